//! Forwarding of broadcast process output into tracing.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, warn};

use streamflow_core::StreamId;

/// Spawn a task that logs each line of `reader` at debug level under the
/// `streamflow::ffmpeg` target.
///
/// The pipe is drained until EOF whatever the bytes look like. Closing it
/// early would let the child die on its next write.
pub fn spawn_line_logger<R>(id: StreamId, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_line_end(&buf));
                    debug!(target: "streamflow::ffmpeg", stream_id = %id, "{line}");
                }
                Err(e) => {
                    warn!(stream_id = %id, error = %e, "Stopped reading broadcast output");
                    break;
                }
            }
        }
    });
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;

    #[test]
    fn line_endings_are_trimmed() {
        assert_eq!(trim_line_end(b"frame=1\r\n"), b"frame=1");
        assert_eq!(trim_line_end(b"frame=2\n"), b"frame=2");
        assert_eq!(trim_line_end(b"tail"), b"tail");
        assert_eq!(trim_line_end(b"\xff\n"), b"\xff");
    }

    #[tokio::test]
    async fn drains_past_invalid_utf8() {
        let (mut writer, reader) = tokio::io::duplex(64);
        spawn_line_logger(StreamId::generate(), reader);

        // Far more than the duplex buffer; stalls if nobody reads.
        let write = async {
            writer.write_all(b"\xff\xfe\n").await?;
            for _ in 0..200 {
                writer
                    .write_all(b"Non-monotonous DTS in output stream\n")
                    .await?;
            }
            writer.shutdown().await
        };
        tokio::time::timeout(Duration::from_secs(5), write)
            .await
            .expect("logger stopped draining")
            .unwrap();
    }
}
