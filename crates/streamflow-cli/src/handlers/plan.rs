//! Plan command handler.
//!
//! Shows exactly what `serve` would run for a broadcast, with stream keys
//! redacted.

use streamflow_core::{Destination, SupervisorSettings};

use crate::commands::PlanArgs;
use crate::error::CliError;

/// Render the redacted ffmpeg command line for `args`.
pub fn render(args: &PlanArgs) -> Result<String, CliError> {
    let settings = SupervisorSettings {
        ffmpeg_path: args.ffmpeg.ffmpeg_path.clone(),
        ffmpeg_log_level: args.ffmpeg.ffmpeg_log_level.clone(),
        ..SupervisorSettings::default()
    };
    settings.validate()?;

    let destinations = args
        .youtube
        .iter()
        .map(Destination::youtube)
        .chain(args.facebook.iter().map(Destination::facebook));
    let command = settings
        .command_builder()
        .source(&args.source)
        .destinations(destinations)
        .build()?;

    Ok(command.redacted().to_string())
}

/// Execute the plan command.
pub fn execute(args: &PlanArgs) -> Result<(), CliError> {
    if !args.source.is_file() {
        tracing::warn!(source = %args.source.display(), "Source file does not exist yet");
    }
    println!("{}", render(args)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::FfmpegArgs;
    use std::path::PathBuf;
    use tokio_test::{assert_err, assert_ok};

    fn args(youtube: Option<&str>, facebook: Option<&str>) -> PlanArgs {
        PlanArgs {
            source: PathBuf::from("/srv/clip.mp4"),
            youtube: youtube.map(str::to_owned),
            facebook: facebook.map(str::to_owned),
            ffmpeg: FfmpegArgs {
                ffmpeg_path: PathBuf::from("ffmpeg"),
                ffmpeg_log_level: "warning".to_string(),
            },
        }
    }

    #[test]
    fn render_redacts_keys() {
        let line = assert_ok!(render(&args(Some("yt-secret"), Some("fb-secret"))));
        assert!(line.starts_with("ffmpeg "), "{line}");
        assert!(line.contains("-stream_loop -1 -re -i /srv/clip.mp4"), "{line}");
        assert!(line.contains("rtmp://a.rtmp.youtube.com/live2/"), "{line}");
        assert!(line.contains("rtmps://live-api-s.facebook.com:443/rtmp/"), "{line}");
        assert!(!line.contains("yt-secret"));
        assert!(!line.contains("fb-secret"));
    }

    #[test]
    fn render_rejects_bad_key() {
        let err = assert_err!(render(&args(Some("has space"), None)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn render_rejects_bad_log_level() {
        let mut plan = args(Some("k"), None);
        plan.ffmpeg.ffmpeg_log_level = "loud".to_string();
        assert_eq!(assert_err!(render(&plan)).exit_code(), 78);
    }
}
