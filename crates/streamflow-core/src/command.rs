//! ffmpeg invocation builder.
//!
//! Produces an argument vector, never a shell string: source paths and
//! ingest keys are passed to the OS as opaque arguments.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{Destination, DestinationError};

/// ffmpeg `-loglevel` used when none is configured.
pub const DEFAULT_FFMPEG_LOG_LEVEL: &str = "warning";

/// Reasons a broadcast command cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("source media path is required")]
    MissingSource,

    #[error("at least one destination is required")]
    NoDestinations,

    #[error(transparent)]
    Destination(#[from] DestinationError),
}

/// A fully resolved program + argument vector.
///
/// Carries a second, display-only rendering where ingest keys are masked;
/// `Debug` and [`BroadcastCommand::redacted`] only ever show that one.
#[derive(Clone, PartialEq, Eq)]
pub struct BroadcastCommand {
    program: PathBuf,
    args: Vec<OsString>,
    display: String,
}

impl BroadcastCommand {
    /// Wrap an arbitrary program and arguments. The display form is the
    /// arguments as given.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let program = program.into();
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let mut display = program.to_string_lossy().into_owned();
        for arg in &args {
            display.push(' ');
            display.push_str(&arg.to_string_lossy());
        }
        Self {
            program,
            args,
            display,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Printable command line with secrets masked.
    pub fn redacted(&self) -> &str {
        &self.display
    }

    pub fn into_parts(self) -> (PathBuf, Vec<OsString>) {
        (self.program, self.args)
    }
}

impl fmt::Debug for BroadcastCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BroadcastCommand")
            .field(&self.display)
            .finish()
    }
}

/// Builder for the looped, copy-codec, multi-output ffmpeg invocation.
///
/// ```text
/// ffmpeg -hide_banner -nostdin -loglevel warning
///        -stream_loop -1 -re -i <source>
///        -c:v copy -c:a copy -f flv <ingest-url>   (once per destination)
/// ```
///
/// The settings part (`ffmpeg_path`, `log_level`) is cloned per request,
/// so a configured builder doubles as a template.
#[derive(Debug, Clone)]
pub struct BroadcastCommandBuilder {
    ffmpeg_path: PathBuf,
    log_level: String,
    source: Option<PathBuf>,
    destinations: Vec<Destination>,
}

impl BroadcastCommandBuilder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            log_level: DEFAULT_FFMPEG_LOG_LEVEL.to_string(),
            source: None,
            destinations: Vec::new(),
        }
    }

    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    #[must_use]
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    #[must_use]
    pub fn destination(mut self, destination: Destination) -> Self {
        self.destinations.push(destination);
        self
    }

    #[must_use]
    pub fn destinations(mut self, destinations: impl IntoIterator<Item = Destination>) -> Self {
        self.destinations.extend(destinations);
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Validate inputs and produce the command.
    pub fn build(self) -> Result<BroadcastCommand, CommandError> {
        let source = self
            .source
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(CommandError::MissingSource)?;
        if self.destinations.is_empty() {
            return Err(CommandError::NoDestinations);
        }
        for destination in &self.destinations {
            destination.validate()?;
        }

        let mut args = ArgList::default();
        args.push("-hide_banner");
        args.push("-nostdin");
        args.push("-loglevel");
        args.push(self.log_level.as_str());
        // Loop forever and read at native frame rate.
        args.push("-stream_loop");
        args.push("-1");
        args.push("-re");
        args.push("-i");
        args.push(source.as_os_str());

        // Output options only bind to the next output, so repeat per target.
        for destination in &self.destinations {
            args.push("-c:v");
            args.push("copy");
            args.push("-c:a");
            args.push("copy");
            args.push("-f");
            args.push("flv");
            args.push_secret(destination.ingest_url(), destination.redacted_url());
        }

        let mut display = self.ffmpeg_path.to_string_lossy().into_owned();
        for shown in &args.shown {
            display.push(' ');
            display.push_str(shown);
        }

        Ok(BroadcastCommand {
            program: self.ffmpeg_path,
            args: args.real,
            display,
        })
    }
}

#[derive(Default)]
struct ArgList {
    real: Vec<OsString>,
    shown: Vec<String>,
}

impl ArgList {
    fn push(&mut self, arg: impl AsRef<std::ffi::OsStr>) {
        let arg = arg.as_ref();
        self.shown.push(arg.to_string_lossy().into_owned());
        self.real.push(arg.to_os_string());
    }

    fn push_secret(&mut self, real: String, shown: String) {
        self.real.push(real.into());
        self.shown.push(shown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &BroadcastCommand) -> Vec<String> {
        cmd.args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn builds_looped_copy_invocation_for_single_destination() {
        let cmd = BroadcastCommandBuilder::new("/usr/bin/ffmpeg")
            .source("/srv/uploads/1-clip.mp4")
            .destination(Destination::youtube("yt-key"))
            .build()
            .unwrap();

        assert_eq!(cmd.program(), Path::new("/usr/bin/ffmpeg"));
        assert_eq!(
            args_of(&cmd),
            [
                "-hide_banner",
                "-nostdin",
                "-loglevel",
                "warning",
                "-stream_loop",
                "-1",
                "-re",
                "-i",
                "/srv/uploads/1-clip.mp4",
                "-c:v",
                "copy",
                "-c:a",
                "copy",
                "-f",
                "flv",
                "rtmp://a.rtmp.youtube.com/live2/yt-key",
            ]
        );
    }

    #[test]
    fn fans_out_one_output_per_destination_in_order() {
        let cmd = BroadcastCommandBuilder::new("ffmpeg")
            .source("in.mp4")
            .destination(Destination::youtube("A"))
            .destination(Destination::facebook("B"))
            .build()
            .unwrap();
        let args = args_of(&cmd);

        let outputs: Vec<&String> = args
            .iter()
            .filter(|a| a.contains("://"))
            .collect();
        assert_eq!(
            outputs,
            [
                "rtmp://a.rtmp.youtube.com/live2/A",
                "rtmps://live-api-s.facebook.com:443/rtmp/B"
            ]
        );
        assert_eq!(args.iter().filter(|a| *a == "flv").count(), 2);
    }

    #[test]
    fn paths_with_spaces_and_quotes_stay_single_arguments() {
        let source = "/tmp/my \"weird\" $(clip).mp4";
        let cmd = BroadcastCommandBuilder::new("ffmpeg")
            .source(source)
            .destination(Destination::youtube("k"))
            .build()
            .unwrap();
        assert!(args_of(&cmd).iter().any(|a| a == source));
    }

    #[test]
    fn redacted_display_hides_keys() {
        let cmd = BroadcastCommandBuilder::new("ffmpeg")
            .log_level("error")
            .source("in.mp4")
            .destination(Destination::youtube("top-secret"))
            .build()
            .unwrap();
        assert!(!cmd.redacted().contains("top-secret"));
        assert!(!format!("{cmd:?}").contains("top-secret"));
        assert!(cmd.redacted().contains("-loglevel error"));
        assert!(cmd.redacted().contains("rtmp://a.rtmp.youtube.com/live2/****"));
    }

    #[test]
    fn rejects_missing_source_and_empty_destinations() {
        let err = BroadcastCommandBuilder::new("ffmpeg")
            .destination(Destination::youtube("k"))
            .build()
            .unwrap_err();
        assert_eq!(err, CommandError::MissingSource);

        let err = BroadcastCommandBuilder::new("ffmpeg")
            .source("")
            .destination(Destination::youtube("k"))
            .build()
            .unwrap_err();
        assert_eq!(err, CommandError::MissingSource);

        let err = BroadcastCommandBuilder::new("ffmpeg")
            .source("in.mp4")
            .build()
            .unwrap_err();
        assert_eq!(err, CommandError::NoDestinations);
    }

    #[test]
    fn rejects_invalid_destination_key() {
        let err = BroadcastCommandBuilder::new("ffmpeg")
            .source("in.mp4")
            .destination(Destination::youtube("ok"))
            .destination(Destination::facebook(""))
            .build()
            .unwrap_err();
        assert!(matches!(err, CommandError::Destination(_)));
    }

    #[test]
    fn plain_command_display_matches_args() {
        let cmd = BroadcastCommand::new("/bin/sleep", ["30"]);
        assert_eq!(cmd.redacted(), "/bin/sleep 30");
        let (program, args) = cmd.into_parts();
        assert_eq!(program, PathBuf::from("/bin/sleep"));
        assert_eq!(args, vec![OsString::from("30")]);
    }
}
