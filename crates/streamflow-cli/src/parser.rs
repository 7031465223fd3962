//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Looped video broadcasting to YouTube and Facebook via ffmpeg.
#[derive(Debug, Parser)]
#[command(name = "streamflow")]
#[command(about = "Supervise looped ffmpeg broadcasts to live platforms")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["streamflow", "serve", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Serve(_)));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["streamflow"]).is_err());
    }
}
