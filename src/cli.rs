//! Command-line arguments.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "vocab-sync", version, about = "Merge vocabulary batches into the flashcard store and its audio")]
pub struct Cli {
    /// Configuration file (.yaml, .toml or .json), layered over the user config.
    #[arg(short, long, global = true, env = "VOCAB_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report what would happen without writing the store, the batch or any audio.
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// More logging; repeat for more. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}
impl Cli {
    pub fn level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge the batch into the store, synthesizing missing audio.
    Sync {
        /// Also delete audio files no entry references.
        #[arg(long)]
        delete_orphans: bool,
    },
    /// Check the store against the audio roots.
    Verify {
        /// Delete audio files no entry references.
        #[arg(long)]
        delete_orphans: bool,
    },
    /// Remove duplicate entries and example sentences from the store.
    Dedup,
    /// Print the effective configuration, secrets masked.
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case::quiet(&["vocab-sync", "sync"], LevelFilter::INFO)]
    #[case::debug(&["vocab-sync", "-v", "sync"], LevelFilter::DEBUG)]
    #[case::trace(&["vocab-sync", "verify", "-vvv"], LevelFilter::TRACE)]
    fn test_verbosity(#[case] args: &[&str], #[case] expected: LevelFilter) {
        assert_eq!(Cli::parse_from(args).level(), expected);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["vocab-sync", "verify", "--delete-orphans", "--dry-run", "-c", "vocab.toml"]);
        assert!(cli.dry_run);
        assert_eq!(cli.config, Some(PathBuf::from("vocab.toml")));
        assert!(matches!(cli.command, Command::Verify { delete_orphans: true }));
    }
}
