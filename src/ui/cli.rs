use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// passrun - Find a pass(1) entry and copy its secret
#[derive(Parser, Debug)]
#[command(name = "passrun")]
#[command(about = "Query a password store and copy secrets to the clipboard", long_about = None)]
#[command(version)]
#[command(subcommand_required = false)]
#[command(arg_required_else_help = false)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Password store directory (default: $PASSWORD_STORE_DIR or ~/.password-store)
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Config file (default: <config dir>/passrun/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match entries against a query
    Query {
        /// Query text; `pass <text>` scopes it to the store
        text: String,
        /// Single-runner mode: no minimum query length
        #[arg(short, long)]
        single: bool,
        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every entry in the store
    List,
    /// Show the configured actions
    Actions {
        /// Print actions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decrypt an entry and copy its secret, clearing it after the timeout
    Copy {
        /// Entry identifier, e.g. email/work
        entry: String,
        /// Name of the action to extract with
        #[arg(short, long)]
        action: Option<String>,
        /// Log the notification instead of sending a desktop notification
        #[arg(long)]
        quiet: bool,
    },
    /// Keep the index current and log every rebuild until interrupted
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_copy_with_action() {
        let cli = Cli::parse_from(["passrun", "--store-dir", "/s", "copy", "email/work", "-a", "Username"]);
        assert_eq!(cli.store_dir, Some(PathBuf::from("/s")));
        match cli.command {
            Some(Commands::Copy { entry, action, quiet }) => {
                assert_eq!(entry, "email/work");
                assert_eq!(action.as_deref(), Some("Username"));
                assert!(!quiet);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_means_interactive() {
        let cli = Cli::parse_from(["passrun", "-vv"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 2);
    }
}
