use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lwshell - store remote hosts and open interactive SSH sessions to them
#[derive(Parser, Debug)]
#[command(name = "lwshell")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Connect to the host with this ID (used by `open` to relaunch itself)
    #[arg(long, value_name = "ID")]
    pub connect_id: Option<String>,

    /// Directory holding servers.json, settings.toml and access.log
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open an interactive session to a saved host
    Connect {
        /// Host ID
        id: String,

        /// Private key to use instead of the host's configured key
        #[arg(short, long)]
        key: Option<PathBuf>,

        /// Window title to keep while connected
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List saved hosts by group
    List,

    /// Add a new host
    Add {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Hostname or IP address
        #[arg(short = 'H', long)]
        host: String,

        /// SSH port
        #[arg(short, long, default_value = "22")]
        port: u16,

        /// Login user
        #[arg(short, long)]
        user: String,

        /// Password
        #[arg(long)]
        password: Option<String>,

        /// Private key path
        #[arg(short, long)]
        key: Option<String>,

        /// Group label
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Remove a saved host
    Remove {
        /// Host ID
        id: String,
    },

    /// Export all hosts as JSON (includes secrets)
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import hosts from an exported JSON file
    Import {
        file: PathBuf,

        /// Replace all hosts instead of merging by ID
        #[arg(long)]
        replace: bool,
    },

    /// Open a new terminal window connected to a saved host
    Open {
        /// Host ID
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_connect_id_flag() {
        let cli = Cli::parse_from(["lwshell", "--connect-id=7"]);
        assert_eq!(cli.connect_id.as_deref(), Some("7"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_connect_subcommand() {
        let cli = Cli::parse_from(["lwshell", "connect", "3", "--key", "/tmp/id", "--title", "db"]);
        match cli.command {
            Some(Commands::Connect { id, key, title }) => {
                assert_eq!(id, "3");
                assert_eq!(key, Some(PathBuf::from("/tmp/id")));
                assert_eq!(title.as_deref(), Some("db"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["lwshell", "list", "--config-dir", "/tmp/lw", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/lw")));
    }
}
