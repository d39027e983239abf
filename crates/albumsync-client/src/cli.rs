//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// albumsync - browse and import Google Photos albums
#[derive(Debug, Parser)]
#[command(name = "albumsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "ALBUMSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Path to the daemon socket
    #[arg(long, env = "ALBUMSYNC_SOCKET", global = true)]
    pub socket_path: Option<PathBuf>,

    /// Request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground
    Server,

    /// Authentication commands
    Auth {
        #[command(subcommand)]
        provider: AuthProvider,
    },

    /// Page through the albums the daemon's source offers
    Browse(BrowseArgs),

    /// Import albums by id
    Import(ImportArgs),

    /// Show imported albums in display order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show daemon status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask a running daemon to stop
    Stop,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Args)]
pub struct BrowseArgs {
    /// Number of pages to load
    #[arg(long, default_value_t = 1, conflicts_with = "all")]
    pub pages: usize,

    /// Keep loading until the source has no more pages
    #[arg(long)]
    pub all: bool,

    /// Albums per page, 1 to 50 (overrides config)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// External album ids
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub ids: Vec<String>,

    /// Browse every page first, then import everything found
    #[arg(long)]
    pub all: bool,

    /// Milliseconds between imports (overrides config)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Output the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum AuthProvider {
    /// Authorize read-only access to Google Photos
    #[cfg(feature = "google")]
    Google {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to the credentials JSON downloaded from Google Cloud Console
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Re-authorize even if tokens are already stored
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Dump,
    /// Check the configuration
    Validate,
    /// Show the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_browse_flags() {
        let cli = Cli::try_parse_from(["albumsync", "browse", "--all", "--page-size", "10", "--json"])
            .unwrap();
        match cli.command {
            Command::Browse(args) => {
                assert!(args.all);
                assert_eq!(args.page_size, Some(10));
                assert!(args.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn import_needs_ids_or_all() {
        assert!(Cli::try_parse_from(["albumsync", "import"]).is_err());
        assert!(Cli::try_parse_from(["albumsync", "import", "a", "--all"]).is_err());

        let cli = Cli::try_parse_from(["albumsync", "import", "AF1", "AF2"]).unwrap();
        match cli.command {
            Command::Import(args) => assert_eq!(args.ids, vec!["AF1", "AF2"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["albumsync", "list", "--socket-path", "/tmp/a.sock", "-v"]).unwrap();
        assert!(cli.debug);
        assert_eq!(cli.socket_path, Some(PathBuf::from("/tmp/a.sock")));
    }
}
