use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format: "0.3.2" for releases, "0.3.2@abc1234 2024-01-15 14:30" for dev builds
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "notetar", bin_name = "notetar", version = get_version())]
#[command(about = "Export a note subtree as a tar archive with a manifest", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store directory (defaults to the platform data dir)
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the subtree under a branch to a tar archive
    #[command(alias = "x")]
    Export {
        /// Id of the branch whose note becomes the archive root
        branch: String,

        /// Output format for text notes: html, markdown or raw
        #[arg(short, long)]
        format: Option<String>,

        /// Archive path (defaults to "<root title>.tar" in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compress with gzip
        #[arg(short = 'z', long)]
        gzip: bool,
    },

    /// Print the manifest an export would contain
    Manifest {
        /// Id of the branch whose note becomes the archive root
        branch: String,

        /// Output format for text notes: html, markdown or raw
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Get or set configuration
    Config {
        /// Configuration key (default-format, exclude-label, gzip)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },
}
