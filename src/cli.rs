use crate::types::InstallMethod;
use clap::{Args, Parser, Subcommand, ValueEnum};

pub fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Tagged HEAD means a release build.
    if let Some(tag) = option_env!("AUTONOMIX_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("AUTONOMIX_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("AUTONOMIX_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup; clap wants a 'static str.
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "autonomix")]
#[command(about = "Track GitHub releases and install them the way your system prefers")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Track a GitHub repository and install its latest release
    #[command(after_help = "Examples:\n  autonomix add https://github.com/cli/cli\n  autonomix add sharkdp/fd --binary")]
    Add {
        /// Repository URL (e.g., 'https://github.com/owner/repo' or 'owner/repo')
        url: String,

        #[command(flatten)]
        method: MethodFlags,
    },

    /// Install the latest release of a tracked app
    Update {
        /// Name of the tracked app
        name: String,

        /// Force a single install method instead of the automatic chain
        #[arg(long, value_enum)]
        method: Option<InstallMethod>,
    },

    /// Check every tracked app for a newer release
    Check,

    /// List tracked apps
    List {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },

    /// Uninstall and stop tracking an app
    Remove {
        /// Name of the tracked app
        name: String,
    },

    /// Stop tracking every app whose last install failed
    Clean,

    /// Show the current version
    Version,
}

/// Forces one install method. At most one may be given.
#[derive(Args, Debug, Default, Clone, Copy)]
#[group(multiple = false)]
pub struct MethodFlags {
    /// Install with Homebrew only
    #[arg(long)]
    pub brew: bool,

    /// Install the binary into ~/.local/bin
    #[arg(long)]
    pub binary: bool,

    /// Install the binary into /usr/local/bin (uses sudo)
    #[arg(long)]
    pub system: bool,

    /// Install the binary into ~/.autonomix/bin
    #[arg(long)]
    pub autonomix: bool,
}

impl MethodFlags {
    pub fn method(&self) -> Option<InstallMethod> {
        if self.brew {
            Some(InstallMethod::Homebrew)
        } else if self.binary {
            Some(InstallMethod::UserPath)
        } else if self.system {
            Some(InstallMethod::SystemPath)
        } else if self.autonomix {
            Some(InstallMethod::AutonomixPath)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
    Yaml,
}
