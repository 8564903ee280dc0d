use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{CliConfig, DEFAULT_CONFIG_FILE};

/// Paginated collection harvester.
#[derive(Parser, Debug)]
#[command(name = "harvester", version, about = "Harvest profile collections to JSON")]
pub struct Cli {
    /// RON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Session cookie header value (must include ds_user_id)
    #[arg(long, env = "HARVESTER_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,

    /// Directory for JSON exports and log files
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Also write a timestamped log file into the output directory
    #[arg(long)]
    pub log_file: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Fold command line overrides into the file configuration.
    pub fn apply(&self, config: &mut CliConfig) {
        if let Some(cookie) = &self.cookie {
            config.session_cookie = Some(cookie.clone());
        }
        if let Some(out) = &self.out {
            config.output_dir = Some(out.clone());
        }
        config.log_to_file |= self.log_file;
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// Items wanted; 0 takes the whole collection (one page for explore/hashtag)
    #[arg(short = 'n', long, default_value_t = 0)]
    pub count: u32,

    /// Items per request
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Cursor to resume from
    #[arg(long, default_value = "")]
    pub after: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve and export a profile
    Profile { username: String },
    /// Harvest a profile's media posts
    Media {
        username: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Harvest the accounts a profile follows
    Following {
        username: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Harvest a profile's followers
    Followers {
        username: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Harvest the session's explore feed
    Explore {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Harvest media under a hashtag
    Hashtag {
        tag: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Fetch a profile's current story reel
    Story { username: String },
    /// Fetch the session's notification feed
    Notifications,
    /// Run a blended search
    Search { query: String },
}
