//! Command line argument parsing

use crate::platform::player::PlayerConfig;
use crate::utils::retry::RetryConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// RTube - decipher signatures and throttle parameters of video stream URLs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// HTTP timeout (e.g., 30s, 1m)
    #[arg(long, global = true, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// HTTP retries for transient errors
    #[arg(long, global = true, default_value = "3")]
    pub retries: u32,

    /// Override User-Agent header
    #[arg(long, global = true, value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Site root for watch pages and player scripts
    #[arg(long, global = true, value_name = "URL", default_value = "https://www.youtube.com")]
    pub base_url: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Decipher a scrambled signature
    Sig {
        #[command(flatten)]
        player: PlayerSource,
        /// Scrambled signature (the `s` value of a signatureCipher)
        signature: String,
    },
    /// Compute the throttle parameter for an `n` value
    Nsig {
        #[command(flatten)]
        player: PlayerSource,
        /// Value of the `n` query parameter
        n: String,
    },
    /// Sign a stream URL
    Sign {
        #[command(flatten)]
        player: PlayerSource,
        /// Stream URL
        url: String,
        /// Scrambled signature to decipher into the URL
        #[arg(short, long, value_name = "SIGNATURE")]
        s: Option<String>,
        /// Query parameter receiving the signature
        #[arg(long, value_name = "PARAM", default_value = "sig")]
        sp: String,
    },
    /// Resolve a video and list its signed streams
    Inspect {
        /// Video URL or ID
        url: String,
        /// Show a single stream
        #[arg(long)]
        itag: Option<u32>,
        /// Print streams as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where the player script comes from
#[derive(clap::Args, Debug, Clone, PartialEq, Default)]
#[group(required = true, multiple = false)]
pub struct PlayerSource {
    /// Player script on disk
    #[arg(long, value_name = "PATH")]
    pub script: Option<PathBuf>,

    /// Player script URL
    #[arg(long, value_name = "URL")]
    pub player_url: Option<String>,
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Fetching configuration from the network options
    pub fn player_config(&self) -> PlayerConfig {
        let mut config = PlayerConfig::default()
            .with_base_url(&self.base_url)
            .with_timeout(self.timeout_duration())
            .with_retry(RetryConfig::default().with_max_retries(self.retries));
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        config
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            command: Command::Inspect {
                url: String::new(),
                itag: None,
                json: false,
            },
            timeout: humantime::Duration::from(Duration::from_secs(30)),
            retries: 3,
            user_agent: None,
            base_url: "https://www.youtube.com".to_string(),
            verbose: false,
            quiet: false,
        }
    }
}
