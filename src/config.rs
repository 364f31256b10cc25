use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Salvage workspace client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the workspace backend
    #[arg(long, env = "SALVAGE_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Path to the session database
    #[arg(long, env = "SALVAGE_SESSION_FILE")]
    pub session_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "10")]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in to the workspace
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Create a workspace account
    Signup {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Drop the stored session
    Logout,

    /// Show the locally evaluated session state
    Status,

    /// List your source files
    Files,

    /// Upload a C source file
    Save {
        /// Path to the C file
        path: PathBuf,

        /// Record name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a file record by id
    Delete { id: i64 },

    /// Transpile a C source file to Rust
    Transpile {
        /// Path to the C file
        path: PathBuf,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub session_file: PathBuf,
    pub log_level: String,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let config = Self::from_args(&args)?;
        Ok((config, args.command))
    }

    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let session_file = match &args.session_file {
            Some(path) => expand_tilde(path),
            None => default_session_file()?,
        };

        Ok(Config {
            api_url: args.api_url.trim_end_matches('/').to_string(),
            session_file,
            log_level: args.log_level.clone(),
            http_connect_timeout: args.connect_timeout,
            http_request_timeout: args.request_timeout,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("SALVAGE_API_URL must be an http(s) URL: {}", self.api_url);
        }

        Ok(())
    }
}

fn default_session_file() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not determine the user data directory")?;
    Ok(data_dir.join("salvage").join("session.sqlite3"))
}

/// Expand tilde (~) in file paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}
