//! Command Line Interface (CLI) arguments.

use clap::Parser;
use std::path::PathBuf;
use url::Url;

/// Snapgate command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the gateway should listen
    #[arg(long, default_value = "0.0.0.0", env = "SNAPGATE_HOST")]
    pub host: String,
    /// The port to which the gateway should bind
    #[arg(long, default_value_t = 8080, env = "SNAPGATE_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "SNAPGATE_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/snapgate/certs/cert.pem",
        env = "SNAPGATE_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/snapgate/certs/key.pem",
        env = "SNAPGATE_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "SNAPGATE_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Root directory that explicit dataset filenames are confined to
    #[arg(long, env = "SNAPGATE_DATA_ROOT")]
    pub data_root: PathBuf,
    /// Path to a JSON file mapping dataset aliases to paths
    #[arg(long, env = "SNAPGATE_ALIAS_FILE")]
    pub alias_file: Option<PathBuf>,
    /// URL of the identity provider that verifies credentials
    #[arg(long, env = "SNAPGATE_AUTH_URL")]
    pub auth_url: Url,
    /// Timeout in seconds for identity provider requests
    #[arg(long, default_value_t = 30, env = "SNAPGATE_AUTH_TIMEOUT")]
    pub auth_timeout: u64,
    /// Secret used to sign bearer tokens
    #[arg(long, env = "SNAPGATE_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,
    /// Bearer token lifespan in seconds
    #[arg(long, default_value_t = 3600, env = "SNAPGATE_TOKEN_LIFETIME")]
    pub token_lifetime: u64,
    /// Clock skew in seconds tolerated when checking token expiry
    #[arg(long, default_value_t = 0, env = "SNAPGATE_TOKEN_LEEWAY")]
    pub token_leeway: u64,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
