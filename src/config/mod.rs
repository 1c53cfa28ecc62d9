//! Configuration management for the Jamf Pro MCP server.
//!
//! Values come from three layers, highest precedence first: command-line
//! arguments (each with an environment variable fallback), an optional YAML or
//! JSON config file, and built-in defaults.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::mcp::resources::COMMON_RESOURCE_DIRS;
use crate::tools::descriptions::DEFAULT_DESCRIPTIONS_FILE;
use crate::tools::ALL_TOOLSETS;

/// Default server name reported during `initialize`.
pub const DEFAULT_SERVER_NAME: &str = "jamfpro-mcp-server";

/// Command-line arguments for the Jamf Pro MCP server.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "jamfpro-mcp-server")]
#[command(author = "Jamf Pro MCP Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server exposing Jamf Pro device management over stdio")]
pub struct Args {
    /// Config file (YAML or JSON)
    #[arg(short, long, env = "JAMF_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server name reported to clients
    #[arg(long, env = "JAMF_MCP_SERVER_NAME")]
    pub server_name: Option<String>,

    /// Jamf Pro instance URL, e.g. https://example.jamfcloud.com
    #[arg(short = 'u', long, env = "JAMFPRO_URL")]
    pub instance_url: Option<String>,

    /// Authentication method
    #[arg(long, value_enum, env = "JAMFPRO_AUTH_METHOD")]
    pub auth_method: Option<AuthMethod>,

    /// OAuth2 client ID
    #[arg(long, env = "JAMFPRO_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "JAMFPRO_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Basic auth username
    #[arg(long, env = "JAMFPRO_USERNAME")]
    pub username: Option<String>,

    /// Basic auth password
    #[arg(long, env = "JAMFPRO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Comma-separated toolsets to enable, or "all"
    #[arg(short, long, value_delimiter = ',', env = "JAMF_MCP_TOOLSETS")]
    pub toolsets: Vec<String>,

    /// Log level filter (RUST_LOG takes precedence)
    #[arg(short, long, env = "JAMF_MCP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, env = "JAMF_MCP_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Directory that resource directories are resolved against
    #[arg(long, env = "JAMF_MCP_RESOURCE_ROOT")]
    pub resource_root: Option<PathBuf>,

    /// Comma-separated directories exposed as resources
    #[arg(long, value_delimiter = ',', env = "JAMF_MCP_RESOURCE_DIRS")]
    pub resource_dirs: Vec<String>,

    /// Tool description overrides file
    #[arg(long, env = "JAMF_MCP_DESCRIPTIONS_FILE")]
    pub descriptions_file: Option<PathBuf>,

    /// Write the current tool descriptions to the overrides file and exit
    #[arg(long)]
    pub export_descriptions: bool,
}

/// How the server authenticates against Jamf Pro.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    #[value(name = "oauth2")]
    OAuth2,
    Basic,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name reported in `serverInfo`
    pub server_name: String,
    /// Jamf Pro instance URL
    pub instance_url: Option<String>,
    /// Authentication method
    pub auth_method: AuthMethod,
    /// OAuth2 client ID
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    /// Basic auth username
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Enabled toolsets
    pub toolsets: Vec<String>,
    /// Log level filter
    pub log_level: String,
    /// Log format
    pub log_format: LogFormat,
    /// Resource root directory
    pub resource_root: PathBuf,
    /// Resource directories, relative to the root
    pub resource_dirs: Vec<String>,
    /// Tool description overrides file
    pub descriptions_file: PathBuf,
    /// Export descriptions and exit
    #[serde(skip)]
    pub export_descriptions: bool,
}

impl Config {
    /// Build the configuration from arguments, the config file and defaults.
    ///
    /// An explicit `--config` path must exist. Without one, the per-user file
    /// under the platform config directory is used when present.
    pub fn load(args: Args) -> Result<Self> {
        let base = match args.config.clone() {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        Ok(base.merge_args(args))
    }

    /// Parse a config file. `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        debug!("Loading configuration from {}", path.display());

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Overlay values given on the command line or in the environment.
    pub fn merge_args(mut self, args: Args) -> Self {
        if let Some(name) = args.server_name {
            self.server_name = name;
        }
        if args.instance_url.is_some() {
            self.instance_url = args.instance_url;
        }
        if let Some(method) = args.auth_method {
            self.auth_method = method;
        }
        if args.client_id.is_some() {
            self.client_id = args.client_id;
        }
        if args.client_secret.is_some() {
            self.client_secret = args.client_secret;
        }
        if args.username.is_some() {
            self.username = args.username;
        }
        if args.password.is_some() {
            self.password = args.password;
        }
        if !args.toolsets.is_empty() {
            self.toolsets = args.toolsets;
        }
        if let Some(level) = args.log_level {
            self.log_level = level;
        }
        if let Some(format) = args.log_format {
            self.log_format = format;
        }
        if let Some(root) = args.resource_root {
            self.resource_root = root;
        }
        if !args.resource_dirs.is_empty() {
            self.resource_dirs = args.resource_dirs;
        }
        if let Some(path) = args.descriptions_file {
            self.descriptions_file = path;
        }
        self.export_descriptions |= args.export_descriptions;
        self
    }

    /// Check the configuration against the known toolset names.
    pub fn validate<S: AsRef<str>>(&self, known_toolsets: &[S]) -> Result<()> {
        if let Some(url) = &self.instance_url {
            validate_url(url)?;

            match self.auth_method {
                AuthMethod::OAuth2 if is_blank(&self.client_id) || is_blank(&self.client_secret) => {
                    return Err(Error::Config(
                        "client ID and client secret are required for OAuth2 authentication"
                            .to_string(),
                    ));
                }
                AuthMethod::Basic if is_blank(&self.username) || is_blank(&self.password) => {
                    return Err(Error::Config(
                        "username and password are required for basic authentication".to_string(),
                    ));
                }
                _ => {}
            }
        }

        for name in &self.toolsets {
            let name = name.trim();
            if name != ALL_TOOLSETS && !known_toolsets.iter().any(|k| k.as_ref() == name) {
                return Err(Error::UnknownToolset(name.to_string()));
            }
        }

        Ok(())
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config::default().merge_args(args)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: DEFAULT_SERVER_NAME.to_string(),
            instance_url: None,
            auth_method: AuthMethod::OAuth2,
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            toolsets: vec![ALL_TOOLSETS.to_string()],
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            resource_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            resource_dirs: COMMON_RESOURCE_DIRS.iter().map(|d| d.to_string()).collect(),
            descriptions_file: PathBuf::from(DEFAULT_DESCRIPTIONS_FILE),
            export_descriptions: false,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_name", &self.server_name)
            .field("instance_url", &self.instance_url)
            .field("auth_method", &self.auth_method)
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("toolsets", &self.toolsets)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("resource_root", &self.resource_root)
            .field("resource_dirs", &self.resource_dirs)
            .field("descriptions_file", &self.descriptions_file)
            .field("export_descriptions", &self.export_descriptions)
            .finish()
    }
}

/// `<config_dir>/jamfpro-mcp/config.yaml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jamfpro-mcp").join("config.yaml"))
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "***")
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn validate_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            Error::Config(format!("instance URL must start with http:// or https://: {}", url))
        })?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(Error::Config(format!("instance URL has no valid host: {}", url)));
    }
    Ok(())
}
