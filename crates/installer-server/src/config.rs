//! Command-line and environment configuration.

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;
use installer_core::{DEFAULT_TTL, GITHUB_API_URL, OwnerPolicy};

#[derive(Debug, Parser)]
#[command(name = "installer")]
#[command(author, version, about = "Serve install scripts for binaries published as GitHub releases")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "INSTALLER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Owner assumed when a path names only the program
    #[arg(long, env = "INSTALLER_USER", default_value = "jpillora")]
    pub user: String,

    /// GitHub API token, raises the upstream rate limit
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Base URL of the GitHub REST API
    #[arg(long, env = "INSTALLER_API_URL", default_value = GITHUB_API_URL)]
    pub api_url: String,

    /// Seconds a resolved query stays cached
    #[arg(long, env = "INSTALLER_CACHE_TTL", default_value_t = DEFAULT_TTL.as_secs())]
    pub cache_ttl: u64,

    /// Upstream request timeout in seconds
    #[arg(long, env = "INSTALLER_TIMEOUT", default_value_t = 10)]
    pub timeout: u64,

    /// Where `/` redirects to
    #[arg(long, env = "INSTALLER_HOMEPAGE", default_value = "https://github.com/jpillora/installer")]
    pub homepage: String,

    /// Owner override for a program, as program=owner (repeatable)
    #[arg(
        long = "alias",
        env = "INSTALLER_ALIASES",
        value_delimiter = ',',
        value_parser = parse_alias,
        default_value = "micro=zyedidia"
    )]
    pub aliases: Vec<(String, String)>,
}

fn parse_alias(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((program, owner)) if !program.is_empty() && !owner.is_empty() => {
            Ok((program.trim().to_string(), owner.trim().to_string()))
        }
        _ => Err(format!("expected program=owner, got '{s}'")),
    }
}

/// Resolved server settings, independent of how they were supplied.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub owners: OwnerPolicy,
    pub token: Option<String>,
    pub api_url: String,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    pub homepage: String,
}

impl ServerConfig {
    /// `host:port` to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            owners: OwnerPolicy {
                default_user: "jpillora".into(),
                aliases: HashMap::from([("micro".to_string(), "zyedidia".to_string())]),
            },
            token: None,
            api_url: GITHUB_API_URL.into(),
            cache_ttl: DEFAULT_TTL,
            timeout: Duration::from_secs(10),
            homepage: "https://github.com/jpillora/installer".into(),
        }
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            owners: OwnerPolicy {
                default_user: cli.user,
                aliases: cli.aliases.into_iter().collect(),
            },
            token: cli.token.filter(|t| !t.is_empty()),
            api_url: cli.api_url,
            cache_ttl: Duration::from_secs(cli.cache_ttl),
            timeout: Duration::from_secs(cli.timeout),
            homepage: cli.homepage,
        }
    }
}
