//! The per-request query and its canonical cache key.

use std::collections::HashMap;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use installer_schema::{Asset, Platform, PlatformAsset};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::InstallerError;
use crate::route::Route;

static TERMINAL_UA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(curl|wget)/").expect("literal regex"));
static HOMEBREW_UA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^homebrew").expect("literal regex"));

/// The kind of document to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    /// Bash install script.
    Script,
    /// Homebrew formula.
    Ruby,
    /// Human-readable summary.
    Text,
}

impl ScriptType {
    /// Parse the `type` query parameter.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidRoute`] for unknown values.
    pub fn from_param(value: &str) -> Result<Self, InstallerError> {
        match value {
            "script" => Ok(Self::Script),
            "homebrew" | "ruby" => Ok(Self::Ruby),
            "text" => Ok(Self::Text),
            other => Err(InstallerError::InvalidRoute(format!("unknown type {other}"))),
        }
    }

    /// Infer the type from the client's `User-Agent`.
    pub fn from_user_agent(ua: &str) -> Self {
        if TERMINAL_UA.is_match(ua) {
            Self::Script
        } else if HOMEBREW_UA.is_match(ua) {
            Self::Ruby
        } else {
            Self::Text
        }
    }

    /// Response `Content-Type`.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Script => "text/x-shellscript",
            Self::Ruby => "text/ruby",
            Self::Text => "text/plain",
        }
    }

    /// File extension of the rendered document.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Script => "sh",
            Self::Ruby => "rb",
            Self::Text => "txt",
        }
    }

    /// Wrap an already sanitized error message so that the document prints
    /// it instead of running anything.
    pub fn wrap_error(self, msg: &str) -> String {
        match self {
            Self::Script => format!("echo 'installer error: {msg}'\nexit 1\n"),
            Self::Ruby => format!("odie \"installer error: {msg}\"\n"),
            Self::Text => format!("echo '{msg}'\n"),
        }
    }
}

/// How a missing owner is filled in.
#[derive(Debug, Clone, Default)]
pub struct OwnerPolicy {
    /// Owner used when the route names none.
    pub default_user: String,
    /// Per-program owner overrides.
    pub aliases: HashMap<String, String>,
}

/// A cache fingerprint: base64 of a SHA-256 over the query identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// The encoded fingerprint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The query could not be serialized for hashing.
#[derive(Error, Debug)]
#[error("failed to encode cache key: {0}")]
pub struct CacheKeyError(#[from] serde_json::Error);

/// One install request, and after resolution, its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    /// When the request arrived.
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub program: String,
    /// Requested tag, empty for latest.
    pub release: String,
    pub move_to_path: bool,
    pub sudo_move: bool,
    /// The owner was defaulted and may be replaced by a repository search.
    pub search: bool,
    pub insecure: bool,
    /// Requested platform, when the client named one.
    pub target: Option<Platform>,
    /// Tag of the release that was actually fetched.
    pub tag: String,
    /// The asset picked for `target`.
    pub resolved_asset: Option<Asset>,
    /// One asset per supported platform.
    pub assets: Vec<PlatformAsset>,
}

impl Query {
    /// Build a query from a parsed route, filling in the owner.
    pub fn new(route: Route, owners: &OwnerPolicy) -> Self {
        let (user, search) = match route.user {
            Some(user) => (user, false),
            None => match owners.aliases.get(&route.program) {
                Some(owner) => (owner.clone(), false),
                None => (owners.default_user.clone(), true),
            },
        };
        Self {
            timestamp: Utc::now(),
            user,
            program: route.program,
            release: route.release.unwrap_or_default(),
            move_to_path: route.move_to_path,
            sudo_move: route.sudo_move,
            search,
            insecure: false,
            target: None,
            tag: String::new(),
            resolved_asset: None,
            assets: Vec::new(),
        }
    }

    /// Fingerprint of the query identity. Volatile and derived fields
    /// (`timestamp`, `tag`, `resolved_asset`, `assets`) are zeroed first.
    ///
    /// # Errors
    ///
    /// Returns [`CacheKeyError`] if serialization fails; callers should skip
    /// the cache rather than fail the request.
    pub fn canonical_key(&self) -> Result<CacheKey, CacheKeyError> {
        let mut identity = self.clone();
        identity.timestamp = DateTime::<Utc>::default();
        identity.tag = String::new();
        identity.resolved_asset = None;
        identity.assets = Vec::new();

        let encoded = serde_json::to_vec(&identity)?;
        let digest = Sha256::digest(&encoded);
        Ok(CacheKey(STANDARD.encode(digest)))
    }

    /// Version string without a leading `v`.
    pub fn version(&self) -> &str {
        self.tag.strip_prefix('v').unwrap_or(&self.tag)
    }
}
