//! Request pipeline for the installer service: route parsing, the query
//! cache, release fetching and script rendering.

pub mod cache;
pub mod error;
pub mod github;
pub mod query;
pub mod resolve;
pub mod route;
pub mod script;

pub use cache::{DEFAULT_TTL, QueryCache};
pub use error::InstallerError;
pub use github::{FetchError, GITHUB_API_URL, GitHubReleases, ReleaseSource};
pub use query::{CacheKey, OwnerPolicy, Query, ScriptType};
pub use resolve::Resolver;
pub use route::{Route, parse_route};
pub use script::ScriptAssembler;

/// User agent sent with upstream requests.
pub const USER_AGENT: &str = concat!("installer/", env!("CARGO_PKG_VERSION"));
