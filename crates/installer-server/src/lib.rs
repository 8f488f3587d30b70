//! HTTP surface of the installer service.
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Every path other than `/` is an install route,
//! `[/user]/program[@release][!|!!]`, answered with a bash script, a
//! Homebrew formula or a text summary depending on `?type=` or the
//! client's `User-Agent`.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query as Params, State};
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use installer_core::{
    GitHubReleases, InstallerError, Query, QueryCache, ReleaseSource, Resolver, ScriptAssembler,
    ScriptType, parse_route,
};
use installer_schema::{Arch, Os, Platform};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub use config::{Cli, ServerConfig};

/// Shared handles injected into every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub assembler: Arc<ScriptAssembler>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// State backed by the GitHub API named in `config`.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let source = GitHubReleases::new(&config.api_url, config.token.clone(), config.timeout)?;
        Self::with_source(config, Arc::new(source))
    }

    /// State backed by an arbitrary release source.
    pub fn with_source(config: ServerConfig, source: Arc<dyn ReleaseSource>) -> anyhow::Result<Self> {
        let cache = Arc::new(QueryCache::new(config.cache_ttl));
        Ok(Self {
            resolver: Arc::new(Resolver::new(source, cache)),
            assembler: Arc::new(ScriptAssembler::new()?),
            config: Arc::new(config),
        })
    }
}

/// Query-string parameters of an install route.
#[derive(Debug, Default, Deserialize)]
pub struct InstallParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub insecure: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(homepage))
        .fallback(install)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn homepage(State(state): State<AppState>) -> Redirect {
    Redirect::permanent(&state.config.homepage)
}

async fn install(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    Params(params): Params<InstallParams>,
) -> Response {
    let ua = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let by_agent = ScriptType::from_user_agent(ua);
    let kind = match params.kind.as_deref().map(ScriptType::from_param) {
        Some(Ok(kind)) => kind,
        Some(Err(err)) => return error_response(by_agent, &err),
        None => by_agent,
    };

    match serve(&state, kind, uri.path(), &params).await {
        Ok(body) => ([(CONTENT_TYPE, kind.content_type())], body).into_response(),
        Err(err) => error_response(kind, &err),
    }
}

async fn serve(
    state: &AppState,
    kind: ScriptType,
    path: &str,
    params: &InstallParams,
) -> Result<Vec<u8>, InstallerError> {
    let route = parse_route(path)?;
    let mut query = Query::new(route, &state.config.owners);
    query.insecure = params.insecure.as_deref() == Some("1");
    query.target = target(params)?;

    let query = state.resolver.resolve(query).await?;
    let body = state.assembler.render(kind, &query)?;
    info!(
        "serving script {}/{}@{} ({})",
        query.user,
        query.program,
        query.tag,
        kind.extension()
    );
    Ok(body)
}

/// The platform named by `?os=&arch=`. Both must be given together.
fn target(params: &InstallParams) -> Result<Option<Platform>, InstallerError> {
    match (params.os.as_deref(), params.arch.as_deref()) {
        (None, None) => Ok(None),
        (Some(os), Some(arch)) => {
            let os: Os = os.parse().map_err(InstallerError::InvalidRoute)?;
            let arch: Arch = arch.parse().map_err(InstallerError::InvalidRoute)?;
            Ok(Some(Platform::new(os, arch)))
        }
        _ => Err(InstallerError::InvalidRoute(
            "os and arch must be given together".into(),
        )),
    }
}

fn error_response(kind: ScriptType, err: &InstallerError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!(error = %err, "request failed");
    } else {
        warn!(error = %err, "request rejected");
    }
    (
        status,
        [(CONTENT_TYPE, kind.content_type())],
        kind.wrap_error(&err.public_message()),
    )
        .into_response()
}

/// Sweep expired cache entries once per TTL until the runtime shuts down.
pub fn spawn_purge(cache: Arc<QueryCache>) -> JoinHandle<()> {
    let period = cache.ttl().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                debug!(purged, remaining = cache.len(), "purged expired cache entries");
            }
        }
    })
}
