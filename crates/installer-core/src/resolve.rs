//! The resolution pipeline: cache lookup, release fetch, asset selection.

use std::sync::Arc;

use installer_schema::{PlatformAsset, Release, platform_table, select_asset};
use tracing::{debug, info, warn};

use crate::cache::QueryCache;
use crate::error::InstallerError;
use crate::github::{FetchError, ReleaseSource};
use crate::query::Query;

/// Resolves queries against a [`ReleaseSource`], memoizing results.
pub struct Resolver {
    source: Arc<dyn ReleaseSource>,
    cache: Arc<QueryCache>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(source: Arc<dyn ReleaseSource>, cache: Arc<QueryCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Resolve a freshly built query.
    ///
    /// A cached result is returned as-is. On a miss the whole pipeline runs
    /// before anything is stored; concurrent misses for one key may each run
    /// it. A key that cannot be computed only disables caching for this
    /// request.
    pub async fn resolve(&self, mut query: Query) -> Result<Query, InstallerError> {
        let key = match query.canonical_key() {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "cache disabled for request");
                None
            }
        };

        if let Some(key) = &key {
            if let Some(hit) = self.cache.get(key) {
                debug!(user = %hit.user, program = %hit.program, "cache hit");
                return Ok(hit);
            }
            debug!(user = %query.user, program = %query.program, "cache miss");
        }

        let release = self.fetch(&mut query).await?;
        attach_assets(&mut query, &release)?;

        if let Some(key) = key {
            self.cache.put(key, query.clone());
        }
        Ok(query)
    }

    async fn fetch(&self, query: &mut Query) -> Result<Release, InstallerError> {
        let tag = (!query.release.is_empty()).then(|| query.release.clone());
        let first = self
            .source
            .fetch_release(&query.user, &query.program, tag.as_deref())
            .await;

        match first {
            Err(FetchError::NotFound(what)) if query.search => {
                let Some(owner) = self.source.find_owner(&query.program).await? else {
                    return Err(InstallerError::NotFound(what));
                };
                if owner == query.user {
                    return Err(InstallerError::NotFound(what));
                }
                info!(program = %query.program, %owner, "owner found by repository search");
                query.user = owner;
                Ok(self
                    .source
                    .fetch_release(&query.user, &query.program, tag.as_deref())
                    .await?)
            }
            other => Ok(other?),
        }
    }
}

/// Attach the selected asset(s) for `release` to `query`.
///
/// With a target, exactly one asset is selected and selection failures
/// end the request. Without one, a per-platform table is built and
/// ambiguous platforms are left out.
fn attach_assets(query: &mut Query, release: &Release) -> Result<(), InstallerError> {
    query.tag.clone_from(&release.tag);
    let candidates = release.candidates();
    if candidates.is_empty() {
        return Err(InstallerError::NotFound(format!(
            "release {} has no installable assets",
            release.tag
        )));
    }

    if let Some(target) = query.target {
        let asset = select_asset(&candidates, target)?;
        debug!(%target, asset = %asset.name, "selected asset");
        query.assets = vec![PlatformAsset {
            os: target.os,
            arch: target.arch,
            rosetta: asset.platform().or_defaults().arch != target.arch,
            asset: asset.clone(),
        }];
        query.resolved_asset = Some(asset);
        return Ok(());
    }

    let table = platform_table(&candidates);
    for err in &table.ambiguous {
        warn!(error = %err, "skipping platform");
    }
    if table.entries.is_empty() {
        return Err(InstallerError::NotFound(format!(
            "no platform could be resolved in release {}",
            release.tag
        )));
    }
    query.assets = table.entries;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::OwnerPolicy;
    use crate::route::parse_route;
    use async_trait::async_trait;
    use installer_schema::{Arch, Os, Platform, RawAsset};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source keyed by `owner/repo`.
    #[derive(Default)]
    struct FakeSource {
        releases: HashMap<String, Release>,
        owners: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with(mut self, repo: &str, tag: &str, names: &[&str]) -> Self {
            let assets = names
                .iter()
                .map(|name| RawAsset {
                    name: (*name).to_string(),
                    download_url: format!("https://github.com/{repo}/releases/download/{tag}/{name}"),
                })
                .collect();
            self.releases.insert(
                repo.to_string(),
                Release {
                    tag: tag.to_string(),
                    assets,
                },
            );
            self
        }
    }

    #[async_trait]
    impl ReleaseSource for FakeSource {
        async fn fetch_release(
            &self,
            owner: &str,
            repo: &str,
            _tag: Option<&str>,
        ) -> Result<Release, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.releases
                .get(&format!("{owner}/{repo}"))
                .cloned()
                .ok_or_else(|| FetchError::NotFound(format!("{owner}/{repo}")))
        }

        async fn find_owner(&self, program: &str) -> Result<Option<String>, FetchError> {
            Ok(self.owners.get(program).cloned())
        }
    }

    fn resolver(source: FakeSource) -> (Resolver, Arc<FakeSource>) {
        let source = Arc::new(source);
        let resolver = Resolver::new(source.clone(), Arc::new(QueryCache::default()));
        (resolver, source)
    }

    fn query(path: &str) -> Query {
        let owners = OwnerPolicy {
            default_user: "jpillora".into(),
            ..OwnerPolicy::default()
        };
        Query::new(parse_route(path).unwrap(), &owners)
    }

    #[tokio::test]
    async fn test_resolve_target() {
        let (resolver, _) = resolver(FakeSource::default().with(
            "FiloSottile/age",
            "v1.2.1",
            &["age-v1.2.1-linux-amd64.tar.gz", "age-v1.2.1-darwin-arm64.tar.gz"],
        ));
        let mut q = query("/FiloSottile/age");
        q.target = Some(Platform::new(Os::Linux, Arch::Amd64));
        let resolved = resolver.resolve(q).await.unwrap();
        assert_eq!(resolved.tag, "v1.2.1");
        assert_eq!(
            resolved.resolved_asset.map(|a| a.name).as_deref(),
            Some("age-v1.2.1-linux-amd64.tar.gz")
        );
        assert_eq!(resolved.assets.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_table_and_cache() {
        let (resolver, source) = resolver(FakeSource::default().with(
            "FiloSottile/age",
            "v1.2.1",
            &[
                "age-v1.2.1-linux-amd64.tar.gz",
                "age-v1.2.1-linux-amd64.tar.gz.proof",
                "age-v1.2.1-darwin-arm64.tar.gz",
                "checksums.txt",
            ],
        ));
        let first = resolver.resolve(query("/FiloSottile/age")).await.unwrap();
        assert_eq!(first.assets.len(), 2);
        assert!(first.resolved_asset.is_none());

        let second = resolver.resolve(query("/FiloSottile/age")).await.unwrap();
        assert_eq!(second.assets, first.assets);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_target_not_found_is_not_cached() {
        let (resolver, source) = resolver(FakeSource::default().with(
            "jedisct1/piknik",
            "0.10.2",
            &["piknik-linux_x86_64-0.10.2.tar.gz", "piknik-linux_arm-0.10.2.tar.gz"],
        ));
        for _ in 0..2 {
            let mut q = query("/jedisct1/piknik");
            q.target = Some(Platform::new(Os::Linux, Arch::Arm64));
            let err = resolver.resolve(q).await.unwrap_err();
            assert!(matches!(err, InstallerError::NotFound(_)));
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_search_fallback() {
        let mut source = FakeSource::default().with("gitleaks/gitleaks", "v8.28.0", &[
            "gitleaks_8.28.0_linux_x64.tar.gz",
        ]);
        source.owners.insert("gitleaks".into(), "gitleaks".into());
        let (resolver, _) = resolver(source);

        let resolved = resolver.resolve(query("/gitleaks")).await.unwrap();
        assert_eq!(resolved.user, "gitleaks");
        assert_eq!(resolved.tag, "v8.28.0");
    }

    #[tokio::test]
    async fn test_no_search_when_owner_given() {
        let mut source = FakeSource::default().with("gitleaks/gitleaks", "v8.28.0", &[
            "gitleaks_8.28.0_linux_x64.tar.gz",
        ]);
        source.owners.insert("gitleaks".into(), "gitleaks".into());
        let (resolver, _) = resolver(source);

        let err = resolver.resolve(query("/someone/gitleaks")).await.unwrap_err();
        assert!(matches!(err, InstallerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_release_without_assets() {
        let (resolver, _) = resolver(FakeSource::default().with("jpillora/empty", "v1", &[]));
        let err = resolver.resolve(query("/jpillora/empty")).await.unwrap_err();
        assert!(matches!(err, InstallerError::NotFound(_)));
    }
}
