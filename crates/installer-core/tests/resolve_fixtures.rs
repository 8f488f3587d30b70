//! End-to-end resolution against recorded release payloads served by a mock
//! upstream.

use std::sync::Arc;
use std::time::Duration;

use installer_core::{
    GitHubReleases, InstallerError, OwnerPolicy, Query, QueryCache, Resolver, ScriptAssembler,
    ScriptType, parse_route,
};
use installer_schema::{Arch, Os, Platform};
use mockito::{Mock, Server, ServerGuard};

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {path}: {e}"))
}

async fn serve(server: &mut ServerGuard, path: &str, name: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(fixture(name))
        .create_async()
        .await
}

fn resolver(server: &ServerGuard) -> Resolver {
    let source = GitHubReleases::new(&server.url(), None, Duration::from_secs(5)).unwrap();
    Resolver::new(Arc::new(source), Arc::new(QueryCache::default()))
}

fn query(path: &str, target: Option<(Os, Arch)>) -> Query {
    let owners = OwnerPolicy {
        default_user: "jpillora".into(),
        ..OwnerPolicy::default()
    };
    let mut q = Query::new(parse_route(path).unwrap(), &owners);
    q.target = target.map(|(os, arch)| Platform::new(os, arch));
    q
}

#[tokio::test]
async fn test_uv_prefers_musl_on_linux() {
    let mut server = Server::new_async().await;
    let _m = serve(&mut server, "/repos/astral-sh/uv/releases/latest", "astral-sh_uv_0.8.16.json").await;

    let resolved = resolver(&server)
        .resolve(query("/astral-sh/uv", Some((Os::Linux, Arch::Amd64))))
        .await
        .unwrap();

    let asset = resolved.resolved_asset.unwrap();
    assert!(asset.name.contains("x86_64-unknown-linux-musl"), "{}", asset.name);
    assert_eq!(asset.extension, ".tar.gz");
    assert_eq!(resolved.tag, "0.8.16");
}

#[tokio::test]
async fn test_uv_platform_table() {
    let mut server = Server::new_async().await;
    let _m = serve(&mut server, "/repos/astral-sh/uv/releases/latest", "astral-sh_uv_0.8.16.json").await;

    let resolved = resolver(&server).resolve(query("/astral-sh/uv", None)).await.unwrap();
    let row = |os: Os, arch: Arch| {
        resolved
            .assets
            .iter()
            .find(|row| row.os == os && row.arch == arch)
            .unwrap_or_else(|| panic!("missing {os}/{arch}"))
    };

    assert_eq!(row(Os::Linux, Arch::Amd64).asset.name, "uv-x86_64-unknown-linux-musl.tar.gz");
    assert_eq!(row(Os::Linux, Arch::Arm64).asset.name, "uv-aarch64-unknown-linux-musl.tar.gz");
    assert_eq!(row(Os::Linux, Arch::I386).asset.name, "uv-i686-unknown-linux-musl.tar.gz");
    assert_eq!(row(Os::Darwin, Arch::Arm64).asset.name, "uv-aarch64-apple-darwin.tar.gz");
    assert!(!row(Os::Darwin, Arch::Arm64).rosetta);
    assert_eq!(row(Os::Windows, Arch::Amd64).asset.name, "uv-x86_64-pc-windows-msvc.zip");
    assert!(resolved.assets.iter().all(|row| !row.asset.name.ends_with(".sha256")));
}

#[tokio::test]
async fn test_piknik_has_no_linux_arm64() {
    let mut server = Server::new_async().await;
    let _m = serve(
        &mut server,
        "/repos/jedisct1/piknik/releases/latest",
        "jedisct1_piknik_0.10.2.json",
    )
    .await;

    let err = resolver(&server)
        .resolve(query("/jedisct1/piknik", Some((Os::Linux, Arch::Arm64))))
        .await
        .unwrap_err();
    assert!(matches!(err, InstallerError::NotFound(_)), "{err}");
    assert_eq!(err.status().as_u16(), 404);
}

#[tokio::test]
async fn test_uv_table_lists_only_builds() {
    let mut server = Server::new_async().await;
    let _m = serve(&mut server, "/repos/astral-sh/uv/releases/latest", "astral-sh_uv_0.8.16.json").await;

    let resolved = resolver(&server).resolve(query("/astral-sh/uv", None)).await.unwrap();
    for row in &resolved.assets {
        let name = &row.asset.name;
        assert!(name.starts_with("uv-") && !name.contains("installer"), "{name}");
    }
    assert!(resolved.assets.iter().all(|row| row.arch != Arch::Unsupported));
}

#[tokio::test]
async fn test_piknik_windows_bit_width() {
    let mut server = Server::new_async().await;
    let _m = serve(
        &mut server,
        "/repos/jedisct1/piknik/releases/latest",
        "jedisct1_piknik_0.10.2.json",
    )
    .await;
    let resolver = resolver(&server);

    let resolved = resolver
        .resolve(query("/jedisct1/piknik", Some((Os::Windows, Arch::Amd64))))
        .await
        .unwrap();
    assert_eq!(resolved.resolved_asset.unwrap().name, "piknik-win64-0.10.2.zip");

    let resolved = resolver
        .resolve(query("/jedisct1/piknik", Some((Os::Windows, Arch::I386))))
        .await
        .unwrap();
    assert_eq!(resolved.resolved_asset.unwrap().name, "piknik-win32-0.10.2.zip");
}

#[tokio::test]
async fn test_piknik_mac_runs_under_rosetta() {
    let mut server = Server::new_async().await;
    let _m = serve(
        &mut server,
        "/repos/jedisct1/piknik/releases/latest",
        "jedisct1_piknik_0.10.2.json",
    )
    .await;

    let resolved = resolver(&server)
        .resolve(query("/jedisct1/piknik", Some((Os::Darwin, Arch::Arm64))))
        .await
        .unwrap();
    assert_eq!(resolved.resolved_asset.unwrap().name, "piknik-macos-0.10.2.zip");
    assert!(resolved.assets[0].rosetta);
}

#[tokio::test]
async fn test_pinned_release_is_cached() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", "/repos/astral-sh/uv/releases/tags/0.8.16")
        .with_status(200)
        .with_body(fixture("astral-sh_uv_0.8.16.json"))
        .expect(1)
        .create_async()
        .await;

    let resolver = resolver(&server);
    for _ in 0..3 {
        let resolved = resolver.resolve(query("/astral-sh/uv@0.8.16", None)).await.unwrap();
        assert_eq!(resolved.tag, "0.8.16");
    }
    m.assert_async().await;
}

#[tokio::test]
async fn test_render_resolved_script() {
    let mut server = Server::new_async().await;
    let _m = serve(&mut server, "/repos/astral-sh/uv/releases/latest", "astral-sh_uv_0.8.16.json").await;

    let resolved = resolver(&server).resolve(query("/astral-sh/uv!", None)).await.unwrap();
    let script = ScriptAssembler::new().unwrap().render(ScriptType::Script, &resolved).unwrap();
    let script = String::from_utf8(script).unwrap();

    assert!(script.contains(
        "URL='https://github.com/astral-sh/uv/releases/download/0.8.16/uv-x86_64-unknown-linux-musl.tar.gz'"
    ));
    assert!(script.contains("\"darwin_arm64\")"));
    assert!(script.contains("OUT_DIR=\"/usr/local/bin\""));
}
