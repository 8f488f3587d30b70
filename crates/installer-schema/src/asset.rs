//! Release and asset records.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extension::{ArchiveFormat, extension_of};
use crate::platform::{Arch, Os, Platform, infer_arch, infer_os};

/// An asset as listed by the release API, before any inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAsset {
    /// Filename of the asset.
    pub name: String,
    /// Direct download URL.
    #[serde(rename = "browser_download_url", alias = "download_url")]
    pub download_url: String,
}

/// A tagged release and its assets, in upstream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release tag (e.g. `v1.2.3`).
    #[serde(rename = "tag_name")]
    pub tag: String,
    /// Attached files.
    #[serde(default)]
    pub assets: Vec<RawAsset>,
}

impl Release {
    /// Derive installable assets, dropping checksums, signatures, OS
    /// packages, source tarballs and installer scripts.
    pub fn candidates(&self) -> Vec<Asset> {
        self.assets
            .iter()
            .filter(|raw| is_installable(&raw.name))
            .map(Asset::from_raw)
            .collect()
    }
}

/// A release asset annotated with its inferred platform and extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Filename of the asset.
    pub name: String,
    /// Direct download URL.
    pub download_url: String,
    /// Inferred operating system.
    pub os: Os,
    /// Inferred architecture.
    pub arch: Arch,
    /// Whether `arch` is a 32-bit member of its family.
    pub is_32bit: bool,
    /// Compound extension including the leading dot, or empty.
    pub extension: String,
}

impl Asset {
    /// Run the platform matcher and extension splitter over a raw record.
    pub fn from_raw(raw: &RawAsset) -> Self {
        let (arch, is_32bit) = infer_arch(&raw.name);
        Self {
            name: raw.name.clone(),
            download_url: raw.download_url.clone(),
            os: infer_os(&raw.name),
            arch,
            is_32bit,
            extension: extension_of(&raw.name).to_string(),
        }
    }

    /// The inferred platform, unknown components left as-is.
    pub fn platform(&self) -> Platform {
        Platform {
            os: self.os,
            arch: self.arch,
            is_32bit: self.is_32bit,
        }
    }

    /// Archive format derived from the extension.
    pub fn format(&self) -> ArchiveFormat {
        ArchiveFormat::from_extension(&self.extension)
    }

    /// Statically linked musl build.
    pub fn is_musl(&self) -> bool {
        self.name.to_lowercase().contains("musl")
    }
}

/// Suffixes of files that accompany a release but are not the program.
const SKIPPED_SUFFIXES: &[&str] = &[
    ".sha256",
    ".sha256sum",
    ".sha512",
    ".md5",
    ".sig",
    ".asc",
    ".pem",
    ".sbom",
    ".json",
    ".txt",
    ".pub",
    ".sum",
    ".b3",
    ".intoto.jsonl",
    ".deb",
    ".rpm",
    ".apk",
    ".msi",
    ".pkg",
    ".dmg",
    ".sh",
    ".ps1",
    ".bat",
];

/// Source archives (`source.tar.gz`, `tool-1.0-src.zip`) and vendor
/// installers (`uv-installer.sh`, `tool_installer.exe`).
static NOT_A_BUILD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[-_.])(?:source|src)(?:[-_.]|$)|[-_]installer(?:[-_.]|$)")
        .expect("non-build pattern is a valid regex")
});

/// Whether an asset could be the program itself (possibly archived).
pub fn is_installable(name: &str) -> bool {
    let lower = name.to_lowercase();
    if lower.contains("checksums") || lower.contains("sha256sums") {
        return false;
    }
    if SKIPPED_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return false;
    }
    !NOT_A_BUILD.is_match(&lower)
}
