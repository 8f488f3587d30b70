//! Asset selection: pick the single best asset for a target platform.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::asset::{Asset, is_installable};
use crate::platform::{Arch, Os, Platform};

/// Why no single asset could be chosen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    /// No asset ships for the platform.
    #[error("no asset found for {0}")]
    NotFound(Platform),

    /// Several assets rank equally and no tie-break applies.
    #[error("ambiguous assets for {platform}: {}", candidates.join(", "))]
    Ambiguous {
        /// The requested platform.
        platform: Platform,
        /// Names of the equally ranked assets.
        candidates: Vec<String>,
    },
}

/// Each pass maps an asset to the platform it is compared under. Later
/// passes fill in defaults and only run when earlier ones found nothing.
const PASSES: [fn(&Asset) -> Platform; 3] = [inferred, arch_defaulted, all_defaulted];

fn inferred(asset: &Asset) -> Platform {
    asset.platform()
}

fn arch_defaulted(asset: &Asset) -> Platform {
    asset.platform().with_default_arch()
}

fn all_defaulted(asset: &Asset) -> Platform {
    asset.platform().or_defaults()
}

/// Select the best asset for `target`.
///
/// Candidates must share the target OS and architecture; assets that are
/// not the program itself (checksums, source tarballs, installer scripts)
/// never qualify. Ties are broken by
/// bit-width (matching the target), then musl over other libcs on linux,
/// then archive format (`tar.gz` > `tar.xz` > `zip` > others > bare). If
/// that still leaves more than one, the result is
/// [`SelectError::Ambiguous`] rather than a guess.
///
/// Apple Silicon targets fall back to `darwin/amd64` assets when no
/// native build exists.
///
/// # Errors
///
/// Returns [`SelectError::NotFound`] when nothing matches and
/// [`SelectError::Ambiguous`] when the tie-break is exhausted.
pub fn select_asset(assets: &[Asset], target: Platform) -> Result<Asset, SelectError> {
    let result = select_for(assets, target);
    if matches!(result, Err(SelectError::NotFound(_))) && target.is_apple_silicon() {
        return select_for(assets, Platform::new(Os::Darwin, Arch::Amd64)).map_err(|err| match err {
            SelectError::NotFound(_) => SelectError::NotFound(target),
            other => other,
        });
    }
    result
}

fn select_for(assets: &[Asset], target: Platform) -> Result<Asset, SelectError> {
    for pass in PASSES {
        let candidates: Vec<&Asset> = assets
            .iter()
            .filter(|&asset| is_installable(&asset.name))
            .filter(|&asset| {
                let p = pass(asset);
                p.os == target.os && p.arch == target.arch
            })
            .collect();
        if !candidates.is_empty() {
            return break_tie(&candidates, target);
        }
    }
    Err(SelectError::NotFound(target))
}

fn rank(asset: &Asset, target: Platform) -> (bool, bool, u8) {
    (
        asset.is_32bit != target.is_32bit,
        target.os == Os::Linux && !asset.is_musl(),
        asset.format().rank(),
    )
}

fn break_tie(candidates: &[&Asset], target: Platform) -> Result<Asset, SelectError> {
    let best = candidates
        .iter()
        .map(|asset| rank(asset, target))
        .min()
        .ok_or(SelectError::NotFound(target))?;

    let tied: Vec<&Asset> = candidates
        .iter()
        .copied()
        .filter(|asset| rank(asset, target) == best)
        .collect();

    match tied.as_slice() {
        [only] => Ok((*only).clone()),
        _ => Err(SelectError::Ambiguous {
            platform: target,
            candidates: tied.iter().map(|asset| asset.name.clone()).collect(),
        }),
    }
}

/// One row of a [`PlatformTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformAsset {
    /// Operating system of the row.
    pub os: Os,
    /// Architecture of the row.
    pub arch: Arch,
    /// The row is served by a `darwin/amd64` asset under Rosetta 2.
    pub rosetta: bool,
    /// Selected asset.
    pub asset: Asset,
}

/// The best asset for every platform a release ships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformTable {
    /// Resolved rows, ordered by platform.
    pub entries: Vec<PlatformAsset>,
    /// Platforms skipped because selection was ambiguous.
    pub ambiguous: Vec<SelectError>,
}

/// Run [`select_asset`] once per distinct platform found in `assets`.
///
/// Adds a Rosetta row for `darwin/arm64` when only `darwin/amd64` exists.
/// Unsupported architectures get no row.
pub fn platform_table(assets: &[Asset]) -> PlatformTable {
    let mut platforms: BTreeSet<Platform> = assets
        .iter()
        .filter(|asset| is_installable(&asset.name))
        .map(|asset| asset.platform().or_defaults())
        .filter(Platform::is_supported)
        .collect();
    let intel_mac = Platform::new(Os::Darwin, Arch::Amd64);
    if platforms.contains(&intel_mac) {
        platforms.insert(Platform::new(Os::Darwin, Arch::Arm64));
    }

    let mut table = PlatformTable::default();
    for platform in platforms {
        match select_asset(assets, platform) {
            Ok(asset) => table.entries.push(PlatformAsset {
                os: platform.os,
                arch: platform.arch,
                rosetta: asset.platform().or_defaults().arch != platform.arch,
                asset,
            }),
            Err(err @ SelectError::Ambiguous { .. }) => table.ambiguous.push(err),
            Err(SelectError::NotFound(_)) => {}
        }
    }
    table
}
