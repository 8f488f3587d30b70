//! Asset resolution engine for the installer service.
//!
//! Release filenames follow hundreds of unrelated naming conventions. This
//! crate classifies them into a closed set of platforms and picks the one
//! asset that fits a client:
//!
//! - [`extension_of`] splits compound extensions (`.tar.gz`).
//! - [`infer_os`] / [`infer_arch`] apply ordered synonym tables.
//! - [`select_asset`] filters and ranks a release's assets for a target.
//!
//! Everything here is pure and stateless.

pub mod asset;
pub mod extension;
pub mod platform;
pub mod select;

// Re-exports
pub use asset::{Asset, RawAsset, Release, is_installable};
pub use extension::{ArchiveFormat, extension_of};
pub use platform::{Arch, Os, Platform, infer_arch, infer_os};
pub use select::{PlatformAsset, PlatformTable, SelectError, platform_table, select_asset};
