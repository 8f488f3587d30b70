//! Compound file extension splitting (`.tar.gz`, `.zip`, ...).

use serde::{Deserialize, Serialize};

/// Suffix components that count as part of an archive extension.
const EXTENSION_TOKENS: &[&str] = &["gz", "bz2", "bz", "zip", "tar", "xz", "Z", "tgz"];

/// Extract the compound extension of a filename, including the leading dot.
///
/// Trailing dot-separated components are included while they are known
/// extension tokens. Membership is all that is checked, so `.tar.zip` is
/// returned as-is even though it is not a real archive format.
///
/// # Example
///
/// ```
/// use installer_schema::extension_of;
///
/// assert_eq!(extension_of("my.file.tar.gz"), ".tar.gz");
/// assert_eq!(extension_of("my.file.tar.zip"), ".tar.zip");
/// assert_eq!(extension_of("runc.s390x"), "");
/// ```
pub fn extension_of(name: &str) -> &str {
    let mut start = name.len();
    let mut rest = name;
    while let Some(dot) = rest.rfind('.') {
        if !EXTENSION_TOKENS.contains(&&rest[dot + 1..]) {
            break;
        }
        start = dot;
        rest = &rest[..dot];
    }
    &name[start..]
}

/// Archive format of an asset, in selection preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (`.tar.gz`, `.tgz`).
    TarGz,
    /// XZ-compressed tar archive (`.tar.xz`).
    TarXz,
    /// Zip archive (`.zip`).
    Zip,
    /// Any other combination of extension tokens (`.tar.bz2`, `.gz`, ...).
    Compressed,
    /// No recognized extension: assumed to be the executable itself.
    Binary,
}

impl ArchiveFormat {
    /// Classify an extension as returned by [`extension_of`].
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "" => Self::Binary,
            ".tar.gz" | ".tgz" => Self::TarGz,
            ".tar.xz" => Self::TarXz,
            ".zip" => Self::Zip,
            _ => Self::Compressed,
        }
    }

    /// Preference rank, lower is better.
    pub fn rank(self) -> u8 {
        self as u8
    }
}
