//! Platform inference from release asset filenames.
//! Handles naming inconsistencies across build systems: darwin/macos/osx,
//! `x86_64`/amd64/x64/64bit, armv7l/armel/armhf, aarch64/arm64, etc.
//!
//! Both tables below are ordered and the first matching rule wins. Some
//! tokens are substrings of others (`arm` inside `arm64`, `win` inside
//! `darwin`), so a new rule goes in at the position that keeps every
//! existing test case passing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Operating system a release asset was built for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux, any libc.
    Linux,
    /// macOS (darwin, osx, apple).
    Darwin,
    /// Microsoft Windows.
    Windows,
    /// FreeBSD.
    FreeBsd,
    /// NetBSD.
    NetBsd,
    /// OpenBSD.
    OpenBsd,
    /// DragonFly BSD.
    DragonflyBsd,
    /// No rule matched.
    #[default]
    Unknown,
}

/// Normalized CPU architecture a release asset was built for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Arch {
    /// x86-64 (`x86_64`, amd64, x64, 64bit).
    #[serde(rename = "amd64")]
    Amd64,
    /// x86-32 (i386, i686, x32, 32bit).
    #[serde(rename = "386")]
    I386,
    /// 32-bit ARM (armv5/6/7, armel, armhf).
    #[serde(rename = "arm")]
    Arm,
    /// 64-bit ARM (aarch64, arm64).
    #[serde(rename = "arm64")]
    Arm64,
    /// Little-endian 64-bit POWER.
    #[serde(rename = "ppc64le")]
    Ppc64le,
    /// 64-bit RISC-V.
    #[serde(rename = "riscv64")]
    Riscv64,
    /// IBM Z.
    #[serde(rename = "s390x")]
    S390x,
    /// A named architecture outside the set above (mips, loongarch, sparc,
    /// big-endian POWER). Never defaulted and never requested.
    #[serde(rename = "unsupported")]
    Unsupported,
    /// No rule matched.
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

/// Ordered OS rules, matched against the lowercased filename.
const OS_RULES: &[(&str, Os)] = &[
    (
        r"darwin|osx|(?:^|[^a-z])(?:apple|mac(?:os)?)(?:[^a-z]|$)",
        Os::Darwin,
    ),
    (r"linux", Os::Linux),
    (
        r"(?:^|[^a-z])win(?:dows|32|64)?(?:[^a-z]|$)|msvc|mingw|\.exe$",
        Os::Windows,
    ),
    (r"freebsd", Os::FreeBsd),
    (r"netbsd", Os::NetBsd),
    (r"openbsd", Os::OpenBsd),
    (r"dragonfly", Os::DragonflyBsd),
];

/// Ordered architecture rules, matched against the lowercased filename.
///
/// 64-bit ARM must precede 32-bit ARM. The 32-bit ARM rule requires a
/// non-alphanumeric neighbour on both sides so that words like `marmite`
/// or `charm` do not count. `win64`/`win32` only decide when no explicit
/// architecture token is present. Unsupported families come last so that
/// a supported token elsewhere in the name wins.
const ARCH_RULES: &[(&str, Arch)] = &[
    (r"aarch64|arm64", Arch::Arm64),
    (
        r"(?:^|[^a-z0-9])arm(?:v[5-7][a-z]*|el|hf)?(?:[^a-z0-9]|$)",
        Arch::Arm,
    ),
    (r"x86[_-]64|amd64|x64|64[_-]?bit", Arch::Amd64),
    (
        r"i[36]86|x32|(?:^|[^a-z0-9])386(?:[^0-9]|$)|32[_-]?bit",
        Arch::I386,
    ),
    (r"ppc64le|powerpc64le", Arch::Ppc64le),
    (r"riscv64", Arch::Riscv64),
    (r"s390x", Arch::S390x),
    (r"(?:^|[^a-z0-9])win64(?:[^a-z0-9]|$)", Arch::Amd64),
    (r"(?:^|[^a-z0-9])win32(?:[^a-z0-9]|$)", Arch::I386),
    (
        r"(?:^|[^a-z])(?:mips|sparc)|loongarch|loongson|s390(?:[^x]|$)|(?:^|[^a-z])(?:powerpc|ppc)(?:64)?(?:[^l6]|$)",
        Arch::Unsupported,
    ),
];

/// A bare `x86` with no width usually names a 32-bit build. It only
/// counts when no architecture rule matched.
static BARE_X86: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^a-z0-9])x86(?:[^a-z0-9_-]|$)").expect("bare x86 hint is a valid regex")
});

static OS_TABLE: LazyLock<Vec<(Regex, Os)>> = LazyLock::new(|| compile(OS_RULES));
static ARCH_TABLE: LazyLock<Vec<(Regex, Arch)>> = LazyLock::new(|| compile(ARCH_RULES));

fn compile<T: Copy>(rules: &[(&str, T)]) -> Vec<(Regex, T)> {
    rules
        .iter()
        .map(|&(pattern, value)| {
            // Patterns are literals above; a bad one fails every test in this module.
            let re = Regex::new(pattern).expect("platform rule is a valid regex");
            (re, value)
        })
        .collect()
}

fn first_match<T: Copy>(table: &[(Regex, T)], name: &str) -> Option<T> {
    let lower = name.to_lowercase();
    table
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map(|&(_, value)| value)
}

/// Infer the operating system from an asset filename.
///
/// Returns [`Os::Unknown`] when no rule matches.
pub fn infer_os(name: &str) -> Os {
    first_match(&OS_TABLE, name).unwrap_or(Os::Unknown)
}

/// Infer the architecture from an asset filename, along with whether it is
/// the 32-bit member of its family.
///
/// Returns `(Arch::Unknown, _)` when no rule matches. The flag is then a
/// hint from a bare `x86` token, used only to break ties once the
/// architecture has been defaulted.
pub fn infer_arch(name: &str) -> (Arch, bool) {
    match first_match(&ARCH_TABLE, name) {
        Some(arch) => (arch, arch.is_32bit()),
        None => (Arch::Unknown, BARE_X86.is_match(&name.to_lowercase())),
    }
}

impl Os {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
            Self::FreeBsd => "freebsd",
            Self::NetBsd => "netbsd",
            Self::OpenBsd => "openbsd",
            Self::DragonflyBsd => "dragonflybsd",
            Self::Unknown => "unknown",
        }
    }
}

impl Arch {
    /// Convert to string representation (Go naming, as used in most filenames).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::I386 => "386",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
            Self::Ppc64le => "ppc64le",
            Self::Riscv64 => "riscv64",
            Self::S390x => "s390x",
            Self::Unsupported => "unsupported",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this is the narrowed 32-bit member of a wider family.
    pub fn is_32bit(&self) -> bool {
        matches!(self, Self::I386 | Self::Arm)
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses a requested OS using the filename synonym table, so `macos`,
/// `osx` and `darwin` are all accepted.
impl std::str::FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match infer_os(s) {
            Os::Unknown => Err(format!("Unknown operating system: {s}")),
            os => Ok(os),
        }
    }
}

/// Parses a requested architecture using the filename synonym table.
impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match infer_arch(s) {
            (Arch::Unknown | Arch::Unsupported, _) => Err(format!("Unknown architecture: {s}")),
            (arch, _) => Ok(arch),
        }
    }
}

/// The (OS, architecture, bit-width) triple a client needs satisfied.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// Normalized architecture.
    pub arch: Arch,
    /// True iff `arch` is a 32-bit member of a wider family.
    pub is_32bit: bool,
}

impl Platform {
    /// Build a platform, deriving the bit-width from the architecture.
    pub fn new(os: Os, arch: Arch) -> Self {
        Self {
            os,
            arch,
            is_32bit: arch.is_32bit(),
        }
    }

    /// Infer the platform an asset filename targets.
    pub fn from_filename(name: &str) -> Self {
        Self::new(infer_os(name), infer_arch(name).0)
    }

    /// Replace an unknown architecture with amd64. Unsupported ones stay.
    pub fn with_default_arch(self) -> Self {
        match self.arch {
            Arch::Unknown => Self::new(self.os, Arch::Amd64),
            _ => self,
        }
    }

    /// Replace unknown components with the conventional defaults: bare
    /// names such as `runc.s390x` are linux builds, and names without an
    /// architecture token such as `yt-dlp_linux` are amd64 builds.
    pub fn or_defaults(self) -> Self {
        let os = match self.os {
            Os::Unknown => Os::Linux,
            os => os,
        };
        Self::new(os, self.arch).with_default_arch()
    }

    /// Whether a client could ever request this platform.
    pub fn is_supported(&self) -> bool {
        !matches!(self.arch, Arch::Unsupported | Arch::Unknown) && self.os != Os::Unknown
    }

    /// Apple Silicon, which can run `darwin/amd64` binaries under Rosetta 2.
    pub fn is_apple_silicon(&self) -> bool {
        self.os == Os::Darwin && self.arch == Arch::Arm64
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
