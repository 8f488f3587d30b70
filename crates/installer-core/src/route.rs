//! Request path grammar: `[/user]/program[@release][!|!!]`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::InstallerError;

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:/([A-Za-z0-9_-]{1,128}))?/([A-Za-z0-9_-]{1,128})(?:@([A-Za-z0-9_.-]{1,128}?))?(!*)$",
    )
    .expect("literal regex")
});

/// The fields extracted from a request path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    /// Repository owner, when given.
    pub user: Option<String>,
    /// Repository name, also the installed binary name.
    pub program: String,
    /// Release tag, when pinned.
    pub release: Option<String>,
    /// `!`: move the binary into `PATH`.
    pub move_to_path: bool,
    /// `!!`: move it with sudo.
    pub sudo_move: bool,
}

/// Parse a request path.
///
/// # Example
///
/// ```
/// use installer_core::route::parse_route;
///
/// let route = parse_route("/jpillora/serve@1.9.0!!").unwrap();
/// assert_eq!(route.user.as_deref(), Some("jpillora"));
/// assert_eq!(route.program, "serve");
/// assert_eq!(route.release.as_deref(), Some("1.9.0"));
/// assert!(route.sudo_move);
/// ```
///
/// # Errors
///
/// Returns [`InstallerError::InvalidRoute`] if the path does not match the
/// grammar.
pub fn parse_route(path: &str) -> Result<Route, InstallerError> {
    let caps = PATH_RE
        .captures(path)
        .ok_or_else(|| InstallerError::InvalidRoute(path.to_string()))?;

    let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
    let bangs = caps.get(4).map_or("", |m| m.as_str());

    Ok(Route {
        user: group(1),
        program: group(2).unwrap_or_default(),
        release: group(3),
        move_to_path: bangs.starts_with('!'),
        sudo_move: bangs.starts_with("!!"),
    })
}
