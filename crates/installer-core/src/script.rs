//! Script assembly: render a resolved [`Query`] into a bash script,
//! Homebrew formula or plain-text summary.

use installer_schema::{Arch, Os};
use minijinja::Environment;
use serde::Serialize;

use crate::error::InstallerError;
use crate::query::{Query, ScriptType};

const SHELL_TEMPLATE: &str = include_str!("../templates/install.sh");
const RUBY_TEMPLATE: &str = include_str!("../templates/install.rb");
const TEXT_TEMPLATE: &str = include_str!("../templates/install.txt");

/// Renders resolved queries with the embedded templates.
#[derive(Debug)]
pub struct ScriptAssembler {
    env: Environment<'static>,
}

/// Template context: the query itself plus values derived for the formula.
#[derive(Serialize)]
struct ScriptContext<'a> {
    #[serde(flatten)]
    query: &'a Query,
    version: &'a str,
    formula_class: String,
    mac_arm: Option<&'a str>,
    mac_intel: Option<&'a str>,
    linux_arm: Option<&'a str>,
    linux_intel: Option<&'a str>,
}

impl<'a> ScriptContext<'a> {
    fn new(query: &'a Query) -> Self {
        let url = |os: Os, arch: Arch| {
            query
                .assets
                .iter()
                .find(|row| row.os == os && row.arch == arch)
                .map(|row| row.asset.download_url.as_str())
        };
        Self {
            query,
            version: query.version(),
            formula_class: formula_class(&query.program),
            mac_arm: url(Os::Darwin, Arch::Arm64),
            mac_intel: url(Os::Darwin, Arch::Amd64),
            linux_arm: url(Os::Linux, Arch::Arm64),
            linux_intel: url(Os::Linux, Arch::Amd64),
        }
    }
}

impl ScriptAssembler {
    /// Load the embedded templates.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Template`] if a template fails to parse.
    pub fn new() -> Result<Self, InstallerError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.add_filter("sh", shell_quote);
        env.add_filter("rb", ruby_quote);
        env.add_template("install.sh", SHELL_TEMPLATE)?;
        env.add_template("install.rb", RUBY_TEMPLATE)?;
        env.add_template("install.txt", TEXT_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Render `query` as `kind`. Either the whole document is produced or
    /// an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Template`] on any rendering failure.
    pub fn render(&self, kind: ScriptType, query: &Query) -> Result<Vec<u8>, InstallerError> {
        let name = format!("install.{}", kind.extension());
        let template = self.env.get_template(&name)?;
        let rendered = template.render(ScriptContext::new(query))?;
        Ok(rendered.into_bytes())
    }
}

/// Single-quote a value for bash.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Double-quote a value for Ruby, disabling interpolation.
fn ruby_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '#') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Homebrew class name for a program: `yt-dlp` becomes `YtDlp`.
fn formula_class(program: &str) -> String {
    let class: String = program
        .split(['-', '_', '.'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect();
    if class.starts_with(|c: char| c.is_ascii_alphabetic()) {
        class
    } else {
        format!("Formula{class}")
    }
}
