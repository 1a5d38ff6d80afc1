//! Ark archive and converter sections

use std::fmt;

use serde::Deserialize;

/// Daily cycles of the IPv4 team-1 probe data
pub const DEFAULT_ARK_BASE_URL: &str =
    "https://data.caida.org/datasets/topology/ark/ipv4/probe-data/team-1/daily";

/// Converter program on `PATH`
pub const DEFAULT_CONVERTER_PROGRAM: &str = "pantrace";

/// Ark archive access
///
/// # Example
///
/// ```toml
/// [ark]
/// username = "researcher@example.org"
/// password = "..."
/// ```
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArkSection {
    /// Archive root holding `<year>/cycle-<YYYYMMDD>/` directories
    pub base_url: String,

    /// Basic-auth username
    pub username: Option<String>,

    /// Basic-auth password
    pub password: Option<String>,
}

impl Default for ArkSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARK_BASE_URL.into(),
            username: None,
            password: None,
        }
    }
}

impl fmt::Debug for ArkSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArkSection")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Converter output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConverterFormat {
    /// One line per flow (default)
    #[default]
    Iris,
    /// One line per reply
    Flat,
}

/// Warts converter subprocess
///
/// # Example
///
/// ```toml
/// [converter]
/// program = "/usr/local/bin/pantrace"
/// format = "flat"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConverterSection {
    /// Program to run
    /// Default: pantrace
    pub program: String,

    /// Output format requested from the converter
    /// Default: iris
    pub format: ConverterFormat,
}

impl Default for ConverterSection {
    fn default() -> Self {
        Self {
            program: DEFAULT_CONVERTER_PROGRAM.into(),
            format: ConverterFormat::Iris,
        }
    }
}
