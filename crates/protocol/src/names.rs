//! Table-name algebra
//!
//! Names follow one of two grammars:
//!
//! ```text
//! iris: (results|routes)__<uuid>__<uuid>     uuid = 8_4_4_4_12 hex digits
//! ark:  ark_(results|routes)__cycle<YYYYMMDD>
//! ```
//!
//! `table_type` and `platform` are cheap prefix/shape checks that never fail.
//! `TableName::parse` validates the full grammar. `convert` rewrites the first
//! occurrence of the type word, so it round-trips on every `results`/`routes`
//! name.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};

const UUID: &str = "[0-9a-fA-F]{8}_[0-9a-fA-F]{4}_[0-9a-fA-F]{4}_[0-9a-fA-F]{4}_[0-9a-fA-F]{12}";

static IRIS_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^(results|routes)__({UUID})__({UUID})$"))
        .expect("iris name pattern is valid")
});

static ARK_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^ark_(results|routes)__cycle([0-9]{8})$")
        .expect("ark name pattern is valid")
});

/// Errors from the name algebra
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// Name is neither a `results` nor a `routes` table
    #[error("unknown table type: '{0}'")]
    UnknownType(String),

    /// Name has a known type but does not match the grammar
    #[error("invalid table name '{name}': {reason}")]
    Invalid { name: String, reason: &'static str },
}

impl Classify for NameError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownType(_) => ErrorKind::UnknownTableType,
            Self::Invalid { .. } => ErrorKind::UnknownTableType,
        }
    }
}

/// Table family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableType {
    Results,
    Routes,
    Unknown,
}

impl TableType {
    /// Word used in table names
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Results => "results",
            Self::Routes => "routes",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform a table was produced by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Iris,
    Ark,
    Unknown,
}

impl Platform {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iris => "iris",
            Self::Ark => "ark",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the table type from its prefix (`results__`, `routes__`, optionally
/// behind `ark_`)
pub fn table_type(name: &str) -> TableType {
    let body = name.strip_prefix("ark_").unwrap_or(name);
    if body.starts_with("results__") {
        TableType::Results
    } else if body.starts_with("routes__") {
        TableType::Routes
    } else {
        TableType::Unknown
    }
}

/// Detect the platform from the name shape
pub fn platform(name: &str) -> Platform {
    if name.starts_with("ark_") {
        return Platform::Ark;
    }
    let mut parts = name.split("__");
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("results" | "routes"), Some(a), Some(b), None) if is_uuid(a) && is_uuid(b) => {
            Platform::Iris
        }
        _ => Platform::Unknown,
    }
}

fn is_uuid(segment: &str) -> bool {
    let groups: Vec<&str> = segment.split('_').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Convert a `results`/`routes` name to the target type
///
/// Returns the name unchanged when it already has the target type.
pub fn convert(name: &str, target: TableType) -> Result<String, NameError> {
    let source = table_type(name);
    if source == TableType::Unknown || target == TableType::Unknown {
        return Err(NameError::UnknownType(name.to_string()));
    }
    if source == target {
        return Ok(name.to_string());
    }
    Ok(name.replacen(source.as_str(), target.as_str(), 1))
}

/// `convert(name, Routes)`
#[inline]
pub fn to_routes(name: &str) -> Result<String, NameError> {
    convert(name, TableType::Routes)
}

/// `convert(name, Results)`
#[inline]
pub fn to_results(name: &str) -> Result<String, NameError> {
    convert(name, TableType::Results)
}

/// Name of the forwarding-decisions table derived from a results table
pub fn forwarding_decisions_name(results: &str) -> Result<String, NameError> {
    match table_type(results) {
        TableType::Results => Ok(results.replacen("results", "forwarding_decisions", 1)),
        _ => Err(NameError::UnknownType(results.to_string())),
    }
}

/// A validated table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    raw: String,
    table_type: TableType,
    platform: Platform,
}

impl TableName {
    /// Validate a name against the full grammar
    pub fn parse(name: &str) -> Result<Self, NameError> {
        let table_type = table_type(name);
        if table_type == TableType::Unknown {
            return Err(NameError::UnknownType(name.to_string()));
        }

        if IRIS_NAME.is_match(name) {
            return Ok(Self {
                raw: name.to_string(),
                table_type,
                platform: Platform::Iris,
            });
        }

        if let Some(caps) = ARK_NAME.captures(name) {
            let date = &caps[2];
            if NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
                return Err(NameError::Invalid {
                    name: name.to_string(),
                    reason: "cycle is not a calendar date",
                });
            }
            return Ok(Self {
                raw: name.to_string(),
                table_type,
                platform: Platform::Ark,
            });
        }

        Err(NameError::Invalid {
            name: name.to_string(),
            reason: "expected <type>__<uuid>__<uuid> or ark_<type>__cycle<YYYYMMDD>",
        })
    }

    /// Name of the results table for an Ark cycle
    pub fn ark_results(cycle: NaiveDate) -> Self {
        Self {
            raw: format!("ark_results__cycle{}", cycle.format("%Y%m%d")),
            table_type: TableType::Results,
            platform: Platform::Ark,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    #[inline]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Convert to the target type; a validated name always converts
    pub fn convert(&self, target: TableType) -> Result<Self, NameError> {
        Ok(Self {
            raw: convert(&self.raw, target)?,
            table_type: target,
            platform: self.platform,
        })
    }

    /// The Ark cycle date, if this is an Ark table
    pub fn cycle(&self) -> Option<NaiveDate> {
        let caps = ARK_NAME.captures(&self.raw)?;
        NaiveDate::parse_from_str(&caps[2], "%Y%m%d").ok()
    }
}

impl FromStr for TableName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
