//! Ark archive listing
//!
//! Daily cycles live at `<base>/<year>/cycle-<YYYYMMDD>/`. Each cycle directory
//! is an HTML index; every `href` ending in `.gz` is one warts file.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::info;
use url::Url;

use crate::error::{IngestError, Result};
use crate::http::{Credentials, get};

/// Default Ark daily probe-data location
pub const DEFAULT_ARK_BASE_URL: &str =
    "https://data.caida.org/datasets/topology/ark/ipv4/probe-data/team-1/daily";

static GZ_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']?([^"'\s>]+\.gz)["'\s>]"#).expect("gz href pattern is valid")
});

/// Parse `YYYY-MM-DD` or `YYYYMMDD`
pub fn parse_cycle_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .map_err(|_| IngestError::InvalidDate(s.to_string()))
}

/// `<base>/<year>/cycle-<YYYYMMDD>/`
pub fn cycle_url(base: &Url, date: NaiveDate) -> Result<Url> {
    let base = base.as_str().trim_end_matches('/');
    let url = format!("{base}/{}/cycle-{}/", date.year(), date.format("%Y%m%d"));
    Ok(Url::parse(&url)?)
}

/// Every `.gz` link of an index page, resolved against `index`, in page order
/// without duplicates
pub fn extract_links(index: &Url, html: &str) -> Result<Vec<Url>> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for caps in GZ_HREF.captures_iter(html) {
        let url = index.join(&caps[1])?;
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }
    Ok(links)
}

/// Lists warts files of Ark cycles
#[derive(Debug, Clone)]
pub struct ArkClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
}

impl ArkClient {
    pub fn new(http: reqwest::Client, base_url: Url, credentials: Option<Credentials>) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// URLs of every warts file of one cycle
    pub async fn list_cycle(&self, date: NaiveDate) -> Result<Vec<Url>> {
        let index = cycle_url(&self.base_url, date)?;
        let response = get(&self.http, index.as_str(), self.credentials.as_ref()).await?;
        let html = response
            .text()
            .await
            .map_err(|e| IngestError::http(index.as_str(), e))?;

        let links = extract_links(&index, &html)?;
        info!(cycle = %date, index = %index, files = links.len(), "listed ark cycle");
        Ok(links)
    }
}

#[cfg(test)]
#[path = "ark_test.rs"]
mod ark_test;
