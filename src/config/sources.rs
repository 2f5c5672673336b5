// src/config/sources.rs

//! Sources list parsing
//!
//! The sources list is line oriented. Blank lines and lines whose first
//! non-whitespace character is `#` are ignored. Every other line is split on
//! whitespace into `kind url distribution components...`:
//!
//! ```text
//! deb rsync://mirror.example/ubuntu maverick main restricted
//! deb [arch=amd64,i386] http://archive.example/debian bookworm main
//! ```
//!
//! Only `deb` lines contribute to the mirror set. An optional `[key=value ...]`
//! block directly after the kind is accepted; `arch=` overrides the default
//! architectures for that line.

use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;
use url::Url;

/// One remote repository endpoint plus the suite selection to mirror from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSource {
    url: Url,
    distribution: String,
    components: Vec<String>,
    architectures: Vec<String>,
}

impl MirrorSource {
    /// Build a source, rejecting selections that would escape the mirror tree
    pub fn new(
        url: Url,
        distribution: impl Into<String>,
        components: Vec<String>,
        architectures: Vec<String>,
    ) -> Result<Self> {
        let distribution = distribution.into();
        check_segment("distribution", &distribution)?;

        let components = dedup(components);
        if components.is_empty() {
            return Err(Error::ConfigError(format!(
                "source {url} ({distribution}) lists no components"
            )));
        }
        for component in &components {
            check_segment("component", component)?;
        }

        let architectures = dedup(architectures);
        if architectures.is_empty() {
            return Err(Error::ConfigError(format!(
                "source {url} ({distribution}) has no architectures"
            )));
        }
        for arch in &architectures {
            check_segment("architecture", arch)?;
            if arch.contains('/') {
                return Err(Error::ConfigError(format!("invalid architecture '{arch}'")));
            }
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::ConfigError(format!("source URL {url} has no host")));
        }

        Ok(Self {
            url,
            distribution,
            components,
            architectures,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn distribution(&self) -> &str {
        &self.distribution
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn architectures(&self) -> &[String] {
        &self.architectures
    }

    /// Identity key: the URL without a trailing slash
    pub fn identity(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Reject empty, absolute or dot-dot selections
fn check_segment(what: &str, value: &str) -> Result<()> {
    let bad = value.is_empty()
        || value.starts_with('/')
        || value.split('/').any(|s| s.is_empty() || s == "." || s == "..");
    if bad {
        return Err(Error::ConfigError(format!("invalid {what} '{value}'")));
    }
    Ok(())
}

/// Read and parse a sources list file
///
/// An unreadable or empty file, or one without any `deb` line, is a fatal
/// configuration error.
pub fn load_sources(path: &Path, default_architectures: &[String]) -> Result<Vec<MirrorSource>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("cannot read sources list {}: {e}", path.display()))
    })?;

    if content.trim().is_empty() {
        return Err(Error::ConfigError(format!(
            "sources list {} is empty",
            path.display()
        )));
    }

    let sources = parse_sources(&content, default_architectures)?;
    if sources.is_empty() {
        return Err(Error::ConfigError(format!(
            "sources list {} has no 'deb' entries",
            path.display()
        )));
    }
    Ok(sources)
}

/// Parse sources list text into mirror sources
pub fn parse_sources(content: &str, default_architectures: &[String]) -> Result<Vec<MirrorSource>> {
    let mut sources = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (kind, rest) = split_first(line);
        if kind != "deb" {
            debug!("Ignoring '{}' entry on line {}", kind, line_no);
            continue;
        }

        let (options, rest) = split_options(rest)
            .map_err(|msg| Error::ConfigError(format!("line {line_no}: {msg}")))?;

        let (url, rest) = split_first(rest);
        let (distribution, groups) = split_first(rest);
        if url.is_empty() || distribution.is_empty() {
            return Err(Error::ConfigError(format!(
                "line {line_no}: expected 'deb <url> <distribution> <components...>'"
            )));
        }

        let url = Url::parse(url)
            .map_err(|e| Error::ConfigError(format!("line {line_no}: invalid URL '{url}': {e}")))?;

        let components: Vec<String> = groups.split_whitespace().map(str::to_string).collect();

        let architectures = options
            .iter()
            .find(|(key, _)| *key == "arch")
            .map(|(_, value)| {
                value
                    .split(',')
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| default_architectures.to_vec());

        let source = MirrorSource::new(url, distribution, components, architectures)
            .map_err(|e| match e {
                Error::ConfigError(msg) => Error::ConfigError(format!("line {line_no}: {msg}")),
                other => other,
            })?;
        sources.push(source);
    }

    Ok(sources)
}

/// Split off the first whitespace-delimited field
fn split_first(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// Split an optional `[key=value ...]` block off the front of `s`
fn split_options(s: &str) -> std::result::Result<(Vec<(&str, &str)>, &str), String> {
    let Some(inner) = s.strip_prefix('[') else {
        return Ok((Vec::new(), s));
    };
    let end = inner
        .find(']')
        .ok_or_else(|| "unterminated '[' option block".to_string())?;

    let mut options = Vec::new();
    for item in inner[..end].split_whitespace() {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| format!("malformed option '{item}'"))?;
        options.push((key, value));
    }
    Ok((options, inner[end + 1..].trim_start()))
}
