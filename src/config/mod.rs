// src/config/mod.rs

//! Configuration for a mirror run
//!
//! - [`sources`]: the line-oriented sources list describing what to mirror
//! - [`settings`]: run-wide settings (roots, bandwidth, concurrency)
//!
//! [`MirrorSourceSet`] resolves parsed sources into mirror groups. Lines that
//! share a URL share a staging subtree, so they are mirrored together as one
//! group whose manifests are the union of each line's manifests.

mod settings;
mod sources;

pub use settings::MirrorSettings;
pub use sources::{MirrorSource, load_sources, parse_sources};

use crate::error::{Error, Result};
use std::collections::HashMap;
use url::Url;

/// All sources sharing one URL, mirrored as a unit
#[derive(Debug, Clone)]
pub struct SourceGroup {
    url: Url,
    key: String,
    sources: Vec<MirrorSource>,
}

impl SourceGroup {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Relative directory name used under both the work and mirror roots
    ///
    /// `<host>`, or `<host><path>` when another URL in the set shares the host.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn sources(&self) -> &[MirrorSource] {
        &self.sources
    }
}

/// The resolved set of remote sources for one run
#[derive(Debug, Clone, Default)]
pub struct MirrorSourceSet {
    groups: Vec<SourceGroup>,
}

impl MirrorSourceSet {
    /// Group sources by URL and assign each group its subtree key
    pub fn resolve(sources: Vec<MirrorSource>) -> Result<Self> {
        let mut groups: Vec<SourceGroup> = Vec::new();
        for source in sources {
            match groups
                .iter_mut()
                .find(|g| g.url.as_str().trim_end_matches('/') == source.identity())
            {
                Some(group) => {
                    if !group.sources.contains(&source) {
                        group.sources.push(source);
                    }
                }
                None => groups.push(SourceGroup {
                    url: source.url().clone(),
                    key: String::new(),
                    sources: vec![source],
                }),
            }
        }

        let mut per_host: HashMap<String, usize> = HashMap::new();
        for group in &groups {
            *per_host.entry(host_of(&group.url)?).or_default() += 1;
        }

        for group in &mut groups {
            let host = host_of(&group.url)?;
            group.key = if per_host.get(&host).copied().unwrap_or(0) > 1 {
                scoped_key(&host, &group.url)?
            } else {
                host
            };
        }

        for (i, outer) in groups.iter().enumerate() {
            if let Some(other) = groups[i + 1..].iter().find(|g| g.key == outer.key) {
                return Err(Error::ConfigError(format!(
                    "sources {} and {} would share the mirror subtree '{}'",
                    outer.url, other.url, outer.key
                )));
            }
            let prefix = format!("{}/", outer.key);
            if let Some(inner) = groups.iter().find(|g| g.key.starts_with(&prefix)) {
                return Err(Error::ConfigError(format!(
                    "source {} would be mirrored inside {}; use distinct paths",
                    inner.url, outer.url
                )));
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[SourceGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn host_of(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::ConfigError(format!("source URL {url} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn scoped_key(host: &str, url: &Url) -> Result<String> {
    let path = url.path().trim_end_matches('/');
    if path
        .split('/')
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(Error::ConfigError(format!(
            "source URL {url} has a relative path segment"
        )));
    }
    Ok(format!("{host}{path}"))
}
