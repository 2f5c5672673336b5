// src/manifest/index.rs

//! Index manifest construction
//!
//! The index manifest is a pure function of configuration: the suite
//! `Release` and its detached signature, plus the per-component,
//! per-architecture `Release` and compressed `Packages` files.

use super::PathManifest;
use crate::config::MirrorSource;
use tracing::warn;

/// Files fetched for every suite
const SUITE_FILES: &[&str] = &["Release", "Release.gpg"];

/// Files fetched for every component/architecture pair
const BINARY_FILES: &[&str] = &["Release", "Packages.gz", "Packages.bz2"];

/// Builds the metadata file list for a source
pub struct IndexManifestBuilder;

impl IndexManifestBuilder {
    /// Index manifest for one source
    pub fn build(source: &MirrorSource) -> PathManifest {
        let mut manifest = PathManifest::new();
        Self::append(&mut manifest, source);
        manifest
    }

    /// Union of the index manifests of several sources, in source order
    pub fn build_all(sources: &[MirrorSource]) -> PathManifest {
        let mut manifest = PathManifest::new();
        for source in sources {
            Self::append(&mut manifest, source);
        }
        manifest
    }

    fn append(manifest: &mut PathManifest, source: &MirrorSource) {
        let dist = source.distribution();
        let mut paths = Vec::new();

        for file in SUITE_FILES {
            paths.push(format!("/dists/{dist}/{file}"));
        }
        for component in source.components() {
            for arch in source.architectures() {
                for file in BINARY_FILES {
                    paths.push(format!("/dists/{dist}/{component}/binary-{arch}/{file}"));
                }
            }
        }

        for path in paths {
            // MirrorSource::new already rejects unsafe selections
            if let Err(e) = manifest.push(&path) {
                warn!("Skipping index path for {}: {}", source.url(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_sources;

    fn source(line: &str, archs: &[&str]) -> MirrorSource {
        let archs: Vec<String> = archs.iter().map(|a| a.to_string()).collect();
        parse_sources(line, &archs).unwrap().remove(0)
    }

    #[test]
    fn test_build_single_component() {
        let src = source("deb rsync://mirror.example/ubuntu maverick main", &["amd64"]);
        let manifest = IndexManifestBuilder::build(&src);
        let entries: Vec<&str> = manifest.iter().collect();
        assert_eq!(
            entries,
            [
                "/dists/maverick/Release",
                "/dists/maverick/Release.gpg",
                "/dists/maverick/main/binary-amd64/Release",
                "/dists/maverick/main/binary-amd64/Packages.gz",
                "/dists/maverick/main/binary-amd64/Packages.bz2",
            ]
        );
    }

    #[test]
    fn test_build_components_times_architectures() {
        let src = source(
            "deb rsync://mirror.example/ubuntu maverick main restricted",
            &["amd64", "i386"],
        );
        let manifest = IndexManifestBuilder::build(&src);
        assert_eq!(manifest.len(), 2 + 2 * 2 * 3);
        assert!(manifest.contains("dists/maverick/restricted/binary-i386/Packages.bz2"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let src = source("deb http://m.example/u jammy main universe", &["amd64"]);
        assert_eq!(IndexManifestBuilder::build(&src), IndexManifestBuilder::build(&src));
    }

    #[test]
    fn test_build_all_unions_suites() {
        let sources = parse_sources(
            "deb http://m.example/u jammy main\ndeb http://m.example/u jammy-updates main\n",
            &["amd64".to_string()],
        )
        .unwrap();
        let manifest = IndexManifestBuilder::build_all(&sources);
        assert_eq!(manifest.len(), 10);
        assert!(manifest.contains("/dists/jammy-updates/Release"));
    }
}
