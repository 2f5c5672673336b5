// src/lib.rs

//! debsync: partial, bandwidth-limited mirroring of Debian-style repositories
//!
//! A run mirrors a configurable subset of one or more remote repositories
//! (distributions, components, architectures) and keeps the local tree free of
//! files that are no longer part of that subset.
//!
//! # Architecture
//!
//! - Manifests first: what must exist locally is derived from configuration
//!   (indexes) and from the fetched indexes (packages), never from the remote
//!   directory listing
//! - Transfers fetch exactly a manifest, through rsync or HTTP, under one
//!   aggregate bandwidth ceiling
//! - Metadata is staged, then published as a hard-linked snapshot
//! - Pruning removes `local - manifest` and nothing else

pub mod cancel;
pub mod compression;
pub mod config;
mod error;
pub mod layout;
pub mod lock;
pub mod manifest;
pub mod publish;
pub mod reconcile;
pub mod sync;
pub mod transfer;

pub use cancel::CancelToken;
pub use config::{MirrorSettings, MirrorSource, MirrorSourceSet, SourceGroup};
pub use error::{Error, Result};
pub use manifest::{IndexManifestBuilder, PackageManifest, PackageManifestBuilder, PathManifest};
pub use publish::{PublishReport, SnapshotPublisher};
pub use reconcile::{PruneReport, Reconciler};
pub use sync::{Mirror, RunSummary, SourceOutcome, SourceReport};
pub use transfer::{Transfer, TransferOutcome, TransferPlanner, TransferRequest};
