// tests/mirror_pipeline.rs

//! End-to-end runs of the mirror pipeline against a local fake remote

mod common;

use common::{Fixture, LocalTransfer, gzip, packages_index, resolve, write_file};
use debsync::config::parse_sources;
use debsync::lock::RunLock;
use debsync::{
    CancelToken, Error, IndexManifestBuilder, Mirror, PackageManifestBuilder, Reconciler,
    SourceOutcome,
};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::sync::Arc;

const SOURCE: &str = "deb rsync://mirror.example/ubuntu maverick main restricted";
const KEY: &str = "mirror.example";
const APP_NEW: &str = "pool/main/a/app/app_2.0_amd64.deb";
const APP_OLD: &str = "pool/main/a/app/app_1.0_amd64.deb";

fn seed_remote(fixture: &Fixture) {
    fixture.remote_file("dists/maverick/Release", b"Suite: maverick\n");
    fixture.remote_file("dists/maverick/Release.gpg", b"signature");
    fixture.remote_file("dists/maverick/main/binary-amd64/Release", b"Component: main\n");
    fixture.remote_packages("maverick", "main", &[APP_NEW]);
    fixture.remote_file(
        "dists/maverick/restricted/binary-amd64/Release",
        b"Component: restricted\n",
    );
    fixture.remote_packages("maverick", "restricted", &[]);
    fixture.remote_file(APP_NEW, b"app 2.0");
}

fn mirror(fixture: &Fixture, cancel: CancelToken) -> Mirror {
    Mirror::new(&fixture.settings(), cancel)
        .with_transfer(Arc::new(LocalTransfer::new(fixture.remote())))
}

#[test]
fn test_end_to_end_prunes_superseded_package() {
    let fixture = Fixture::new();
    seed_remote(&fixture);
    fixture.published_file(KEY, APP_OLD, b"app 1.0");
    fixture.published_file(KEY, "dists/lucid/Release", b"Suite: lucid\n");

    let summary = mirror(&fixture, CancelToken::new()).run(&resolve(SOURCE)).unwrap();
    let report = &summary.sources[0];

    assert_eq!(report.outcome, SourceOutcome::Completed);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(report.key, KEY);
    assert_eq!(report.packages_listed, 1);
    assert_eq!(report.packages_fetched, 1);
    assert_eq!(report.pruned_published, 1);

    assert_eq!(fs::read(fixture.published(KEY, APP_NEW)).unwrap(), b"app 2.0");
    assert!(!fixture.published(KEY, APP_OLD).exists());
    assert!(!fixture.published(KEY, "dists/lucid").exists());

    let staged = fs::metadata(fixture.staged(KEY, "dists/maverick/Release")).unwrap();
    let published = fs::metadata(fixture.published(KEY, "dists/maverick/Release")).unwrap();
    assert_eq!((staged.dev(), staged.ino()), (published.dev(), published.ino()));

    let packages = fs::read_to_string(fixture.staged(KEY, "packages")).unwrap();
    assert_eq!(packages, format!("/{APP_NEW}\n"));
    let indexes = fs::read_to_string(fixture.staged(KEY, "indexes")).unwrap();
    assert!(indexes.starts_with("/dists/maverick/Release\n/dists/maverick/Release.gpg\n"));
}

#[test]
fn test_reconcile_against_staged_index_removes_only_old_version() {
    let fixture = Fixture::new();
    let source = parse_sources(SOURCE, &["amd64".to_string()]).unwrap().remove(0);
    let staging = fixture.work_root().join(KEY);
    let published = fixture.mirror_root().join(KEY);

    write_file(
        &staging.join("dists/maverick/main/binary-amd64/Packages.gz"),
        &gzip(&packages_index(&[APP_NEW])),
    );
    write_file(&published.join(APP_NEW), b"new");
    write_file(&published.join(APP_OLD), b"old");

    let index_manifest = IndexManifestBuilder::build(&source);
    let packages = PackageManifestBuilder::build(&staging, &index_manifest);
    let report = Reconciler::new().prune(&published, &packages.manifest).unwrap();

    assert_eq!(report.removed, [APP_OLD]);
    assert!(published.join(APP_NEW).exists());
}

#[test]
fn test_second_run_prunes_nothing() {
    let fixture = Fixture::new();
    seed_remote(&fixture);
    let sources = resolve(SOURCE);

    mirror(&fixture, CancelToken::new()).run(&sources).unwrap();
    let second = mirror(&fixture, CancelToken::new()).run(&sources).unwrap();

    let report = &second.sources[0];
    assert_eq!(report.outcome, SourceOutcome::Completed);
    assert_eq!(report.pruned_staging, 0);
    assert_eq!(report.pruned_published, 0);
}

#[test]
fn test_cancel_during_package_pull_leaves_published_tree_alone() {
    let fixture = Fixture::new();
    seed_remote(&fixture);
    fixture.published_file(KEY, "dists/maverick/Release", b"previous snapshot");
    fixture.published_file(KEY, APP_OLD, b"app 1.0");

    let cancel = CancelToken::new();
    let transfer = LocalTransfer::new(fixture.remote()).cancelling_on_pool(cancel.clone());
    let mirror = Mirror::new(&fixture.settings(), cancel).with_transfer(Arc::new(transfer));

    let summary = mirror.run(&resolve(SOURCE)).unwrap();

    assert_eq!(summary.sources[0].outcome, SourceOutcome::Cancelled);
    assert_eq!(summary.exit_code(), 130);
    assert_eq!(
        fs::read(fixture.published(KEY, "dists/maverick/Release")).unwrap(),
        b"previous snapshot"
    );
    assert!(fixture.published(KEY, APP_OLD).exists());
}

#[test]
fn test_dropped_component_is_pruned_from_staging_and_mirror() {
    let fixture = Fixture::new();
    seed_remote(&fixture);
    mirror(&fixture, CancelToken::new()).run(&resolve(SOURCE)).unwrap();
    let restricted = "dists/maverick/restricted/binary-amd64/Packages.gz";
    assert!(fixture.staged(KEY, restricted).exists());

    let narrowed = resolve("deb rsync://mirror.example/ubuntu maverick main");
    let summary = mirror(&fixture, CancelToken::new()).run(&narrowed).unwrap();

    assert_eq!(summary.sources[0].pruned_staging, 2);
    assert!(!fixture.staged(KEY, restricted).exists());
    assert!(!fixture.published(KEY, restricted).exists());
    assert!(fixture.published(KEY, APP_NEW).exists());
}

#[test]
fn test_no_usable_index_empties_pool() {
    let fixture = Fixture::new();
    fixture.remote_file("dists/maverick/Release", b"Suite: maverick\n");
    fixture.published_file(KEY, APP_OLD, b"app 1.0");

    let summary = mirror(&fixture, CancelToken::new()).run(&resolve(SOURCE)).unwrap();
    let report = &summary.sources[0];

    assert_eq!(report.outcome, SourceOutcome::Completed);
    assert_eq!(report.packages_listed, 0);
    assert!(!report.warnings.is_empty());
    assert!(!fixture.published(KEY, APP_OLD).exists());
    assert!(fixture.published(KEY, "dists/maverick/Release").exists());
}

#[test]
fn test_dry_run_touches_neither_tree() {
    let fixture = Fixture::new();
    seed_remote(&fixture);
    fixture.published_file(KEY, APP_OLD, b"app 1.0");

    let mut settings = fixture.settings();
    settings.dry_run = true;
    let mirror = Mirror::new(&settings, CancelToken::new())
        .with_transfer(Arc::new(LocalTransfer::new(fixture.remote())));

    let summary = mirror.run(&resolve(SOURCE)).unwrap();

    assert_eq!(summary.sources[0].pruned_published, 1);
    assert!(fixture.published(KEY, APP_OLD).exists());
    assert!(!fixture.published(KEY, "dists").exists());
}

#[test]
fn test_parallel_sources_use_separate_subtrees() {
    let fixture = Fixture::new();
    seed_remote(&fixture);

    let mut settings = fixture.settings();
    settings.jobs = 2;
    let mirror = Mirror::new(&settings, CancelToken::new())
        .with_transfer(Arc::new(LocalTransfer::new(fixture.remote())));

    let sources = resolve(
        "deb rsync://a.example/ubuntu maverick main\n\
         deb rsync://b.example/ubuntu maverick main\n",
    );
    let summary = mirror.run(&sources).unwrap();

    assert_eq!(summary.exit_code(), 0);
    let keys: Vec<&str> = summary.sources.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, ["a.example", "b.example"]);
    assert!(fixture.published("a.example", APP_NEW).exists());
    assert!(fixture.published("b.example", APP_NEW).exists());
}

#[test]
fn test_concurrent_run_is_refused() {
    let fixture = Fixture::new();
    seed_remote(&fixture);
    let _held = RunLock::acquire(&fixture.work_root()).unwrap();

    let result = mirror(&fixture, CancelToken::new()).run(&resolve(SOURCE));
    assert!(matches!(result, Err(Error::LockError(_))));
}
