// cotorra is a multi-repository file broadcast tool
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{collections::BTreeMap, sync::Arc};

use cotorra::{
    cache::ContentCache,
    config::TransformConfig,
    context::Context,
    github::GithubClient,
    processor::{BatchProcessor, FileJob},
    ui::{progress::NullProgressReporter, sync_progress::SyncProgressReporter},
};

use tempfile::tempdir;

use crate::integration_tests::{MockGithub, SOURCE_REPO, TARGET_REPO};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n0000111122223333";

fn processor(github: Arc<MockGithub>, branch: &str) -> BatchProcessor {
    BatchProcessor::new(
        github,
        Arc::new(ContentCache::default()),
        SOURCE_REPO.to_string(),
        TARGET_REPO.to_string(),
        branch.to_string(),
        4,
    )
}

fn write_source(dir: &std::path::Path, files: &[(&str, &[u8])]) {
    for (rel, content) in files {
        let full = dir.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
}

fn transform_with(vars: &[(&str, &str)]) -> TransformConfig {
    TransformConfig {
        repo_name: false,
        variables: vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[test]
fn test_existing_text_file_changed() {
    let tmp = tempdir().unwrap();
    write_source(tmp.path(), &[("hello.txt", b"${GREETING} World")]);

    let github = Arc::new(
        MockGithub::new().with_file(TARGET_REPO, "development", "hello.txt", b"old"),
    );
    let processor = processor(github.clone(), "development");
    let ctx = Context::background();

    let jobs = vec![FileJob::new(
        "hello.txt",
        "hello.txt",
        transform_with(&[("GREETING", "Transformed Hello")]),
    )];
    let changes = processor.process_files(&ctx, tmp.path(), jobs).unwrap();

    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert_eq!(change.path, "hello.txt");
    assert_eq!(
        change.content.as_deref().unwrap(),
        b"Transformed Hello World"
    );
    assert_eq!(change.original_content.as_deref().unwrap(), b"old");
    assert!(!change.is_new);
    assert!(!change.is_deleted);

    // Every remote lookup carried the configured target branch.
    let lookups = github.file_lookups();
    assert!(!lookups.is_empty());
    for (_, _, rev) in lookups {
        assert_eq!(rev, "development");
    }
}

#[test]
fn test_unchanged_file_is_filtered() {
    let tmp = tempdir().unwrap();
    // The transform renders exactly what the target already holds.
    write_source(tmp.path(), &[("same.txt", b"${VALUE}")]);

    let github = Arc::new(MockGithub::new().with_file(
        TARGET_REPO,
        "development",
        "hello.txt",
        b"old",
    ));
    let processor = processor(github, "development");
    let ctx = Context::background();

    let jobs = vec![FileJob::new(
        "same.txt",
        "hello.txt",
        transform_with(&[("VALUE", "old")]),
    )];
    let changes = processor.process_files(&ctx, tmp.path(), jobs).unwrap();
    assert!(changes.is_empty());
}

#[test]
fn test_binary_file_new_in_target() {
    let tmp = tempdir().unwrap();
    write_source(tmp.path(), &[("image.png", PNG_BYTES)]);

    let github = Arc::new(MockGithub::new());
    let processor = processor(github, "main");
    let ctx = Context::background();
    let reporter = SyncProgressReporter::new(TARGET_REPO);

    let jobs = vec![FileJob::new(
        "image.png",
        "image.png",
        transform_with(&[("VAR", "value")]),
    )];
    let changes = processor
        .process_files_with_reporter(&ctx, tmp.path(), jobs, Some(&reporter))
        .unwrap();
    reporter.finalize();

    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert!(change.is_new);
    assert!(change.original_content.is_none());
    // Transform was skipped: the bytes pass through untouched.
    assert_eq!(change.content.as_deref().unwrap(), PNG_BYTES);

    let summary = reporter.get_summary();
    assert_eq!(summary.binary_files_skipped, 1);
    assert!(summary.binary_bytes_skipped > 0);
    assert_eq!(summary.transform_successes, 0);
}

#[test]
fn test_mixed_batch_with_missing_sources() {
    let tmp = tempdir().unwrap();
    write_source(
        tmp.path(),
        &[("success1.txt", b"one"), ("success2.txt", b"two")],
    );

    let github = Arc::new(MockGithub::new());
    let processor = processor(github, "main");
    let ctx = Context::background();

    let jobs = vec![
        FileJob::new("success1.txt", "success1.txt", TransformConfig::default()),
        FileJob::new("nonexistent1.txt", "nonexistent1.txt", TransformConfig::default()),
        FileJob::new("success2.txt", "success2.txt", TransformConfig::default()),
        FileJob::new("nonexistent2.txt", "nonexistent2.txt", TransformConfig::default()),
    ];
    let changes = processor
        .process_files_with_reporter(&ctx, tmp.path(), jobs, Some(&NullProgressReporter))
        .unwrap();

    let mut paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["success1.txt", "success2.txt"]);
}

#[test]
fn test_empty_batch_makes_no_remote_calls() {
    let tmp = tempdir().unwrap();
    let github = Arc::new(MockGithub::new());
    let processor = processor(github.clone(), "main");
    let ctx = Context::background();

    let changes = processor.process_files(&ctx, tmp.path(), Vec::new()).unwrap();
    assert!(changes.is_empty());
    assert!(github.file_lookups().is_empty());
}

#[test]
fn test_canceled_context_propagates() {
    let tmp = tempdir().unwrap();
    write_source(tmp.path(), &[("a.txt", b"content")]);

    let github = Arc::new(MockGithub::new());
    let processor = processor(github, "main");
    let (ctx, handle) = Context::cancellable();
    handle.cancel();

    let jobs = vec![FileJob::new("a.txt", "a.txt", TransformConfig::default())];
    let err = processor.process_files(&ctx, tmp.path(), jobs).unwrap_err();
    assert!(matches!(
        err,
        cotorra::processor::ProcessError::Context(_)
    ));
}

#[test]
fn test_second_target_lookup_hits_content_cache() {
    let tmp = tempdir().unwrap();
    write_source(tmp.path(), &[("a.txt", b"fresh"), ("b.txt", b"fresh")]);

    let github = Arc::new(MockGithub::new().with_file(TARGET_REPO, "main", "shared.txt", b"old"));
    let contents = Arc::new(ContentCache::default());
    let processor = BatchProcessor::new(
        github.clone(),
        contents,
        SOURCE_REPO.to_string(),
        TARGET_REPO.to_string(),
        "main".to_string(),
        1,
    );
    let ctx = Context::background();

    // Two jobs writing the same destination: the second lookup is served
    // from the content cache.
    let jobs = vec![
        FileJob::new("a.txt", "shared.txt", TransformConfig::default()),
        FileJob::new("b.txt", "shared.txt", TransformConfig::default()),
    ];
    let changes = processor.process_files(&ctx, tmp.path(), jobs).unwrap();

    // Deduplicated by destination.
    assert_eq!(changes.len(), 1);
    assert_eq!(github.file_lookups().len(), 1);
    assert_eq!(processor.stats().cache_hits, 1);
}
