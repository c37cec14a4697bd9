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

use std::sync::Arc;

use cotorra::{
    cache::{ContentCache, TreeCache, TreeCacheOptions},
    config::{DirectoryMapping, ModuleConfig, TargetConfig},
    context::Context,
    github::GithubClient,
    processor::{BatchProcessor, DirectoryProcessor, ProcessError},
};

use tempfile::tempdir;

use crate::integration_tests::{MockGit, MockGithub, SOURCE_REPO, TARGET_REPO};

fn write_files(dir: &std::path::Path, files: &[(&str, &[u8])]) {
    for (rel, content) in files {
        let full = dir.join(rel);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
}

fn target() -> TargetConfig {
    TargetConfig {
        repo: TARGET_REPO.to_string(),
        branch: "main".to_string(),
        ..Default::default()
    }
}

fn mapping(src: &str, dest: &str, exclude: &[&str]) -> DirectoryMapping {
    DirectoryMapping {
        src: src.to_string(),
        dest: dest.to_string(),
        exclude: exclude.iter().map(|s| s.to_string()).collect(),
        delete: false,
        module: None,
    }
}

struct Fixture {
    batch: BatchProcessor,
    trees: Arc<TreeCache>,
    git: Arc<MockGit>,
    target: TargetConfig,
}

impl Fixture {
    fn new(git: MockGit, github: Arc<MockGithub>) -> Self {
        let github_dyn: Arc<dyn GithubClient> = github;
        Self {
            batch: BatchProcessor::new(
                github_dyn.clone(),
                Arc::new(ContentCache::default()),
                SOURCE_REPO.to_string(),
                TARGET_REPO.to_string(),
                "main".to_string(),
                4,
            ),
            trees: Arc::new(TreeCache::new(github_dyn, TreeCacheOptions::default())),
            git: Arc::new(git),
            target: target(),
        }
    }

    fn processor(&self) -> DirectoryProcessor<'_> {
        DirectoryProcessor {
            batch: &self.batch,
            trees: self.trees.as_ref(),
            git: self.git.as_ref(),
            target: &self.target,
            temp_base: std::path::Path::new("/tmp"),
        }
    }
}

#[test]
fn test_walk_respects_exclusion_globs() {
    let source = tempdir().unwrap();
    write_files(
        source.path(),
        &[
            ("docs/a.txt", b"a"),
            ("docs/debug.log", b"x"),
            ("docs/sub/trace.log", b"y"),
            ("docs/sub/d.txt", b"d"),
        ],
    );

    let fixture = Fixture::new(MockGit::new(&[]), Arc::new(MockGithub::new()));
    let outcome = fixture
        .processor()
        .process_mapping(
            &Context::background(),
            source.path(),
            &mapping("docs", "shared", &["*.log"]),
            None,
        )
        .unwrap();

    let mut paths: Vec<&str> = outcome.changes.iter().map(|c| c.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["shared/a.txt", "shared/sub/d.txt"]);

    assert_eq!(outcome.metrics.files_examined, 4);
    assert_eq!(outcome.metrics.files_excluded, 2);
    assert_eq!(outcome.metrics.files_synced, 2);
    assert!(outcome.module_update.is_none());
}

#[test]
fn test_unchanged_directory_files_are_not_synced() {
    let source = tempdir().unwrap();
    write_files(source.path(), &[("docs/a.txt", b"same")]);

    let github =
        Arc::new(MockGithub::new().with_file(TARGET_REPO, "main", "shared/a.txt", b"same"));
    let fixture = Fixture::new(MockGit::new(&[]), github);

    let outcome = fixture
        .processor()
        .process_mapping(
            &Context::background(),
            source.path(),
            &mapping("docs", "shared", &[]),
            None,
        )
        .unwrap();

    assert!(outcome.changes.is_empty());
    assert_eq!(outcome.metrics.files_examined, 1);
    assert_eq!(outcome.metrics.files_synced, 0);
}

#[test]
fn test_module_mapping_without_target_manifest_falls_back() {
    let source = tempdir().unwrap();
    // The source carries a module, but the target has no manifest at all.
    write_files(
        source.path(),
        &[
            ("lib/go.mod", b"module github.com/org/lib\n"),
            ("lib/code.go", b"package lib\n"),
        ],
    );

    let fixture = Fixture::new(MockGit::new(&[]), Arc::new(MockGithub::new()));
    let mut dir_mapping = mapping("lib", "lib", &[]);
    dir_mapping.module = Some(ModuleConfig {
        name: "github.com/org/lib".to_string(),
        repo_url: "https://github.com/org/lib.git".to_string(),
        manifest: "go.mod".to_string(),
        subdir: None,
    });

    let outcome = fixture
        .processor()
        .process_mapping(&Context::background(), source.path(), &dir_mapping, None)
        .unwrap();

    // No module clone happened; the content came from the source walk.
    assert!(outcome.module_update.is_none());
    assert!(fixture.git.calls_matching("clone").is_empty());
    let paths: Vec<&str> = outcome.changes.iter().map(|c| c.path.as_str()).collect();
    assert!(paths.contains(&"lib/code.go"));
}

#[test]
fn test_delete_mapping_with_no_files_is_nothing_to_delete() {
    let source = tempdir().unwrap();
    let fixture = Fixture::new(MockGit::new(&[]), Arc::new(MockGithub::new()));

    let mut dir_mapping = mapping("", "ghost", &[]);
    dir_mapping.delete = true;

    let err = fixture
        .processor()
        .process_mapping(&Context::background(), source.path(), &dir_mapping, None)
        .unwrap_err();
    assert!(matches!(err, ProcessError::NothingToDelete(_)));
}

#[test]
fn test_missing_source_directory_fails() {
    let source = tempdir().unwrap();
    let fixture = Fixture::new(MockGit::new(&[]), Arc::new(MockGithub::new()));

    let err = fixture
        .processor()
        .process_mapping(
            &Context::background(),
            source.path(),
            &mapping("does-not-exist", "out", &[]),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, ProcessError::FileNotFound(_)));
}
