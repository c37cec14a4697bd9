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

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use crate::{
    cache::TreeCache,
    config::{DirectoryMapping, TargetConfig},
    context::Context,
    git::GitDriver,
    gomod::{self, ModuleUpdate},
    sync::metrics::DirectoryMetrics,
    ui::{cli, progress::ProgressReporter},
    utils::{globs::ExcludeSet, join_rel_paths, normalize_rel_path},
};

use super::{BatchProcessor, FileChange, FileJob, ProcessError};

/// What one directory mapping produced.
#[derive(Debug)]
pub struct DirectoryOutcome {
    pub changes: Vec<FileChange>,
    pub module_update: Option<ModuleUpdate>,
    pub metrics: DirectoryMetrics,
}

/// Walks one directory mapping, builds jobs and hands them to the batch
/// processor.
pub struct DirectoryProcessor<'a> {
    pub batch: &'a BatchProcessor,
    pub trees: &'a TreeCache,
    pub git: &'a dyn GitDriver,
    pub target: &'a TargetConfig,
    /// Base for module scratch clones.
    pub temp_base: &'a Path,
}

impl DirectoryProcessor<'_> {
    pub fn process_mapping(
        &self,
        ctx: &Context,
        source_root: &Path,
        mapping: &DirectoryMapping,
        reporter: Option<&dyn ProgressReporter>,
    ) -> Result<DirectoryOutcome, ProcessError> {
        ctx.check()?;
        let started = Instant::now();

        if mapping.delete {
            return self.process_delete(ctx, mapping, started);
        }

        // A module-linked mapping re-roots the walk at the pinned version.
        let mut module_update = None;
        let mut walk_root = source_root.join(&mapping.src);
        let mut versioned = None;

        if let Some(module_cfg) = &mapping.module
            && gomod::find_go_mod_in_parents(&walk_root).is_some()
        {
            match self.resolve_module_source(ctx, mapping, module_cfg) {
                Ok(Some((source, update))) => {
                    versioned = Some(source);
                    walk_root = versioned.as_ref().unwrap().path.clone();
                    module_update = Some(update);
                }
                Ok(None) => {}
                Err(e) => return Err(e),
            }
        }

        let exclude = ExcludeSet::compile(&mapping.exclude).map_err(|e| ProcessError::Io {
            path: mapping.src.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

        let mut examined = 0u64;
        let mut excluded = 0u64;
        let mut survivors: Vec<String> = Vec::new();

        for rel in walk_files(&walk_root)? {
            examined += 1;
            if exclude.matches(&rel) {
                excluded += 1;
                continue;
            }
            survivors.push(rel);
        }

        let total = survivors.len();
        let jobs: Vec<FileJob> = survivors
            .into_iter()
            .enumerate()
            .map(|(index, rel)| {
                let source_path = match &versioned {
                    // Walk is rooted at the module checkout; jobs still need
                    // paths relative to the root the batch reads from.
                    Some(_) => rel.clone(),
                    None => join_rel_paths(&mapping.src, &rel),
                };
                FileJob::from_directory(
                    mapping,
                    source_path,
                    join_rel_paths(&mapping.dest, &rel),
                    rel,
                    index,
                    total,
                    self.target.transform.clone(),
                )
            })
            .collect();

        let batch_root: &Path = match &versioned {
            Some(source) => &source.path,
            None => source_root,
        };
        let changes = self
            .batch
            .process_files_with_reporter(ctx, batch_root, jobs, reporter)?;

        let metrics = DirectoryMetrics {
            src: mapping.src.clone(),
            dest: mapping.dest.clone(),
            excluded: mapping.exclude.clone(),
            files_examined: examined,
            files_excluded: excluded,
            files_synced: changes.len() as u64,
            processing_ms: started.elapsed().as_millis() as u64,
        };

        Ok(DirectoryOutcome {
            changes,
            module_update,
            metrics,
        })
    }

    /// `delete: true`: emit a deletion for every file currently under the
    /// destination in the target.
    fn process_delete(
        &self,
        ctx: &Context,
        mapping: &DirectoryMapping,
        started: Instant,
    ) -> Result<DirectoryOutcome, ProcessError> {
        let index = self
            .trees
            .get_tree(ctx, &self.target.repo, &self.target.branch)
            .map_err(|e| ProcessError::Remote {
                path: mapping.dest.clone(),
                source: e,
            })?;

        let files = index.files_under(&mapping.dest);
        if files.is_empty() {
            return Err(ProcessError::NothingToDelete(mapping.dest.clone()));
        }

        let mut changes = Vec::with_capacity(files.len());
        for node in &files {
            ctx.check()?;
            // Original content is best-effort: a deletion is still valid
            // when the lookup fails.
            let original = match self.batch.fetch_existing(ctx, &node.path) {
                Ok(content) => content,
                Err(ProcessError::Context(c)) => return Err(ProcessError::Context(c)),
                Err(e) => {
                    cli::log_warning(&format!(
                        "Could not fetch '{}' before deletion: {e}",
                        node.path
                    ));
                    None
                }
            };
            changes.push(FileChange::deleted(node.path.clone(), original));
        }

        let metrics = DirectoryMetrics {
            src: mapping.src.clone(),
            dest: mapping.dest.clone(),
            excluded: mapping.exclude.clone(),
            files_examined: files.len() as u64,
            files_excluded: 0,
            files_synced: changes.len() as u64,
            processing_ms: started.elapsed().as_millis() as u64,
        };

        Ok(DirectoryOutcome {
            changes,
            module_update: None,
            metrics,
        })
    }

    /// Reads the version the target pins for the linked module and clones
    /// the module source at that tag. `Ok(None)` falls back to the plain
    /// source walk.
    fn resolve_module_source(
        &self,
        ctx: &Context,
        mapping: &DirectoryMapping,
        module_cfg: &crate::config::ModuleConfig,
    ) -> Result<Option<(gomod::VersionedSource, ModuleUpdate)>, ProcessError> {
        let Some(manifest) = self.batch.fetch_existing(ctx, &module_cfg.manifest)? else {
            cli::log_warning(&format!(
                "Target {} has no manifest at '{}', syncing '{}' from the source clone",
                self.target.repo, module_cfg.manifest, mapping.src
            ));
            return Ok(None);
        };
        let manifest_text = String::from_utf8_lossy(&manifest);

        let Some(version) = gomod::manifest::pinned_version(&manifest_text, &module_cfg.name)
        else {
            cli::log_warning(&format!(
                "Target {} does not require module '{}', syncing '{}' from the source clone",
                self.target.repo, module_cfg.name, mapping.src
            ));
            return Ok(None);
        };

        let source = gomod::source_at_version(
            ctx,
            self.git,
            &module_cfg.repo_url,
            &version,
            module_cfg.subdir.as_deref(),
            self.temp_base,
        )
        .map_err(|e| match crate::context::find_context_error(&e) {
            Some(ctx_err) => ProcessError::Context(ctx_err),
            None => ProcessError::Io {
                path: mapping.src.clone(),
                source: std::io::Error::other(e.to_string()),
            },
        })?;

        let update = ModuleUpdate {
            dest_path: module_cfg.manifest.clone(),
            module: module_cfg.name.clone(),
            version: source.resolved_version.clone(),
        };
        Ok(Some((source, update)))
    }
}

/// Collects every file under `root` as a forward-slash relative path, in
/// lexicographical order. The stack-based walk avoids recursion.
fn walk_files(root: &Path) -> Result<Vec<String>, ProcessError> {
    if !root.is_dir() {
        return Err(ProcessError::FileNotFound(root.display().to_string()));
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| ProcessError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;

        let mut children: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ProcessError::Io {
                path: dir.display().to_string(),
                source: e,
            })?;
            children.push(entry.path());
        }
        children.sort();

        for child in children.into_iter().rev() {
            if child.is_dir() {
                stack.push(child);
            } else if child.is_file() {
                let rel = child
                    .strip_prefix(root)
                    .expect("walked path is under its root");
                files.push(normalize_rel_path(rel));
            }
        }
    }

    files.sort();
    Ok(files)
}
