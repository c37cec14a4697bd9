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

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    global::{defaults, is_valid_repo_id},
    resolver::{SourceFileInfo, detect_conflicts},
    utils::{globs::ExcludeSet, has_traversal},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root of the broadcast configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Prefix of generated sync branches.
    #[serde(default)]
    pub branch_prefix: Option<String>,
    pub source: SourceConfig,
    pub targets: Vec<TargetConfig>,
    /// PR lists applied to every target of the group.
    #[serde(default)]
    pub pr_global: PrLists,
    /// Fallback PR lists when the merged lists end up empty.
    #[serde(default)]
    pub pr_defaults: PrLists,
    #[serde(default)]
    pub conflict_resolution: Option<ConflictResolutionConfig>,
}

impl GroupConfig {
    pub fn effective_branch_prefix(&self) -> &str {
        self.branch_prefix
            .as_deref()
            .unwrap_or(defaults::DEFAULT_BRANCH_PREFIX)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub repo: String,
    pub branch: String,
    /// Blobs above this size are skipped when cloning the source.
    #[serde(default)]
    pub blob_size_limit: Option<u64>,
    #[serde(default)]
    pub security_email: Option<String>,
    #[serde(default)]
    pub support_email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub repo: String,
    /// Branch content lookups and PR bases run against. Required.
    pub branch: String,
    #[serde(default)]
    pub files: Vec<FileMapping>,
    #[serde(default)]
    pub directories: Vec<DirectoryMapping>,
    #[serde(default)]
    pub transform: TransformConfig,
    /// Per-target PR list overrides, merged with the group's globals.
    #[serde(default)]
    pub pr: PrLists,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMapping {
    pub src: String,
    pub dest: String,
    /// Remove `dest` from the target instead of copying.
    #[serde(default)]
    pub delete: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryMapping {
    pub src: String,
    pub dest: String,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Remove every file under `dest` in the target.
    #[serde(default)]
    pub delete: bool,
    /// Module link: re-resolve the source at the version the target pins.
    #[serde(default)]
    pub module: Option<ModuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Module path as it appears in manifests.
    pub name: String,
    /// Clone URL of the module's repository.
    pub repo_url: String,
    /// Manifest location inside the target repository.
    #[serde(default = "default_manifest_path")]
    pub manifest: String,
    /// Subdirectory of the module repository to sync from.
    #[serde(default)]
    pub subdir: Option<String>,
}

fn default_manifest_path() -> String {
    "go.mod".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub repo_name: bool,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl TransformConfig {
    pub fn is_enabled(&self) -> bool {
        self.repo_name || !self.variables.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrLists {
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub team_reviewers: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictResolutionConfig {
    pub strategy: String,
    #[serde(default)]
    pub priority: Vec<String>,
}

/// Runtime options, populated from CLI flags.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Sync even when the target is up to date.
    pub force: bool,
    /// No push, no PR; still clones and stages for accurate previews.
    pub dry_run: bool,
    /// Engine worker pool size.
    pub max_concurrency: usize,
    /// Whether `pending` status targets are eligible.
    pub update_existing_prs: bool,
    /// Gate for scratch-dir teardown.
    pub cleanup_temp_files: bool,
    pub automerge: bool,
    pub automerge_labels: Vec<String>,
    /// Batch processor worker count; 0 means the default.
    pub workers: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            max_concurrency: defaults::DEFAULT_MAX_CONCURRENCY,
            update_existing_prs: false,
            cleanup_temp_files: true,
            automerge: false,
            automerge_labels: Vec::new(),
            workers: defaults::DEFAULT_PROCESS_WORKERS,
        }
    }
}

/// Loads and validates a configuration file.
pub fn load(path: &Path) -> Result<SyncConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: SyncConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &SyncConfig) -> Result<(), ConfigError> {
    if config.groups.is_empty() {
        return Err(ConfigError::Invalid("no groups configured".to_string()));
    }

    for group in &config.groups {
        if group.id.is_empty() {
            return Err(ConfigError::Invalid("group id must not be empty".into()));
        }
        if !is_valid_repo_id(&group.source.repo) {
            return Err(ConfigError::Invalid(format!(
                "group '{}': source repo '{}' is not org/name",
                group.id, group.source.repo
            )));
        }
        if group.source.branch.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "group '{}': source branch must not be empty",
                group.id
            )));
        }

        for target in &group.targets {
            validate_target(group, target)?;
        }
    }
    Ok(())
}

fn validate_target(group: &GroupConfig, target: &TargetConfig) -> Result<(), ConfigError> {
    let where_ = format!("group '{}', target '{}'", group.id, target.repo);

    if !is_valid_repo_id(&target.repo) {
        return Err(ConfigError::Invalid(format!(
            "{where_}: repo is not org/name"
        )));
    }
    // An empty target branch would make remote content lookups fall back to
    // the default branch and mis-diff every file.
    if target.branch.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "{where_}: branch must not be empty"
        )));
    }

    let mut entries = Vec::new();
    for (index, mapping) in target.files.iter().enumerate() {
        if mapping.dest.is_empty() || (mapping.src.is_empty() && !mapping.delete) {
            return Err(ConfigError::Invalid(format!(
                "{where_}: file mapping {index} has empty paths"
            )));
        }
        for path in [&mapping.src, &mapping.dest] {
            if has_traversal(path) {
                return Err(ConfigError::Invalid(format!(
                    "{where_}: path '{path}' contains '..'"
                )));
            }
        }
        entries.push(SourceFileInfo {
            source_id: mapping.src.clone(),
            src: mapping.src.clone(),
            dest: mapping.dest.clone(),
            mapping_index: index,
        });
    }

    // Destination collisions are fatal here only under the error strategy;
    // the other strategies resolve them at sync time.
    let strategy = group
        .conflict_resolution
        .as_ref()
        .map(|c| c.strategy.as_str())
        .unwrap_or("last-wins");
    if strategy == "error" {
        let conflicts = detect_conflicts(&entries);
        if let Some(conflict) = conflicts.first() {
            return Err(ConfigError::Invalid(format!(
                "{where_}: {} sources map to '{}'",
                conflict.sources.len(),
                conflict.dest
            )));
        }
    }

    for (index, mapping) in target.directories.iter().enumerate() {
        if mapping.dest.is_empty() || (mapping.src.is_empty() && !mapping.delete) {
            return Err(ConfigError::Invalid(format!(
                "{where_}: directory mapping {index} has empty paths"
            )));
        }
        for path in [&mapping.src, &mapping.dest] {
            if has_traversal(path) {
                return Err(ConfigError::Invalid(format!(
                    "{where_}: path '{path}' contains '..'"
                )));
            }
        }
        ExcludeSet::compile(&mapping.exclude)
            .map_err(|e| ConfigError::Invalid(format!("{where_}: {e}")))?;
    }

    Ok(())
}
