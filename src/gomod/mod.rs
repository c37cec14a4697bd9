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

pub mod manifest;
pub mod source;

use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};

pub use source::{VersionedSource, source_at_version};

pub const MANIFEST_NAME: &str = "go.mod";

/// A go.mod rewrite the orchestrator applies to the target before staging.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleUpdate {
    /// Manifest path inside the target repository.
    pub dest_path: String,
    pub module: String,
    pub version: String,
}

/// A directory is a module when it carries a manifest.
pub fn is_module_root(dir: &Path) -> bool {
    dir.join(MANIFEST_NAME).is_file()
}

/// Walks `root` and returns every module root found. The walk never
/// descends into a discovered module, so nested modules are not reported.
pub fn detect_modules(root: &Path) -> Result<Vec<PathBuf>> {
    let mut modules = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if is_module_root(&dir) {
            modules.push(dir);
            continue;
        }

        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?;
        let mut children: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        children.sort();
        // Reverse so the stack pops in lexicographical order.
        stack.extend(children.into_iter().rev());
    }

    modules.sort();
    Ok(modules)
}

/// Climbs from `dir` towards the filesystem root looking for a manifest.
pub fn find_go_mod_in_parents(dir: &Path) -> Option<PathBuf> {
    let mut current = Some(dir);
    while let Some(d) = current {
        let candidate = d.join(MANIFEST_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = d.parent();
    }
    None
}
