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

use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result, bail};

use crate::{
    context::Context,
    git::{CloneOptions, GitDriver},
    sync::scratch::ScratchDir,
};

/// A module checked out at a pinned version. The backing clone lives in its
/// own scratch directory and is torn down when this value drops.
#[derive(Debug)]
pub struct VersionedSource {
    /// Directory the sync walk should be re-rooted at.
    pub path: PathBuf,
    /// Root of the clone (equals `path` unless a subdir was requested).
    pub repo_path: PathBuf,
    pub resolved_version: String,
    _scratch: ScratchDir,
}

fn sanitize_version(version: &str) -> String {
    version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Clones `repo_url` at exactly `version` into a fresh scratch dir under
/// `temp_base` and returns the checkout, optionally narrowed to `subdir`.
///
/// The scratch dir is named `module-<version>-<pid>`; collisions across
/// invocations are tolerated because each sync run uses a fresh temp base.
pub fn source_at_version(
    ctx: &Context,
    git: &dyn GitDriver,
    repo_url: &str,
    version: &str,
    subdir: Option<&str>,
    temp_base: &Path,
) -> Result<VersionedSource> {
    if repo_url.is_empty() {
        bail!("Module source URL must not be empty");
    }
    if version.is_empty() {
        bail!("Module version must not be empty");
    }

    let scratch = ScratchDir::create(Some(temp_base), true)
        .with_context(|| "Failed to create module scratch directory")?;
    let clone_dir = scratch.path().join(format!(
        "module-{}-{}",
        sanitize_version(version),
        std::process::id()
    ));

    git.clone_at_tag(ctx, repo_url, &clone_dir, version, &CloneOptions::default())
        .with_context(|| format!("Failed to clone {repo_url} at {version}"))?;

    let path = match subdir {
        None => clone_dir.clone(),
        Some(sub) => {
            let narrowed = clone_dir.join(sub);
            if !narrowed.is_dir() {
                // The scratch guard tears the clone down on return.
                bail!("Subdirectory '{sub}' does not exist in {repo_url} at {version}");
            }
            narrowed
        }
    };

    Ok(VersionedSource {
        path,
        repo_path: clone_dir,
        resolved_version: version.to_string(),
        _scratch: scratch,
    })
}
