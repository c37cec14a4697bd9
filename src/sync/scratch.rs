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
    time::Duration,
};

use anyhow::{Context as AnyhowContext, Result};

use crate::{global::defaults, ui::cli};

/// A scratch directory removed on drop, including on failure paths.
///
/// Removal first walks the tree forcing permissions (dirs 0700, files 0600)
/// because clones can carry read-only objects, and retries a few times with
/// short delays to cope with OS-level holds on just-released files.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    cleanup: bool,
}

impl ScratchDir {
    /// Creates a uniquely named scratch directory under `base` (or the
    /// system temp dir). `cleanup=false` leaves it behind for inspection.
    pub fn create(base: Option<&Path>, cleanup: bool) -> Result<Self> {
        let builder_base = match base {
            Some(dir) => dir.to_path_buf(),
            None => std::env::temp_dir(),
        };
        std::fs::create_dir_all(&builder_base)
            .with_context(|| format!("Failed to create scratch base {}", builder_base.display()))?;

        let dir = tempfile::Builder::new()
            .prefix(defaults::SCRATCH_DIR_PREFIX)
            .tempdir_in(&builder_base)
            .with_context(|| "Failed to create scratch directory")?;

        // Ownership of removal moves to this type so failures can retry.
        let path = dir.keep();
        Ok(Self { path, cleanup })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates (if needed) and returns a named subdirectory.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let sub = self.path.join(name);
        std::fs::create_dir_all(&sub)
            .with_context(|| format!("Failed to create scratch subdir {}", sub.display()))?;
        Ok(sub)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.cleanup || !self.path.exists() {
            return;
        }
        if let Err(e) = remove_dir_forced(&self.path) {
            cli::log_warning(&format!(
                "Could not remove scratch directory {}: {e}",
                self.path.display()
            ));
        }
    }
}

/// Forces permissions along the whole tree, then removes it, retrying on
/// transient failures.
pub fn remove_dir_forced(path: &Path) -> Result<()> {
    force_permissions(path);

    let mut last_err = None;
    for attempt in 0..defaults::SCRATCH_CLEANUP_RETRIES {
        match std::fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                last_err = Some(e);
                if attempt + 1 < defaults::SCRATCH_CLEANUP_RETRIES {
                    std::thread::sleep(Duration::from_millis(
                        defaults::SCRATCH_CLEANUP_RETRY_DELAY_MS,
                    ));
                }
            }
        }
    }
    Err(anyhow::anyhow!(
        "Failed to remove {} after {} attempts: {}",
        path.display(),
        defaults::SCRATCH_CLEANUP_RETRIES,
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(unix)]
fn force_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return;
    };
    if metadata.is_dir() {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700));
        if let Ok(entries) = std::fs::read_dir(path) {
            for entry in entries.flatten() {
                force_permissions(&entry.path());
            }
        }
    } else if metadata.is_file() {
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
}

#[cfg(not(unix))]
fn force_permissions(path: &Path) {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return;
    };
    let mut perms = metadata.permissions();
    perms.set_readonly(false);
    let _ = std::fs::set_permissions(path, perms);
    if metadata.is_dir()
        && let Ok(entries) = std::fs::read_dir(path)
    {
        for entry in entries.flatten() {
            force_permissions(&entry.path());
        }
    }
}
