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

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::github::{GitTree, TreeEntryKind};

/// A blob inside a [`TreeIndex`].
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub path: String,
    pub sha: String,
    pub size: Option<u64>,
}

/// In-memory snapshot of a repository tree at a ref, optimized for O(1)
/// existence checks. Immutable after construction; every strict prefix of a
/// blob path is present in `directories`.
#[derive(Debug)]
pub struct TreeIndex {
    files: BTreeMap<String, TreeNode>,
    directories: BTreeSet<String>,
    pub sha: String,
    pub truncated: bool,
    pub fetched_at: DateTime<Utc>,
}

fn clean_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl TreeIndex {
    pub fn from_git_tree(tree: &GitTree) -> Self {
        let mut files = BTreeMap::new();
        let mut directories = BTreeSet::new();

        for entry in &tree.entries {
            let path = clean_path(&entry.path).to_string();
            if path.is_empty() {
                continue;
            }
            match entry.kind {
                TreeEntryKind::Blob => {
                    insert_prefixes(&mut directories, &path);
                    files.insert(
                        path.clone(),
                        TreeNode {
                            path,
                            sha: entry.sha.clone(),
                            size: entry.size,
                        },
                    );
                }
                TreeEntryKind::Tree => {
                    insert_prefixes(&mut directories, &path);
                    directories.insert(path);
                }
                // Submodule pointers are neither files nor walkable dirs.
                TreeEntryKind::Commit => {}
            }
        }

        Self {
            files,
            directories,
            sha: tree.sha.clone(),
            truncated: tree.truncated,
            fetched_at: Utc::now(),
        }
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.contains_key(clean_path(path))
    }

    /// The empty path is the tree root and always exists.
    pub fn has_directory(&self, path: &str) -> bool {
        let path = clean_path(path);
        path.is_empty() || self.directories.contains(path)
    }

    pub fn file(&self, path: &str) -> Option<&TreeNode> {
        self.files.get(clean_path(path))
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Direct children blobs of `dir` (no recursion).
    pub fn files_in_directory<'a>(&'a self, dir: &'a str) -> Vec<&'a TreeNode> {
        let dir = clean_path(dir);
        self.files_with_prefix(dir)
            .filter(|(rest, _)| !rest.contains('/'))
            .map(|(_, node)| node)
            .collect()
    }

    /// Every blob under `dir`, recursively.
    pub fn files_under<'a>(&'a self, dir: &'a str) -> Vec<&'a TreeNode> {
        self.files_with_prefix(clean_path(dir))
            .map(|(_, node)| node)
            .collect()
    }

    fn files_with_prefix<'a>(
        &'a self,
        dir: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a TreeNode)> {
        let range: Box<dyn Iterator<Item = (&String, &TreeNode)>> = if dir.is_empty() {
            Box::new(self.files.iter())
        } else {
            let start = format!("{dir}/");
            let end = format!("{dir}0"); // '0' is the successor of '/'
            Box::new(self.files.range(start..end))
        };
        let skip = if dir.is_empty() { 0 } else { dir.len() + 1 };
        range.map(move |(path, node)| (&path[skip..], node))
    }
}

fn insert_prefixes(directories: &mut BTreeSet<String>, path: &str) {
    for (i, c) in path.char_indices() {
        if c == '/' {
            directories.insert(path[..i].to_string());
        }
    }
}
