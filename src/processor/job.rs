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

use crate::config::{DirectoryMapping, TransformConfig};

/// One file to read, transform and diff. Owned by exactly one worker at a
/// time: producer → channel → worker → collector.
#[derive(Debug, Clone)]
pub struct FileJob {
    /// Path relative to the source root being processed.
    pub source_path: String,
    /// Destination path inside the target repository.
    pub dest_path: String,
    pub transform: TransformConfig,
    pub is_from_directory: bool,
    pub directory_mapping: Option<DirectoryMapping>,
    /// Path relative to the directory mapping (equals `source_path` for
    /// standalone file mappings).
    pub relative_path: String,
    pub file_index: usize,
    pub total_files: usize,
}

impl FileJob {
    /// A standalone single-file job.
    pub fn new(src: &str, dest: &str, transform: TransformConfig) -> Self {
        Self {
            source_path: src.to_string(),
            dest_path: dest.to_string(),
            transform,
            is_from_directory: false,
            directory_mapping: None,
            relative_path: src.to_string(),
            file_index: 0,
            total_files: 1,
        }
    }

    /// A job produced by a directory walk.
    pub fn from_directory(
        mapping: &DirectoryMapping,
        source_path: String,
        dest_path: String,
        relative_path: String,
        file_index: usize,
        total_files: usize,
        transform: TransformConfig,
    ) -> Self {
        Self {
            source_path,
            dest_path,
            transform,
            is_from_directory: true,
            directory_mapping: Some(mapping.clone()),
            relative_path,
            file_index,
            total_files,
        }
    }
}

/// Result of processing one file. Exactly one of these shapes holds:
/// deletion (`is_deleted`, no content), creation (`is_new`, no original),
/// or modification (both contents present).
#[derive(Debug, Clone, PartialEq)]
pub struct FileChange {
    pub path: String,
    pub content: Option<Vec<u8>>,
    pub original_content: Option<Vec<u8>>,
    pub is_new: bool,
    pub is_deleted: bool,
}

impl FileChange {
    pub fn created(path: String, content: Vec<u8>) -> Self {
        Self {
            path,
            content: Some(content),
            original_content: None,
            is_new: true,
            is_deleted: false,
        }
    }

    pub fn modified(path: String, content: Vec<u8>, original: Vec<u8>) -> Self {
        Self {
            path,
            content: Some(content),
            original_content: Some(original),
            is_new: false,
            is_deleted: false,
        }
    }

    pub fn deleted(path: String, original: Option<Vec<u8>>) -> Self {
        Self {
            path,
            content: None,
            original_content: original,
            is_new: false,
            is_deleted: true,
        }
    }
}
