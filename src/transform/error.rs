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

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformCategory {
    BinaryFile,
    TemplateParse,
    VariableSubstitution,
    RepoNameFormat,
    GenericTransform,
    FileSystem,
    Timeout,
    Context,
}

impl std::fmt::Display for TransformCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransformCategory::BinaryFile => "binary_file",
            TransformCategory::TemplateParse => "template_parse",
            TransformCategory::VariableSubstitution => "variable_substitution",
            TransformCategory::RepoNameFormat => "repo_name_format",
            TransformCategory::GenericTransform => "generic_transform",
            TransformCategory::FileSystem => "file_system",
            TransformCategory::Timeout => "timeout",
            TransformCategory::Context => "context",
        };
        write!(f, "{s}")
    }
}

/// What a failed per-file transform should fall back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Propagate; the pipeline is ending anyway.
    None,
    /// Drop the file from the batch.
    SkipFile,
    /// Try the transform once more.
    Retry,
    /// Keep the untransformed source content.
    UseOriginal,
}

/// A transform failure with its category, which fixes recoverability and
/// retryability:
///
/// | category | recoverable | retryable |
/// |---|---|---|
/// | binary_file | yes | no |
/// | template_parse / variable_substitution / repo_name_format / generic_transform | yes | no |
/// | file_system | no | yes |
/// | timeout | yes | yes |
/// | context | no | no |
#[derive(Debug, Clone, Error)]
#[error("{category} error in transform '{transform}' for '{file}': {message}")]
pub struct TransformError {
    pub category: TransformCategory,
    pub transform: String,
    pub file: String,
    pub message: String,
}

impl TransformError {
    pub fn new(
        category: TransformCategory,
        transform: impl Into<String>,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            transform: transform.into(),
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn recoverable(&self) -> bool {
        match self.category {
            TransformCategory::BinaryFile
            | TransformCategory::TemplateParse
            | TransformCategory::VariableSubstitution
            | TransformCategory::RepoNameFormat
            | TransformCategory::GenericTransform
            | TransformCategory::Timeout => true,
            TransformCategory::FileSystem | TransformCategory::Context => false,
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(
            self.category,
            TransformCategory::FileSystem | TransformCategory::Timeout
        )
    }

    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        if self.category == TransformCategory::Context {
            return RecoveryStrategy::None;
        }
        if self.category == TransformCategory::BinaryFile {
            return RecoveryStrategy::SkipFile;
        }
        if self.retryable() {
            return RecoveryStrategy::Retry;
        }
        if self.recoverable() {
            return RecoveryStrategy::UseOriginal;
        }
        RecoveryStrategy::SkipFile
    }
}
