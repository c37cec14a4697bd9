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

pub mod error;
pub mod repo_name;
pub mod variables;

use std::collections::BTreeMap;

use crate::{global::is_valid_repo_id, utils::has_traversal};

pub use error::{RecoveryStrategy, TransformCategory, TransformError};
pub use repo_name::RepoNameTransformer;
pub use variables::VariableTransformer;

/// Everything a transformer may need about the file being rewritten.
#[derive(Debug, Clone, Default)]
pub struct TransformContext {
    pub source_repo: String,
    pub target_repo: String,
    pub file_path: String,
    pub variables: BTreeMap<String, String>,
}

impl TransformContext {
    /// Fails fast on empty fields, malformed repo ids and path traversal.
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.file_path.is_empty() {
            return Err(TransformError::new(
                TransformCategory::GenericTransform,
                "context",
                "",
                "file path is empty",
            ));
        }
        if self.source_repo.is_empty() || self.target_repo.is_empty() {
            return Err(TransformError::new(
                TransformCategory::GenericTransform,
                "context",
                &self.file_path,
                "source and target repositories are required",
            ));
        }
        for repo in [&self.source_repo, &self.target_repo] {
            if !is_valid_repo_id(repo) {
                return Err(TransformError::new(
                    TransformCategory::RepoNameFormat,
                    "context",
                    &self.file_path,
                    format!("'{repo}' is not a valid org/name repository id"),
                ));
            }
        }
        if has_traversal(&self.file_path) {
            return Err(TransformError::new(
                TransformCategory::FileSystem,
                "context",
                &self.file_path,
                "path contains '..' segments",
            ));
        }
        Ok(())
    }
}

/// A single content rewriting step.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform(&self, content: &str, tctx: &TransformContext)
    -> Result<String, TransformError>;
}

/// Ordered set of transformers applied to each text file.
#[derive(Default)]
pub struct TransformChain {
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transformer: Box<dyn Transformer>) {
        self.transformers.push(transformer);
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Runs the whole chain. The context is validated once up front.
    pub fn apply(&self, content: &str, tctx: &TransformContext) -> Result<String, TransformError> {
        tctx.validate()?;

        let mut current = content.to_string();
        for transformer in &self.transformers {
            current = transformer.transform(&current, tctx)?;
        }
        Ok(current)
    }
}
