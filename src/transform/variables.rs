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

use super::{TransformCategory, TransformContext, TransformError, Transformer};

/// Substitutes configured variables, accepting both `${NAME}` and
/// `{{NAME}}` spellings. Variables that are not configured are left in
/// place so downstream tooling can flag them.
pub struct VariableTransformer;

impl Transformer for VariableTransformer {
    fn name(&self) -> &'static str {
        "variables"
    }

    fn transform(
        &self,
        content: &str,
        tctx: &TransformContext,
    ) -> Result<String, TransformError> {
        let mut rewritten = content.to_string();
        for (name, value) in &tctx.variables {
            if name.is_empty() {
                return Err(TransformError::new(
                    TransformCategory::VariableSubstitution,
                    self.name(),
                    &tctx.file_path,
                    "variable with empty name",
                ));
            }
            rewritten = rewritten.replace(&format!("${{{name}}}"), value);
            rewritten = rewritten.replace(&format!("{{{{{name}}}}}"), value);
        }
        Ok(rewritten)
    }
}
