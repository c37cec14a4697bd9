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

use std::time::Duration;

/// Core progress surface the file processor reports to.
///
/// Implementations provide what they can; the processor probes for the
/// enhanced capability set with [`ProgressReporter::enhanced`] before
/// calling those methods.
pub trait ProgressReporter: Send + Sync {
    fn update_progress(&self, current: usize, total: usize, message: &str);

    /// Capability probe for the enhanced counter set.
    fn enhanced(&self) -> Option<&dyn EnhancedProgressReporter> {
        None
    }
}

/// Extended counters a richer reporter can expose.
pub trait EnhancedProgressReporter: Send + Sync {
    fn record_binary_file_skipped(&self, size: u64);
    fn record_transform_success(&self, duration: Duration);
    fn record_transform_error(&self);
    fn record_file_changed(&self);
}

/// Reporter that swallows everything. Used by tests and dry paths.
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn update_progress(&self, _current: usize, _total: usize, _message: &str) {}
}
