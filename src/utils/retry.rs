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

use rand::Rng;

/// Backoff before retry `attempt` (1-based): `base * 2^(attempt-1)` plus a
/// random jitter in `[0, base * 2^(attempt-1) / 4)`. The jitter comes from
/// the thread RNG, which is a CSPRNG.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
    let jitter_cap = (exp / 4).as_millis() as u64;
    let jitter = if jitter_cap > 0 {
        rand::rng().random_range(0..jitter_cap)
    } else {
        0
    };
    exp + Duration::from_millis(jitter)
}
