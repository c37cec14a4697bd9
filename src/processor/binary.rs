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

use crate::global::defaults::BINARY_SNIFF_LEN;

/// Well-known signatures checked before the byte scan.
const MAGIC_NUMBERS: &[&[u8]] = &[
    b"\x89PNG\r\n\x1a\n", // PNG
    b"\xff\xd8\xff",      // JPEG
    b"GIF87a",            // GIF
    b"GIF89a",
    b"%PDF-",             // PDF
    b"\x7fELF",           // ELF
    b"PK\x03\x04",        // zip family
    b"\x1f\x8b",          // gzip
];

/// Sniffs whether content is binary: a magic-number fast path, then a NUL
/// scan over the first 8 KiB.
pub fn is_binary(content: &[u8]) -> bool {
    for magic in MAGIC_NUMBERS {
        if content.starts_with(magic) {
            return true;
        }
    }
    let window = &content[..content.len().min(BINARY_SNIFF_LEN)];
    window.contains(&0)
}
