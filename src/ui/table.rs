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

// Helper function to calculate the "visible" length of a string, ignoring ANSI escape codes.
fn visible_string_len(s: &str) -> usize {
    let mut len = 0;
    let mut in_ansi_escape = false;

    for c in s.chars() {
        if in_ansi_escape {
            if c == 'm' {
                in_ansi_escape = false;
            }
            continue;
        } else if c == '\x1b' {
            in_ansi_escape = true;
            continue;
        } else {
            len += 1;
        }
    }
    len
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Alignment {
    Left,
    Right,
}

/// A helper struct to construct a Table
pub struct Table {
    headers: Vec<String>,
    data: Vec<Vec<String>>,
    column_alignments: Vec<Alignment>,
    padding: usize,
}

impl Table {
    pub fn new_with_alignments(alignments: Vec<Alignment>) -> Self {
        Self {
            headers: Vec::new(),
            data: Vec::new(),
            column_alignments: alignments,
            padding: 2,
        }
    }

    pub fn set_headers(&mut self, headers: Vec<String>) {
        self.headers = headers;
        self.column_alignments
            .resize(self.headers.len(), Alignment::Left);
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        let row_len = row.len();
        self.data.push(row);
        let current_max_cols = self.column_alignments.len().max(row_len);
        self.column_alignments
            .resize(current_max_cols, Alignment::Left);
    }

    fn column_widths(&self) -> Vec<usize> {
        let num_columns = self
            .data
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        let mut widths = vec![0usize; num_columns];
        for (i, header) in self.headers.iter().enumerate() {
            widths[i] = widths[i].max(visible_string_len(header));
        }
        for row in &self.data {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(visible_string_len(cell));
            }
        }
        widths
    }

    fn render_cell(&self, cell: &str, width: usize, alignment: Alignment) -> String {
        let visible = visible_string_len(cell);
        let fill = width.saturating_sub(visible);
        match alignment {
            Alignment::Left => format!("{}{}", cell, " ".repeat(fill)),
            Alignment::Right => format!("{}{}", " ".repeat(fill), cell),
        }
    }

    /// Renders the table to a String, one line per row.
    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let pad = " ".repeat(self.padding);
        let mut lines = Vec::new();

        if !self.headers.is_empty() {
            let cells: Vec<String> = self
                .headers
                .iter()
                .enumerate()
                .map(|(i, h)| self.render_cell(h, widths[i], self.column_alignments[i]))
                .collect();
            lines.push(cells.join(&pad).trim_end().to_string());
        }

        for row in &self.data {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, c)| self.render_cell(c, widths[i], self.column_alignments[i]))
                .collect();
            lines.push(cells.join(&pad).trim_end().to_string());
        }

        lines.join("\n")
    }

    pub fn print(&self) {
        println!("{}", self.render());
    }
}
