use serde::{Deserialize, Serialize};

/// A worksheet snapshot: the header row followed by data rows.
///
/// Rows may be ragged, the way the sheet API trims trailing blanks. Reading
/// past the end of a row yields an empty cell.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Zero-based data coordinates. Row 0 is the first row under the header.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: usize,
    pub column: usize,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Split raw sheet values into header and rows. An empty grid is an empty table.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let header = grid.remove(0);
        Self { header, rows: grid }
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn get(&self, at: CellRef) -> &str {
        self.cell(at.row, at.column)
    }

    /// Overwrite one cell, growing a short row with blanks if needed.
    pub fn set(&mut self, at: CellRef, value: String) {
        if self.rows.len() <= at.row {
            self.rows.resize_with(at.row + 1, Vec::new);
        }
        let row = &mut self.rows[at.row];
        if row.len() <= at.column {
            row.resize(at.column + 1, String::new());
        }
        row[at.column] = value;
    }

    pub fn append(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Width of the widest row, header included.
    pub fn width(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }
}

/// Spreadsheet column letters for a zero-based index: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quote a worksheet name for use in an A1 range.
pub fn quote_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// A1 address of a data cell, accounting for the header on sheet row 1.
pub fn a1_cell(sheet: &str, at: CellRef) -> String {
    format!("{}!{}{}", quote_sheet(sheet), column_letter(at.column), at.row + 2)
}

/// A1 range covering a whole worksheet.
pub fn a1_sheet(sheet: &str) -> String {
    quote_sheet(sheet)
}
