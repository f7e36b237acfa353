//! Reading case files into a rectangular grid of typed cells.
//!
//! Case files may be CSV files or spreadsheets. For spreadsheets, only the first worksheet is read.
use anyhow::{Context, Result, bail};
use calamine::{DataType, Reader, open_workbook_auto};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// File extensions which are read as spreadsheets
const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// A single cell of a case file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// No value
    Empty,
    /// A numeric value
    Number(f64),
    /// A boolean value
    Bool(bool),
    /// A text value (never empty)
    Text(String),
    /// A date and time, as stored natively by spreadsheets
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Parse a cell from text, as found in CSV files.
    ///
    /// Surrounding whitespace is ignored. Numeric and boolean text is converted into the
    /// corresponding variant, except for "NaN", which is kept as text.
    pub fn from_text(s: &str) -> Self {
        let s = s.trim_start_matches('\u{feff}').trim();
        if s.is_empty() {
            return Cell::Empty;
        }
        if let Some(value) = s.parse::<f64>().ok().filter(|value| !value.is_nan()) {
            return Cell::Number(value);
        }
        if s.eq_ignore_ascii_case("true") {
            return Cell::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return Cell::Bool(false);
        }

        Cell::Text(s.to_string())
    }

    /// Whether the cell holds no value
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// The cell's value as text, if it is a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::Text(value) => write!(f, "{value}"),
            Cell::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A row of cells. Rows may have different lengths.
pub type Row = Vec<Cell>;

/// The contents of a case file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Row>,
}

impl Grid {
    /// Create a grid from rows, dropping rows which are entirely empty
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: remove_empty_rows(rows),
        }
    }

    /// The (non-empty) rows of the grid
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the grid has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Drop rows which have no cells or whose cells are all empty
fn remove_empty_rows(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .filter(|row| !row.iter().all(Cell::is_empty))
        .collect()
}

/// Get the cell at the given column of a row, treating missing trailing cells as empty
pub fn cell_at(row: &[Cell], col: usize) -> &Cell {
    row.get(col).unwrap_or(&Cell::Empty)
}

/// Read a case file into a [`Grid`].
///
/// The file type is chosen based on the file extension.
///
/// # Arguments
///
/// * `file_path` - Path to a CSV or spreadsheet file
pub fn read_grid(file_path: &Path) -> Result<Grid> {
    let extension = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = if extension == "csv" {
        read_csv_rows(file_path)
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        read_spreadsheet_rows(file_path)
    } else {
        bail!(
            "Case file {} must have a .csv, .xlsx, .xlsm, .xls or .ods extension",
            file_path.display()
        )
    }
    .with_context(|| format!("Error reading case file {}", file_path.display()))?;

    Ok(Grid::new(rows))
}

/// Read all records of a CSV file, without treating the first line as a header
fn read_csv_rows(file_path: &Path) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(file_path)?;

    reader
        .records()
        .map(|record| -> Result<Row> { Ok(record?.iter().map(Cell::from_text).collect()) })
        .collect()
}

/// Read the first worksheet of a spreadsheet
fn read_spreadsheet_rows(file_path: &Path) -> Result<Vec<Row>> {
    let mut workbook = open_workbook_auto(file_path)?;
    let range = workbook
        .worksheet_range_at(0)
        .context("Spreadsheet has no worksheets")??;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_spreadsheet).collect())
        .collect())
}

/// Convert a spreadsheet cell into a [`Cell`]
fn cell_from_spreadsheet(data: &DataType) -> Cell {
    match data {
        DataType::Empty => Cell::Empty,
        #[allow(clippy::cast_precision_loss)]
        DataType::Int(value) => Cell::Number(*value as f64),
        DataType::Float(value) if !value.is_nan() => Cell::Number(*value),
        DataType::Bool(value) => Cell::Bool(*value),
        DataType::String(value) => Cell::from_text(value),
        DataType::DateTime(_) => data.as_datetime().map_or(Cell::Empty, Cell::DateTime),
        other => Cell::from_text(&other.to_string()),
    }
}
