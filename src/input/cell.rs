//! Classifying the raw value of a component attribute cell.
use crate::sheet::Cell;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// The marker for a reference to the technology cost database
const DB_MARKER: &str = "db";

/// File extension identifying time series files
const TIME_SERIES_EXTENSION: &str = ".csv";

/// What a component attribute cell holds
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// No value
    Empty,
    /// A plain number
    Number(f64),
    /// A plain boolean
    Bool(bool),
    /// A lookup in the technology cost database, multiplied by `factor`.
    ///
    /// If `attribute` is `None`, the attribute named in the column header is looked up.
    DbRef {
        /// Multiplier for the looked-up value
        factor: f64,
        /// Cost database attribute to look up instead of the column's attribute
        attribute: Option<String>,
    },
    /// The name of a time series file
    FileRef(PathBuf),
    /// Quoted text, taken literally (without the quotes)
    Literal(String),
    /// Any other text
    Text(String),
}

impl CellValue {
    /// Classify a cell.
    ///
    /// Fails only if the cell looks like a scaled database reference whose scaling factor is not
    /// a number (e.g. `x*db`).
    pub fn parse(cell: &Cell) -> Result<Self> {
        let text = match cell {
            Cell::Empty => return Ok(CellValue::Empty),
            Cell::Number(value) => return Ok(CellValue::Number(*value)),
            Cell::Bool(value) => return Ok(CellValue::Bool(*value)),
            Cell::DateTime(_) => return Ok(CellValue::Text(cell.to_string())),
            Cell::Text(text) => text.trim(),
        };

        if let Some(value) = parse_db_ref(text)? {
            return Ok(value);
        }
        if let Some(literal) = strip_quotes(text) {
            return Ok(CellValue::Literal(literal.to_string()));
        }
        if text.to_ascii_lowercase().ends_with(TIME_SERIES_EXTENSION) {
            return Ok(CellValue::FileRef(PathBuf::from(text)));
        }

        Ok(CellValue::Text(text.to_string()))
    }

    /// Classify a cell of an attribute which holds text.
    ///
    /// Anything but an empty cell is taken literally, without surrounding quotes.
    pub fn parse_text(cell: &Cell) -> Self {
        if cell.is_empty() {
            return CellValue::Empty;
        }

        let text = cell.to_string();
        let text = text.trim();
        CellValue::Literal(strip_quotes(text).unwrap_or(text).to_string())
    }
}

/// Parse `db`, `db_<attr>`, `<factor>*db` or `<factor>*db_<attr>`
fn parse_db_ref(text: &str) -> Result<Option<CellValue>> {
    let (factor, marker) = match text.split_once('*') {
        Some((factor, marker)) => (Some(factor.trim()), marker.trim()),
        None => (None, text),
    };

    let attribute = if marker == DB_MARKER {
        None
    } else if let Some(attribute) = marker
        .strip_prefix(DB_MARKER)
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|attribute| !attribute.is_empty())
    {
        Some(attribute.to_string())
    } else {
        return Ok(None);
    };

    let factor = match factor {
        Some(factor) => factor
            .parse::<f64>()
            .ok()
            .filter(|factor| factor.is_finite())
            .with_context(|| format!("Invalid scaling factor '{factor}' in '{text}'"))?,
        None => 1.0,
    };

    Ok(Some(CellValue::DbRef { factor, attribute }))
}

/// Strip matching single or double quotes from around a string
fn strip_quotes(text: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|quote| {
        text.strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn db_ref(factor: f64, attribute: Option<&str>) -> CellValue {
        CellValue::DbRef {
            factor,
            attribute: attribute.map(ToString::to_string),
        }
    }

    #[rstest]
    #[case(Cell::Empty, CellValue::Empty)]
    #[case(Cell::Number(2.5), CellValue::Number(2.5))]
    #[case(Cell::Bool(true), CellValue::Bool(true))]
    #[case(Cell::Text("db".into()), db_ref(1.0, None))]
    #[case(Cell::Text("db_capital_cost".into()), db_ref(1.0, Some("capital_cost")))]
    #[case(Cell::Text("2*db_capital_cost".into()), db_ref(2.0, Some("capital_cost")))]
    #[case(Cell::Text("0.5 * db".into()), db_ref(0.5, None))]
    #[case(Cell::Text("solar.csv".into()), CellValue::FileRef("solar.csv".into()))]
    #[case(Cell::Text("Solar.CSV".into()), CellValue::FileRef("Solar.CSV".into()))]
    #[case(Cell::Text("\"db\"".into()), CellValue::Literal("db".into()))]
    #[case(Cell::Text("'AC'".into()), CellValue::Literal("AC".into()))]
    #[case(Cell::Text("electricity".into()), CellValue::Text("electricity".into()))]
    #[case(Cell::Text("dbx".into()), CellValue::Text("dbx".into()))]
    #[case(Cell::Text("db_".into()), CellValue::Text("db_".into()))]
    #[case(Cell::Text("2*3".into()), CellValue::Text("2*3".into()))]
    fn parse_cell(#[case] cell: Cell, #[case] expected: CellValue) {
        assert_eq!(CellValue::parse(&cell).unwrap(), expected);
    }

    #[rstest]
    #[case("two*db")]
    #[case("nan*db")]
    fn parse_bad_factor(#[case] text: &str) {
        assert!(CellValue::parse(&Cell::Text(text.into())).is_err());
    }

    #[rstest]
    #[case(Cell::Empty, CellValue::Empty)]
    #[case(Cell::Text("db".into()), CellValue::Literal("db".into()))]
    #[case(Cell::Text("'PQ'".into()), CellValue::Literal("PQ".into()))]
    #[case(Cell::Number(1.0), CellValue::Literal("1".into()))]
    fn parse_text_cell(#[case] cell: Cell, #[case] expected: CellValue) {
        assert_eq!(CellValue::parse_text(&cell), expected);
    }
}
