//! Writing the results workbook.
use crate::input::CaseFile;
use crate::postprocess::{ReportTables, Table, TableValue};
use crate::sheet::Cell;
use anyhow::{Result, anyhow};
use std::path::Path;
use umya_spreadsheet::{Spreadsheet, Worksheet};

/// Add an empty worksheet with the given name
fn add_sheet<'a>(book: &'a mut Spreadsheet, name: &str) -> Result<&'a mut Worksheet> {
    book.new_sheet(name)
        .map_err(|err| anyhow!("Could not add sheet {name}: {err}"))
}

/// Write a case file cell at the given (1-based) column and row
fn write_cell(sheet: &mut Worksheet, col: u32, row: u32, cell: &Cell) {
    let target = sheet.get_cell_mut((col, row));
    match cell {
        Cell::Empty => {}
        Cell::Number(value) => {
            target.set_value_number(*value);
        }
        Cell::Bool(value) => {
            target.set_value_bool(*value);
        }
        Cell::Text(_) | Cell::DateTime(_) => {
            target.set_value(cell.to_string());
        }
    }
}

/// Write a report table, with its column names in the first row
fn write_table(sheet: &mut Worksheet, table: &Table) {
    for (col, name) in (1u32..).zip(&table.columns) {
        sheet.get_cell_mut((col, 1u32)).set_value(name.clone());
    }
    for (row, values) in (2u32..).zip(&table.rows) {
        for (col, value) in (1u32..).zip(values) {
            let target = sheet.get_cell_mut((col, row));
            match value {
                TableValue::Number(value) => {
                    target.set_value_number(*value);
                }
                TableValue::Text(value) => {
                    target.set_value(value.clone());
                }
            }
        }
    }
}

/// Write the case inputs and report tables to a workbook
pub fn write_workbook(file_path: &Path, case_file: &CaseFile, tables: &ReportTables) -> Result<()> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();

    let sheet = add_sheet(&mut book, "case inputs")?;
    for (row, (key, value)) in (1u32..).zip(&case_file.config.entries) {
        sheet.get_cell_mut((1u32, row)).set_value(key.clone());
        write_cell(sheet, 2, row, value);
    }

    let sheet = add_sheet(&mut book, "component inputs")?;
    for (col, name) in (1u32..).zip(&case_file.header) {
        sheet.get_cell_mut((col, 1u32)).set_value(name.clone());
    }
    for (row, cells) in (2u32..).zip(&case_file.component_rows) {
        for (col, cell) in (1u32..).zip(cells) {
            write_cell(sheet, col, row, cell);
        }
    }

    for (name, table) in tables.iter() {
        write_table(add_sheet(&mut book, name)?, table);
    }

    umya_spreadsheet::writer::xlsx::write(&book, file_path).map_err(|err| anyhow!("{err:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::write_demo_case;
    use crate::input::read_case_file;
    use crate::sheet::read_grid;
    use tempfile::tempdir;

    #[test]
    fn workbook_has_case_inputs() {
        let dir = tempdir().unwrap();
        let case_file = read_case_file(&write_demo_case(dir.path())).unwrap();
        let mut table = Table::new(["objective [EUR]"]);
        table.rows.push(vec![TableValue::Number(1.5)]);
        let tables = ReportTables {
            time_inputs: Table::default(),
            case_results: table,
            component_results: Table::default(),
            time_results: Table::default(),
        };

        let file_path = dir.path().join("demo.xlsx");
        write_workbook(&file_path, &case_file, &tables).unwrap();

        // The first sheet is read back
        let grid = read_grid(&file_path).unwrap();
        assert_eq!(grid.rows()[0][0], Cell::Text("numerics_scaling".into()));
        assert_eq!(grid.rows()[0][1], Cell::Number(1000.0));
    }
}
