//! The module responsible for writing output data to disk.
use crate::input::CaseFile;
use crate::input::case_config::CaseConfig;
use crate::postprocess::{ReportTables, Table};
use anyhow::{Context, Result, ensure};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;
use metadata::write_metadata;
mod xlsx;
use xlsx::write_workbook;

/// Get the folder which results for the case will be written to: `<output_path>/<case_name>`
pub fn get_output_dir(config: &CaseConfig) -> PathBuf {
    config.output_path.join(&config.case_name)
}

/// Create a new output directory for the case, if it doesn't already exist.
///
/// If the folder already exists and is not empty, it is deleted and recreated if `allow_overwrite`
/// is true, otherwise an error is returned.
///
/// # Returns
///
/// True if the output folder had to be cleared.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite or set overwrite in \
            the settings file to replace it."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// The name of the CSV file for a report table, e.g. `demo_case_results.csv`
fn table_file_name(prefix: &str, table_name: &str) -> String {
    format!("{prefix}_{}.csv", table_name.replace(' ', "_"))
}

/// Write a table to a CSV file
fn write_table_csv(file_path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(ToString::to_string))?;
    }
    writer.flush()?;

    Ok(())
}

/// Write all results for a solved case.
///
/// Creates `<prefix>.xlsx`, with the case inputs and the report tables as sheets,
/// `<prefix>.json`, with the report tables, and one CSV file per report table.
///
/// # Arguments
///
/// * `output_dir` - The folder to write to, which must already exist
/// * `case_file` - The case file which was run
/// * `tables` - The report tables
pub fn write_results(output_dir: &Path, case_file: &CaseFile, tables: &ReportTables) -> Result<()> {
    let prefix = &case_file.config.filename_prefix;

    let workbook_path = output_dir.join(format!("{prefix}.xlsx"));
    write_workbook(&workbook_path, case_file, tables)
        .with_context(|| format!("Could not write {}", workbook_path.display()))?;

    let json_path = output_dir.join(format!("{prefix}.json"));
    fs::write(&json_path, serde_json::to_string_pretty(tables)?)
        .with_context(|| format!("Could not write {}", json_path.display()))?;

    for (name, table) in tables.iter() {
        let file_path = output_dir.join(table_file_name(prefix, name));
        write_table_csv(&file_path, table)
            .with_context(|| format!("Could not write {}", file_path.display()))?;
    }

    write_metadata(output_dir, &case_file.path)?;
    info!("Results written to {}", output_dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::TableValue;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn create_output_directory_new() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results").join("demo");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn create_output_directory_existing_empty() {
        let dir = tempdir().unwrap();
        assert!(!create_output_directory(dir.path(), false).unwrap());
    }

    #[test]
    fn create_output_directory_non_empty() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("old.csv")).unwrap();
        assert!(create_output_directory(dir.path(), false).is_err());

        assert!(create_output_directory(dir.path(), true).unwrap());
        assert!(!dir.path().join("old.csv").exists());
    }

    #[test]
    fn table_csv() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(table_file_name("demo", "case results"));
        let mut table = Table::new(["objective [EUR]", "system cost [EUR/h]"]);
        table.rows.push(vec![TableValue::Number(70.0), TableValue::Number(35.5)]);
        write_table_csv(&file_path, &table).unwrap();

        assert!(file_path.ends_with("demo_case_results.csv"));
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "objective [EUR],system cost [EUR/h]\n70,35.5\n"
        );
    }
}
