//! Common routines for reading case files and their supporting input data.
use crate::component::{ComponentRecord, ComponentType};
use crate::costs::{CostTable, load_costs};
use crate::schema::AttributeSchema;
use crate::sheet::{Row, read_grid};
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use itertools::Itertools;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

pub mod case_config;
use case_config::CaseConfig;
pub mod cell;
pub mod resolve;
use resolve::resolve_component_row;
pub mod section;
use section::extract_sections;
pub mod time_series;
pub mod validate;
use validate::validate_header;

/// The maximum number of items to list in an error message
const MAX_ITEMS_IN_MESSAGE: usize = 10;

/// Read a series of type `T`s from a CSV file.
///
/// Returns an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());

    Ok(vec.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Format a list of items, showing at most [`MAX_ITEMS_IN_MESSAGE`] of them
pub fn format_items_with_cap<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    let items = items.into_iter().collect_vec();
    let shown = items.iter().take(MAX_ITEMS_IN_MESSAGE).join(", ");
    if items.len() > MAX_ITEMS_IN_MESSAGE {
        format!(
            "{shown} (and {} more)",
            items.len() - MAX_ITEMS_IN_MESSAGE
        )
    } else {
        shown
    }
}

/// A case file split into its configuration and its (still unresolved) component rows
#[derive(Debug, Clone, PartialEq)]
pub struct CaseFile {
    /// Path to the case file
    pub path: PathBuf,
    /// The parsed case configuration
    pub config: CaseConfig,
    /// Attribute names from the component header row (including `component` and `name`)
    pub header: Vec<String>,
    /// Rows of the component-definition section, without the header row
    pub component_rows: Vec<Row>,
}

/// A fully resolved case, ready for network assembly
#[derive(Debug, Clone)]
pub struct Case {
    /// The parsed case configuration
    pub config: CaseConfig,
    /// Attribute schema, augmented from the component header row
    pub schema: AttributeSchema,
    /// The technology cost database
    pub costs: CostTable,
    /// One record per (non-comment) component row
    pub records: Vec<ComponentRecord>,
}

/// Read a case file and split it into its sections.
///
/// # Arguments
///
/// * `case_path` - Path to the case file (CSV or spreadsheet)
pub fn read_case_file(case_path: &Path) -> Result<CaseFile> {
    let grid = read_grid(case_path)?;
    let sections = extract_sections(&grid).with_context(|| input_err_msg(case_path))?;
    let base_dir = case_path.parent().unwrap_or(Path::new(""));
    let config = CaseConfig::from_rows(sections.case_data, base_dir)
        .with_context(|| input_err_msg(case_path))?;

    let (header_row, component_rows) = sections
        .component_data
        .split_first()
        .with_context(|| format!("{}: component data section is empty", case_path.display()))?;
    let header = read_header(header_row).with_context(|| input_err_msg(case_path))?;

    Ok(CaseFile {
        path: case_path.to_path_buf(),
        config,
        header,
        component_rows: component_rows.to_vec(),
    })
}

/// Read the names in the component header row, checking the first two columns
fn read_header(row: &Row) -> Result<Vec<String>> {
    let header = row.iter().map(|cell| cell.to_string().trim().to_string()).collect_vec();
    ensure!(
        header.first().is_some_and(|s| s.eq_ignore_ascii_case("component"))
            && header.get(1).is_some_and(|s| s.eq_ignore_ascii_case("name")),
        "The component header row must start with the columns 'component' and 'name'"
    );

    Ok(header)
}

/// Resolve every component row of a case file.
///
/// This loads the technology cost database, builds the attribute schema from the header row and
/// resolves and validates each component row in turn.
///
/// # Arguments
///
/// * `case_file` - The case file, as read by [`read_case_file`]
/// * `cost_config_override` - Cost configuration file to use if the case file does not name one
pub fn load_case(case_file: &CaseFile, cost_config_override: Option<&Path>) -> Result<Case> {
    let CaseFile {
        path,
        config,
        header,
        component_rows,
    } = case_file;

    let cost_config_path = config
        .cost_config_path
        .as_deref()
        .or(cost_config_override);
    info!("Loading cost database from {}", config.costs_path.display());
    let costs = load_costs(&config.costs_path, cost_config_path, config.years())?;

    let mut schema = AttributeSchema::builtin()?;
    schema.augment_from_header(header);
    validate_header(header, &schema).with_context(|| input_err_msg(path))?;

    let mut records = Vec::new();
    let mut seen = IndexSet::new();
    for row in component_rows {
        let Some(record) = resolve_component_row(row, header, &schema, &costs)
            .with_context(|| input_err_msg(path))?
        else {
            continue;
        };

        ensure!(
            seen.insert((record.kind, record.name.clone())),
            "Duplicate {} name: {}",
            record.kind,
            record.name
        );
        debug!("Resolved {} {}", record.kind, record.name);
        records.push(record);
    }

    info!(
        "Read {} components ({})",
        records.len(),
        count_by_kind(&records)
    );

    Ok(Case {
        config: config.clone(),
        schema,
        costs,
        records,
    })
}

/// Summarise how many components of each type there are
fn count_by_kind(records: &[ComponentRecord]) -> String {
    ComponentType::ALL
        .iter()
        .filter_map(|kind| {
            let count = records.iter().filter(|r| r.kind == *kind).count();
            (count > 0).then(|| format!("{count} {kind}"))
        })
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::write_demo_case;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    #[test]
    fn read_csv_trims_fields() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.csv");
        {
            let mut file = fs::File::create(&file_path).unwrap();
            writeln!(file, "id,value\n hello ,1\nworld, 2").unwrap();
        }
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".to_string(),
                    value: 1,
                },
                Record {
                    id: "world".to_string(),
                    value: 2,
                }
            ]
        );
    }

    #[test]
    fn read_csv_empty_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.csv");
        fs::write(&file_path, "id,value\n").unwrap();
        assert!(read_csv::<Record>(&file_path).is_err());
    }

    #[test]
    fn format_items_with_cap_truncates() {
        assert_eq!(format_items_with_cap(["a", "b"]), "a, b");
        let items = (0..12).map(|i| i.to_string());
        assert_eq!(
            format_items_with_cap(items),
            "0, 1, 2, 3, 4, 5, 6, 7, 8, 9 (and 2 more)"
        );
    }

    #[test]
    fn read_case_file_splits_sections() {
        let dir = tempdir().unwrap();
        let case_path = write_demo_case(dir.path());

        let case_file = read_case_file(&case_path).unwrap();
        assert_eq!(case_file.config.case_name, "demo");
        assert_eq!(&case_file.header[..2], ["component", "name"]);
        assert_eq!(case_file.component_rows.len(), 4);
    }

    #[test]
    fn load_case_resolves_rows() {
        let dir = tempdir().unwrap();
        let case_path = write_demo_case(dir.path());

        let case = load_case(&read_case_file(&case_path).unwrap(), None).unwrap();
        let names = case.records.iter().map(|r| r.name.as_str()).collect_vec();
        assert_eq!(names, ["electricity", "solar-utility % field", "demand"]);
    }

    #[test]
    fn read_header_bad_columns() {
        let row = vec![
            crate::sheet::Cell::Text("name".into()),
            crate::sheet::Cell::Text("component".into()),
        ];
        assert!(read_header(&row).is_err());
    }
}
