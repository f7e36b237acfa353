//! The case configuration, read from the `CASE_DATA` section of a case file.
use crate::sheet::{Cell, Row, cell_at};
use anyhow::{Context, Result, bail, ensure};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use log::debug;
use std::path::{Path, PathBuf};

/// Accepted formats for date-time values written as text
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Keys which must be present in every case file
const REQUIRED_KEYS: [&str; 14] = [
    "numerics_scaling",
    "datetime_start",
    "datetime_end",
    "input_path",
    "output_path",
    "case_name",
    "solver",
    "currency",
    "power_unit",
    "time_unit",
    "logging_level",
    "delta_t",
    "no_time_steps",
    "costs_path",
];

/// Optional keys understood by the program
const OPTIONAL_KEYS: [&str; 2] = ["filename_prefix", "cost_config_path"];

/// Case-level settings for a single run
#[derive(Debug, Clone, PartialEq)]
pub struct CaseConfig {
    /// All key/value pairs as they appear in the case file
    pub entries: IndexMap<String, Cell>,
    /// Factor applied to power and energy inputs before optimisation
    pub numerics_scaling: f64,
    /// First snapshot
    pub datetime_start: NaiveDateTime,
    /// Last snapshot (inclusive)
    pub datetime_end: NaiveDateTime,
    /// Folder containing time series files
    pub input_path: PathBuf,
    /// Folder in which the case's output folder is created
    pub output_path: PathBuf,
    /// Name of the case, used for the output folder
    pub case_name: String,
    /// Prefix for output file names
    pub filename_prefix: String,
    /// Name of the solver to use
    pub solver: String,
    /// Currency unit, used in report column names
    pub currency: String,
    /// Power unit, used in report column names
    pub power_unit: String,
    /// Time unit, used in report column names
    pub time_unit: String,
    /// Log level for the run
    pub logging_level: String,
    /// Keep every `delta_t`-th snapshot. `None` means every snapshot.
    pub delta_t: Option<usize>,
    /// Maximum number of snapshots. `None` means no cap.
    pub no_time_steps: Option<usize>,
    /// Path to the technology cost database
    pub costs_path: PathBuf,
    /// Path to the cost configuration, if not the default one
    pub cost_config_path: Option<PathBuf>,
}

impl CaseConfig {
    /// Build the configuration from the rows of the case data section.
    ///
    /// # Arguments
    ///
    /// * `rows` - Key/value rows
    /// * `base_dir` - Folder against which relative paths are resolved
    pub fn from_rows(rows: &[Row], base_dir: &Path) -> Result<Self> {
        let mut entries = IndexMap::new();
        for row in rows {
            let key = cell_at(row, 0);
            let Cell::Text(key) = key else {
                bail!("Invalid case configuration key: '{key}'");
            };
            let key = key.trim().to_string();
            ensure!(
                entries
                    .insert(key.clone(), cell_at(row, 1).clone())
                    .is_none(),
                "Duplicate case configuration key: {key}"
            );
        }

        for key in entries.keys() {
            if !REQUIRED_KEYS.contains(&key.as_str()) && !OPTIONAL_KEYS.contains(&key.as_str()) {
                debug!("Ignoring unknown case configuration key: {key}");
            }
        }

        let reader = EntryReader {
            entries: &entries,
            base_dir,
        };
        let numerics_scaling = reader.number("numerics_scaling")?;
        ensure!(
            numerics_scaling.is_finite() && numerics_scaling > 0.0,
            "numerics_scaling must be a positive number"
        );
        let datetime_start = reader.datetime("datetime_start")?;
        let datetime_end = reader.datetime("datetime_end")?;
        ensure!(
            datetime_end >= datetime_start,
            "datetime_end ({datetime_end}) is before datetime_start ({datetime_start})"
        );
        let case_name = reader.text("case_name")?;
        let filename_prefix = match reader.optional("filename_prefix") {
            Some(cell) => cell.to_string(),
            None => case_name.clone(),
        };

        let config = Self {
            numerics_scaling,
            datetime_start,
            datetime_end,
            input_path: reader.path("input_path")?,
            output_path: reader.path("output_path")?,
            case_name,
            filename_prefix,
            solver: reader.text("solver")?,
            currency: reader.text("currency")?,
            power_unit: reader.text("power_unit")?,
            time_unit: reader.text("time_unit")?,
            logging_level: reader.text("logging_level")?,
            delta_t: reader.count("delta_t")?,
            no_time_steps: reader.count("no_time_steps")?,
            costs_path: reader.path("costs_path")?,
            cost_config_path: reader
                .optional("cost_config_path")
                .map(|cell| base_dir.join(cell.to_string())),
            entries,
        };

        Ok(config)
    }

    /// The length of the modelled period in years (fractional)
    pub fn years(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let seconds = (self.datetime_end - self.datetime_start).num_seconds() as f64;
        seconds / (365.0 * 24.0 * 3600.0)
    }

    /// The weighting of each snapshot in hours
    pub fn snapshot_weighting(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let stride = self.delta_t.unwrap_or(1) as f64;
        stride
    }

    /// The snapshots for the run.
    ///
    /// These are hourly timestamps from the start to the end of the case (inclusive), keeping
    /// every `delta_t`-th timestamp and capped at `no_time_steps` entries.
    pub fn snapshots(&self) -> Vec<NaiveDateTime> {
        let hours = (self.datetime_end - self.datetime_start).num_hours();
        let cap = self.no_time_steps.unwrap_or(usize::MAX);
        (0..=hours)
            .step_by(self.delta_t.unwrap_or(1))
            .map(|hour| self.datetime_start + Duration::hours(hour))
            .take(cap)
            .collect()
    }
}

/// Typed access to the raw configuration entries
struct EntryReader<'a> {
    entries: &'a IndexMap<String, Cell>,
    base_dir: &'a Path,
}

impl EntryReader<'_> {
    /// Get the value for a required key
    fn get(&self, key: &str) -> Result<&Cell> {
        self.entries
            .get(key)
            .with_context(|| format!("Missing required case configuration key: {key}"))
    }

    /// Get the value for an optional key, treating empty values as absent
    fn optional(&self, key: &str) -> Option<&Cell> {
        self.entries.get(key).filter(|cell| !cell.is_empty())
    }

    fn number(&self, key: &str) -> Result<f64> {
        match self.get(key)? {
            Cell::Number(value) => Ok(*value),
            other => bail!("Case configuration key {key} must be a number (got '{other}')"),
        }
    }

    fn text(&self, key: &str) -> Result<String> {
        let value = self.get(key)?;
        ensure!(
            !value.is_empty(),
            "Case configuration key {key} must have a value"
        );
        Ok(value.to_string())
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.base_dir.join(self.text(key)?))
    }

    /// A non-negative integer, where empty or zero means "not set"
    fn count(&self, key: &str) -> Result<Option<usize>> {
        match self.get(key)? {
            Cell::Empty => Ok(None),
            Cell::Number(value) => {
                ensure!(
                    *value >= 0.0 && value.fract() == 0.0,
                    "Case configuration key {key} must be a non-negative integer"
                );
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let value = *value as usize;
                Ok((value > 0).then_some(value))
            }
            other => bail!("Case configuration key {key} must be an integer (got '{other}')"),
        }
    }

    fn datetime(&self, key: &str) -> Result<NaiveDateTime> {
        match self.get(key)? {
            Cell::DateTime(value) => Ok(*value),
            Cell::Text(value) => parse_datetime(value)
                .with_context(|| format!("Invalid value for case configuration key {key}")),
            other => bail!("Case configuration key {key} must be a date and time (got '{other}')"),
        }
    }
}

/// Parse a date and time, or a date alone (meaning midnight)
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for format in DATETIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(value);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    bail!("Could not parse '{s}' as a date and time")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, case_config_rows};
    use rstest::rstest;

    fn set(rows: &mut [Row], key: &str, value: Cell) {
        let row = rows
            .iter_mut()
            .find(|row| row[0] == Cell::Text(key.into()))
            .unwrap();
        row[1] = value;
    }

    #[test]
    fn from_rows_valid() {
        let config = CaseConfig::from_rows(&case_config_rows(), Path::new("/cases")).unwrap();
        assert_eq!(config.numerics_scaling, 1000.0);
        assert_eq!(config.solver, "highs");
        assert_eq!(config.filename_prefix, "demo");
        assert_eq!(config.input_path, Path::new("/cases/data"));
        assert_eq!(config.delta_t, None);
        assert_eq!(config.no_time_steps, None);
        assert_eq!(config.cost_config_path, None);
    }

    #[test]
    fn from_rows_missing_key() {
        let rows = case_config_rows()
            .into_iter()
            .filter(|row| row[0] != Cell::Text("currency".into()))
            .collect::<Vec<_>>();
        assert_error!(
            CaseConfig::from_rows(&rows, Path::new("")),
            "Missing required case configuration key: currency"
        );
    }

    #[test]
    fn from_rows_duplicate_key() {
        let mut rows = case_config_rows();
        rows.push(vec![Cell::Text("solver".into()), Cell::Text("highs".into())]);
        assert_error!(
            CaseConfig::from_rows(&rows, Path::new("")),
            "Duplicate case configuration key: solver"
        );
    }

    #[test]
    fn from_rows_bad_scaling() {
        let mut rows = case_config_rows();
        set(&mut rows, "numerics_scaling", Cell::Number(0.0));
        assert!(CaseConfig::from_rows(&rows, Path::new("")).is_err());
    }

    #[test]
    fn snapshots_with_stride_and_cap() {
        let mut rows = case_config_rows();
        set(&mut rows, "delta_t", Cell::Number(3.0));
        let config = CaseConfig::from_rows(&rows, Path::new("")).unwrap();
        let snapshots = config.snapshots();

        // 2019-01-01 00:00 to 2019-01-01 23:00 inclusive
        assert_eq!(snapshots.len(), 8);
        assert_eq!(snapshots[1], parse_datetime("2019-01-01 03:00").unwrap());
        assert_eq!(config.snapshot_weighting(), 3.0);

        set(&mut rows, "no_time_steps", Cell::Number(5.0));
        let config = CaseConfig::from_rows(&rows, Path::new("")).unwrap();
        assert_eq!(config.snapshots().len(), 5);
    }

    #[test]
    fn years_is_fractional() {
        let mut rows = case_config_rows();
        set(&mut rows, "datetime_end", Cell::Text("2019-01-01 12:00".into()));
        let config = CaseConfig::from_rows(&rows, Path::new("")).unwrap();
        assert!((config.years() - 0.5 / 365.0).abs() < 1e-12);
    }

    #[rstest]
    #[case("2019-01-01 05:00:00")]
    #[case("2019-01-01 05:00")]
    fn parse_datetime_formats(#[case] s: &str) {
        let expected = NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(5, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime(s).unwrap(), expected);
    }

    #[test]
    fn parse_datetime_date_only() {
        assert_eq!(
            parse_datetime("2020-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 29)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!(parse_datetime("29/02/2020").is_err());
    }
}
