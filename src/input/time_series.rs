//! Reading time series files.
//!
//! A time series file is a CSV file. Any preamble ends with a row whose first cell is
//! `BEGIN_DATA`; the row after it holds the column names. Timestamps are given either by `day`,
//! `month`, `year` and `hour` columns (with hours numbered 1 to 24) or by a single `snapshot`,
//! `date` or `datetime` column. The values are in the `value` column or, if there is none, the
//! first other column.
use super::case_config::parse_datetime;
use super::input_err_msg;
use anyhow::{Context, Result, bail, ensure};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use std::path::Path;

/// Marks the end of the preamble
const BEGIN_DATA: &str = "begin_data";

/// Columns which together give a timestamp
const DATE_PART_COLUMNS: [&str; 4] = ["day", "month", "year", "hour"];

/// Alternative names for a single timestamp column
const DATETIME_COLUMNS: [&str; 3] = ["snapshot", "date", "datetime"];

/// Preferred name of the value column
const VALUE_COLUMN: &str = "value";

/// Values indexed by timestamp, in time order
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create a time series from (timestamp, value) pairs, which may be in any order.
    ///
    /// Timestamps must be unique.
    pub fn new(points: impl IntoIterator<Item = (NaiveDateTime, f64)>) -> Result<Self> {
        let points = points
            .into_iter()
            .sorted_by_key(|(timestamp, _)| *timestamp)
            .collect_vec();
        if let Some(((timestamp, _), _)) = points
            .iter()
            .tuple_windows()
            .find(|((a, _), (b, _))| a == b)
        {
            bail!("Duplicate timestamp {timestamp}");
        }

        let (timestamps, values) = points.into_iter().unzip();
        Ok(Self { timestamps, values })
    }

    /// The number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The values, in time order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The mean value
    pub fn mean(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let len = self.values.len() as f64;
        self.values.iter().sum::<f64>() / len
    }

    /// The part of the series between `start` and `end` (inclusive).
    ///
    /// Both `start` and `end` must be timestamps of the series.
    pub fn slice(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        let first = self
            .timestamps
            .binary_search(&start)
            .ok()
            .with_context(|| format!("Time series does not contain start time {start}"))?;
        let last = self
            .timestamps
            .binary_search(&end)
            .ok()
            .with_context(|| format!("Time series does not contain end time {end}"))?;
        ensure!(first <= last, "Time series window is empty");

        Ok(Self {
            timestamps: self.timestamps[first..=last].to_vec(),
            values: self.values[first..=last].to_vec(),
        })
    }

    /// Rescale the series so that its mean equals `target_mean`
    pub fn normalise(&mut self, target_mean: f64) -> Result<()> {
        let mean = self.mean();
        ensure!(
            mean.is_finite() && mean != 0.0,
            "Cannot normalise a time series with mean {mean}"
        );
        self.scale(target_mean / mean);

        Ok(())
    }

    /// Multiply every value by `factor`
    pub fn scale(&mut self, factor: f64) {
        for value in &mut self.values {
            *value *= factor;
        }
    }

    /// The values at the given snapshots.
    ///
    /// Every snapshot must be a timestamp of the series.
    pub fn align(&self, snapshots: &[NaiveDateTime]) -> Result<Vec<f64>> {
        snapshots
            .iter()
            .map(|snapshot| {
                let idx = self
                    .timestamps
                    .binary_search(snapshot)
                    .ok()
                    .with_context(|| format!("Time series has no value for {snapshot}"))?;
                Ok(self.values[idx])
            })
            .collect()
    }
}

/// Load a time series and cut it to the window `[window_start, window_end]`.
///
/// The series must contain both ends of the window.
pub fn load_time_series(
    file_path: &Path,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Result<TimeSeries> {
    read_time_series(file_path)?
        .slice(window_start, window_end)
        .with_context(|| input_err_msg(file_path))
}

/// Read a whole time series file
pub fn read_time_series(file_path: &Path) -> Result<TimeSeries> {
    let rows = read_rows(file_path).with_context(|| input_err_msg(file_path))?;
    let series = parse_rows(&rows).with_context(|| input_err_msg(file_path))?;
    ensure!(
        !series.is_empty(),
        "Time series file {} contains no data",
        file_path.display()
    );

    Ok(series)
}

fn read_rows(file_path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(file_path)?;

    reader
        .records()
        .map(|record| -> Result<Vec<String>> {
            Ok(record?.iter().map(ToString::to_string).collect())
        })
        .collect()
}

/// How timestamps are given in a file
enum TimestampColumns {
    /// Indexes of the day, month, year and hour columns
    Parts([usize; 4]),
    /// Index of a single date-time column
    Single(usize),
}

fn parse_rows(rows: &[Vec<String>]) -> Result<TimeSeries> {
    let header_idx = rows
        .iter()
        .position(|row| {
            row.first().is_some_and(|cell| {
                cell.trim_start_matches('\u{feff}')
                    .eq_ignore_ascii_case(BEGIN_DATA)
            })
        })
        .map_or(0, |idx| idx + 1);
    let header = rows
        .get(header_idx)
        .context("Missing header row")?
        .iter()
        .map(|name| name.to_lowercase())
        .collect_vec();
    let column = |name: &str| header.iter().position(|col| col == name);

    let timestamp_columns = if let Some(parts) = DATE_PART_COLUMNS
        .iter()
        .map(|name| column(name))
        .collect::<Option<Vec<_>>>()
    {
        TimestampColumns::Parts([parts[0], parts[1], parts[2], parts[3]])
    } else if let Some(idx) = DATETIME_COLUMNS.iter().find_map(|name| column(name)) {
        TimestampColumns::Single(idx)
    } else {
        bail!(
            "Time series needs either {} columns or a {} column",
            DATE_PART_COLUMNS.join("/"),
            DATETIME_COLUMNS.join("/")
        );
    };

    let value_idx = column(VALUE_COLUMN)
        .or_else(|| {
            header.iter().position(|name| {
                !DATE_PART_COLUMNS.contains(&name.as_str())
                    && !DATETIME_COLUMNS.contains(&name.as_str())
            })
        })
        .context("Time series has no value column")?;

    let mut points = Vec::new();
    for (row_idx, row) in rows.iter().enumerate().skip(header_idx + 1) {
        if row.iter().all(String::is_empty) {
            continue;
        }

        let point = parse_point(row, &timestamp_columns, value_idx)
            .with_context(|| format!("Invalid time series data on line {}", row_idx + 1))?;
        points.push(point);
    }

    TimeSeries::new(points)
}

fn parse_point(
    row: &[String],
    columns: &TimestampColumns,
    value_idx: usize,
) -> Result<(NaiveDateTime, f64)> {
    let get = |idx: usize| row.get(idx).map_or("", String::as_str);
    let timestamp = match columns {
        TimestampColumns::Parts([day, month, year, hour]) => timestamp_from_parts(
            get(*day).parse()?,
            get(*month).parse()?,
            get(*year).parse()?,
            get(*hour).parse()?,
        )?,
        TimestampColumns::Single(idx) => parse_datetime(get(*idx))?,
    };
    let value = get(value_idx)
        .parse()
        .with_context(|| format!("Invalid value '{}'", get(value_idx)))?;

    Ok((timestamp, value))
}

/// The timestamp for the given hour (1 to 24) of a day.
///
/// Hour 24 is midnight at the start of the following day.
pub fn timestamp_from_parts(day: u32, month: u32, year: i32, hour: u32) -> Result<NaiveDateTime> {
    ensure!((1..=24).contains(&hour), "Hour must be between 1 and 24 (got {hour})");
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("Invalid date {year}-{month}-{day}"))?;

    Ok(date.and_time(chrono::NaiveTime::MIN) + Duration::hours(i64::from(hour)))
}
