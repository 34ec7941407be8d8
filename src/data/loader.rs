//! CSV Data Loader Module
//! Reads the collision export with Polars and turns each geo-complete row
//! into a typed `CollisionRecord`.

use crate::data::record::{CollisionRecord, CollisionTable};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Cannot read data source: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Record {row}: cannot parse timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },
    #[error("Record {row}: invalid value '{value}' in column {column}")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("Row limit must be a positive integer")]
    InvalidRowLimit,
}

const LATITUDE: &str = "latitude";
const LONGITUDE: &str = "longitude";
const CRASH_DATE: &str = "crash_date";
const CRASH_TIME: &str = "crash_time";
const PERSONS_INJURED: &str = "number_of_persons_injured";
const PEDESTRIANS_INJURED: &str = "number_of_pedestrians_injured";
const MOTORISTS_INJURED: &str = "number_of_motorist_injured";
const ON_STREET_NAME: &str = "on_street_name";

/// Columns that must be present after name normalization.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    LATITUDE,
    LONGITUDE,
    CRASH_DATE,
    CRASH_TIME,
    PERSONS_INJURED,
    PEDESTRIANS_INJURED,
    MOTORISTS_INJURED,
    ON_STREET_NAME,
];

/// Accepted spellings of the optional cyclist count column.
const CYCLIST_COLUMNS: [&str; 2] = ["number_of_cyclist_injured", "injured_cyclists"];

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Lowercase a header and replace spaces with underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Parse `"<date> <time>"` using the formats found in collision exports.
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    // Socrata JSON-style dates carry a midnight time we must not keep
    let date = date.trim().split('T').next().unwrap_or_default();
    let joined = format!("{} {}", date, time.trim());

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&joined, fmt).ok())
        .or_else(|| {
            // Date-only cell with a separate time column given as HH:MM:SS.fff
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(date, "%m/%d/%Y"))
                .ok()?;
            let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S%.f").ok()?;
            Some(date.and_time(time))
        })
}

/// Identity of the source file at the time it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl SourceFingerprint {
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Handles CSV loading and cleaning of the collision dataset.
pub struct CollisionLoader;

impl CollisionLoader {
    /// Load at most `row_limit` rows and return the cleaned table.
    pub fn load(path: &Path, row_limit: usize) -> Result<CollisionTable, LoaderError> {
        if row_limit == 0 {
            return Err(LoaderError::InvalidRowLimit);
        }
        // Surface a missing file as an IO error rather than a Polars one
        fs::metadata(path)?;

        let start = Instant::now();

        // Every column is read as text; numbers are parsed per field below
        let mut df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_n_rows(Some(row_limit))
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;
        let rows_read = df.height();

        let normalized: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| normalize_column_name(name))
            .collect();
        df.set_column_names(normalized.iter().map(|s| s.as_str()))?;

        for column in REQUIRED_COLUMNS {
            if !normalized.iter().any(|name| name == column) {
                return Err(LoaderError::MissingColumn(column.to_string()));
            }
        }
        let cyclist_column = CYCLIST_COLUMNS
            .iter()
            .copied()
            .find(|candidate| normalized.iter().any(|name| name == candidate));

        let df = df
            .lazy()
            .filter(col(LATITUDE).is_not_null().and(col(LONGITUDE).is_not_null()))
            .collect()?;

        let records = Self::build_records(&df, cyclist_column)?;

        info!(
            path = %path.display(),
            rows_read,
            rows_kept = records.len(),
            cyclist_counts = cyclist_column.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded collision data"
        );

        Ok(CollisionTable::new(records, cyclist_column.is_some(), row_limit))
    }

    /// Build one record per row, in input order.
    fn build_records(
        df: &DataFrame,
        cyclist_column: Option<&str>,
    ) -> Result<Vec<CollisionRecord>, LoaderError> {
        let latitude = df.column(LATITUDE)?.str()?;
        let longitude = df.column(LONGITUDE)?.str()?;
        let date = df.column(CRASH_DATE)?.str()?;
        let time = df.column(CRASH_TIME)?.str()?;
        let persons = df.column(PERSONS_INJURED)?.str()?;
        let pedestrians = df.column(PEDESTRIANS_INJURED)?.str()?;
        let motorists = df.column(MOTORISTS_INJURED)?.str()?;
        let street = df.column(ON_STREET_NAME)?.str()?;
        let cyclists = match cyclist_column {
            Some(name) => Some(df.column(name)?.str()?),
            None => None,
        };

        let rows: Vec<Option<CollisionRecord>> = (0..df.height())
            .into_par_iter()
            .map(|row| -> Result<Option<CollisionRecord>, LoaderError> {
                let (Some(lat), Some(lon)) = (
                    parse_coordinate(row, LATITUDE, latitude.get(row))?,
                    parse_coordinate(row, LONGITUDE, longitude.get(row))?,
                ) else {
                    return Ok(None);
                };

                let date = date.get(row).unwrap_or_default();
                let time = time.get(row).unwrap_or_default();
                let timestamp =
                    parse_timestamp(date, time).ok_or_else(|| LoaderError::InvalidTimestamp {
                        row,
                        value: format!("{} {}", date, time),
                    })?;

                let injured_cyclists = match cyclists {
                    Some(ca) => Some(
                        parse_count(row, "injured_cyclists", ca.get(row))?.unwrap_or_default(),
                    ),
                    None => None,
                };

                Ok(Some(CollisionRecord {
                    timestamp,
                    latitude: lat,
                    longitude: lon,
                    injured_persons: parse_count(row, "injured_persons", persons.get(row))?,
                    injured_pedestrians: parse_count(
                        row,
                        "injured_pedestrians",
                        pedestrians.get(row),
                    )?
                    .unwrap_or_default(),
                    injured_motorists: parse_count(row, "injured_motorists", motorists.get(row))?
                        .unwrap_or_default(),
                    injured_cyclists,
                    on_street_name: street
                        .get(row)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                }))
            })
            .collect::<Result<_, _>>()?;

        let dropped = rows.iter().filter(|r| r.is_none()).count();
        if dropped > 0 {
            debug!(dropped, "dropped rows with blank or non-finite coordinates");
        }

        Ok(rows.into_iter().flatten().collect())
    }
}

/// Blank cells count as missing; anything else must be a finite number.
fn parse_coordinate(
    row: usize,
    column: &'static str,
    raw: Option<&str>,
) -> Result<Option<f64>, LoaderError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let value: f64 = raw.parse().map_err(|_| LoaderError::InvalidNumber {
        row,
        column,
        value: raw.to_string(),
    })?;
    Ok(value.is_finite().then_some(value))
}

/// Blank counts are `None`; the caller decides whether that means zero.
fn parse_count(
    row: usize,
    column: &'static str,
    raw: Option<&str>,
) -> Result<Option<u32>, LoaderError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(value) = raw.parse::<u32>() {
        return Ok(Some(value));
    }
    // Float-formatted exports write counts as "2.0"
    match raw.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 => {
            Ok(Some(value as u32))
        }
        _ => Err(LoaderError::InvalidNumber {
            row,
            column,
            value: raw.to_string(),
        }),
    }
}

/// Loaded tables keyed by row limit.
///
/// Entries are dropped when the source path changes or the file on disk no
/// longer matches the fingerprint taken when the entries were loaded.
pub struct LoadCache {
    path: PathBuf,
    fingerprint: Option<SourceFingerprint>,
    entries: HashMap<usize, CollisionTable>,
}

impl LoadCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fingerprint: None,
            entries: HashMap::new(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.path
    }

    /// Point the cache at another file, discarding everything loaded so far.
    pub fn set_source(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if path != self.path {
            self.path = path;
            self.invalidate();
        }
    }

    pub fn invalidate(&mut self) {
        if !self.is_empty() {
            info!(entries = self.len(), "invalidating load cache");
        }
        self.entries.clear();
        self.fingerprint = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached table for `row_limit`, if the source is unchanged.
    pub fn get(&mut self, row_limit: usize) -> Option<CollisionTable> {
        self.revalidate();
        let hit = self.entries.get(&row_limit).cloned();
        debug!(row_limit, hit = hit.is_some(), "load cache lookup");
        hit
    }

    /// Read `row_limit` rows together with the fingerprint they were read under.
    ///
    /// Takes no `&self` so it can run on a worker thread.
    pub fn read_source(
        path: &Path,
        row_limit: usize,
    ) -> Result<(SourceFingerprint, CollisionTable), LoaderError> {
        let fingerprint = SourceFingerprint::read(path)?;
        let table = CollisionLoader::load(path, row_limit)?;
        Ok((fingerprint, table))
    }

    /// Store the result of `read_source` and hand the table back.
    pub fn complete_load(
        &mut self,
        row_limit: usize,
        fingerprint: SourceFingerprint,
        table: CollisionTable,
    ) -> CollisionTable {
        if self.fingerprint != Some(fingerprint) {
            self.entries.clear();
            self.fingerprint = Some(fingerprint);
        }
        self.entries.insert(row_limit, table.clone());
        debug!(row_limit, entries = self.len(), "cached collision table");
        table
    }

    /// Blocking lookup-or-read; the app splits this across its load thread.
    #[cfg(test)]
    pub fn get_or_load(&mut self, row_limit: usize) -> Result<CollisionTable, LoaderError> {
        if let Some(table) = self.get(row_limit) {
            return Ok(table);
        }
        let (fingerprint, table) = Self::read_source(&self.path, row_limit)?;
        Ok(self.complete_load(row_limit, fingerprint, table))
    }

    fn revalidate(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let current = SourceFingerprint::read(&self.path).ok();
        if current != self.fingerprint {
            info!(path = %self.path.display(), "data source changed on disk");
            self.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "CRASH DATE,CRASH TIME,BOROUGH,LATITUDE,LONGITUDE,ON STREET NAME,\
NUMBER OF PERSONS INJURED,NUMBER OF PEDESTRIANS INJURED,NUMBER OF CYCLIST INJURED,\
NUMBER OF MOTORIST INJURED";

    fn write_csv(header: &str, rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", header).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn sample_rows() -> Vec<&'static str> {
        vec![
            "09/11/2021,2:39,BROOKLYN,40.667202,-73.8665,WHITESTONE EXPRESSWAY   ,2,0,0,2",
            "03/26/2022,11:45,,,,QUEENSBORO BRIDGE UPPER,1,0,0,1",
            "06/29/2022,6:55,QUEENS,40.75144,,THROGS NECK BRIDGE,0,0,0,0",
            "09/11/2021,9:35,BROOKLYN,40.683304,-73.917274,,0,0,0,0",
            "12/14/2021,8:13,BROOKLYN,40.86816,-73.83148,SARATOGA AVENUE,4,1,1,2",
        ]
    }

    #[test]
    fn normalizes_headers() {
        assert_eq!(normalize_column_name("CRASH DATE"), "crash_date");
        assert_eq!(
            normalize_column_name(" NUMBER OF MOTORIST INJURED "),
            "number_of_motorist_injured"
        );
    }

    #[test]
    fn parses_export_timestamps() {
        let ts = parse_timestamp("09/11/2021", "2:39").unwrap();
        assert_eq!(ts.to_string(), "2021-09-11 02:39:00");
        let ts = parse_timestamp("2021-09-11T00:00:00.000", "14:05").unwrap();
        assert_eq!(ts.to_string(), "2021-09-11 14:05:00");
        let ts = parse_timestamp("2021-09-11", "14:05:30.000").unwrap();
        assert_eq!(ts.to_string(), "2021-09-11 14:05:30");
        assert!(parse_timestamp("yesterday", "noon").is_none());
    }

    #[test]
    fn drops_rows_without_coordinates() {
        let file = write_csv(HEADER, &sample_rows());
        let table = CollisionLoader::load(file.path(), 1000).unwrap();

        assert_eq!(table.len(), 3);
        assert!(table.has_cyclist_counts());
        assert!(table
            .records()
            .iter()
            .all(|r| r.latitude.is_finite() && r.longitude.is_finite()));

        let first = &table.records()[0];
        assert_eq!(first.timestamp.to_string(), "2021-09-11 02:39:00");
        assert_eq!(first.injured_persons, Some(2));
        assert_eq!(first.injured_motorists, 2);
        assert_eq!(first.on_street_name.as_deref(), Some("WHITESTONE EXPRESSWAY"));

        assert_eq!(table.records()[1].on_street_name, None);
        assert_eq!(table.records()[2].injured_cyclists, Some(1));
    }

    #[test]
    fn respects_row_limit() {
        let file = write_csv(HEADER, &sample_rows());
        let table = CollisionLoader::load(file.path(), 2).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.row_limit(), 2);
    }

    #[test]
    fn keeps_every_geo_complete_row() {
        let mut rows = Vec::new();
        for i in 0..1000 {
            if i % 20 == 0 {
                rows.push(format!("01/02/2022,{}:{:02},,,,MAIN STREET,0,0,0,0", i % 24, i % 60));
            } else {
                rows.push(format!(
                    "01/02/2022,{}:{:02},,40.7,-73.9,MAIN STREET,0,0,0,0",
                    i % 24,
                    i % 60
                ));
            }
        }
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let file = write_csv(HEADER, &rows);

        let table = CollisionLoader::load(file.path(), 1000).unwrap();
        assert_eq!(table.len(), 950);
    }

    #[test]
    fn missing_cyclist_column_is_tolerated() {
        let file = write_csv(
            "CRASH DATE,CRASH TIME,LATITUDE,LONGITUDE,ON STREET NAME,NUMBER OF PERSONS INJURED,\
NUMBER OF PEDESTRIANS INJURED,NUMBER OF MOTORIST INJURED",
            &["09/11/2021,2:39,40.66,-73.86,BROADWAY,1,1,0"],
        );
        let table = CollisionLoader::load(file.path(), 10).unwrap();
        assert!(!table.has_cyclist_counts());
        assert_eq!(table.records()[0].injured_cyclists, None);
    }

    #[test]
    fn missing_required_column_fails() {
        let file = write_csv(
            "CRASH DATE,CRASH TIME,LATITUDE,LONGITUDE",
            &["09/11/2021,2:39,40.66,-73.86"],
        );
        let err = CollisionLoader::load(file.path(), 10).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(c) if c == "number_of_persons_injured"));
    }

    #[test]
    fn bad_timestamp_fails_loudly() {
        let file = write_csv(HEADER, &["not a date,2:39,,40.6,-73.8,BROADWAY,0,0,0,0"]);
        let err = CollisionLoader::load(file.path(), 10).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidTimestamp { row: 0, .. }));
    }

    #[test]
    fn rejects_zero_limit_and_missing_file() {
        let file = write_csv(HEADER, &sample_rows());
        assert!(matches!(
            CollisionLoader::load(file.path(), 0),
            Err(LoaderError::InvalidRowLimit)
        ));
        assert!(matches!(
            CollisionLoader::load(Path::new("/nonexistent/collisions.csv"), 10),
            Err(LoaderError::Io(_))
        ));
    }

    #[test]
    fn cache_returns_identical_table_for_same_limit() {
        let file = write_csv(HEADER, &sample_rows());
        let mut cache = LoadCache::new(file.path());

        let first = cache.get_or_load(100).unwrap();
        let second = cache.get_or_load(100).unwrap();
        assert_eq!(first.records(), second.records());
        assert!(std::ptr::eq(first.records(), second.records()));
        assert_eq!(cache.len(), 1);

        cache.get_or_load(2).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn loading_twice_yields_identical_records() {
        let file = write_csv(HEADER, &sample_rows());
        let first = CollisionLoader::load(file.path(), 100).unwrap();
        let second = CollisionLoader::load(file.path(), 100).unwrap();

        assert!(!std::ptr::eq(first.records(), second.records()));
        assert_eq!(first.records(), second.records());
        assert_eq!(first.has_cyclist_counts(), second.has_cyclist_counts());
    }

    #[test]
    fn blank_person_count_stays_unknown() {
        let file = write_csv(
            HEADER,
            &[
                "01/05/2022,7:10,QUEENS,40.7,-73.8,BROADWAY,,,,",
                "01/05/2022,7:20,QUEENS,40.7,-73.8,BROADWAY,2.0,1,,1",
            ],
        );
        let table = CollisionLoader::load(file.path(), 10).unwrap();
        let records = table.records();

        assert_eq!(records[0].injured_persons, None);
        assert_eq!(records[0].injured_pedestrians, 0);
        assert_eq!(records[0].injured_cyclists, Some(0));
        assert_eq!(records[1].injured_persons, Some(2));
    }

    #[test]
    fn completed_background_read_is_served_from_cache() {
        let file = write_csv(HEADER, &sample_rows());
        let mut cache = LoadCache::new(file.path());
        assert!(cache.get(50).is_none());

        let (fingerprint, table) = LoadCache::read_source(cache.source(), 50).unwrap();
        let installed = cache.complete_load(50, fingerprint, table);

        let cached = cache.get(50).unwrap();
        assert!(std::ptr::eq(installed.records(), cached.records()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_invalidates_when_source_changes() {
        let mut file = write_csv(HEADER, &sample_rows());
        let mut cache = LoadCache::new(file.path());
        cache.get_or_load(100).unwrap();
        assert!(cache.get(100).is_some());

        writeln!(file, "01/01/2022,0:01,,40.7,-73.9,BROADWAY,0,0,0,0").unwrap();
        file.flush().unwrap();

        assert!(cache.get(100).is_none());
        assert_eq!(cache.get_or_load(100).unwrap().len(), 4);
    }

    #[test]
    fn switching_source_clears_cache() {
        let file = write_csv(HEADER, &sample_rows());
        let other = write_csv(HEADER, &sample_rows()[..1]);
        let mut cache = LoadCache::new(file.path());
        cache.get_or_load(100).unwrap();

        cache.set_source(other.path());
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_load(100).unwrap().len(), 1);
    }
}
