//! Collision Record Module
//! Typed, immutable rows produced by the loader.

use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;

/// A single collision event after cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionRecord {
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    /// `None` when the count cell was blank.
    pub injured_persons: Option<u32>,
    pub injured_pedestrians: u32,
    pub injured_motorists: u32,
    /// `None` when the source has no cyclist injury column.
    pub injured_cyclists: Option<u32>,
    pub on_street_name: Option<String>,
}

impl CollisionRecord {
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Category of injured person tracked by a count column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VictimClass {
    #[default]
    Pedestrians,
    Cyclists,
    Motorists,
}

impl VictimClass {
    pub const ALL: [VictimClass; 3] = [
        VictimClass::Pedestrians,
        VictimClass::Cyclists,
        VictimClass::Motorists,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            VictimClass::Pedestrians => "Pedestrians",
            VictimClass::Cyclists => "Cyclists",
            VictimClass::Motorists => "Motorists",
        }
    }

    /// Injury count of this class for a record.
    pub fn count(&self, record: &CollisionRecord) -> Option<u32> {
        match self {
            VictimClass::Pedestrians => Some(record.injured_pedestrians),
            VictimClass::Cyclists => record.injured_cyclists,
            VictimClass::Motorists => Some(record.injured_motorists),
        }
    }

    /// Column header used by the ranking table.
    pub fn column_name(&self) -> &'static str {
        match self {
            VictimClass::Pedestrians => "injured_pedestrians",
            VictimClass::Cyclists => "injured_cyclists",
            VictimClass::Motorists => "injured_motorists",
        }
    }
}

impl fmt::Display for VictimClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The cleaned dataset, shared read-only between the cache and the views.
#[derive(Debug, Clone)]
pub struct CollisionTable {
    records: Arc<Vec<CollisionRecord>>,
    has_cyclist_counts: bool,
    row_limit: usize,
}

impl CollisionTable {
    pub fn new(records: Vec<CollisionRecord>, has_cyclist_counts: bool, row_limit: usize) -> Self {
        Self {
            records: Arc::new(records),
            has_cyclist_counts,
            row_limit,
        }
    }

    pub fn records(&self) -> &[CollisionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the source carried a cyclist injury column.
    pub fn has_cyclist_counts(&self) -> bool {
        self.has_cyclist_counts
    }

    pub fn row_limit(&self) -> usize {
        self.row_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(cyclists: Option<u32>) -> CollisionRecord {
        CollisionRecord {
            timestamp: NaiveDate::from_ymd_opt(2021, 9, 11)
                .unwrap()
                .and_hms_opt(2, 39, 0)
                .unwrap(),
            latitude: 40.7,
            longitude: -73.9,
            injured_persons: Some(3),
            injured_pedestrians: 1,
            injured_motorists: 2,
            injured_cyclists: cyclists,
            on_street_name: Some("BROADWAY".to_string()),
        }
    }

    #[test]
    fn victim_class_reads_matching_field() {
        let r = record(Some(4));
        assert_eq!(VictimClass::Pedestrians.count(&r), Some(1));
        assert_eq!(VictimClass::Motorists.count(&r), Some(2));
        assert_eq!(VictimClass::Cyclists.count(&r), Some(4));
        assert_eq!(VictimClass::Cyclists.count(&record(None)), None);
    }

    #[test]
    fn table_shares_records_on_clone() {
        let table = CollisionTable::new(vec![record(None)], false, 10);
        let copy = table.clone();
        assert!(std::ptr::eq(table.records(), copy.records()));
        assert_eq!(copy.row_limit(), 10);
        assert!(!copy.has_cyclist_counts());
    }
}
