//! Data Processor Module
//! Derived views over the loaded collision table. Every view reads the
//! table and returns new data; nothing here mutates its input.

use crate::data::record::{CollisionRecord, CollisionTable, GeoPoint, VictimClass};
use crate::stats::{HexBin, HexScale, StatsCalculator};
use chrono::{NaiveDateTime, Timelike};
use thiserror::Error;

/// Number of ranked streets shown for a victim class.
pub const TOP_STREETS: usize = 5;
/// Buckets in the per-minute histogram.
pub const MINUTES_PER_HOUR: usize = 60;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("No collisions recorded between {hour}:00 and {}:00", .hour + 1)]
    EmptySelection { hour: u32 },
    #[error("No data available for {class}")]
    MissingField { class: VictimClass },
}

/// Rows whose timestamp falls in one hour of the day.
#[derive(Debug, Clone, Default)]
pub struct HourSubset {
    pub hour: u32,
    pub records: Vec<CollisionRecord>,
}

impl HourSubset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Input for the density layer.
#[derive(Debug, Clone)]
pub struct HeatmapView {
    pub hour: u32,
    pub center: GeoPoint,
    pub samples: Vec<(NaiveDateTime, f64, f64)>,
    pub bins: Vec<HexBin>,
}

impl HeatmapView {
    /// Earliest and latest sample timestamps.
    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let times = self.samples.iter().map(|(t, _, _)| *t);
        Some((times.clone().min()?, times.max()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteBucket {
    pub minute: u32,
    pub crashes: usize,
}

/// Collision counts for every minute of one hour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteHistogram {
    pub hour: u32,
    pub buckets: Vec<MinuteBucket>,
}

impl MinuteHistogram {
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.crashes).sum()
    }

    pub fn max_count(&self) -> usize {
        self.buckets.iter().map(|b| b.crashes).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreetRanking {
    pub street: String,
    pub injured: u32,
}

/// Builds the dashboard's derived views.
pub struct CollisionViews;

impl CollisionViews {
    /// Coordinates of collisions with at least `threshold` injured persons.
    pub fn threshold_points(table: &CollisionTable, threshold: u32) -> Vec<GeoPoint> {
        table
            .records()
            .iter()
            .filter(|r| r.injured_persons.is_some_and(|n| n >= threshold))
            .map(CollisionRecord::location)
            .filter(GeoPoint::is_finite)
            .collect()
    }

    /// Collisions whose hour of day equals `hour`.
    pub fn hour_subset(records: &[CollisionRecord], hour: u32) -> HourSubset {
        HourSubset {
            hour,
            records: records
                .iter()
                .filter(|r| r.timestamp.hour() == hour)
                .cloned()
                .collect(),
        }
    }

    /// Centre point and density bins for an hour subset.
    pub fn heatmap(subset: &HourSubset, scale: HexScale) -> Result<HeatmapView, ViewError> {
        let latitudes: Vec<f64> = subset.records.iter().map(|r| r.latitude).collect();
        let longitudes: Vec<f64> = subset.records.iter().map(|r| r.longitude).collect();

        let (Some(latitude), Some(longitude)) = (
            StatsCalculator::mean(&latitudes),
            StatsCalculator::mean(&longitudes),
        ) else {
            return Err(ViewError::EmptySelection { hour: subset.hour });
        };
        let center = GeoPoint::new(latitude, longitude);

        let points: Vec<GeoPoint> = subset.records.iter().map(|r| r.location()).collect();

        Ok(HeatmapView {
            hour: subset.hour,
            center,
            samples: subset
                .records
                .iter()
                .map(|r| (r.timestamp, r.latitude, r.longitude))
                .collect(),
            bins: StatsCalculator::hexagon_bins(&points, center, scale),
        })
    }

    /// Per-minute collision counts within `[hour, hour + 1)`.
    pub fn minute_histogram(subset: &HourSubset, hour: u32) -> MinuteHistogram {
        let minutes: Vec<f64> = subset
            .records
            .iter()
            .filter(|r| (hour..hour + 1).contains(&r.timestamp.hour()))
            .map(|r| r.timestamp.minute() as f64)
            .collect();

        let counts = StatsCalculator::histogram(&minutes, MINUTES_PER_HOUR, 0.0, 60.0);

        MinuteHistogram {
            hour,
            buckets: counts
                .into_iter()
                .enumerate()
                .map(|(minute, crashes)| MinuteBucket {
                    minute: minute as u32,
                    crashes,
                })
                .collect(),
        }
    }

    /// The five streets with the most injured people of `class`.
    ///
    /// Ties keep input order.
    pub fn top_streets(
        table: &CollisionTable,
        class: VictimClass,
    ) -> Result<Vec<StreetRanking>, ViewError> {
        if class == VictimClass::Cyclists && !table.has_cyclist_counts() {
            return Err(ViewError::MissingField { class });
        }

        let mut ranked: Vec<StreetRanking> = table
            .records()
            .iter()
            .filter_map(|r| {
                let injured = class.count(r).filter(|&n| n >= 1)?;
                let street = r.on_street_name.clone()?;
                Some(StreetRanking { street, injured })
            })
            .collect();

        ranked.sort_by(|a, b| b.injured.cmp(&a.injured));
        ranked.truncate(TOP_STREETS);
        Ok(ranked)
    }
}

/// Caption for the density map.
pub fn hour_caption(hour: u32) -> String {
    format!("Vehicle collisions between {}:00 and {}:00", hour, hour + 1)
}

/// Caption for the per-minute chart.
pub fn minute_caption(hour: u32) -> String {
    format!(
        "Breakdown by minute between {}:00 and {}:00",
        hour,
        (hour + 1) % 24
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SCALE: HexScale = HexScale {
        radius_m: 200.0,
        elevation_range: (0.0, 1000.0),
        elevation_scale: 4.0,
    };

    fn record(hour: u32, minute: u32, persons: u32, street: Option<&str>) -> CollisionRecord {
        CollisionRecord {
            timestamp: NaiveDate::from_ymd_opt(2022, 3, 4)
                .unwrap()
                .and_hms_opt(hour, minute, 0)
                .unwrap(),
            latitude: 40.6 + hour as f64 * 0.01,
            longitude: -73.9 - minute as f64 * 0.001,
            injured_persons: Some(persons),
            injured_pedestrians: persons / 2,
            injured_motorists: persons % 3,
            injured_cyclists: Some(persons % 2),
            on_street_name: street.map(str::to_string),
        }
    }

    fn sample_table() -> CollisionTable {
        let records = (0..200u32)
            .map(|i| {
                let street = match i % 4 {
                    0 => None,
                    1 => Some("BROADWAY"),
                    2 => Some("ATLANTIC AVENUE"),
                    _ => Some("FLATBUSH AVENUE"),
                };
                record(i % 24, (i * 7) % 60, i % 20, street)
            })
            .collect();
        CollisionTable::new(records, true, 1000)
    }

    #[test]
    fn threshold_view_filters_and_shrinks() {
        let table = sample_table();
        let mut previous = usize::MAX;
        for threshold in 0..=19 {
            let points = CollisionViews::threshold_points(&table, threshold);
            let expected = table
                .records()
                .iter()
                .filter(|r| r.injured_persons.is_some_and(|n| n >= threshold))
                .count();
            assert_eq!(points.len(), expected);
            assert!(points.len() <= previous);
            previous = points.len();
        }
        assert_eq!(CollisionViews::threshold_points(&table, 0).len(), 200);
    }

    #[test]
    fn blank_person_count_is_never_above_a_threshold() {
        let mut blank = record(6, 0, 0, Some("BROADWAY"));
        blank.injured_persons = None;
        let table = CollisionTable::new(vec![blank, record(6, 1, 0, None)], true, 10);

        assert_eq!(CollisionViews::threshold_points(&table, 0).len(), 1);
        assert!(CollisionViews::threshold_points(&table, 1).is_empty());
    }

    #[test]
    fn hour_subset_is_exact() {
        let table = sample_table();
        for hour in 0..24 {
            let subset = CollisionViews::hour_subset(table.records(), hour);
            assert!(!subset.is_empty());
            assert!(subset.records.iter().all(|r| r.timestamp.hour() == hour));
        }
    }

    #[test]
    fn histogram_is_total_and_sums_to_subset() {
        let table = sample_table();
        for hour in 0..24 {
            let subset = CollisionViews::hour_subset(table.records(), hour);
            let histogram = CollisionViews::minute_histogram(&subset, hour);
            assert_eq!(histogram.buckets.len(), 60);
            for (i, bucket) in histogram.buckets.iter().enumerate() {
                assert_eq!(bucket.minute, i as u32);
            }
            assert_eq!(histogram.total(), subset.len());
        }
    }

    #[test]
    fn histogram_for_forty_rows_at_eight() {
        let mut records: Vec<CollisionRecord> =
            (0..40).map(|i| record(8, i % 60, 0, None)).collect();
        records.extend((0..25).map(|i| record(9, i, 0, None)));
        let table = CollisionTable::new(records, true, 1000);

        let subset = CollisionViews::hour_subset(table.records(), 8);
        let histogram = CollisionViews::minute_histogram(&subset, 8);
        assert_eq!(subset.len(), 40);
        assert_eq!(histogram.total(), 40);
        assert_eq!(histogram.buckets[0].crashes, 1);
        assert_eq!(histogram.buckets[59].crashes, 0);
    }

    #[test]
    fn heatmap_center_is_mean_position() {
        let records = vec![record(5, 10, 1, None), record(5, 0, 1, None)];
        let subset = HourSubset { hour: 5, records };
        let view = CollisionViews::heatmap(&subset, SCALE).unwrap();

        assert!((view.center.latitude - 40.65).abs() < 1e-9);
        assert!((view.center.longitude - (-73.905)).abs() < 1e-9);
        assert_eq!(view.samples.len(), 2);
        let (first, last) = view.time_range().unwrap();
        assert_eq!(first.to_string(), "2022-03-04 05:00:00");
        assert_eq!(last.to_string(), "2022-03-04 05:10:00");
        assert_eq!(view.bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn empty_hour_is_reported() {
        let table = CollisionTable::new(vec![record(3, 0, 1, None)], true, 10);
        let subset = CollisionViews::hour_subset(table.records(), 4);
        let err = CollisionViews::heatmap(&subset, SCALE).unwrap_err();
        assert_eq!(err, ViewError::EmptySelection { hour: 4 });
        assert_eq!(
            err.to_string(),
            "No collisions recorded between 4:00 and 5:00"
        );
        assert_eq!(CollisionViews::minute_histogram(&subset, 4).total(), 0);
    }

    #[test]
    fn top_streets_are_bounded_and_sorted() {
        let table = sample_table();
        for class in VictimClass::ALL {
            let ranked = CollisionViews::top_streets(&table, class).unwrap();
            assert!(ranked.len() <= TOP_STREETS);
            assert!(ranked.iter().all(|s| s.injured >= 1));
            assert!(ranked.windows(2).all(|w| w[0].injured >= w[1].injured));
        }
    }

    #[test]
    fn top_street_ties_keep_input_order() {
        let records = vec![
            record(1, 0, 2, Some("FIRST")),
            record(1, 0, 6, Some("SECOND")),
            record(1, 0, 2, Some("THIRD")),
            record(1, 0, 2, None),
            record(1, 0, 2, Some("FOURTH")),
            record(1, 0, 0, Some("NOBODY")),
            record(1, 0, 2, Some("FIFTH")),
            record(1, 0, 2, Some("SIXTH")),
        ];
        let table = CollisionTable::new(records, true, 10);
        let ranked = CollisionViews::top_streets(&table, VictimClass::Pedestrians).unwrap();
        let names: Vec<&str> = ranked.iter().map(|s| s.street.as_str()).collect();
        assert_eq!(names, ["SECOND", "FIRST", "THIRD", "FOURTH", "FIFTH"]);
        assert_eq!(ranked[0].injured, 3);
    }

    #[test]
    fn cyclists_without_column_is_recoverable() {
        let table = CollisionTable::new(vec![record(1, 0, 3, Some("BROADWAY"))], false, 10);
        let err = CollisionViews::top_streets(&table, VictimClass::Cyclists).unwrap_err();
        assert_eq!(err.to_string(), "No data available for Cyclists");
        assert!(CollisionViews::top_streets(&table, VictimClass::Motorists).is_ok());
    }

    #[test]
    fn captions_wrap_at_midnight() {
        assert_eq!(hour_caption(23), "Vehicle collisions between 23:00 and 24:00");
        assert_eq!(minute_caption(23), "Breakdown by minute between 23:00 and 0:00");
    }
}
