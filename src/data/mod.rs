//! Data module - CSV loading, typed records and derived views

mod loader;
mod processor;
mod record;

pub use loader::{LoadCache, SourceFingerprint};
pub use processor::{
    hour_caption, minute_caption, CollisionViews, HeatmapView, HourSubset, MinuteHistogram,
    StreetRanking, ViewError,
};
pub use record::{CollisionRecord, CollisionTable, GeoPoint, VictimClass};
