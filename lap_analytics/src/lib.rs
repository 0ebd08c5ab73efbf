//! Lap analytics core: telemetry anomaly scoring (DPTAD) and sector-weighted
//! target lap estimation (SIWTL).
//!
//! Every entry point is a pure function from already-fetched rows to a plain
//! result record. Nothing here touches storage or the network, so calls for
//! different vehicles can run side by side without coordination.

pub mod config;
pub mod dptad;
pub mod error;
pub mod insights;
pub mod siwtl;
pub mod stats;
pub mod types;

pub use config::{CategoryWeights, ConfigError, ScoringConfig};
pub use dptad::score_anomalies;
pub use error::AnalyticsError;
pub use insights::{combine_insights, CombinedInsights};
pub use siwtl::estimate_target_lap;
pub use types::{
    AnomalyCategory, AnomalyEvent, AnomalyReport, AnomalySummary, CategoryScores,
    ChannelStats, Confidence, LapRecord, SectorAnalysis, SiwtlResult, SmoothnessMetrics,
    SpeedProfile, TelemetryFeatureRow,
};
