use lap_analytics::{AnomalyReport, CombinedInsights, LapRecord, SiwtlResult, TelemetryFeatureRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct DptadRequest {
    pub rows: Vec<TelemetryFeatureRow>,
}

#[derive(Debug, Deserialize)]
pub struct SiwtlRequest {
    pub laps: Vec<LapRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ComprehensiveRequest {
    #[serde(default)]
    pub rows: Vec<TelemetryFeatureRow>, // may be empty when no telemetry was captured
    pub laps: Vec<LapRecord>,
}

#[derive(Debug, Serialize)]
pub struct ComprehensiveOut {
    pub vehicle_id: String,
    pub dptad: Option<AnomalyReport>,
    pub siwtl: Option<SiwtlResult>,
    pub combined_insights: CombinedInsights,
    pub algorithms_used: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct FleetRequest {
    pub vehicles: BTreeMap<String, Vec<LapRecord>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FleetEntry {
    Ok(SiwtlResult),
    Failed { error: String, kind: &'static str },
}

#[derive(Debug, Serialize)]
pub struct FleetOut {
    pub vehicles: BTreeMap<String, FleetEntry>,
}
