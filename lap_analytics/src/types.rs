use serde::{Deserialize, Serialize};
use std::fmt;

// ---------- Inputs ----------

/// One observed lap for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    pub lap_number: u32,
    pub lap_time_ms: i64,
    pub sector_1_time: Option<f64>, // seconds
    pub sector_2_time: Option<f64>,
    pub sector_3_time: Option<f64>,
    #[serde(default = "default_true")]
    pub is_valid: bool, // false on track limits / yellow flags
}

fn default_true() -> bool {
    true
}

impl LapRecord {
    pub fn new(lap_number: u32, lap_time_ms: i64, sectors: [f64; 3]) -> Self {
        Self {
            lap_number,
            lap_time_ms,
            sector_1_time: Some(sectors[0]),
            sector_2_time: Some(sectors[1]),
            sector_3_time: Some(sectors[2]),
            is_valid: true,
        }
    }

    pub fn without_sectors(lap_number: u32, lap_time_ms: i64) -> Self {
        Self {
            lap_number,
            lap_time_ms,
            sector_1_time: None,
            sector_2_time: None,
            sector_3_time: None,
            is_valid: true,
        }
    }

    pub fn invalidated(mut self) -> Self {
        self.is_valid = false;
        self
    }

    /// All three sector times, when each one was captured and is positive.
    pub fn complete_sectors(&self) -> Option<[f64; 3]> {
        let s = [self.sector_1_time?, self.sector_2_time?, self.sector_3_time?];
        s.iter().all(|t| t.is_finite() && *t > 0.0).then_some(s)
    }

    /// Valid, positive lap time and complete sector timing.
    pub fn is_eligible(&self) -> bool {
        self.is_valid && self.lap_time_ms > 0 && self.complete_sectors().is_some()
    }

    pub fn lap_time_seconds(&self) -> f64 {
        self.lap_time_ms as f64 / 1000.0
    }
}

/// Aggregated signal statistics for one lap, as produced by the upstream
/// feature extraction. Means are optional on the wire so that a missing value
/// is rejected instead of being coerced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryFeatureRow {
    pub lap_number: u32,
    pub speed_mean: Option<f64>,
    pub speed_std: Option<f64>,
    pub throttle_mean: Option<f64>,
    pub throttle_std: Option<f64>,
    pub brake_mean: Option<f64>,
    pub brake_std: Option<f64>,
    pub steering_angle_mean: Option<f64>,
    pub steering_angle_std: Option<f64>,
    #[serde(default)]
    pub brake_spike_count: i32,
    #[serde(default)]
    pub throttle_drop_count: i32,
    #[serde(default)]
    pub steering_corrections: i32,
}

impl TelemetryFeatureRow {
    pub fn new(lap_number: u32) -> Self {
        Self {
            lap_number,
            ..Default::default()
        }
    }

    pub fn speed(mut self, mean: f64, std: f64) -> Self {
        self.speed_mean = Some(mean);
        self.speed_std = Some(std);
        self
    }

    pub fn throttle(mut self, mean: f64, std: f64) -> Self {
        self.throttle_mean = Some(mean);
        self.throttle_std = Some(std);
        self
    }

    pub fn brake(mut self, mean: f64, std: f64) -> Self {
        self.brake_mean = Some(mean);
        self.brake_std = Some(std);
        self
    }

    pub fn steering(mut self, mean: f64, std: f64) -> Self {
        self.steering_angle_mean = Some(mean);
        self.steering_angle_std = Some(std);
        self
    }

    pub fn counts(mut self, brake_spikes: i32, throttle_drops: i32, steering_corrections: i32) -> Self {
        self.brake_spike_count = brake_spikes;
        self.throttle_drop_count = throttle_drops;
        self.steering_corrections = steering_corrections;
        self
    }
}

/// Validated mean/std pair for one channel of one lap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: f64,
    pub std: f64,
}

impl ChannelStats {
    /// A channel whose mean is exactly zero carried no drive signal that lap.
    pub fn is_idle(&self) -> bool {
        self.mean == 0.0
    }

    /// `1 - std/|mean|` clamped to [0,1]; 1.0 for an idle channel.
    ///
    /// The magnitude of the mean is used so signed channels (steering angle)
    /// are not pushed below zero by direction alone.
    pub fn smoothness(&self) -> f64 {
        if self.is_idle() {
            return 1.0;
        }
        (1.0 - self.std / self.mean.abs()).clamp(0.0, 1.0)
    }
}

// ---------- Anomaly output ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyCategory {
    Brake,
    Throttle,
    Steering,
    SpeedConsistency,
}

impl AnomalyCategory {
    /// Categories backed by a discrete per-lap event count.
    pub const EVENT_CATEGORIES: [AnomalyCategory; 3] = [
        AnomalyCategory::Brake,
        AnomalyCategory::Throttle,
        AnomalyCategory::Steering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyCategory::Brake => "brake",
            AnomalyCategory::Throttle => "throttle",
            AnomalyCategory::Steering => "steering",
            AnomalyCategory::SpeedConsistency => "speed_consistency",
        }
    }
}

impl fmt::Display for AnomalyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub lap_number: u32,
    pub category: AnomalyCategory,
    pub severity: f64, // 0..=1
    pub count: u32,
    pub reference: u32,
    pub description: String,
    pub recommended_action: String,
}

/// 0-100, higher is worse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub brake: f64,
    pub throttle: f64,
    pub steering: f64,
    pub speed_consistency: f64,
}

impl CategoryScores {
    pub fn get(&self, category: AnomalyCategory) -> f64 {
        match category {
            AnomalyCategory::Brake => self.brake,
            AnomalyCategory::Throttle => self.throttle,
            AnomalyCategory::Steering => self.steering,
            AnomalyCategory::SpeedConsistency => self.speed_consistency,
        }
    }

    pub fn all(&self) -> [f64; 4] {
        [self.brake, self.throttle, self.steering, self.speed_consistency]
    }
}

/// Per-channel smoothness averaged across laps, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothnessMetrics {
    pub speed: f64,
    pub throttle: f64,
    pub brake: f64,
    pub steering: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    /// `1 - std/mean` of per-lap mean speed.
    pub consistency: f64,
    /// `min/max` of per-lap mean speed; 1.0 means no lap was slower.
    pub corner_speed_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub total_anomalies: usize,
    pub severity_avg: f64,
    pub severity_max: f64,
    pub high_severity_count: usize,
    pub categories_affected: Vec<AnomalyCategory>,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub vehicle_id: String,
    pub laps_analyzed: usize,
    pub scores: CategoryScores,
    pub events: Vec<AnomalyEvent>,
    pub smoothness: SmoothnessMetrics,
    pub speed_profile: SpeedProfile,
    pub summary: AnomalySummary,
}

// ---------- Target lap output ----------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorAnalysis {
    pub sector: u8, // 1..=3
    pub best_seconds: f64,
    pub variance: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_lap_count(eligible_laps: usize) -> Self {
        if eligible_laps >= 30 {
            Confidence::High
        } else if eligible_laps >= 15 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiwtlResult {
    pub vehicle_id: String,
    pub siwtl_lap_seconds: f64,
    pub potential_gain_seconds: f64,
    pub achievability_score: f64,
    pub sector_weights: [f64; 3],
    pub sectors: [SectorAnalysis; 3],
    pub consistency_score: f64,
    /// Plain sum of best sectors, for comparison with the weighted target.
    pub theoretical_best_seconds: f64,
    pub current_best_lap_seconds: f64,
    pub average_lap_seconds: f64,
    pub laps_analyzed: usize,
    pub laps_supplied: usize,
    pub confidence: Confidence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_requires_valid_flag_and_all_sectors() {
        let lap = LapRecord::new(1, 105_000, [30.0, 40.0, 35.0]);
        assert!(lap.is_eligible());
        assert!(!lap.clone().invalidated().is_eligible());

        let mut missing = lap.clone();
        missing.sector_2_time = None;
        assert!(!missing.is_eligible());

        let mut zero = lap.clone();
        zero.sector_3_time = Some(0.0);
        assert!(!zero.is_eligible());

        let mut bad_time = lap;
        bad_time.lap_time_ms = 0;
        assert!(!bad_time.is_eligible());
    }

    #[test]
    fn lap_record_defaults_to_valid_on_the_wire() {
        let lap: LapRecord = serde_json::from_str(
            r#"{"lap_number":3,"lap_time_ms":121500,"sector_1_time":40.1,"sector_2_time":null,"sector_3_time":41.0}"#,
        )
        .unwrap();
        assert!(lap.is_valid);
        assert_eq!(lap.sector_2_time, None);
        assert!(!lap.is_eligible());
    }

    #[test]
    fn smoothness_edge_cases() {
        let idle = ChannelStats { mean: 0.0, std: 0.0 };
        assert!(idle.is_idle());
        assert_eq!(idle.smoothness(), 1.0);

        let steady = ChannelStats { mean: 40.0, std: 0.0 };
        assert_eq!(steady.smoothness(), 1.0);

        let noisy = ChannelStats { mean: 10.0, std: 25.0 };
        assert_eq!(noisy.smoothness(), 0.0);

        let left = ChannelStats { mean: -4.0, std: 1.0 };
        assert_eq!(left.smoothness(), 0.75);
    }

    #[test]
    fn category_names_sort_lexically() {
        let mut names: Vec<_> = AnomalyCategory::EVENT_CATEGORIES.iter().map(|c| c.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["brake", "steering", "throttle"]);
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(Confidence::from_lap_count(1), Confidence::Low);
        assert_eq!(Confidence::from_lap_count(15), Confidence::Medium);
        assert_eq!(Confidence::from_lap_count(30), Confidence::High);
    }
}
