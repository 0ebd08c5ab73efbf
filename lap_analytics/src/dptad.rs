//! Telemetry anomaly scoring (DPTAD).
//!
//! Works on one row of aggregated channel statistics per lap. Brake, throttle
//! and steering are scored from the pre-counted per-lap events blended with
//! the channel's smoothness; speed is scored from lap-to-lap consistency of
//! mean speed plus a penalty for the slowest lap.

use crate::{
    config::ScoringConfig,
    error::AnalyticsError,
    stats,
    types::{
        AnomalyCategory, AnomalyEvent, AnomalyReport, AnomalySummary, CategoryScores,
        ChannelStats, SmoothnessMetrics, SpeedProfile, TelemetryFeatureRow,
    },
};

// ---------- Validated lap features ----------

#[derive(Debug, Clone, Copy)]
struct LapFeatures {
    lap_number: u32,
    speed: ChannelStats,
    throttle: ChannelStats,
    brake: ChannelStats,
    steering: ChannelStats,
    brake_spikes: u32,
    throttle_drops: u32,
    steering_corrections: u32,
}

impl LapFeatures {
    fn channel(&self, category: AnomalyCategory) -> ChannelStats {
        match category {
            AnomalyCategory::Brake => self.brake,
            AnomalyCategory::Throttle => self.throttle,
            AnomalyCategory::Steering => self.steering,
            AnomalyCategory::SpeedConsistency => self.speed,
        }
    }

    /// Event count for the category; an idle channel cannot produce events.
    fn event_count(&self, category: AnomalyCategory) -> u32 {
        if self.channel(category).is_idle() {
            return 0;
        }
        match category {
            AnomalyCategory::Brake => self.brake_spikes,
            AnomalyCategory::Throttle => self.throttle_drops,
            AnomalyCategory::Steering => self.steering_corrections,
            AnomalyCategory::SpeedConsistency => 0,
        }
    }
}

fn channel_stats(
    lap_number: u32,
    mean_field: &'static str,
    mean: Option<f64>,
    std_field: &'static str,
    std: Option<f64>,
) -> Result<ChannelStats, AnalyticsError> {
    let mean = match mean {
        None => return Err(AnalyticsError::invalid_row(lap_number, mean_field, "is missing")),
        Some(m) if !m.is_finite() => {
            return Err(AnalyticsError::invalid_row(lap_number, mean_field, "is not a finite number"))
        }
        Some(m) => m,
    };
    let std = match std {
        None => return Err(AnalyticsError::invalid_row(lap_number, std_field, "is missing")),
        Some(s) if !s.is_finite() => {
            return Err(AnalyticsError::invalid_row(lap_number, std_field, "is not a finite number"))
        }
        Some(s) if s < 0.0 => {
            return Err(AnalyticsError::invalid_row(
                lap_number,
                std_field,
                format!("is negative ({})", s),
            ))
        }
        Some(s) => s,
    };
    Ok(ChannelStats { mean, std })
}

fn event_count(lap_number: u32, field: &'static str, count: i32) -> Result<u32, AnalyticsError> {
    u32::try_from(count)
        .map_err(|_| AnalyticsError::invalid_row(lap_number, field, format!("is negative ({})", count)))
}

fn validate_row(row: &TelemetryFeatureRow) -> Result<LapFeatures, AnalyticsError> {
    let lap = row.lap_number;
    Ok(LapFeatures {
        lap_number: lap,
        speed: channel_stats(lap, "speed_mean", row.speed_mean, "speed_std", row.speed_std)?,
        throttle: channel_stats(lap, "throttle_mean", row.throttle_mean, "throttle_std", row.throttle_std)?,
        brake: channel_stats(lap, "brake_mean", row.brake_mean, "brake_std", row.brake_std)?,
        steering: channel_stats(
            lap,
            "steering_angle_mean",
            row.steering_angle_mean,
            "steering_angle_std",
            row.steering_angle_std,
        )?,
        brake_spikes: event_count(lap, "brake_spike_count", row.brake_spike_count)?,
        throttle_drops: event_count(lap, "throttle_drop_count", row.throttle_drop_count)?,
        steering_corrections: event_count(lap, "steering_corrections", row.steering_corrections)?,
    })
}

// ---------- Category scoring ----------

/// Mean smoothness over the laps where the channel was active; 1.0 if it
/// never was.
fn channel_smoothness(laps: &[LapFeatures], category: AnomalyCategory) -> f64 {
    let per_lap: Vec<f64> = laps
        .iter()
        .map(|l| l.channel(category))
        .filter(|c| !c.is_idle())
        .map(|c| c.smoothness())
        .collect();
    stats::mean(&per_lap).map(stats::clamp_unit).unwrap_or(1.0)
}

fn event_intensity(laps: &[LapFeatures], category: AnomalyCategory, reference: u32) -> f64 {
    let per_lap: Vec<f64> = laps
        .iter()
        .map(|l| (l.event_count(category) as f64 / reference as f64).min(1.0))
        .collect();
    stats::mean(&per_lap).unwrap_or(0.0)
}

fn event_category_score(intensity: f64, smoothness: f64, cfg: &ScoringConfig) -> f64 {
    let w = cfg.category_weights;
    let raw = 100.0 * (w.event_intensity * intensity + w.smoothness * (1.0 - smoothness));
    stats::round_to(stats::clamp_percent(raw), 1)
}

fn speed_profile(laps: &[LapFeatures]) -> SpeedProfile {
    let means: Vec<f64> = laps.iter().map(|l| l.speed.mean).collect();

    let consistency = match stats::coefficient_of_variation(&means) {
        Some(cv) => stats::clamp_unit(1.0 - cv),
        None => 1.0,
    };
    let corner_speed_loss = match (stats::min(&means), stats::max(&means)) {
        (Some(lo), Some(hi)) if hi > 0.0 => stats::clamp_unit(lo / hi),
        _ => 1.0,
    };

    SpeedProfile {
        consistency,
        corner_speed_loss,
    }
}

fn speed_score(profile: &SpeedProfile, cfg: &ScoringConfig) -> f64 {
    let raw = 100.0 * (1.0 - profile.consistency)
        + 100.0 * (1.0 - profile.corner_speed_loss) * cfg.corner_speed_loss_weight;
    stats::round_to(stats::clamp_percent(raw), 1)
}

// ---------- Events ----------

fn describe(category: AnomalyCategory, lap_number: u32, count: u32, reference: u32) -> String {
    let what = match category {
        AnomalyCategory::Brake => "brake spikes",
        AnomalyCategory::Throttle => "throttle drops",
        AnomalyCategory::Steering => "steering corrections",
        AnomalyCategory::SpeedConsistency => "speed deviations",
    };
    format!(
        "Lap {}: {} {} (reference {} per lap)",
        lap_number, count, what, reference
    )
}

fn recommended_action(category: AnomalyCategory) -> &'static str {
    match category {
        AnomalyCategory::Brake => "Focus on smoother brake application. Avoid sudden brake spikes.",
        AnomalyCategory::Throttle => {
            "Work on progressive throttle control. Eliminate stabs and hesitation."
        }
        AnomalyCategory::Steering => {
            "Reduce steering corrections. Focus on smooth, deliberate inputs."
        }
        AnomalyCategory::SpeedConsistency => {
            "Assess tire degradation and grip levels. Adjust driving style."
        }
    }
}

fn detect_events(laps: &[LapFeatures], reference: u32) -> Vec<AnomalyEvent> {
    let mut events = Vec::new();
    for lap in laps {
        for category in AnomalyCategory::EVENT_CATEGORIES {
            let count = lap.event_count(category);
            if count > reference {
                events.push(AnomalyEvent {
                    lap_number: lap.lap_number,
                    category,
                    severity: (count as f64 / reference as f64).min(1.0),
                    count,
                    reference,
                    description: describe(category, lap.lap_number, count, reference),
                    recommended_action: recommended_action(category).to_string(),
                });
            }
        }
    }
    // lap ascending, then category name
    events.sort_by(|a, b| {
        a.lap_number
            .cmp(&b.lap_number)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });
    events
}

// ---------- Summary ----------

fn summarize(events: &[AnomalyEvent], scores: &CategoryScores, cfg: &ScoringConfig) -> AnomalySummary {
    if events.is_empty() {
        return AnomalySummary {
            total_anomalies: 0,
            severity_avg: 0.0,
            severity_max: 0.0,
            high_severity_count: 0,
            categories_affected: Vec::new(),
            recommendation: "No anomalies detected. Performance is consistent.".to_string(),
        };
    }

    let severities: Vec<f64> = events.iter().map(|e| e.severity).collect();

    let mut categories_affected: Vec<AnomalyCategory> = events.iter().map(|e| e.category).collect();
    categories_affected.sort_by_key(|c| c.as_str());
    categories_affected.dedup();

    // most events wins; ties resolved by name since the list is name-sorted
    let mut dominant = categories_affected[0];
    let mut dominant_count = 0;
    for c in &categories_affected {
        let n = events.iter().filter(|e| e.category == *c).count();
        if n > dominant_count {
            dominant = *c;
            dominant_count = n;
        }
    }

    let score = scores.get(dominant);
    let recommendation = if score > 70.0 {
        format!(
            "Critical: Focus immediately on {} technique. Repeated {} anomalies detected.",
            dominant, dominant
        )
    } else if score > 40.0 {
        format!(
            "Important: Improve {} consistency. Driver technique issues identified.",
            dominant
        )
    } else {
        format!("Minor technique adjustments needed in {} control.", dominant)
    };

    AnomalySummary {
        total_anomalies: events.len(),
        severity_avg: stats::mean(&severities).unwrap_or(0.0),
        severity_max: stats::max(&severities).unwrap_or(0.0),
        high_severity_count: severities
            .iter()
            .filter(|s| **s >= cfg.high_severity_threshold)
            .count(),
        categories_affected,
        recommendation,
    }
}

// ---------- Entry point ----------

/// Scores one vehicle's per-lap telemetry features.
pub fn score_anomalies(
    vehicle_id: &str,
    rows: &[TelemetryFeatureRow],
    cfg: &ScoringConfig,
) -> Result<AnomalyReport, AnalyticsError> {
    if rows.is_empty() {
        return Err(AnalyticsError::InsufficientData {
            context: "telemetry feature rows",
        });
    }

    let laps = rows
        .iter()
        .map(validate_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            tracing::warn!("vehicle={} rejected telemetry row: {}", vehicle_id, e);
            e
        })?;

    let reference = cfg.event_reference_count.max(1);

    let mut event_scores = [0.0; 3];
    for (slot, category) in event_scores.iter_mut().zip(AnomalyCategory::EVENT_CATEGORIES) {
        let intensity = event_intensity(&laps, category, reference);
        let smoothness = channel_smoothness(&laps, category);
        *slot = event_category_score(intensity, smoothness, cfg);
        tracing::debug!(
            "vehicle={} category={} intensity={:.3} smoothness={:.3} score={:.1}",
            vehicle_id, category, intensity, smoothness, *slot
        );
    }

    let profile = speed_profile(&laps);
    let scores = CategoryScores {
        brake: event_scores[0],
        throttle: event_scores[1],
        steering: event_scores[2],
        speed_consistency: speed_score(&profile, cfg),
    };

    let smoothness = SmoothnessMetrics {
        speed: channel_smoothness(&laps, AnomalyCategory::SpeedConsistency),
        throttle: channel_smoothness(&laps, AnomalyCategory::Throttle),
        brake: channel_smoothness(&laps, AnomalyCategory::Brake),
        steering: channel_smoothness(&laps, AnomalyCategory::Steering),
    };

    let events = detect_events(&laps, reference);
    let summary = summarize(&events, &scores, cfg);

    tracing::info!(
        "dptad vehicle={} laps={} events={} scores=[brake={:.1} throttle={:.1} steering={:.1} speed={:.1}]",
        vehicle_id,
        laps.len(),
        events.len(),
        scores.brake,
        scores.throttle,
        scores.steering,
        scores.speed_consistency
    );

    Ok(AnomalyReport {
        vehicle_id: vehicle_id.to_string(),
        laps_analyzed: laps.len(),
        scores,
        events,
        smoothness,
        speed_profile: profile,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryWeights;

    fn steady_row(lap: u32) -> TelemetryFeatureRow {
        TelemetryFeatureRow::new(lap)
            .speed(120.0, 0.0)
            .throttle(0.7, 0.0)
            .brake(0.3, 0.0)
            .steering(5.0, 0.0)
    }

    #[test]
    fn empty_input_is_insufficient_data() {
        let err = score_anomalies("GR86-001", &[], &ScoringConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData { .. }));
    }

    #[test]
    fn saturated_brake_count_contributes_sixty_points() {
        let row = steady_row(1).counts(9, 0, 0);
        let report = score_anomalies("GR86-001", &[row], &ScoringConfig::default()).unwrap();

        // intensity capped at 1.0, zero std => smoothness term contributes nothing
        assert_eq!(report.scores.brake, 60.0);
        assert_eq!(report.scores.throttle, 0.0);
        assert_eq!(report.scores.steering, 0.0);
        assert_eq!(report.scores.speed_consistency, 0.0);

        assert_eq!(report.events.len(), 1);
        let e = &report.events[0];
        assert_eq!(e.category, AnomalyCategory::Brake);
        assert_eq!(e.count, 9);
        assert_eq!(e.severity, 1.0);
        assert_eq!(e.description, "Lap 1: 9 brake spikes (reference 3 per lap)");
    }

    #[test]
    fn zero_std_means_perfect_smoothness() {
        let rows: Vec<_> = (1..=4).map(steady_row).collect();
        let report = score_anomalies("GR86-002", &rows, &ScoringConfig::default()).unwrap();
        assert_eq!(report.smoothness.brake, 1.0);
        assert_eq!(report.smoothness.throttle, 1.0);
        assert_eq!(report.smoothness.steering, 1.0);
        assert_eq!(report.smoothness.speed, 1.0);
        assert!(report.events.is_empty());
        assert_eq!(
            report.summary.recommendation,
            "No anomalies detected. Performance is consistent."
        );
    }

    #[test]
    fn smoothness_term_scales_with_noise() {
        // 1 - 0.15/0.3 = 0.5 smoothness, no events => 0.4 * 0.5 * 100
        let row = TelemetryFeatureRow::new(1)
            .speed(120.0, 3.0)
            .throttle(0.7, 0.0)
            .brake(0.3, 0.15)
            .steering(5.0, 0.0);
        let report = score_anomalies("GR86-003", &[row], &ScoringConfig::default()).unwrap();
        assert_eq!(report.smoothness.brake, 0.5);
        assert_eq!(report.scores.brake, 20.0);
    }

    #[test]
    fn idle_channel_is_excluded_from_smoothness_and_cannot_spike() {
        let idle = TelemetryFeatureRow::new(1)
            .speed(120.0, 0.0)
            .throttle(0.7, 0.0)
            .brake(0.0, 0.4)
            .steering(5.0, 0.0)
            .counts(7, 0, 0);
        let active = TelemetryFeatureRow::new(2)
            .speed(120.0, 0.0)
            .throttle(0.7, 0.0)
            .brake(0.4, 0.1)
            .steering(5.0, 0.0);

        let report = score_anomalies("GR86-004", &[idle, active], &ScoringConfig::default()).unwrap();
        assert_eq!(report.smoothness.brake, 0.75);
        assert!(report.events.is_empty());
        // intensity 0, smoothness 0.75 => 0.4 * 0.25 * 100
        assert_eq!(report.scores.brake, 10.0);
    }

    #[test]
    fn events_are_ordered_by_lap_then_category_name() {
        let rows = vec![
            steady_row(2).counts(4, 5, 0),
            steady_row(1).counts(0, 0, 6),
            steady_row(3).counts(0, 9, 8),
        ];
        let report = score_anomalies("GR86-005", &rows, &ScoringConfig::default()).unwrap();
        let order: Vec<(u32, &str)> = report
            .events
            .iter()
            .map(|e| (e.lap_number, e.category.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, "steering"),
                (2, "brake"),
                (2, "throttle"),
                (3, "steering"),
                (3, "throttle"),
            ]
        );
        assert_eq!(report.summary.total_anomalies, 5);
        assert_eq!(report.summary.high_severity_count, 5);
        assert_eq!(
            report.summary.categories_affected,
            vec![
                AnomalyCategory::Brake,
                AnomalyCategory::Steering,
                AnomalyCategory::Throttle
            ]
        );
    }

    #[test]
    fn count_at_reference_is_not_an_event() {
        let report =
            score_anomalies("GR86-006", &[steady_row(1).counts(3, 3, 3)], &ScoringConfig::default())
                .unwrap();
        assert!(report.events.is_empty());
        assert_eq!(report.scores.brake, 60.0);
    }

    #[test]
    fn speed_consistency_combines_spread_and_slowest_lap() {
        let rows = vec![
            steady_row(1).speed(90.0, 0.0),
            steady_row(2).speed(110.0, 0.0),
        ];
        let report = score_anomalies("GR86-007", &rows, &ScoringConfig::default()).unwrap();
        assert!((report.speed_profile.consistency - 0.9).abs() < 1e-12);
        assert!((report.speed_profile.corner_speed_loss - 90.0 / 110.0).abs() < 1e-12);
        // 10 + 100 * (1 - 0.8181..) * 0.3 = 15.45..
        assert_eq!(report.scores.speed_consistency, 15.5);
    }

    #[test]
    fn huge_speed_means_still_score_finitely() {
        let rows = vec![
            steady_row(1).speed(1e308, 0.0),
            steady_row(2).speed(1.5e308, 0.0),
        ];
        let report = score_anomalies("GR86-012", &rows, &ScoringConfig::default()).unwrap();
        assert!((report.speed_profile.consistency - 0.8).abs() < 1e-12);
        assert!((report.speed_profile.corner_speed_loss - 2.0 / 3.0).abs() < 1e-12);
        // 20 + 100 * (1/3) * 0.3
        assert_eq!(report.scores.speed_consistency, 30.0);
        for score in report.scores.all() {
            assert!(score.is_finite());
        }
    }

    #[test]
    fn negative_std_is_rejected_with_field_detail() {
        let bad = steady_row(4).brake(0.3, -0.1);
        let err = score_anomalies("GR86-008", &[steady_row(3), bad], &ScoringConfig::default())
            .unwrap_err();
        match err {
            AnalyticsError::InvalidFeatureRow { lap_number, field, .. } => {
                assert_eq!(lap_number, 4);
                assert_eq!(field, "brake_std");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_or_nan_mean_is_rejected() {
        let mut missing = steady_row(1);
        missing.throttle_mean = None;
        let err = score_anomalies("GR86-009", &[missing], &ScoringConfig::default()).unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::invalid_row(1, "throttle_mean", "is missing")
        );

        let nan = steady_row(2).speed(f64::NAN, 1.0);
        let err = score_anomalies("GR86-009", &[nan], &ScoringConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InvalidFeatureRow { field: "speed_mean", .. }
        ));
    }

    #[test]
    fn negative_count_is_rejected() {
        let row = steady_row(5).counts(0, -2, 0);
        let err = score_anomalies("GR86-010", &[row], &ScoringConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InvalidFeatureRow { lap_number: 5, field: "throttle_drop_count", .. }
        ));
    }

    #[test]
    fn weights_and_reference_come_from_config() {
        let cfg = ScoringConfig {
            event_reference_count: 10,
            category_weights: CategoryWeights {
                event_intensity: 1.0,
                smoothness: 0.0,
            },
            ..ScoringConfig::default()
        };
        let report = score_anomalies("GR86-011", &[steady_row(1).counts(5, 0, 0)], &cfg).unwrap();
        assert_eq!(report.scores.brake, 50.0);
        assert!(report.events.is_empty());
    }
}
