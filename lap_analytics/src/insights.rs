use serde::{Deserialize, Serialize};

use crate::{
    stats,
    types::{AnomalyReport, SiwtlResult},
};

/// Short rule-based coaching text derived from the two scorers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedInsights {
    pub performance_assessment: String,
    pub primary_focus: String,
    pub recommendations: Vec<String>,
    pub potential_vs_issues: String,
}

// Neutral achievability assumed when no target lap could be computed.
const DEFAULT_ACHIEVABILITY: f64 = 0.5;

pub fn combine_insights(anomalies: Option<&AnomalyReport>, target: Option<&SiwtlResult>) -> CombinedInsights {
    let (anomaly_count, critical_issues) = anomalies
        .map(|a| (a.summary.total_anomalies, a.summary.high_severity_count))
        .unwrap_or((0, 0));
    let (potential_gain, achievability) = target
        .map(|t| (t.potential_gain_seconds, t.achievability_score))
        .unwrap_or((0.0, DEFAULT_ACHIEVABILITY));

    let (assessment, focus) = if critical_issues > 3 {
        ("Critical issues detected", "Fix fundamental driving errors first")
    } else if potential_gain > 10.0 {
        (
            "High improvement potential",
            "Maximize performance gains through consistency",
        )
    } else if anomaly_count > 5 {
        ("Multiple technique issues", "Address technique inconsistencies")
    } else {
        ("Performance optimization phase", "Fine-tune for marginal gains")
    };

    let mut recommendations = Vec::new();
    if critical_issues > 0 {
        recommendations.push("Address critical anomalies detected in telemetry".to_string());
    }
    if potential_gain > 5.0 {
        recommendations.push(format!(
            "Focus on {:.1}s potential gain identified by the target lap",
            potential_gain
        ));
    }
    if achievability < 0.7 {
        recommendations.push("Improve consistency for better achievability scores".to_string());
    }
    if let Some(t) = target {
        if t.potential_gain_seconds > 0.0 {
            recommendations.push(format!(
                "Target lap {} (current best {})",
                stats::format_lap_time(t.siwtl_lap_seconds),
                stats::format_lap_time(t.current_best_lap_seconds)
            ));
        }
    }

    CombinedInsights {
        performance_assessment: assessment.to_string(),
        primary_focus: focus.to_string(),
        recommendations,
        potential_vs_issues: format!(
            "{:.1}s potential with {} issues to address",
            potential_gain, anomaly_count
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ScoringConfig, dptad::score_anomalies, siwtl::estimate_target_lap,
        types::{LapRecord, TelemetryFeatureRow},
    };

    fn spiky_rows(n: u32) -> Vec<TelemetryFeatureRow> {
        (1..=n)
            .map(|lap| {
                TelemetryFeatureRow::new(lap)
                    .speed(120.0, 2.0)
                    .throttle(0.6, 0.1)
                    .brake(0.3, 0.1)
                    .steering(4.0, 1.0)
                    .counts(6, 0, 0)
            })
            .collect()
    }

    #[test]
    fn nothing_to_go_on_is_optimization_phase() {
        let i = combine_insights(None, None);
        assert_eq!(i.performance_assessment, "Performance optimization phase");
        // missing target => neutral 0.5 achievability triggers the consistency hint
        assert_eq!(
            i.recommendations,
            vec!["Improve consistency for better achievability scores".to_string()]
        );
        assert_eq!(i.potential_vs_issues, "0.0s potential with 0 issues to address");
    }

    #[test]
    fn many_high_severity_events_are_critical() {
        let report = score_anomalies("GR86-001", &spiky_rows(4), &ScoringConfig::default()).unwrap();
        assert_eq!(report.summary.high_severity_count, 4);
        let i = combine_insights(Some(&report), None);
        assert_eq!(i.performance_assessment, "Critical issues detected");
        assert_eq!(i.primary_focus, "Fix fundamental driving errors first");
        assert!(i.recommendations[0].starts_with("Address critical anomalies"));
    }

    #[test]
    fn large_gain_is_high_potential() {
        let laps = vec![
            LapRecord::new(1, 118_000, [30.0, 40.0, 35.0]),
            LapRecord::new(2, 119_000, [30.0, 40.0, 35.0]),
        ];
        let target = estimate_target_lap("GR86-002", &laps).unwrap();
        assert!(target.potential_gain_seconds > 10.0);

        let i = combine_insights(None, Some(&target));
        assert_eq!(i.performance_assessment, "High improvement potential");
        assert!(i.recommendations.iter().any(|r| r.starts_with("Focus on 13.0s")));
        assert!(i.recommendations.iter().any(|r| r == "Target lap 1:45.000 (current best 1:58.000)"));
    }
}
