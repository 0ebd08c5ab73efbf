//! Sector-weighted target lap estimation (SIWTL).
//!
//! Each sector's best observed time is trusted in proportion to how
//! repeatable that sector is: `weight = 1 / (1 + variance)`. The weights are
//! rescaled to average 1 before they multiply the best sectors, so equal
//! weights reproduce the plain sum of best sectors. The weighted figure is
//! capped at that sum: weighting may pull the target below the best-sector
//! lap but never above it.

use crate::{
    error::AnalyticsError,
    stats,
    types::{Confidence, LapRecord, SectorAnalysis, SiwtlResult},
};

const SECTORS: usize = 3;

fn sector_analysis(eligible: &[[f64; SECTORS]]) -> [SectorAnalysis; SECTORS] {
    std::array::from_fn(|i| {
        let times: Vec<f64> = eligible.iter().map(|s| s[i]).collect();
        // population variance: one lap is a legitimate zero-variance sample
        let variance = stats::population_variance(&times).unwrap_or(0.0);
        SectorAnalysis {
            sector: (i + 1) as u8,
            best_seconds: stats::min(&times).unwrap_or(0.0),
            variance,
            weight: sector_weight(variance),
        }
    })
}

/// `1 / (1 + variance)`, floored so an overflowing variance still leaves a
/// positive weight.
fn sector_weight(variance: f64) -> f64 {
    (1.0 / (1.0 + variance)).max(f64::MIN_POSITIVE)
}

fn weighted_target(sectors: &[SectorAnalysis; SECTORS]) -> f64 {
    let total_weight: f64 = sectors.iter().map(|s| s.weight).sum();
    sectors
        .iter()
        .map(|s| s.best_seconds * (s.weight / total_weight * SECTORS as f64))
        .sum()
}

/// Geometric mean of the weights, taken in log space so tiny weights do not
/// underflow the product to zero.
fn achievability(sectors: &[SectorAnalysis; SECTORS]) -> f64 {
    let log_mean = sectors.iter().map(|s| s.weight.ln()).sum::<f64>() / SECTORS as f64;
    stats::clamp_unit(log_mean.exp())
}

/// `100 * (1 - cv)` with the sample std; 100 for a single lap.
fn consistency_score(lap_times: &[f64]) -> f64 {
    match (stats::sample_std_dev(lap_times), stats::mean(lap_times)) {
        (Some(sd), Some(m)) if m > 0.0 => 100.0 * (1.0 - sd / m).max(0.0),
        _ => 100.0,
    }
}

/// Computes the weighted target lap for one vehicle's laps.
pub fn estimate_target_lap(vehicle_id: &str, laps: &[LapRecord]) -> Result<SiwtlResult, AnalyticsError> {
    if laps.is_empty() {
        return Err(AnalyticsError::InsufficientData { context: "lap records" });
    }

    let eligible: Vec<&LapRecord> = laps.iter().filter(|l| l.is_eligible()).collect();
    if eligible.is_empty() {
        tracing::warn!(
            "siwtl vehicle={} has {} laps but none valid with complete sectors",
            vehicle_id,
            laps.len()
        );
        return Err(AnalyticsError::NoValidLaps { total_laps: laps.len() });
    }
    if eligible.len() < laps.len() {
        tracing::debug!(
            "siwtl vehicle={} skipping {} ineligible laps",
            vehicle_id,
            laps.len() - eligible.len()
        );
    }

    let sector_times: Vec<[f64; SECTORS]> = eligible
        .iter()
        .filter_map(|l| l.complete_sectors())
        .collect();
    let lap_times: Vec<f64> = eligible.iter().map(|l| l.lap_time_seconds()).collect();

    let sectors = sector_analysis(&sector_times);
    for s in &sectors {
        tracing::debug!(
            "siwtl vehicle={} sector={} best={:.3} var={:.4} weight={:.4}",
            vehicle_id, s.sector, s.best_seconds, s.variance, s.weight
        );
    }

    let theoretical_best: f64 = sectors.iter().map(|s| s.best_seconds).sum();
    let siwtl_lap = weighted_target(&sectors).min(theoretical_best);
    if !siwtl_lap.is_finite() || !theoretical_best.is_finite() {
        tracing::warn!("siwtl vehicle={} sector sums overflow", vehicle_id);
        return Err(AnalyticsError::NumericOverflow {
            context: "sum of best sector times",
        });
    }
    let current_best = stats::min(&lap_times).unwrap_or(0.0);
    let potential_gain = (current_best - siwtl_lap).max(0.0);

    let result = SiwtlResult {
        vehicle_id: vehicle_id.to_string(),
        siwtl_lap_seconds: siwtl_lap,
        potential_gain_seconds: potential_gain,
        achievability_score: achievability(&sectors),
        sector_weights: [sectors[0].weight, sectors[1].weight, sectors[2].weight],
        sectors,
        consistency_score: consistency_score(&lap_times),
        theoretical_best_seconds: theoretical_best,
        current_best_lap_seconds: current_best,
        average_lap_seconds: stats::mean(&lap_times).unwrap_or(0.0),
        laps_analyzed: eligible.len(),
        laps_supplied: laps.len(),
        confidence: Confidence::from_lap_count(eligible.len()),
    };

    tracing::info!(
        "siwtl vehicle={} laps={}/{} target={} best={} gain={:.3}s achievability={:.3}",
        vehicle_id,
        result.laps_analyzed,
        result.laps_supplied,
        stats::format_lap_time(result.siwtl_lap_seconds),
        stats::format_lap_time(result.current_best_lap_seconds),
        result.potential_gain_seconds,
        result.achievability_score
    );

    Ok(result)
}
