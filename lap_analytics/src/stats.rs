// Small statistics helpers shared by the scorers.
//
// Empty input yields None instead of NaN so callers pick the edge-case policy.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Variance with an `n` denominator.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / values.len() as f64)
}

pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    population_variance(values).map(f64::sqrt)
}

/// Standard deviation with an `n - 1` denominator. Needs at least two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss = values.iter().map(|x| (x - m) * (x - m)).sum::<f64>();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Population std over mean. None when the mean is zero.
///
/// The ratio is scale free, so values are divided by their largest magnitude
/// first; sums of very large inputs then stay finite.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let peak = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if peak == 0.0 || !peak.is_finite() {
        return None;
    }
    let scaled: Vec<f64> = values.iter().map(|v| v / peak).collect();
    let m = mean(&scaled)?;
    if m == 0.0 {
        return None;
    }
    Some(population_std_dev(&scaled)? / m.abs())
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

pub fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Formats seconds as `m:ss.mmm`, e.g. `104.2` -> `1:44.200`.
pub fn format_lap_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "-:--.---".to_string();
    }
    let total_ms = (seconds * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{}:{:02}.{:03}", minutes, secs, ms)
}
