//! Mean and population standard deviation over a price window.
//!
//! STDDEV = sqrt(sum((C[j] - SMA)^2) / n), dividing by N rather than N-1.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sma = mean(values);
    let variance: f64 = values
        .iter()
        .map(|v| {
            let diff = v - sma;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}
