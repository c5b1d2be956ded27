//! RSI (Relative Strength Index) over a price series.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n values are `None` (need n price changes).

pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() < 2 {
        return vec![None; values.len()];
    }

    let mut out = Vec::with_capacity(values.len());
    out.push(None);

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (idx, &change) in changes.iter().enumerate() {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if idx < period - 1 {
            avg_gain += gain;
            avg_loss += loss;
            out.push(None);
            continue;
        }

        if idx == period - 1 {
            avg_gain = (avg_gain + gain) / period as f64;
            avg_loss = (avg_loss + loss) / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        out.push(Some(rsi));
    }

    out
}
