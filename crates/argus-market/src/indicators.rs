//! Technical indicators over candle close series.
//!
//! All functions return `None` when the series is too short; callers treat
//! that as "no signal", never as an error.

/// Simple moving average of the last `period` values.
#[must_use]
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average series with smoothing `2 / (period + 1)`.
///
/// Seeded with the SMA of the first `period` values.
#[must_use]
pub fn ema_series(values: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || values.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        series.push(prev);
    }
    Some(series)
}

/// RSI with Wilder's smoothing. Needs at least `period + 1` closes.
///
/// Zero average loss clamps to 100; a perfectly flat series reads 50.
#[must_use]
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (mut avg_gain, mut avg_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });
    let period_f = period as f64;
    avg_gain /= period_f;
    avg_loss /= period_f;

    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
    }

    let value = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };

    value.is_finite().then_some(value)
}

/// MACD output: line, signal and histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD(12, 26, 9) over the close series.
#[must_use]
pub fn macd(closes: &[f64]) -> Option<Macd> {
    macd_with(closes, 12, 26, 9)
}

/// MACD with explicit fast/slow/signal periods.
#[must_use]
pub fn macd_with(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast >= slow || closes.len() < slow + signal {
        return None;
    }
    let fast_series = ema_series(closes, fast)?;
    let slow_series = ema_series(closes, slow)?;

    // Align: slow series starts (slow - fast) entries later.
    let offset = slow - fast;
    let macd_line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .map(|(i, s)| fast_series[i + offset] - s)
        .collect();

    let signal_series = ema_series(&macd_line, signal)?;
    let macd_value = *macd_line.last()?;
    let signal_value = *signal_series.last()?;
    Some(Macd {
        macd: macd_value,
        signal: signal_value,
        histogram: macd_value - signal_value,
    })
}
