/// Relative Strength Index over the last `period` close-to-close moves
///
/// Gains and losses are averaged with a plain mean over the trailing window
/// (no Wilder smoothing), so the value for a bar depends only on the
/// `period + 1` closes ending at it.
///
/// Returns `None` with fewer than `period + 1` prices, or when the window has
/// neither gains nor losses. No losses with some gain saturates at 100.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let window = &prices[prices.len() - period - 1..];
    let (gain_sum, loss_sum) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let n = period as f64;
    from_averages(gain_sum / n, loss_sum / n)
}

fn from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    match (avg_gain == 0.0, avg_loss == 0.0) {
        (true, true) => None, // flat run
        (false, true) => Some(100.0),
        _ => Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss)),
    }
}

/// RSI for every bar, `None` until index `period`
pub fn calculate_rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| calculate_rsi(&prices[..=i], period))
        .collect()
}
