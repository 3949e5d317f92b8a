use serde::{Deserialize, Serialize};

use crate::indicators::sma;

/// Crossing of a short moving average over a long one on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaCross {
    /// Short average moved from above to below the long one.
    Death,
    /// Short average moved from below to above the long one.
    Golden,
}

/// Compares the order of the two moving averages on the last two bars.
///
/// Needs at least `long_window + 1` closes so that both averages exist on both
/// bars; with fewer, no cross is reported.
pub fn moving_average_cross(closes: &[f64], short_window: usize, long_window: usize) -> Option<MaCross> {
    if short_window == 0 || short_window >= long_window || closes.len() <= long_window {
        return None;
    }

    let short = sma(closes, short_window);
    let long = sma(closes, long_window);
    let (s_prev, s_last) = last_two(&short)?;
    let (l_prev, l_last) = last_two(&long)?;

    if s_prev > l_prev && s_last < l_last {
        Some(MaCross::Death)
    } else if s_prev < l_prev && s_last > l_last {
        Some(MaCross::Golden)
    } else {
        None
    }
}

pub fn is_death_cross(closes: &[f64], short_window: usize, long_window: usize) -> bool {
    moving_average_cross(closes, short_window, long_window) == Some(MaCross::Death)
}

fn last_two(values: &[f64]) -> Option<(f64, f64)> {
    match values {
        [.., prev, last] => Some((*prev, *last)),
        _ => None,
    }
}
