use chrono::NaiveDate;

use crate::types::{Cadence, FrequencyInfo};

/// Default minimum distinct-date count before the small-sample penalty stops
/// applying to the confidence score.
pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 12;

/// Penalty subtracted from the confidence of estimates built on fewer than
/// the minimum sample size. Prevents early requests from looking falsely
/// confident.
const SMALL_SAMPLE_PENALTY: f64 = 0.25;

/// Estimate the native cadence of a series from its observed dates.
///
/// The input order does not matter; duplicate dates are ignored. The estimate
/// is the modal positive day-delta between consecutive distinct dates, which
/// is robust to occasional missing points without a full calendar model:
///
/// - step 1 → [`Cadence::Daily`]
/// - step 7 → [`Cadence::Weekly`]
/// - step 28..=31 → [`Cadence::Monthly`]
/// - anything else → [`Cadence::Irregular`] (the modal step is still reported)
///
/// Confidence is the share of deltas matching the mode, clamped to [0, 1]
/// after subtracting a 0.25 penalty when fewer than `min_sample` distinct
/// dates contributed. Fewer than two distinct dates yields `Irregular` with
/// confidence 0.
#[must_use]
pub fn infer_frequency(dates: &[NaiveDate], min_sample: usize) -> FrequencyInfo {
    let mut sorted: Vec<NaiveDate> = dates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let n = sorted.len();

    if n < 2 {
        return FrequencyInfo {
            cadence: Cadence::Irregular,
            step_days: None,
            confidence: 0.0,
            sample_size: n,
        };
    }

    let mut deltas: Vec<i64> = Vec::with_capacity(n - 1);
    for w in sorted.windows(2) {
        let d = (w[1] - w[0]).num_days();
        if d > 0 {
            deltas.push(d);
        }
    }
    if deltas.is_empty() {
        return FrequencyInfo {
            cadence: Cadence::Irregular,
            step_days: None,
            confidence: 0.0,
            sample_size: n,
        };
    }
    deltas.sort_unstable();

    // Modal delta by run-length scan over the sorted deltas; on a tie the
    // smallest delta wins.
    let mut mode = deltas[0];
    let mut mode_count = 0usize;
    let mut cur = deltas[0];
    let mut cur_count = 1usize;
    for &d in deltas.iter().skip(1) {
        if d == cur {
            cur_count += 1;
            continue;
        }
        if cur_count > mode_count {
            mode_count = cur_count;
            mode = cur;
        }
        cur = d;
        cur_count = 1;
    }
    if cur_count > mode_count {
        mode_count = cur_count;
        mode = cur;
    }

    #[allow(clippy::cast_precision_loss)]
    let mode_share = mode_count as f64 / deltas.len() as f64;
    let penalty = if n < min_sample {
        SMALL_SAMPLE_PENALTY
    } else {
        0.0
    };
    let confidence = (mode_share - penalty).clamp(0.0, 1.0);

    let cadence = match mode {
        1 => Cadence::Daily,
        7 => Cadence::Weekly,
        28..=31 => Cadence::Monthly,
        _ => Cadence::Irregular,
    };

    FrequencyInfo {
        cadence,
        step_days: Some(mode),
        confidence,
        sample_size: n,
    }
}
