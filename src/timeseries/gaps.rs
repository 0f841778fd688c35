use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

use crate::types::{Cadence, FrequencyInfo, Segment, SeriesTable};

/// Compute the disjoint, ascending list of sub-ranges of `[start, end]` that
/// must be fetched to cover the window.
///
/// Policy, in priority order:
///
/// 1. Empty table, or no cached rows inside the window → the whole window as
///    one segment.
/// 2. Daily cadence with internal gap-fill allowed → the expected daily
///    calendar minus the observed dates, compressed into maximal consecutive
///    runs.
/// 3. Otherwise, edge-fill: extend coverage before the earliest and/or after
///    the latest cached in-window date. Internal gaps in non-daily data are
///    assumed to be legitimate absence (holidays, non-trading periods) and
///    are never proactively fetched.
///
/// A fully covered window yields an empty list.
#[must_use]
pub fn missing_segments(
    table: &SeriesTable,
    start: NaiveDate,
    end: NaiveDate,
    freq: Option<&FrequencyInfo>,
    allow_internal_gap_fill_daily: bool,
) -> Vec<Segment> {
    if table.is_empty() {
        return vec![Segment::new(start, end)];
    }
    let in_window = table.distinct_dates_within(start, end);
    if in_window.is_empty() {
        return vec![Segment::new(start, end)];
    }

    let daily = freq.is_some_and(|f| f.cadence == Cadence::Daily);
    if daily && allow_internal_gap_fill_daily {
        return missing_segments_daily(&in_window, start, end);
    }

    // Edge-fill. Bounds are exclusive of the cached extremes so the output
    // stays pairwise disjoint even when only one date is cached.
    let earliest = in_window[0];
    let latest = in_window[in_window.len() - 1];
    let mut segments = Vec::new();
    if start < earliest {
        if let Some(head_end) = earliest.checked_sub_days(Days::new(1)) {
            segments.push(Segment::new(start, head_end));
        }
    }
    if end > latest {
        if let Some(tail_start) = latest.checked_add_days(Days::new(1)) {
            segments.push(Segment::new(tail_start, end));
        }
    }
    segments
}

/// Daily internal gap-fill: every date of the window not present in
/// `observed` becomes part of a segment, with consecutive missing dates
/// compressed into one segment each.
fn missing_segments_daily(observed: &[NaiveDate], start: NaiveDate, end: NaiveDate) -> Vec<Segment> {
    let observed: BTreeSet<NaiveDate> = observed.iter().copied().collect();
    let missing: Vec<NaiveDate> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !observed.contains(d))
        .collect();
    compress_dates_to_segments(&missing)
}

/// Compress an ascending list of dates into maximal runs of consecutive days.
fn compress_dates_to_segments(missing: &[NaiveDate]) -> Vec<Segment> {
    let Some((&first, rest)) = missing.split_first() else {
        return Vec::new();
    };
    let mut segments = Vec::new();
    let mut seg_start = first;
    let mut prev = first;
    for &d in rest {
        if (d - prev).num_days() == 1 {
            prev = d;
            continue;
        }
        segments.push(Segment::new(seg_start, prev));
        seg_start = d;
        prev = d;
    }
    segments.push(Segment::new(seg_start, prev));
    segments
}
