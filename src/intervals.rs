use crate::types::{Interval, SessionWindow};

/// Collapse a participant's raw spans into sorted, disjoint coverage.
///
/// Touching spans (`end == next.start`) coalesce, so a leave immediately
/// followed by a rejoin counts as continuous presence.
pub fn merge_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_by_key(|i| i.start);

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(last) = merged.last_mut()
            && interval.start <= last.end
        {
            last.end = last.end.max(interval.end);
            continue;
        }
        merged.push(interval);
    }
    merged
}

/// Clip merged coverage to a session window, dropping spans with no overlap.
pub fn clip_to_window(merged: &[Interval], window: &SessionWindow) -> Vec<Interval> {
    let clipped = merged
        .iter()
        .filter_map(|i| Interval::new(i.start.max(window.start), i.end.min(window.end)))
        .collect();
    merge_intervals(clipped)
}

pub fn total_minutes(intervals: &[Interval]) -> f64 {
    intervals.iter().map(Interval::minutes).sum()
}
