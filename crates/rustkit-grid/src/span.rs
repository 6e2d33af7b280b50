//! Distribution of multi-track cell sizes over their spanned range.

use std::collections::BTreeMap;

use tracing::trace;

use crate::axis::Axis;
use crate::math::{are_close, is_zero};
use crate::track::TrackDefinition;

/// Key of a spanned range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpanKey {
    pub axis: Axis,
    pub start: usize,
    pub count: usize,
}

/// Requested sizes of spanning cells, one entry per distinct range.
///
/// Keeps the largest request per range. Iteration is ordered by key so
/// repeated passes distribute in the same order.
#[derive(Debug, Clone, Default)]
pub struct SpanStore {
    requests: BTreeMap<SpanKey, f64>,
}

impl SpanStore {
    pub fn register(&mut self, axis: Axis, start: usize, count: usize, size: f64) {
        let entry = self
            .requests
            .entry(SpanKey { axis, start, count })
            .or_insert(size);
        if *entry < size {
            *entry = size;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (SpanKey, f64)> + '_ {
        std::mem::take(&mut self.requests).into_iter()
    }
}

/// Raise the floors of `tracks[start..start + count]` so that together they
/// cover `requested`.
///
/// `order` and `caps` are scratch space of at least `count` entries.
pub fn ensure_min_size_in_range(
    tracks: &mut [TrackDefinition],
    start: usize,
    count: usize,
    requested: f64,
    order: &mut Vec<usize>,
    caps: &mut Vec<f64>,
) {
    debug_assert!(count > 1 && start + count <= tracks.len());
    if is_zero(requested) {
        return;
    }

    let end = start + count;
    order.clear();
    caps.clear();
    caps.resize(tracks.len(), 0.0);

    let mut auto_count = 0;
    let mut range_min = 0.0;
    let mut range_preferred = 0.0;
    let mut range_max = 0.0;
    let mut max_max = 0.0_f64;

    for i in start..end {
        let track = &tracks[i];
        let min = track.min_size();
        let preferred = track.preferred_size();
        let max = track.user_max().max(min);

        range_min += min;
        range_preferred += preferred;
        range_max += max;
        caps[i] = max;
        max_max = max_max.max(max);

        if track.effective_user_size().is_auto() {
            auto_count += 1;
        }
        order.push(i);
    }

    trace!(
        start,
        count,
        requested,
        range_min,
        range_preferred,
        range_max,
        "Distributing span"
    );

    if requested <= range_min {
        return;
    }

    let is_auto = |t: &TrackDefinition| t.effective_user_size().is_auto();

    if requested <= range_preferred {
        // Grow non-auto tracks first, smallest preferred first; auto tracks keep
        // their floors.
        order.sort_by(|&a, &b| {
            let (ta, tb) = (&tracks[a], &tracks[b]);
            match (is_auto(ta), is_auto(tb)) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                (true, true) => ta.min_size().total_cmp(&tb.min_size()),
                (false, false) => ta.preferred_size().total_cmp(&tb.preferred_size()),
            }
        });

        let mut remaining = requested;
        for &i in &order[..auto_count] {
            remaining -= tracks[i].min_size();
        }
        for (n, &i) in order[auto_count..].iter().enumerate() {
            let share = remaining / (count - auto_count - n) as f64;
            let share = share.min(tracks[i].preferred_size());
            if share > tracks[i].min_size() {
                tracks[i].update_min_size(share);
            }
            remaining -= share;
        }
    } else if requested <= range_max {
        // Grow beyond preferred, smallest cap first; auto tracks last.
        order.sort_by(|&a, &b| {
            match (is_auto(&tracks[a]), is_auto(&tracks[b])) {
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                _ => caps[a].total_cmp(&caps[b]),
            }
        });

        let mut remaining = requested - range_preferred;
        let fixed_count = count - auto_count;
        for (n, &i) in order[..fixed_count].iter().enumerate() {
            let preferred = tracks[i].preferred_size();
            let grown = (preferred + remaining / (fixed_count - n) as f64).min(caps[i]);
            tracks[i].update_min_size(grown);
            remaining -= tracks[i].min_size() - preferred;
        }
        for (n, &i) in order[fixed_count..].iter().enumerate() {
            let preferred = tracks[i].min_size();
            let grown = (preferred + remaining / (auto_count - n) as f64).min(caps[i]);
            tracks[i].update_min_size(grown);
            remaining -= tracks[i].min_size() - preferred;
        }
    } else {
        // Past every cap: tracks with more headroom below the largest cap grow
        // faster so the total reaches the request.
        let equal_share = requested / count as f64;
        if equal_share < max_max && !are_close(equal_share, max_max) {
            let total_headroom = max_max * count as f64 - range_max;
            let excess = requested - range_max;
            for i in start..end {
                let share = (max_max - caps[i]) * excess / total_headroom;
                tracks[i].update_min_size(caps[i] + share);
            }
        } else {
            for track in &mut tracks[start..end] {
                track.update_min_size(equal_share);
            }
        }
    }
}
