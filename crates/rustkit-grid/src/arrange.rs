//! # Final Track Sizes
//!
//! Resolves every track of one axis against the final size handed to arrange,
//! optionally snaps the result to device pixels, and computes offsets.
//!
//! Non-star tracks take their fixed size (auto tracks their floor), clamped to
//! `[min, max]`; shared tracks are pinned to their aggregate user size. Star
//! tracks are then resolved against what is left with the configured
//! [`StarResolution`].
//!
//! ## Layout rounding
//!
//! Each size is rounded to the nearest multiple of `1 / dpi_scale` and the
//! per-track residual is kept. If the rounded total misses the final size,
//! whole device pixels are taken from the tracks that were rounded up the most
//! (or given to those rounded down the most) until the total matches. Tracks
//! never drop below their floor.

use tracing::trace;

use crate::config::StarResolution;
use crate::math::{are_close, round_layout_value};
use crate::star::{legacy, max_discrepancy, StarInput, StarScratch};
use crate::track::TrackDefinition;

/// Buffers reused across arrange passes.
#[derive(Debug, Default)]
pub struct ArrangeScratch {
    pub(crate) star: StarScratch,
    order: Vec<usize>,
    residuals: Vec<f64>,
}

impl ArrangeScratch {
    pub fn clear(&mut self) {
        self.star.clear();
        self.order.clear();
        self.residuals.clear();
    }
}

/// Resolve final sizes and offsets of `tracks`. Returns the total extent.
///
/// `dpi_scale` enables layout rounding when set.
pub(crate) fn set_final_size(
    tracks: &mut [TrackDefinition],
    final_size: f64,
    strategy: StarResolution,
    dpi_scale: Option<f64>,
    scratch: &mut ArrangeScratch,
) -> f64 {
    match strategy {
        StarResolution::MaxDiscrepancy => {
            resolve_max_discrepancy(tracks, final_size, dpi_scale, scratch)
        }
        StarResolution::Legacy => resolve_legacy(tracks, final_size, dpi_scale, scratch),
    }

    let mut offset = 0.0;
    for track in tracks.iter_mut() {
        track.final_offset = offset;
        offset += track.size_cache;
    }

    trace!(final_size, extent = offset, tracks = tracks.len(), "Final track sizes");
    offset
}

/// Size of a non-star track before star resolution.
fn non_star_size(track: &TrackDefinition) -> f64 {
    let user_size = track.effective_user_size();
    let min = track.min_size_for_arrange();
    let size = if user_size.is_absolute() {
        user_size.value()
    } else {
        min
    };
    let max = if track.is_shared() {
        size
    } else {
        track.user_max()
    };
    min.max(size.min(max))
}

fn star_input(track: &TrackDefinition) -> StarInput {
    StarInput {
        weight: track.effective_user_size().value(),
        min: track.min_size_for_arrange(),
        max: track.user_max(),
    }
}

fn resolve_max_discrepancy(
    tracks: &mut [TrackDefinition],
    final_size: f64,
    dpi_scale: Option<f64>,
    scratch: &mut ArrangeScratch,
) {
    let StarScratch {
        stars,
        members,
        sizes,
        work,
    } = &mut scratch.star;
    stars.clear();
    members.clear();

    let mut taken = 0.0;
    for (i, track) in tracks.iter_mut().enumerate() {
        if track.effective_user_size().is_star() {
            members.push(i);
            stars.push(star_input(track));
        } else {
            track.size_cache = non_star_size(track);
            taken += track.size_cache;
        }
    }

    max_discrepancy(stars, taken, final_size, work, sizes);
    for (&i, &size) in members.iter().zip(sizes.iter()) {
        tracks[i].size_cache = size;
    }

    let Some(dpi) = dpi_scale else {
        return;
    };

    let residuals = &mut scratch.residuals;
    residuals.clear();
    let mut rounded_total = 0.0;
    for track in tracks.iter_mut() {
        let rounded = round_layout_value(track.size_cache, dpi);
        residuals.push(rounded - track.size_cache);
        track.size_cache = rounded;
        rounded_total += rounded;
    }

    if !are_close(rounded_total, final_size) {
        correct_rounding(
            tracks,
            final_size,
            dpi,
            rounded_total,
            residuals,
            &mut scratch.order,
        );
    }
}

fn resolve_legacy(
    tracks: &mut [TrackDefinition],
    final_size: f64,
    dpi_scale: Option<f64>,
    scratch: &mut ArrangeScratch,
) {
    let n = tracks.len();
    let round = |value: f64| dpi_scale.map_or(value, |dpi| round_layout_value(value, dpi));

    // Unrounded sizes, turned into residuals before correction.
    let unrounded = &mut scratch.residuals;
    unrounded.clear();
    unrounded.resize(n, 0.0);

    let StarScratch {
        stars,
        members,
        work,
        ..
    } = &mut scratch.star;
    stars.clear();
    members.clear();

    let mut all_preferred = 0.0;
    for (i, track) in tracks.iter_mut().enumerate() {
        if track.effective_user_size().is_star() {
            members.push(i);
            stars.push(star_input(track));
        } else {
            let size = non_star_size(track);
            unrounded[i] = size;
            track.size_cache = round(size);
            all_preferred += track.size_cache;
        }
    }

    let mut star_total = 0.0;
    legacy(stars, all_preferred, final_size, work, |k, size| {
        let i = members[k];
        unrounded[i] = size;
        let committed = round(size);
        tracks[i].size_cache = committed;
        star_total += committed;
        committed
    });
    all_preferred += star_total;

    // Over-allocated: shrink the tracks with the least slack above their floor
    // first, never below the floor.
    if all_preferred > final_size && !are_close(all_preferred, final_size) {
        let order = &mut scratch.order;
        order.clear();
        order.extend(0..n);
        order.sort_by(|&a, &b| {
            let slack_a = tracks[a].size_cache - tracks[a].min_size_for_arrange();
            let slack_b = tracks[b].size_cache - tracks[b].min_size_for_arrange();
            slack_a.total_cmp(&slack_b)
        });

        let mut to_distribute = final_size - all_preferred;
        for (k, &i) in order.iter().enumerate() {
            let track = &mut tracks[i];
            let floor = track.min_size_for_arrange();
            let target = track.size_cache + to_distribute / (n - k) as f64;
            let mut size = target.max(floor).min(track.size_cache);
            if dpi_scale.is_some() {
                unrounded[i] = size;
                size = round(target).max(floor).min(track.size_cache);
            }
            to_distribute -= size - track.size_cache;
            track.size_cache = size;
        }
        all_preferred = final_size - to_distribute;
    }

    let Some(dpi) = dpi_scale else {
        return;
    };
    if are_close(all_preferred, final_size) {
        return;
    }

    for (residual, track) in unrounded.iter_mut().zip(tracks.iter()) {
        *residual = track.size_cache - *residual;
    }
    correct_rounding(
        tracks,
        final_size,
        dpi,
        all_preferred,
        &scratch.residuals,
        &mut scratch.order,
    );
}

/// Nudge rounded sizes by whole device pixels until they sum to `final_size`.
///
/// `residuals[i]` is rounded minus unrounded size of track `i`.
fn correct_rounding(
    tracks: &mut [TrackDefinition],
    final_size: f64,
    dpi: f64,
    rounded_total: f64,
    residuals: &[f64],
    order: &mut Vec<usize>,
) {
    order.clear();
    order.extend(0..tracks.len());
    order.sort_by(|&a, &b| residuals[a].total_cmp(&residuals[b]));

    let increment = 1.0 / dpi;
    let mut adjusted = rounded_total;

    if rounded_total > final_size {
        // Take from the tracks rounded up the most.
        for &i in order.iter().rev() {
            if adjusted <= final_size || are_close(adjusted, final_size) {
                break;
            }
            let track = &mut tracks[i];
            let size = (track.size_cache - increment).max(track.min_size_for_arrange());
            if size < track.size_cache {
                adjusted -= track.size_cache - size;
            }
            track.size_cache = size;
        }
    } else if rounded_total < final_size {
        // Give to the tracks rounded down the most.
        for &i in order.iter() {
            if adjusted >= final_size || are_close(adjusted, final_size) {
                break;
            }
            let track = &mut tracks[i];
            track.size_cache += increment;
            adjusted += increment;
        }
    }

    trace!(rounded_total, adjusted, final_size, "Corrected layout rounding");
}
