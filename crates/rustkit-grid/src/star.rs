//! # Star-Weight Resolution
//!
//! Splits the space left after fixed and auto tracks among star tracks in
//! proportion to their weights, honoring each track's min and max.
//!
//! ## Variants
//!
//! - **Max discrepancy** (default): tracks whose proportional share would
//!   violate a bound are pinned to that bound one at a time, always picking the
//!   track whose violation is largest relative to the current proportion. The
//!   unconstrained rest then split what is left exactly by weight. Weights are
//!   rescaled by a power of two so their sum cannot overflow.
//! - **Legacy**: tracks are visited in ascending max/weight order and each takes
//!   its share of the remaining space clamped to its bounds. Cheaper, but a
//!   track hitting its min can starve tracks visited later.
//!
//! The same cores serve measure (writing `measure_size`) and arrange (writing
//! `size_cache`, see [`crate::arrange`]).

use tracing::trace;

use crate::config::StarResolution;
use crate::math::{is_zero, STAR_CLIP};
use crate::track::{SizeKind, TrackDefinition};

/// Which bound a star track was pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

/// Pick the bound whose violation is larger under `proportion`
/// (remaining weight per unit of remaining space).
///
/// `min_ratio` is weight/min of the tightest min candidate, `max_ratio`
/// weight/max of the tightest max candidate. Returns `None` when neither is
/// violated.
pub fn choose(min_ratio: f64, max_ratio: f64, proportion: f64) -> Option<Bound> {
    if min_ratio < proportion {
        if max_ratio > proportion {
            // Both violated: compare proportion/min_ratio with max_ratio/proportion
            // around a power of two near their geometric mean to stay in range.
            let min_power = min_ratio.log2().floor();
            let max_power = max_ratio.log2().floor();
            let f = 2.0_f64.powf(((min_power + max_power) / 2.0).floor());
            if (proportion / f) * (proportion / f) > (min_ratio / f) * (max_ratio / f) {
                Some(Bound::Min)
            } else {
                Some(Bound::Max)
            }
        } else {
            Some(Bound::Min)
        }
    } else if max_ratio > proportion {
        Some(Bound::Max)
    } else {
        None
    }
}

/// One star track as seen by the resolver cores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StarInput {
    pub(crate) weight: f64,
    pub(crate) min: f64,
    /// User max; the effective max is `max(min, max)`.
    pub(crate) max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resolution {
    Pending,
    Resolved(f64),
}

/// Reusable buffers for star resolution, owned by the grid.
#[derive(Debug, Default)]
pub struct StarScratch {
    pub(crate) stars: Vec<StarInput>,
    /// Track index of each entry in `stars`.
    pub(crate) members: Vec<usize>,
    pub(crate) sizes: Vec<f64>,
    pub(crate) work: StarWork,
}

impl StarScratch {
    /// Drop all per-pass contents, keeping capacity.
    pub fn clear(&mut self) {
        self.stars.clear();
        self.members.clear();
        self.sizes.clear();
        self.work.reset(0);
    }

    pub(crate) fn reserve(&mut self, tracks: usize) {
        self.stars.reserve(tracks);
        self.members.reserve(tracks);
        self.sizes.reserve(tracks);
        self.work.order.reserve(2 * tracks);
    }
}

#[derive(Debug, Default)]
pub(crate) struct StarWork {
    weights: Vec<f64>,
    state: Vec<Resolution>,
    min_ratio: Vec<f64>,
    max_ratio: Vec<f64>,
    min_list: Vec<usize>,
    max_list: Vec<usize>,
    chosen: Vec<(usize, Bound)>,
    order: Vec<usize>,
    partial: Vec<f64>,
}

impl StarWork {
    fn reset(&mut self, n: usize) {
        for v in [&mut self.weights, &mut self.min_ratio, &mut self.max_ratio, &mut self.partial] {
            v.clear();
            v.resize(n, 0.0);
        }
        self.state.clear();
        self.state.resize(n, Resolution::Pending);
        self.min_list.clear();
        self.max_list.clear();
        self.chosen.clear();
        self.order.clear();
    }
}

/// Resolve the measure size of every star track on one axis.
///
/// Auto tracks contribute their floor and fixed tracks their measure size to
/// the space already taken.
pub(crate) fn resolve_star(
    tracks: &mut [TrackDefinition],
    available: f64,
    strategy: StarResolution,
    scratch: &mut StarScratch,
) {
    let StarScratch {
        stars,
        members,
        sizes,
        work,
    } = scratch;
    stars.clear();
    members.clear();

    let mut taken = 0.0;
    for (i, track) in tracks.iter().enumerate() {
        if track.size_kind == SizeKind::AUTO {
            taken += track.min_size();
        } else if track.size_kind == SizeKind::FIXED {
            taken += track.measure_size;
        } else if track.size_kind == SizeKind::STAR {
            members.push(i);
            stars.push(StarInput {
                weight: track.effective_user_size().value(),
                min: track.min_size(),
                max: track.user_max(),
            });
        }
    }
    if stars.is_empty() {
        return;
    }

    match strategy {
        StarResolution::MaxDiscrepancy => {
            max_discrepancy(stars, taken, available, work, sizes);
            for (&i, &size) in members.iter().zip(sizes.iter()) {
                tracks[i].measure_size = size;
            }
        }
        StarResolution::Legacy => {
            legacy(stars, taken, available, work, |k, size| {
                tracks[members[k]].measure_size = size;
                size
            });
        }
    }

    trace!(
        available,
        taken,
        stars = stars.len(),
        ?strategy,
        "Resolved star tracks"
    );
}

/// Max-discrepancy resolution of `stars` into `sizes`.
///
/// `taken_fixed` is the space already claimed by non-star tracks.
pub(crate) fn max_discrepancy(
    stars: &[StarInput],
    taken_fixed: f64,
    available: f64,
    work: &mut StarWork,
    sizes: &mut Vec<f64>,
) {
    let n = stars.len();
    sizes.clear();
    sizes.resize(n, 0.0);
    if n == 0 {
        return;
    }
    work.reset(n);
    let StarWork {
        weights,
        state,
        min_ratio,
        max_ratio,
        min_list,
        max_list,
        chosen,
        order,
        partial,
    } = work;

    // Phase 1: scale weights so their sum stays finite. With an infinite
    // weight present only the infinite tracks share the space.
    let max_star = stars.iter().fold(0.0_f64, |m, s| m.max(s.weight));
    let infinite = max_star.is_infinite();
    let mut scale = 1.0;
    if !infinite {
        let power = (f64::MAX / max_star / n as f64).log2().floor();
        if power < 0.0 {
            scale = 2.0_f64.powf(power - 4.0);
        }
    }
    for (w, star) in weights.iter_mut().zip(stars) {
        *w = if infinite {
            if star.weight.is_infinite() {
                1.0
            } else {
                0.0
            }
        } else {
            star.weight * scale
        };
    }

    let mut pending = n;
    let mut taken;
    // Each round pins at least one track for good.
    let max_rounds = 2 * n + 2;
    let mut rounds = 0;

    loop {
        // Phase 2: gather candidates violating a bound.
        taken = taken_fixed;
        let mut total_weight = 0.0;
        min_list.clear();
        max_list.clear();
        chosen.clear();

        for i in 0..n {
            match state[i] {
                Resolution::Resolved(size) => taken += size,
                Resolution::Pending => {
                    let w = weights[i];
                    let star = &stars[i];
                    total_weight += w;
                    if star.min > 0.0 {
                        min_list.push(i);
                        min_ratio[i] = w / star.min;
                    }
                    let effective_max = star.min.max(star.max);
                    if effective_max.is_finite() {
                        max_list.push(i);
                        max_ratio[i] = w / effective_max;
                    }
                }
            }
        }

        // Phase 3: pin the worst offender until the proportion fits everyone.
        // Tightest candidates sit at the end of each list.
        min_list.sort_by(|&a, &b| min_ratio[b].total_cmp(&min_ratio[a]));
        max_list.sort_by(|&a, &b| max_ratio[a].total_cmp(&max_ratio[b]));

        let mut taken_weight = 0.0;
        let mut remaining_space = available - taken;
        let mut remaining_weight = total_weight;

        while (!min_list.is_empty() || !max_list.is_empty()) && remaining_space > 0.0 {
            if remaining_weight < total_weight / 256.0 {
                // Lost more than 8 bits to cancellation; recompute from scratch.
                taken_weight = 0.0;
                total_weight = (0..n)
                    .filter(|&i| state[i] == Resolution::Pending)
                    .map(|i| weights[i])
                    .sum();
                remaining_weight = total_weight;
            }

            let tightest_min = min_list.last().map_or(f64::INFINITY, |&i| min_ratio[i]);
            let tightest_max = max_list.last().map_or(-1.0, |&i| max_ratio[i]);
            let proportion = remaining_weight / remaining_space;

            let (i, bound) = match choose(tightest_min, tightest_max, proportion) {
                Some(Bound::Min) => match min_list.pop() {
                    Some(i) => (i, Bound::Min),
                    None => break,
                },
                Some(Bound::Max) => match max_list.pop() {
                    Some(i) => (i, Bound::Max),
                    None => break,
                },
                None => break,
            };
            let size = match bound {
                Bound::Min => stars[i].min,
                Bound::Max => stars[i].min.max(stars[i].max),
            };

            taken += size;
            state[i] = Resolution::Resolved(size);
            taken_weight += weights[i];
            pending -= 1;
            chosen.push((i, bound));

            remaining_space = available - taken;
            remaining_weight = total_weight - taken_weight;

            while min_list.last().is_some_and(|&j| state[j] != Resolution::Pending) {
                min_list.pop();
            }
            while max_list.last().is_some_and(|&j| state[j] != Resolution::Pending) {
                max_list.pop();
            }
        }

        // Slack left with every track pinned: pinned-at-min tracks may grow.
        // Over-allocated: pinned-at-max tracks may shrink.
        let mut rerun = false;
        if pending == 0 && taken < available {
            rerun |= release(chosen, state, Bound::Min, &mut pending);
        }
        if taken > available {
            rerun |= release(chosen, state, Bound::Max, &mut pending);
        }

        rounds += 1;
        if !rerun || rounds >= max_rounds {
            break;
        }
    }

    // Phase 4: unconstrained tracks split the rest by weight, largest weight
    // last so the smallest shares are computed from the most precise sums.
    order.clear();
    for i in 0..n {
        match state[i] {
            Resolution::Resolved(size) => sizes[i] = size,
            Resolution::Pending => order.push(i),
        }
    }
    if order.is_empty() {
        return;
    }

    order.sort_by(|&a, &b| weights[a].total_cmp(&weights[b]));
    let mut running = 0.0;
    for (k, &i) in order.iter().enumerate() {
        running += weights[i];
        partial[k] = running;
    }
    for k in (0..order.len()).rev() {
        let i = order[k];
        let star = &stars[i];
        let share = if weights[i] > 0.0 {
            (available - taken).max(0.0) * (weights[i] / partial[k])
        } else {
            0.0
        };
        let size = share.min(star.max).max(star.min);
        sizes[i] = size;
        taken += size;
    }
}

fn release(
    chosen: &[(usize, Bound)],
    state: &mut [Resolution],
    bound: Bound,
    pending: &mut usize,
) -> bool {
    let mut released = false;
    for &(i, b) in chosen {
        if b == bound && state[i] != Resolution::Pending {
            state[i] = Resolution::Pending;
            *pending += 1;
            released = true;
        }
    }
    released
}

/// Legacy proportional resolution.
///
/// `commit(k, size)` stores the size of `stars[k]` and returns the amount
/// actually claimed (which may be rounded).
pub(crate) fn legacy(
    stars: &[StarInput],
    taken_fixed: f64,
    available: f64,
    work: &mut StarWork,
    mut commit: impl FnMut(usize, f64) -> f64,
) {
    let n = stars.len();
    if n == 0 {
        return;
    }
    work.reset(n);
    let StarWork {
        weights,
        min_ratio: ratio,
        order,
        partial,
        ..
    } = work;

    for (i, star) in stars.iter().enumerate() {
        if is_zero(star.weight) {
            weights[i] = 0.0;
            ratio[i] = 0.0;
        } else {
            let weight = star.weight.min(STAR_CLIP);
            weights[i] = weight;
            ratio[i] = star.min.max(star.max).min(STAR_CLIP) / weight;
        }
        order.push(i);
    }

    // Ascending max/weight; partial sums run from the largest ratio back.
    order.sort_by(|&a, &b| ratio[a].total_cmp(&ratio[b]));
    let mut running = 0.0;
    for k in (0..n).rev() {
        running += weights[order[k]];
        partial[k] = running;
    }

    let mut taken = taken_fixed;
    for k in 0..n {
        let i = order[k];
        let star = &stars[i];
        let size = if weights[i] == 0.0 {
            star.min
        } else {
            let share = (available - taken).max(0.0) * (weights[i] / partial[k]);
            share.min(star.max).max(star.min)
        };
        taken += commit(i, size);
    }
}
