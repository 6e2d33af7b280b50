//! # Shared Size Groups
//!
//! Lets tracks in independent grids agree on a common minimum size, e.g. to
//! line up label columns across sibling panels.
//!
//! ## Protocol
//!
//! A [`SharedSizeScope`] is a cheap handle onto one registry; every grid that
//! should participate is built with a clone of it. Each layout cycle:
//!
//! 1. Every grid measures and arranges. Shared tracks report their content floor
//!    and final size to the registry, and arm their group for validation.
//! 2. The host calls [`SharedSizeScope::settle_shared_groups`] once all grids in
//!    the pass are done. Armed groups recompute their aggregate minimum and the
//!    grids whose last layout used a stale aggregate are returned (and reported
//!    by [`Grid::is_layout_valid`](crate::Grid::is_layout_valid)) so the host can
//!    lay them out again.
//!
//! A member whose own floor is the group maximum (the "long pole") measures
//! against its own floor; the others measure against the aggregate. This keeps
//! a growing long pole from forcing every sibling to remeasure.
//!
//! The registry is single-threaded (`Rc<RefCell<_>>`), like the layout pass.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::length::GridLength;
use crate::math::are_close;

/// Identity of a grid registered with a [`SharedSizeScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridId(u64);

/// Identity of one shared track in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct MemberId(u64);

/// A track's membership plus the aggregate snapshot used during a pass.
#[derive(Debug, Clone)]
pub(crate) struct SharedLink {
    pub(crate) member: MemberId,
    pub(crate) group: String,
    /// Group aggregate user size (largest fixed member, else auto).
    pub(crate) user_size: GridLength,
    /// Aggregate floor applied during measure, if this member is not the long pole.
    pub(crate) floor: Option<f64>,
    /// Aggregate floor applied during arrange.
    pub(crate) arrange_floor: Option<f64>,
}

/// Handle onto a shared-size registry.
#[derive(Debug, Clone, Default)]
pub struct SharedSizeScope {
    registry: Rc<RefCell<SharedSizeRegistry>>,
}

#[derive(Debug, Default)]
struct SharedSizeRegistry {
    groups: BTreeMap<String, SharedSizeGroup>,
    members: BTreeMap<MemberId, Member>,
    next_grid: u64,
    next_member: u64,
    /// Grids that must run another layout pass.
    stale: BTreeSet<GridId>,
}

#[derive(Debug)]
struct SharedSizeGroup {
    members: Vec<MemberId>,
    user_size: GridLength,
    min_size: f64,
    user_size_valid: bool,
    pending_validation: bool,
}

#[derive(Debug)]
struct Member {
    group: String,
    grid: GridId,
    user_size: GridLength,
    raw_min: f64,
    size_cache: f64,
    use_shared_minimum: bool,
    layout_was_updated: bool,
}

impl SharedSizeScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live groups.
    pub fn group_count(&self) -> usize {
        self.registry.borrow().groups.len()
    }

    /// Number of members in `group`, zero if the group does not exist.
    pub fn member_count(&self, group: &str) -> usize {
        self.registry
            .borrow()
            .groups
            .get(group)
            .map_or(0, |g| g.members.len())
    }

    /// Current aggregate minimum of `group`.
    pub fn shared_min_size(&self, group: &str) -> Option<f64> {
        let mut registry = self.registry.borrow_mut();
        registry.ensure_user_size_valid(group);
        registry.groups.get(group).map(|g| g.min_size)
    }

    /// Recompute the aggregates of every group armed during the last pass.
    ///
    /// Returns the grids whose last layout is no longer valid, in id order.
    pub fn settle_shared_groups(&self) -> Vec<GridId> {
        let mut registry = self.registry.borrow_mut();
        let armed: Vec<String> = registry
            .groups
            .iter()
            .filter(|(_, g)| g.pending_validation)
            .map(|(name, _)| name.clone())
            .collect();

        for name in armed {
            registry.settle_group(&name);
        }

        let stale: Vec<GridId> = registry.stale.iter().copied().collect();
        debug!(stale = stale.len(), "Shared size groups settled");
        stale
    }

    pub(crate) fn register_grid(&self) -> GridId {
        let mut registry = self.registry.borrow_mut();
        registry.next_grid += 1;
        GridId(registry.next_grid)
    }

    pub(crate) fn join(&self, group: &str, grid: GridId, user_size: GridLength) -> MemberId {
        let mut registry = self.registry.borrow_mut();
        registry.next_member += 1;
        let id = MemberId(registry.next_member);
        registry.members.insert(
            id,
            Member {
                group: group.to_string(),
                grid,
                user_size,
                raw_min: 0.0,
                size_cache: 0.0,
                use_shared_minimum: false,
                layout_was_updated: false,
            },
        );
        registry.invalidate(group);
        registry
            .groups
            .entry(group.to_string())
            .or_insert_with(|| SharedSizeGroup {
                members: Vec::new(),
                user_size: GridLength::AUTO,
                min_size: 0.0,
                user_size_valid: false,
                pending_validation: false,
            })
            .members
            .push(id);
        trace!(group, member = id.0, "Shared size member joined");
        id
    }

    pub(crate) fn leave(&self, member: MemberId) {
        let mut registry = self.registry.borrow_mut();
        let Some(removed) = registry.members.remove(&member) else {
            return;
        };
        registry.invalidate(&removed.group);
        if !registry.members.values().any(|m| m.grid == removed.grid) {
            registry.stale.remove(&removed.grid);
        }

        let empty = match registry.groups.get_mut(&removed.group) {
            Some(group) => {
                group.members.retain(|&m| m != member);
                group.members.is_empty()
            }
            None => false,
        };
        if empty {
            registry.groups.remove(&removed.group);
            trace!(group = %removed.group, "Shared size group removed");
        }
    }

    /// Propagate a member's own user size; invalidates the group on change.
    pub(crate) fn set_user_size(&self, member: MemberId, user_size: GridLength) {
        let mut registry = self.registry.borrow_mut();
        let group = match registry.members.get_mut(&member) {
            Some(m) if m.user_size != user_size => {
                m.user_size = user_size;
                m.group.clone()
            }
            _ => return,
        };
        registry.invalidate(&group);
    }

    /// Start of a measure pass for `member`: arm deferred validation.
    pub(crate) fn begin_layout(&self, member: MemberId) {
        let mut registry = self.registry.borrow_mut();
        let group = match registry.members.get_mut(&member) {
            Some(m) => {
                m.layout_was_updated = true;
                m.group.clone()
            }
            None => return,
        };
        if let Some(g) = registry.groups.get_mut(&group) {
            g.pending_validation = true;
        }
    }

    /// Refresh the aggregate snapshot carried by a track.
    pub(crate) fn refresh(&self, link: &mut SharedLink) {
        let mut registry = self.registry.borrow_mut();
        registry.ensure_user_size_valid(&link.group);
        let Some(group) = registry.groups.get(&link.group) else {
            return;
        };
        let (user_size, min_size) = (group.user_size, group.min_size);
        let Some(member) = registry.members.get(&link.member) else {
            return;
        };

        link.user_size = user_size;
        link.floor = member.use_shared_minimum.then_some(min_size);
        link.arrange_floor =
            (member.use_shared_minimum || !member.layout_was_updated).then_some(min_size);
    }

    pub(crate) fn report_min(&self, member: MemberId, raw_min: f64) {
        if let Some(m) = self.registry.borrow_mut().members.get_mut(&member) {
            m.raw_min = raw_min;
        }
    }

    pub(crate) fn report_size(&self, member: MemberId, size: f64) {
        if let Some(m) = self.registry.borrow_mut().members.get_mut(&member) {
            m.size_cache = size;
        }
    }

    pub(crate) fn is_stale(&self, grid: GridId) -> bool {
        self.registry.borrow().stale.contains(&grid)
    }

    pub(crate) fn clear_stale(&self, grid: GridId) {
        self.registry.borrow_mut().stale.remove(&grid);
    }
}

impl SharedSizeRegistry {
    /// Mark the aggregate dirty and ask every member grid to re-layout.
    fn invalidate(&mut self, group: &str) {
        let Some(g) = self.groups.get_mut(group) else {
            return;
        };
        g.user_size_valid = false;
        for member in &g.members {
            if let Some(m) = self.members.get(member) {
                self.stale.insert(m.grid);
            }
        }
    }

    fn ensure_user_size_valid(&mut self, group: &str) {
        let Some(g) = self.groups.get(group) else {
            return;
        };
        if g.user_size_valid {
            return;
        }

        let mut user_size = GridLength::AUTO;
        for member in &g.members {
            let Some(size) = self.members.get(member).map(|m| m.user_size) else {
                continue;
            };
            if size.is_absolute() && (user_size.is_auto() || user_size.value() < size.value()) {
                user_size = size;
            }
        }

        if let Some(g) = self.groups.get_mut(group) {
            g.user_size = user_size;
            // Fixed members pin the floor so arrange cannot squeeze them apart.
            g.min_size = if user_size.is_absolute() {
                user_size.value()
            } else {
                0.0
            };
            g.user_size_valid = true;
        }
    }

    fn settle_group(&mut self, name: &str) {
        self.ensure_user_size_valid(name);
        let Some(group) = self.groups.get(name) else {
            return;
        };
        let old_min = group.min_size;
        let member_ids = group.members.clone();

        let shared_min = member_ids
            .iter()
            .filter_map(|id| self.members.get(id))
            .fold(0.0_f64, |acc, m| acc.max(m.raw_min));
        let changed = !are_close(old_min, shared_min);

        for id in &member_ids {
            let Some(member) = self.members.get_mut(id) else {
                continue;
            };
            let use_shared = !are_close(member.raw_min, shared_min);

            let measure_valid = if !member.use_shared_minimum {
                // Long pole stays valid only while it is still the long pole.
                !use_shared
            } else if use_shared {
                !changed
            } else {
                member.layout_was_updated
                    && (member.raw_min > old_min || are_close(member.raw_min, old_min))
            };

            if !measure_valid || !are_close(shared_min, member.size_cache) {
                self.stale.insert(member.grid);
            }

            member.use_shared_minimum = use_shared;
            member.layout_was_updated = false;
        }

        if let Some(group) = self.groups.get_mut(name) {
            group.min_size = shared_min;
            group.pending_validation = false;
        }
        trace!(group = name, shared_min, "Shared size group validated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(scope: &SharedSizeScope, group: &str, member: MemberId) -> SharedLink {
        let mut link = SharedLink {
            member,
            group: group.to_string(),
            user_size: GridLength::AUTO,
            floor: None,
            arrange_floor: None,
        };
        scope.refresh(&mut link);
        link
    }

    #[test]
    fn test_group_lifecycle() {
        let scope = SharedSizeScope::new();
        let grid = scope.register_grid();
        let a = scope.join("labels", grid, GridLength::AUTO);
        let b = scope.join("labels", grid, GridLength::AUTO);
        assert_eq!(scope.group_count(), 1);
        assert_eq!(scope.member_count("labels"), 2);

        scope.leave(a);
        assert_eq!(scope.member_count("labels"), 1);
        scope.leave(b);
        assert_eq!(scope.group_count(), 0);
        // Leaving twice is a no-op.
        scope.leave(b);
    }

    #[test]
    fn test_leave_keeps_stale_mark_of_other_groups() {
        let scope = SharedSizeScope::new();
        let grid = scope.register_grid();
        let labels = scope.join("labels", grid, GridLength::AUTO);
        let values = scope.join("values", grid, GridLength::AUTO);
        scope.clear_stale(grid);

        scope.set_user_size(values, GridLength::fixed(30.0).unwrap());
        assert!(scope.is_stale(grid));

        // "values" still needs the grid to re-layout.
        scope.leave(labels);
        assert!(scope.is_stale(grid));

        scope.leave(values);
        assert!(!scope.is_stale(grid));
    }

    #[test]
    fn test_aggregate_user_size_is_largest_fixed() {
        let scope = SharedSizeScope::new();
        let grid = scope.register_grid();
        let a = scope.join("g", grid, GridLength::AUTO);
        scope.join("g", grid, GridLength::fixed(40.0).unwrap());
        scope.join("g", grid, GridLength::fixed(70.0).unwrap());

        let snapshot = link(&scope, "g", a);
        assert_eq!(snapshot.user_size, GridLength::fixed(70.0).unwrap());
        assert_eq!(scope.shared_min_size("g"), Some(70.0));

        scope.set_user_size(a, GridLength::fixed(90.0).unwrap());
        assert_eq!(scope.shared_min_size("g"), Some(90.0));
    }

    #[test]
    fn test_settle_marks_short_pole_grid_stale() {
        let scope = SharedSizeScope::new();
        let left = scope.register_grid();
        let right = scope.register_grid();
        let a = scope.join("g", left, GridLength::AUTO);
        let b = scope.join("g", right, GridLength::AUTO);
        scope.clear_stale(left);
        scope.clear_stale(right);

        // One layout pass: left content is wider.
        for (member, min) in [(a, 80.0), (b, 30.0)] {
            scope.begin_layout(member);
            scope.report_min(member, min);
            scope.report_size(member, min);
        }
        let stale = scope.settle_shared_groups();

        // Right was measured against its own 30 but must now use 80.
        assert_eq!(stale, vec![right]);
        assert_eq!(scope.shared_min_size("g"), Some(80.0));
        let right_link = link(&scope, "g", b);
        assert_eq!(right_link.floor, Some(80.0));
        assert_eq!(link(&scope, "g", a).floor, None);

        // Second pass converges.
        scope.clear_stale(right);
        for (member, min) in [(a, 80.0), (b, 30.0)] {
            scope.begin_layout(member);
            scope.report_min(member, min);
            scope.report_size(member, 80.0);
        }
        assert!(scope.settle_shared_groups().is_empty());
    }

    #[test]
    fn test_settle_skips_unarmed_groups() {
        let scope = SharedSizeScope::new();
        let grid = scope.register_grid();
        let a = scope.join("g", grid, GridLength::AUTO);
        scope.clear_stale(grid);
        scope.report_min(a, 50.0);
        assert!(scope.settle_shared_groups().is_empty());
        assert_eq!(scope.shared_min_size("g"), Some(0.0));
    }
}
