//! Ordered, index-addressable track collections.
//!
//! Mutation is rejected while the owning grid is inside a measure or arrange
//! pass. Every accepted mutation records how much of the previous layout it
//! invalidates; the grid consumes that at the start of the next measure.

use crate::axis::Axis;
use crate::length::GridLength;
use crate::shared::MemberId;
use crate::track::TrackDefinition;
use crate::{GridError, GridResult};

/// How much of the last layout a mutation invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Invalidation {
    None,
    /// Track values changed; cell classification still holds.
    Measure,
    /// A track changed size kind; cells must be reclassified.
    Cells,
    /// Tracks were added or removed.
    Structure,
}

/// Columns or rows of a grid.
#[derive(Debug, Clone)]
pub struct TrackCollection {
    axis: Axis,
    items: Vec<TrackDefinition>,
    /// Stand-in used when `items` is empty.
    implicit: TrackDefinition,
    read_only: bool,
    invalidation: Invalidation,
    arranged: bool,
    final_extent: f64,
    /// Shared memberships of removed tracks, released at the next sync.
    released: Vec<MemberId>,
}

impl TrackCollection {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            items: Vec::new(),
            implicit: TrackDefinition::default(),
            read_only: false,
            invalidation: Invalidation::Structure,
            arranged: false,
            final_extent: 0.0,
            released: Vec::new(),
        }
    }

    pub fn from_tracks(axis: Axis, tracks: impl IntoIterator<Item = TrackDefinition>) -> Self {
        let mut collection = Self::new(axis);
        collection.items = tracks.into_iter().map(detached).collect();
        collection
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackDefinition> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackDefinition> {
        self.items.iter()
    }

    /// Whether a measure or arrange pass currently holds the collection.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn push(&mut self, track: TrackDefinition) -> GridResult<()> {
        self.check_writable()?;
        self.items.push(detached(track));
        self.invalidate(Invalidation::Structure);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, track: TrackDefinition) -> GridResult<()> {
        self.check_writable()?;
        if index > self.items.len() {
            return Err(self.out_of_range(index));
        }
        self.items.insert(index, detached(track));
        self.invalidate(Invalidation::Structure);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> GridResult<TrackDefinition> {
        self.check_writable()?;
        if index >= self.items.len() {
            return Err(self.out_of_range(index));
        }
        let track = self.items.remove(index);
        self.invalidate(Invalidation::Structure);
        Ok(self.release(track))
    }

    pub fn remove_range(&mut self, index: usize, count: usize) -> GridResult<()> {
        self.check_writable()?;
        let end = index.checked_add(count).unwrap_or(usize::MAX);
        if end > self.items.len() {
            return Err(self.out_of_range(end.saturating_sub(1)));
        }
        if count == 0 {
            return Ok(());
        }
        let removed: Vec<_> = self.items.drain(index..end).collect();
        for track in removed {
            self.release(track);
        }
        self.invalidate(Invalidation::Structure);
        Ok(())
    }

    pub fn clear(&mut self) -> GridResult<()> {
        self.check_writable()?;
        let removed = std::mem::take(&mut self.items);
        for track in removed {
            self.release(track);
        }
        self.invalidate(Invalidation::Structure);
        Ok(())
    }

    /// Replace the track at `index`, returning the old one.
    pub fn set(&mut self, index: usize, track: TrackDefinition) -> GridResult<TrackDefinition> {
        self.check_writable()?;
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(GridError::IndexOutOfRange { index, len })?;
        let old = std::mem::replace(slot, detached(track));
        self.invalidate(Invalidation::Structure);
        Ok(self.release(old))
    }

    pub fn set_user_size(&mut self, index: usize, size: GridLength) -> GridResult<()> {
        let track = self.track_mut(index)?;
        let old = track.user_size();
        if old == size {
            return Ok(());
        }
        track.set_user_size(size);
        let level = if old.unit() != size.unit() {
            Invalidation::Cells
        } else {
            Invalidation::Measure
        };
        self.invalidate(level);
        Ok(())
    }

    pub fn set_user_min(&mut self, index: usize, min: f64) -> GridResult<()> {
        self.track_mut(index)?.set_user_min(min)?;
        self.invalidate(Invalidation::Measure);
        Ok(())
    }

    pub fn set_user_max(&mut self, index: usize, max: f64) -> GridResult<()> {
        self.track_mut(index)?.set_user_max(max)?;
        self.invalidate(Invalidation::Measure);
        Ok(())
    }

    /// Join or leave a shared size group.
    pub fn set_shared_group(&mut self, index: usize, group: Option<&str>) -> GridResult<()> {
        let track = self.track_mut(index)?;
        if track.shared_group() == group {
            return Ok(());
        }
        track.set_shared_group(group.map(str::to_string));
        self.invalidate(Invalidation::Cells);
        Ok(())
    }

    /// Final size of the track at `index` after the last arrange.
    ///
    /// `None` if out of range or if tracks were added or removed since.
    pub fn actual_size(&self, index: usize) -> Option<f64> {
        let start = self.offset(index)?;
        let end = match self.items.get(index + 1) {
            Some(next) => next.final_offset,
            None => self.final_extent,
        };
        Some(end - start)
    }

    /// Leading edge of the track at `index` after the last arrange.
    pub fn offset(&self, index: usize) -> Option<f64> {
        if !self.arranged || self.invalidation == Invalidation::Structure {
            return None;
        }
        self.items.get(index).map(|t| t.final_offset)
    }

    /// Total arranged size along the axis.
    pub fn extent(&self) -> Option<f64> {
        (self.arranged && self.invalidation != Invalidation::Structure).then_some(self.final_extent)
    }

    fn check_writable(&self) -> GridResult<()> {
        if self.read_only {
            Err(GridError::ReadOnlyDuringLayout)
        } else {
            Ok(())
        }
    }

    fn track_mut(&mut self, index: usize) -> GridResult<&mut TrackDefinition> {
        self.check_writable()?;
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(GridError::IndexOutOfRange { index, len })
    }

    fn out_of_range(&self, index: usize) -> GridError {
        GridError::IndexOutOfRange {
            index,
            len: self.items.len(),
        }
    }

    fn invalidate(&mut self, level: Invalidation) {
        self.invalidation = self.invalidation.max(level);
    }

    fn release(&mut self, mut track: TrackDefinition) -> TrackDefinition {
        if let Some(link) = track.shared.take() {
            self.released.push(link.member);
        }
        track
    }

    // ==================== Layout access ====================

    /// Tracks as seen by layout: the implicit `1*` track when empty.
    pub(crate) fn layout_tracks(&self) -> &[TrackDefinition] {
        if self.items.is_empty() {
            std::slice::from_ref(&self.implicit)
        } else {
            &self.items
        }
    }

    pub(crate) fn layout_tracks_mut(&mut self) -> &mut [TrackDefinition] {
        if self.items.is_empty() {
            std::slice::from_mut(&mut self.implicit)
        } else {
            &mut self.items
        }
    }

    pub(crate) fn layout_len(&self) -> usize {
        self.items.len().max(1)
    }

    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub(crate) fn invalidation(&self) -> Invalidation {
        self.invalidation
    }

    /// Consume the pending invalidation at the start of a measure pass.
    pub(crate) fn take_invalidation(&mut self) -> Invalidation {
        let level = self.invalidation;
        self.invalidation = Invalidation::None;
        if level == Invalidation::Structure {
            self.arranged = false;
        }
        level
    }

    pub(crate) fn mark_arranged(&mut self, extent: f64) {
        self.arranged = true;
        self.final_extent = extent;
    }

    pub(crate) fn take_released(&mut self) -> Vec<MemberId> {
        std::mem::take(&mut self.released)
    }

    pub(crate) fn drain_all_memberships(&mut self) -> Vec<MemberId> {
        let mut members = self.take_released();
        members.extend(
            self.items
                .iter_mut()
                .filter_map(|t| t.shared.take())
                .map(|link| link.member),
        );
        members
    }
}

/// Strip any shared membership carried over from another collection.
fn detached(mut track: TrackDefinition) -> TrackDefinition {
    track.shared = None;
    track
}
