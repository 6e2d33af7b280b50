//! # Track Definitions
//!
//! One [`TrackDefinition`] per column or row. The user-facing part (size,
//! min, max, shared group) is validated on every write. The layout-transient
//! part is reset at the start of each measure pass and only read back by the
//! solver and by the owning [`TrackCollection`](crate::TrackCollection).

use crate::length::GridLength;
use crate::shared::SharedLink;
use crate::{GridError, GridResult};

bitflags::bitflags! {
    /// Size kinds of a track, or the union of kinds a cell spans.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SizeKind: u8 {
        const FIXED = 0b0000_0001;
        const AUTO  = 0b0000_0010;
        const STAR  = 0b0000_0100;
    }
}

/// A column or row definition.
#[derive(Debug, Clone)]
pub struct TrackDefinition {
    user_size: GridLength,
    user_min: f64,
    user_max: f64,
    shared_group: Option<String>,

    /// Membership in a shared size group, with the aggregate snapshot taken at
    /// the start of the current pass.
    pub(crate) shared: Option<SharedLink>,

    /// Size kind resolved for the current pass.
    pub(crate) size_kind: SizeKind,
    /// Content-driven floor, reset to the user minimum every pass.
    pub(crate) min_size: f64,
    /// Probe size handed to children spanning this track.
    pub(crate) measure_size: f64,
    /// Resolved size after arrange.
    pub(crate) size_cache: f64,
    /// Position of the track's leading edge after arrange.
    pub(crate) final_offset: f64,
}

impl Default for TrackDefinition {
    fn default() -> Self {
        Self::new(GridLength::ONE_STAR)
    }
}

impl TrackDefinition {
    /// Create a track with no min/max constraints.
    pub fn new(user_size: GridLength) -> Self {
        Self {
            user_size,
            user_min: 0.0,
            user_max: f64::INFINITY,
            shared_group: None,
            shared: None,
            size_kind: SizeKind::empty(),
            min_size: 0.0,
            measure_size: 0.0,
            size_cache: 0.0,
            final_offset: 0.0,
        }
    }

    pub fn with_min(mut self, min: f64) -> GridResult<Self> {
        self.set_user_min(min)?;
        Ok(self)
    }

    pub fn with_max(mut self, max: f64) -> GridResult<Self> {
        self.set_user_max(max)?;
        Ok(self)
    }

    pub fn with_shared_group(mut self, group: impl Into<String>) -> Self {
        self.shared_group = Some(group.into());
        self
    }

    pub fn user_size(&self) -> GridLength {
        self.user_size
    }

    pub fn user_min(&self) -> f64 {
        self.user_min
    }

    pub fn user_max(&self) -> f64 {
        self.user_max
    }

    pub fn shared_group(&self) -> Option<&str> {
        self.shared_group.as_deref()
    }

    pub fn set_user_size(&mut self, size: GridLength) {
        self.user_size = size;
    }

    /// Set the minimum size. Must be finite and non-negative.
    pub fn set_user_min(&mut self, min: f64) -> GridResult<()> {
        if !min.is_finite() || min < 0.0 {
            return Err(GridError::InvalidConstraint { name: "min", value: min });
        }
        self.user_min = min;
        Ok(())
    }

    /// Set the maximum size. Must be non-negative; may be infinite.
    pub fn set_user_max(&mut self, max: f64) -> GridResult<()> {
        if max.is_nan() || max < 0.0 {
            return Err(GridError::InvalidConstraint { name: "max", value: max });
        }
        self.user_max = max;
        Ok(())
    }

    pub(crate) fn set_shared_group(&mut self, group: Option<String>) {
        self.shared_group = group;
    }

    /// Size kind resolved by the last measure pass.
    pub fn size_kind(&self) -> SizeKind {
        self.size_kind
    }

    /// Map the user size to a size kind.
    ///
    /// Star tracks count as auto while their axis is sized to content.
    pub fn effective_size_kind(&self, treat_star_as_auto: bool) -> SizeKind {
        let size = self.effective_user_size();
        if size.is_absolute() {
            SizeKind::FIXED
        } else if size.is_auto() || treat_star_as_auto {
            SizeKind::AUTO
        } else {
            SizeKind::STAR
        }
    }

    /// User size as seen by layout: the group aggregate for shared tracks.
    pub(crate) fn effective_user_size(&self) -> GridLength {
        match &self.shared {
            Some(link) => link.user_size,
            None => self.user_size,
        }
    }

    pub(crate) fn is_shared(&self) -> bool {
        self.shared.is_some()
    }

    /// Reset the transient state for a new measure pass.
    pub(crate) fn prepare(&mut self, treat_star_as_auto: bool) {
        self.min_size = 0.0;

        let mut user_min = self.user_min;
        let user_max = self.user_max;
        let user_size = self.effective_user_size();

        self.size_kind = self.effective_size_kind(treat_star_as_auto);
        let size = if self.size_kind == SizeKind::FIXED {
            user_min = user_min.max(user_size.value().min(user_max));
            user_size.value()
        } else {
            f64::INFINITY
        };

        self.update_min_size(user_min);
        self.measure_size = user_min.max(size.min(user_max));
    }

    /// Content floor including the shared aggregate when it applies.
    pub(crate) fn min_size(&self) -> f64 {
        match self.shared.as_ref().and_then(|link| link.floor) {
            Some(floor) if self.min_size < floor => floor,
            _ => self.min_size,
        }
    }

    /// Content floor ignoring the shared aggregate.
    pub(crate) fn raw_min_size(&self) -> f64 {
        self.min_size
    }

    pub(crate) fn min_size_for_arrange(&self) -> f64 {
        match self.shared.as_ref().and_then(|link| link.arrange_floor) {
            Some(floor) if self.min_size < floor => floor,
            _ => self.min_size,
        }
    }

    pub(crate) fn update_min_size(&mut self, min: f64) {
        self.min_size = self.min_size.max(min);
    }

    pub(crate) fn set_min_size(&mut self, min: f64) {
        self.min_size = min;
    }

    pub(crate) fn preferred_size(&self) -> f64 {
        let min = self.min_size();
        if self.size_kind != SizeKind::AUTO && min < self.measure_size {
            self.measure_size
        } else {
            min
        }
    }
}
