//! # RustKit Grid
//!
//! Track-sizing layout engine for grid containers.
//!
//! Computes column widths, row heights and offsets for a grid whose tracks are
//! sized in fixed pixels, to content (`auto`), or as weighted shares of the
//! remaining space (`*`). Children occupy rectangular ranges of tracks and are
//! measured through the [`GridChildren`] host trait.
//!
//! ## Design Goals
//!
//! 1. **Cycle breaking**: content-sized rows that depend on weighted columns (and
//!    the reverse) are resolved by a bounded fixed-point loop
//! 2. **Star resolution**: weighted tracks saturating at their min or max are
//!    resolved without overflow or bias (max-discrepancy), with a legacy
//!    proportional variant selectable at configuration time
//! 3. **Layout rounding**: optional snapping to the device-pixel grid that keeps
//!    the total allocated size
//! 4. **Shared sizes**: tracks in independent grids can agree on a common minimum
//!
//! ## Example
//!
//! ```
//! use rustkit_grid::{CellPlacement, Grid, GridChildren, GridLength, Rect, Size, TrackDefinition};
//!
//! struct Boxes(Vec<(CellPlacement, Size)>);
//!
//! impl GridChildren for Boxes {
//!     fn len(&self) -> usize { self.0.len() }
//!     fn placement(&self, index: usize) -> CellPlacement { self.0[index].0 }
//!     fn measure(&mut self, index: usize, _constraint: Size) -> Size { self.0[index].1 }
//!     fn arrange(&mut self, _index: usize, _cell: Rect) {}
//! }
//!
//! let mut grid = Grid::builder()
//!     .column(TrackDefinition::new(GridLength::fixed(100.0).unwrap()))
//!     .column(TrackDefinition::new(GridLength::AUTO))
//!     .column(TrackDefinition::new(GridLength::star(2.0).unwrap()))
//!     .build();
//!
//! let mut children = Boxes(vec![(CellPlacement::at(0, 1), Size::new(50.0, 20.0))]);
//! grid.measure(Size::new(300.0, 40.0), &mut children);
//! grid.arrange(Size::new(300.0, 40.0), &mut children);
//!
//! assert_eq!(grid.columns().actual_size(2), Some(150.0));
//! ```

pub mod arrange;
pub mod axis;
pub mod cells;
pub mod collection;
pub mod config;
pub mod grid;
pub mod length;
mod math;
pub mod shared;
pub mod span;
pub mod star;
pub mod track;

pub use axis::{Axis, Columns, Orientation, Rows};
pub use cells::{CellPlacement, CellRecord};
pub use collection::TrackCollection;
pub use config::{GridBuilder, GridConfig, StarResolution};
pub use grid::{Grid, GridChildren, MeasurePath};
pub use length::{GridLength, GridUnit, LengthParseOptions};
pub use shared::{GridId, SharedSizeScope};
pub use track::{SizeKind, TrackDefinition};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while configuring a grid.
///
/// Measure and arrange never fail; everything here is raised synchronously by
/// setters and parsers before an invalid value can be stored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid grid length value: {value}")]
    InvalidLength { value: f64 },

    #[error("Invalid {name} constraint: {value}")]
    InvalidConstraint { name: &'static str, value: f64 },

    #[error("Cannot parse grid length: {0:?}")]
    Parse(String),

    #[error("Track collection is read-only during layout")]
    ReadOnlyDuringLayout,

    #[error("Track index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Result alias for fallible grid operations.
pub type GridResult<T> = Result<T, GridError>;

/// A 2D size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Size that asks the grid to size both axes to content.
    pub const INFINITE: Size = Size::new(f64::INFINITY, f64::INFINITY);
}

/// A rectangle in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Edge sizes around a child (margin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Thickness {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Thickness {
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn uniform(value: f64) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}
