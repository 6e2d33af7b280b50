//! Axis selection for the track solver.
//!
//! Columns and rows are solved by the same code. [`Orientation`] is implemented
//! by two zero-sized markers so the solver is written once and specialized per
//! axis instead of threading an `is_column` flag through every call.

use crate::cells::CellRecord;
use crate::track::SizeKind;
use crate::{Size, Thickness};

/// Layout axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    /// Columns (U).
    Horizontal,
    /// Rows (V).
    Vertical,
}

impl Axis {
    /// Get the cross axis.
    pub fn cross(self) -> Self {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

/// Per-axis projections used by the solver.
pub trait Orientation {
    const AXIS: Axis;

    /// Component of `size` along this axis.
    fn extent(size: Size) -> f64;

    /// Sum of the margin edges along this axis.
    fn margin(margin: &Thickness) -> f64;

    /// First track index and span of a cell on this axis.
    fn range(cell: &CellRecord) -> (usize, usize);

    /// Union of the size kinds the cell spans on this axis.
    fn kinds(cell: &CellRecord) -> SizeKind;
}

/// Column axis marker.
#[derive(Debug, Clone, Copy)]
pub struct Columns;

/// Row axis marker.
#[derive(Debug, Clone, Copy)]
pub struct Rows;

impl Orientation for Columns {
    const AXIS: Axis = Axis::Horizontal;

    fn extent(size: Size) -> f64 {
        size.width
    }

    fn margin(margin: &Thickness) -> f64 {
        margin.horizontal()
    }

    fn range(cell: &CellRecord) -> (usize, usize) {
        (cell.column, cell.column_span)
    }

    fn kinds(cell: &CellRecord) -> SizeKind {
        cell.kinds_u
    }
}

impl Orientation for Rows {
    const AXIS: Axis = Axis::Vertical;

    fn extent(size: Size) -> f64 {
        size.height
    }

    fn margin(margin: &Thickness) -> f64 {
        margin.vertical()
    }

    fn range(cell: &CellRecord) -> (usize, usize) {
        (cell.row, cell.row_span)
    }

    fn kinds(cell: &CellRecord) -> SizeKind {
        cell.kinds_v
    }
}
