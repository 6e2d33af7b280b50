//! # Cell Classification
//!
//! Every child occupies a rectangle of tracks. The classifier turns each
//! placement into a [`CellRecord`] and partitions the records into four
//! measurement groups by the size kinds they span:
//!
//! | Group | U (columns) | V (rows) |
//! |---|---|---|
//! | 1 | not star | not star |
//! | 2 | auto, not star | star |
//! | 3 | star | not star |
//! | 4 | everything else (star on both, or fixed U with star V) | |
//!
//! Group lists are intrusive singly-linked lists threaded through the record
//! array, each in ascending child order.

use crate::track::{SizeKind, TrackDefinition};

/// Where a child sits in the grid. Spans of zero are treated as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellPlacement {
    pub column: usize,
    pub row: usize,
    pub column_span: usize,
    pub row_span: usize,
}

impl CellPlacement {
    /// Single cell at (`row`, `column`).
    pub const fn at(row: usize, column: usize) -> Self {
        Self {
            column,
            row,
            column_span: 1,
            row_span: 1,
        }
    }

    pub const fn with_spans(mut self, row_span: usize, column_span: usize) -> Self {
        self.row_span = row_span;
        self.column_span = column_span;
        self
    }
}

/// Classified placement of one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRecord {
    pub column: usize,
    pub row: usize,
    pub column_span: usize,
    pub row_span: usize,
    /// Union of the size kinds of the spanned columns.
    pub kinds_u: SizeKind,
    /// Union of the size kinds of the spanned rows.
    pub kinds_v: SizeKind,
    /// Next cell in the same group.
    pub next: Option<usize>,
}

impl CellRecord {
    pub fn is_star_u(&self) -> bool {
        self.kinds_u.contains(SizeKind::STAR)
    }

    pub fn is_auto_u(&self) -> bool {
        self.kinds_u.contains(SizeKind::AUTO)
    }

    pub fn is_star_v(&self) -> bool {
        self.kinds_v.contains(SizeKind::STAR)
    }

    pub fn is_auto_v(&self) -> bool {
        self.kinds_v.contains(SizeKind::AUTO)
    }
}

/// Measurement group of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellGroup {
    One,
    Two,
    Three,
    Four,
}

impl CellGroup {
    fn slot(self) -> usize {
        match self {
            CellGroup::One => 0,
            CellGroup::Two => 1,
            CellGroup::Three => 2,
            CellGroup::Four => 3,
        }
    }
}

/// Classified cells of one grid.
#[derive(Debug, Clone, Default)]
pub struct CellCache {
    records: Vec<CellRecord>,
    heads: [Option<usize>; 4],
    has_star_cells_u: bool,
    has_star_cells_v: bool,
    has_group3_in_auto_rows: bool,
}

impl CellCache {
    /// Rebuild all records and group lists.
    ///
    /// `columns` and `rows` must already carry this pass's size kinds.
    pub fn build(
        placements: &[CellPlacement],
        columns: &[TrackDefinition],
        rows: &[TrackDefinition],
    ) -> Self {
        let mut cache = CellCache {
            records: Vec::with_capacity(placements.len()),
            ..Default::default()
        };

        for placement in placements {
            let (column, column_span) =
                clamp_range(placement.column, placement.column_span, columns.len());
            let (row, row_span) = clamp_range(placement.row, placement.row_span, rows.len());
            cache.records.push(CellRecord {
                column,
                row,
                column_span,
                row_span,
                kinds_u: span_kinds(columns, column, column_span),
                kinds_v: span_kinds(rows, row, row_span),
                next: None,
            });
        }

        // Reverse order so prepending leaves each list ascending.
        for index in (0..cache.records.len()).rev() {
            let cell = cache.records[index];
            let group = classify(&cell);

            if group == CellGroup::Three && cell.is_auto_v() {
                cache.has_group3_in_auto_rows = true;
            }
            cache.has_star_cells_u |= cell.is_star_u();
            cache.has_star_cells_v |= cell.is_star_v();

            let slot = group.slot();
            cache.records[index].next = cache.heads[slot];
            cache.heads[slot] = Some(index);
        }

        cache
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> &CellRecord {
        &self.records[index]
    }

    pub fn records(&self) -> &[CellRecord] {
        &self.records
    }

    pub fn head(&self, group: CellGroup) -> Option<usize> {
        self.heads[group.slot()]
    }

    pub fn is_group_empty(&self, group: CellGroup) -> bool {
        self.head(group).is_none()
    }

    /// Indices of the cells in `group`, in child order.
    pub fn group(&self, group: CellGroup) -> GroupIter<'_> {
        GroupIter {
            records: &self.records,
            cursor: self.head(group),
        }
    }

    pub fn has_star_cells_u(&self) -> bool {
        self.has_star_cells_u
    }

    pub fn has_star_cells_v(&self) -> bool {
        self.has_star_cells_v
    }

    pub fn has_group3_in_auto_rows(&self) -> bool {
        self.has_group3_in_auto_rows
    }
}

/// Iterator over one group list.
pub struct GroupIter<'a> {
    records: &'a [CellRecord],
    cursor: Option<usize>,
}

impl Iterator for GroupIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let index = self.cursor?;
        self.cursor = self.records[index].next;
        Some(index)
    }
}

fn classify(cell: &CellRecord) -> CellGroup {
    if !cell.is_star_v() {
        if !cell.is_star_u() {
            CellGroup::One
        } else {
            CellGroup::Three
        }
    } else if cell.is_auto_u() && !cell.is_star_u() {
        CellGroup::Two
    } else {
        CellGroup::Four
    }
}

fn clamp_range(start: usize, span: usize, count: usize) -> (usize, usize) {
    let start = start.min(count.saturating_sub(1));
    let span = span.max(1).min(count - start);
    (start, span)
}

fn span_kinds(tracks: &[TrackDefinition], start: usize, span: usize) -> SizeKind {
    tracks[start..start + span]
        .iter()
        .fold(SizeKind::empty(), |kinds, track| kinds | track.size_kind())
}
