//! # Grid Container
//!
//! Measure and arrange driver for a grid of column and row tracks.
//!
//! ## Overview
//!
//! A measure pass runs in five steps:
//!
//! 1. Consume pending invalidations and sync shared-size memberships
//! 2. Reset the per-pass state of every track
//! 3. Rebuild the cell groups if tracks, placements or content sizing changed
//! 4. Measure the groups in dependency order, resolving star tracks in between
//! 5. Sum the track floors into the desired size
//!
//! Step 4 picks one of three orders. When no star-column cell sits in an auto
//! row, rows resolve before columns and every group is measured once. When
//! there is no auto-column cell in a star row, columns resolve first instead.
//! Otherwise the two axes depend on each other and the auto-column cells are
//! re-measured until their widths settle, at most [`LAYOUT_LOOP_MAX`] + 1
//! rounds.
//!
//! An arrange pass resolves final track sizes (see [`crate::arrange`]) and
//! hands every child the rectangle of the tracks it spans.

use tracing::{debug, trace};

use crate::arrange::{set_final_size, ArrangeScratch};
use crate::axis::{Axis, Columns, Orientation, Rows};
use crate::cells::{CellCache, CellGroup, CellPlacement, CellRecord};
use crate::collection::{Invalidation, TrackCollection};
use crate::config::{GridBuilder, GridConfig};
use crate::math::{double_close, LAYOUT_LOOP_MAX};
use crate::shared::{GridId, SharedLink, SharedSizeScope};
use crate::span::{ensure_min_size_in_range, SpanStore};
use crate::star::{resolve_star, StarScratch};
use crate::track::{SizeKind, TrackDefinition};
use crate::{GridResult, Rect, Size, Thickness};

/// Children of a grid, as seen by layout.
///
/// Indices run from `0` to `len() - 1` and must stay stable between a measure
/// and the arrange that follows it.
pub trait GridChildren {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracks occupied by child `index`.
    fn placement(&self, index: usize) -> CellPlacement;

    /// Margin around child `index`, added to its desired size.
    fn margin(&self, _index: usize) -> Thickness {
        Thickness::default()
    }

    /// Measure child `index` against `constraint` (margin already removed).
    ///
    /// Infinite components ask for the content size on that axis.
    fn measure(&mut self, index: usize, constraint: Size) -> Size;

    /// Position child `index` in its cell.
    fn arrange(&mut self, index: usize, cell: Rect);
}

/// Order in which the last measure pass visited the cell groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurePath {
    /// Rows resolved before columns; every group measured once.
    RowsFirst,
    /// Columns resolved before rows; every group measured once.
    ColumnsFirst,
    /// Cross-axis loop over the auto-column cells in star rows.
    Cyclic {
        /// Re-measure rounds run.
        rounds: usize,
        /// False if the loop stopped at its cap with widths still changing.
        converged: bool,
    },
}

#[derive(Debug, Default)]
struct LayoutScratch {
    star: StarScratch,
    arrange: ArrangeScratch,
    span_order: Vec<usize>,
    span_caps: Vec<f64>,
    group: Vec<usize>,
    placements: Vec<CellPlacement>,
}

impl LayoutScratch {
    fn clear(&mut self) {
        self.star.clear();
        self.arrange.clear();
        self.span_order.clear();
        self.span_caps.clear();
        self.group.clear();
        self.placements.clear();
    }
}

/// A grid container.
#[derive(Debug)]
pub struct Grid {
    config: GridConfig,
    columns: TrackCollection,
    rows: TrackCollection,

    cells: CellCache,
    cells_valid: bool,
    /// Placements the cell cache was built from.
    placements: Vec<CellPlacement>,
    /// Size kinds the cell cache was built from.
    kinds_u: Vec<SizeKind>,
    kinds_v: Vec<SizeKind>,
    size_to_content: Option<(bool, bool)>,
    /// Desired size (with margin) of each child at its last measure.
    last_desired: Vec<Size>,

    spans: SpanStore,
    scratch: LayoutScratch,

    desired_size: Size,
    measured: bool,
    last_path: MeasurePath,
    shared: Option<(SharedSizeScope, GridId)>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    /// Create a grid with no explicit tracks.
    pub fn new() -> Self {
        GridBuilder::new().build()
    }

    pub fn builder() -> GridBuilder {
        GridBuilder::new()
    }

    pub(crate) fn from_parts(
        config: GridConfig,
        columns: TrackCollection,
        rows: TrackCollection,
        scope: Option<SharedSizeScope>,
    ) -> Self {
        let shared = scope.map(|scope| {
            let id = scope.register_grid();
            (scope, id)
        });
        Self {
            config,
            columns,
            rows,
            cells: CellCache::default(),
            cells_valid: false,
            placements: Vec::new(),
            kinds_u: Vec::new(),
            kinds_v: Vec::new(),
            size_to_content: None,
            last_desired: Vec::new(),
            spans: SpanStore::default(),
            scratch: LayoutScratch::default(),
            desired_size: Size::default(),
            measured: false,
            last_path: MeasurePath::RowsFirst,
            shared,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Change the configuration. Takes effect at the next measure.
    pub fn set_config(&mut self, config: GridConfig) -> GridResult<()> {
        config.validate()?;
        if self.config != config {
            self.config = config;
            self.measured = false;
        }
        Ok(())
    }

    pub fn columns(&self) -> &TrackCollection {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut TrackCollection {
        &mut self.columns
    }

    pub fn rows(&self) -> &TrackCollection {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut TrackCollection {
        &mut self.rows
    }

    /// Desired size from the last measure.
    pub fn desired_size(&self) -> Size {
        self.desired_size
    }

    /// Group order taken by the last measure.
    pub fn last_measure_path(&self) -> MeasurePath {
        self.last_path
    }

    /// Identity in the shared-size scope, if the grid has one.
    pub fn shared_id(&self) -> Option<GridId> {
        self.shared.as_ref().map(|(_, id)| *id)
    }

    /// Force the cell groups to be rebuilt at the next measure.
    pub fn invalidate_cells(&mut self) {
        self.cells_valid = false;
    }

    /// Whether the last layout still holds.
    ///
    /// False before the first measure, after any track mutation, and while a
    /// shared-size group this grid belongs to needs another pass.
    pub fn is_layout_valid(&self) -> bool {
        let stale = self
            .shared
            .as_ref()
            .is_some_and(|(scope, id)| scope.is_stale(*id));
        self.measured
            && self.columns.invalidation() == Invalidation::None
            && self.rows.invalidation() == Invalidation::None
            && !stale
    }

    // ==================== Measure ====================

    /// Measure the grid against `available` and return its desired size.
    ///
    /// An infinite component sizes that axis to content; star tracks on it
    /// then behave like auto tracks.
    pub fn measure<C: GridChildren + ?Sized>(&mut self, available: Size, children: &mut C) -> Size {
        let size_to_content_u = available.width == f64::INFINITY;
        let size_to_content_v = available.height == f64::INFINITY;

        // Step 1: consume invalidations, sync shared memberships
        let invalidation = self
            .columns
            .take_invalidation()
            .max(self.rows.take_invalidation());
        self.sync_shared_members();
        self.set_read_only(true);

        // Step 2: reset per-pass track state
        for track in self.columns.layout_tracks_mut() {
            track.prepare(size_to_content_u);
        }
        for track in self.rows.layout_tracks_mut() {
            track.prepare(size_to_content_v);
        }
        let track_count = self.columns.layout_len().max(self.rows.layout_len());
        self.scratch.star.reserve(track_count);

        // Step 3: classify cells
        self.refresh_cells(
            &*children,
            invalidation,
            (size_to_content_u, size_to_content_v),
        );

        // Step 4: measure groups
        let path = self.measure_cells(available, children);

        // Step 5: desired size
        let width: f64 = self.columns.layout_tracks().iter().map(|t| t.min_size()).sum();
        let height: f64 = self.rows.layout_tracks().iter().map(|t| t.min_size()).sum();
        self.desired_size = Size::new(width, height);
        self.report_shared_min_sizes();

        self.set_read_only(false);
        self.scratch.clear();
        self.measured = true;
        self.last_path = path;

        debug!(
            "Grid measure: available {}x{}, {} columns, {} rows, {} cells, {:?}, desired {}x{}",
            available.width,
            available.height,
            self.columns.layout_len(),
            self.rows.layout_len(),
            self.cells.len(),
            path,
            width,
            height
        );

        self.desired_size
    }

    fn refresh_cells<C: GridChildren + ?Sized>(
        &mut self,
        children: &C,
        invalidation: Invalidation,
        size_to_content: (bool, bool),
    ) {
        let placements = &mut self.scratch.placements;
        placements.clear();
        placements.extend((0..children.len()).map(|i| children.placement(i)));

        // Both snapshots must be refreshed, so no short-circuit.
        let kinds_changed = snapshot_kinds(&mut self.kinds_u, self.columns.layout_tracks())
            | snapshot_kinds(&mut self.kinds_v, self.rows.layout_tracks());

        let rebuild = !self.cells_valid
            || invalidation >= Invalidation::Cells
            || kinds_changed
            || self.size_to_content != Some(size_to_content)
            || *placements != self.placements;
        if !rebuild {
            return;
        }

        std::mem::swap(&mut self.placements, placements);
        self.cells = CellCache::build(
            &self.placements,
            self.columns.layout_tracks(),
            self.rows.layout_tracks(),
        );
        self.last_desired.clear();
        self.last_desired.resize(self.cells.len(), Size::default());
        self.size_to_content = Some(size_to_content);
        self.cells_valid = true;

        trace!(
            cells = self.cells.len(),
            star_u = self.cells.has_star_cells_u(),
            star_v = self.cells.has_star_cells_v(),
            group3_in_auto_rows = self.cells.has_group3_in_auto_rows(),
            "Rebuilt cell groups"
        );
    }

    fn measure_cells<C: GridChildren + ?Sized>(
        &mut self,
        available: Size,
        children: &mut C,
    ) -> MeasurePath {
        self.measure_group(CellGroup::One, children, false, false, false);

        let path = if !self.cells.has_group3_in_auto_rows() {
            if self.cells.has_star_cells_v() {
                self.resolve_star_tracks(Axis::Vertical, available.height);
            }
            self.measure_group(CellGroup::Two, children, false, false, false);
            if self.cells.has_star_cells_u() {
                self.resolve_star_tracks(Axis::Horizontal, available.width);
            }
            self.measure_group(CellGroup::Three, children, false, false, false);
            MeasurePath::RowsFirst
        } else if self.cells.is_group_empty(CellGroup::Two) {
            if self.cells.has_star_cells_u() {
                self.resolve_star_tracks(Axis::Horizontal, available.width);
            }
            self.measure_group(CellGroup::Three, children, false, false, false);
            if self.cells.has_star_cells_v() {
                self.resolve_star_tracks(Axis::Vertical, available.height);
            }
            MeasurePath::ColumnsFirst
        } else {
            self.measure_cycle(available, children)
        };

        self.measure_group(CellGroup::Four, children, false, false, false);
        path
    }

    /// Alternate between the star-column cells in auto rows and the
    /// auto-column cells in star rows until the latter stop changing width.
    fn measure_cycle<C: GridChildren + ?Sized>(
        &mut self,
        available: Size,
        children: &mut C,
    ) -> MeasurePath {
        // Floors before either group contributed, restored every round.
        let group2_mins =
            cache_min_sizes::<Columns>(&self.cells, CellGroup::Two, self.columns.layout_tracks());
        let group3_mins =
            cache_min_sizes::<Rows>(&self.cells, CellGroup::Three, self.rows.layout_tracks());

        // Widths of the auto-column cells with unbounded height.
        self.measure_group(CellGroup::Two, children, false, true, false);

        let mut rounds = 0;
        let mut width_changed = false;
        loop {
            if width_changed {
                apply_min_sizes(self.rows.layout_tracks_mut(), &group3_mins);
            }
            if self.cells.has_star_cells_u() {
                self.resolve_star_tracks(Axis::Horizontal, available.width);
            }
            self.measure_group(CellGroup::Three, children, false, false, false);

            apply_min_sizes(self.columns.layout_tracks_mut(), &group2_mins);
            if self.cells.has_star_cells_v() {
                self.resolve_star_tracks(Axis::Vertical, available.height);
            }
            // The final round keeps the column floors it already has.
            let last_round = rounds == LAYOUT_LOOP_MAX;
            width_changed = self.measure_group(CellGroup::Two, children, last_round, false, true);

            rounds += 1;
            if !width_changed || rounds > LAYOUT_LOOP_MAX {
                break;
            }
        }

        if width_changed {
            debug!(rounds, "Grid cross-axis loop hit its cap");
        } else {
            trace!(rounds, "Grid cross-axis loop converged");
        }
        MeasurePath::Cyclic {
            rounds,
            converged: !width_changed,
        }
    }

    /// Measure every cell in `group` and fold the results into the tracks.
    ///
    /// Returns whether any cell's desired width changed since its previous
    /// measure (only tracked with `check_width_change`).
    fn measure_group<C: GridChildren + ?Sized>(
        &mut self,
        group: CellGroup,
        children: &mut C,
        ignore_u: bool,
        force_infinity_v: bool,
        check_width_change: bool,
    ) -> bool {
        if self.cells.is_group_empty(group) {
            return false;
        }

        let mut indices = std::mem::take(&mut self.scratch.group);
        indices.clear();
        indices.extend(self.cells.group(group));

        let mut width_changed = false;
        for &index in &indices {
            let cell = *self.cells.record(index);
            let desired = self.measure_cell(index, &cell, children, force_infinity_v);

            let previous = std::mem::replace(&mut self.last_desired[index], desired);
            if check_width_change {
                width_changed |= !double_close(previous.width, desired.width);
            }

            if !ignore_u {
                fold_desired::<Columns>(
                    self.columns.layout_tracks_mut(),
                    &mut self.spans,
                    &cell,
                    desired.width,
                );
            }
            if !force_infinity_v {
                fold_desired::<Rows>(
                    self.rows.layout_tracks_mut(),
                    &mut self.spans,
                    &cell,
                    desired.height,
                );
            }
        }
        self.scratch.group = indices;

        self.distribute_spans();
        width_changed
    }

    fn measure_cell<C: GridChildren + ?Sized>(
        &self,
        index: usize,
        cell: &CellRecord,
        children: &mut C,
        force_infinity_v: bool,
    ) -> Size {
        let width = if cell.is_auto_u() && !cell.is_star_u() {
            f64::INFINITY
        } else {
            probe_size::<Columns>(self.columns.layout_tracks(), cell)
        };
        let height = if force_infinity_v || (cell.is_auto_v() && !cell.is_star_v()) {
            f64::INFINITY
        } else {
            probe_size::<Rows>(self.rows.layout_tracks(), cell)
        };

        let margin = children.margin(index);
        let (margin_u, margin_v) = (Columns::margin(&margin), Rows::margin(&margin));
        let constraint = Size::new((width - margin_u).max(0.0), (height - margin_v).max(0.0));
        let measured = children.measure(index, constraint);
        let desired = Size::new(measured.width + margin_u, measured.height + margin_v);

        trace!(
            index,
            constraint_width = constraint.width,
            constraint_height = constraint.height,
            width = desired.width,
            height = desired.height,
            "Measured cell"
        );
        desired
    }

    fn distribute_spans(&mut self) {
        let Self {
            spans,
            columns,
            rows,
            scratch,
            ..
        } = self;
        for (key, requested) in spans.drain() {
            let tracks = match key.axis {
                Axis::Horizontal => columns.layout_tracks_mut(),
                Axis::Vertical => rows.layout_tracks_mut(),
            };
            ensure_min_size_in_range(
                tracks,
                key.start,
                key.count,
                requested,
                &mut scratch.span_order,
                &mut scratch.span_caps,
            );
        }
    }

    fn resolve_star_tracks(&mut self, axis: Axis, available: f64) {
        let tracks = match axis {
            Axis::Horizontal => self.columns.layout_tracks_mut(),
            Axis::Vertical => self.rows.layout_tracks_mut(),
        };
        resolve_star(
            tracks,
            available,
            self.config.star_resolution,
            &mut self.scratch.star,
        );
    }

    // ==================== Arrange ====================

    /// Resolve final track sizes for `final_size` and arrange every child in
    /// its cell.
    ///
    /// Measures first against `final_size` if the last measure no longer
    /// matches the tracks or the children.
    pub fn arrange<C: GridChildren + ?Sized>(&mut self, final_size: Size, children: &mut C) {
        let needs_measure = !self.measured
            || !self.cells_valid
            || self.columns.invalidation() != Invalidation::None
            || self.rows.invalidation() != Invalidation::None
            || self.placements_changed(children);
        if needs_measure {
            debug!("Grid arrange without a current measure, measuring first");
            self.measure(final_size, children);
        }

        self.set_read_only(true);
        self.refresh_shared_links();

        let strategy = self.config.star_resolution;
        let rounding = self.config.use_layout_rounding;
        let dpi_u = rounding.then_some(self.config.dpi_scale(Axis::Horizontal));
        let dpi_v = rounding.then_some(self.config.dpi_scale(Axis::Vertical));

        let extent_u = set_final_size(
            self.columns.layout_tracks_mut(),
            final_size.width,
            strategy,
            dpi_u,
            &mut self.scratch.arrange,
        );
        let extent_v = set_final_size(
            self.rows.layout_tracks_mut(),
            final_size.height,
            strategy,
            dpi_v,
            &mut self.scratch.arrange,
        );
        self.columns.mark_arranged(extent_u);
        self.rows.mark_arranged(extent_v);
        self.report_shared_sizes();

        // Place children
        let columns = self.columns.layout_tracks();
        let rows = self.rows.layout_tracks();
        for (index, cell) in self.cells.records().iter().enumerate() {
            let rect = Rect::new(
                columns[cell.column].final_offset,
                rows[cell.row].final_offset,
                range_size(columns, cell.column, cell.column_span),
                range_size(rows, cell.row, cell.row_span),
            );
            children.arrange(index, rect);
        }

        self.set_read_only(false);
        self.scratch.clear();

        debug!(
            "Grid arrange: final {}x{}, extent {}x{}, {} cells",
            final_size.width,
            final_size.height,
            extent_u,
            extent_v,
            self.cells.len()
        );
    }

    /// Whether any child moved since the cells were last built.
    fn placements_changed<C: GridChildren + ?Sized>(&self, children: &C) -> bool {
        children.len() != self.placements.len()
            || self
                .placements
                .iter()
                .enumerate()
                .any(|(index, placement)| children.placement(index) != *placement)
    }

        fn set_read_only(&mut self, read_only: bool) {
        self.columns.set_read_only(read_only);
        self.rows.set_read_only(read_only);
    }

    // ==================== Shared Sizes ====================

    fn sync_shared_members(&mut self) {
        let Self {
            shared,
            columns,
            rows,
            ..
        } = self;
        let Some((scope, grid)) = shared.as_ref() else {
            return;
        };

        for collection in [columns, rows] {
            for member in collection.take_released() {
                scope.leave(member);
            }
            for track in collection.layout_tracks_mut() {
                sync_track(scope, *grid, track);
            }
        }

        // This pass picks up the current aggregates.
        scope.clear_stale(*grid);
    }

    fn refresh_shared_links(&mut self) {
        let Self {
            shared,
            columns,
            rows,
            ..
        } = self;
        let Some((scope, _)) = shared.as_ref() else {
            return;
        };
        let tracks = columns
            .layout_tracks_mut()
            .iter_mut()
            .chain(rows.layout_tracks_mut().iter_mut());
        for link in tracks.filter_map(|t| t.shared.as_mut()) {
            scope.refresh(link);
        }
    }

    fn report_shared_min_sizes(&self) {
        let Some((scope, _)) = &self.shared else {
            return;
        };
        for track in self.shared_tracks() {
            if let Some(link) = &track.shared {
                scope.report_min(link.member, track.raw_min_size());
            }
        }
    }

    fn report_shared_sizes(&self) {
        let Some((scope, _)) = &self.shared else {
            return;
        };
        for track in self.shared_tracks() {
            if let Some(link) = &track.shared {
                scope.report_size(link.member, track.size_cache);
            }
        }
    }

    fn shared_tracks(&self) -> impl Iterator<Item = &TrackDefinition> {
        self.columns
            .layout_tracks()
            .iter()
            .chain(self.rows.layout_tracks())
            .filter(|t| t.is_shared())
    }
}

impl Drop for Grid {
    fn drop(&mut self) {
        if let Some((scope, _)) = &self.shared {
            for member in self
                .columns
                .drain_all_memberships()
                .into_iter()
                .chain(self.rows.drain_all_memberships())
            {
                scope.leave(member);
            }
        }
    }
}

// ==================== Helpers ====================

/// Join, leave or refresh the shared group of one track.
fn sync_track(scope: &SharedSizeScope, grid: GridId, track: &mut TrackDefinition) {
    let wanted = track.shared_group().map(str::to_owned);
    let own_size = track.user_size();

    if let Some(link) = &track.shared {
        if wanted.as_deref() != Some(link.group.as_str()) {
            scope.leave(link.member);
            track.shared = None;
        }
    }
    if track.shared.is_none() {
        if let Some(group) = wanted {
            let member = scope.join(&group, grid, own_size);
            track.shared = Some(SharedLink {
                member,
                group,
                user_size: own_size,
                floor: None,
                arrange_floor: None,
            });
        }
    }

    if let Some(link) = track.shared.as_mut() {
        scope.set_user_size(link.member, own_size);
        scope.begin_layout(link.member);
        scope.refresh(link);
    }
}

/// Record `kinds` of `tracks`; returns whether they differ from the snapshot.
fn snapshot_kinds(snapshot: &mut Vec<SizeKind>, tracks: &[TrackDefinition]) -> bool {
    let changed = snapshot.len() != tracks.len()
        || snapshot
            .iter()
            .zip(tracks)
            .any(|(&kind, track)| kind != track.size_kind());
    if changed {
        snapshot.clear();
        snapshot.extend(tracks.iter().map(|t| t.size_kind()));
    }
    changed
}

/// Probe size of the tracks a cell spans: floors for auto tracks, measure
/// sizes for the rest.
fn probe_size<O: Orientation>(tracks: &[TrackDefinition], cell: &CellRecord) -> f64 {
    let (start, span) = O::range(cell);
    tracks[start..start + span]
        .iter()
        .map(|t| {
            if t.size_kind() == SizeKind::AUTO {
                t.min_size()
            } else {
                t.measure_size
            }
        })
        .sum()
}

fn fold_desired<O: Orientation>(
    tracks: &mut [TrackDefinition],
    spans: &mut SpanStore,
    cell: &CellRecord,
    desired: f64,
) {
    let (start, span) = O::range(cell);
    if span == 1 {
        let track = &mut tracks[start];
        let max = track.user_max();
        track.update_min_size(desired.min(max));
    } else {
        spans.register(O::AXIS, start, span, desired);
    }
}

/// Raw floor of the first track of every cell in `group`.
fn cache_min_sizes<O: Orientation>(
    cells: &CellCache,
    group: CellGroup,
    tracks: &[TrackDefinition],
) -> Vec<Option<f64>> {
    let mut mins = vec![None; tracks.len()];
    for index in cells.group(group) {
        let (start, _) = O::range(cells.record(index));
        mins[start] = Some(tracks[start].raw_min_size());
    }
    mins
}

fn apply_min_sizes(tracks: &mut [TrackDefinition], mins: &[Option<f64>]) {
    for (track, min) in tracks.iter_mut().zip(mins) {
        if let Some(min) = *min {
            track.set_min_size(min);
        }
    }
}

fn range_size(tracks: &[TrackDefinition], start: usize, span: usize) -> f64 {
    tracks[start..start + span].iter().map(|t| t.size_cache).sum()
}
