//! Track Sizing Integration Tests
//!
//! End-to-end measure and arrange passes through the public API.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package rustkit-grid --test track_sizing
//!
//! # With solver traces
//! RUST_LOG=rustkit_grid=trace cargo test --package rustkit-grid --test track_sizing -- --nocapture
//! ```

mod support;

use rustkit_grid::{
    CellPlacement, Grid, GridConfig, GridLength, MeasurePath, SharedSizeScope, Size,
    StarResolution, Thickness, TrackDefinition,
};
use support::*;

const STRATEGIES: [StarResolution; 2] = [StarResolution::MaxDiscrepancy, StarResolution::Legacy];

fn track(text: &str) -> TrackDefinition {
    TrackDefinition::new(text.parse::<GridLength>().unwrap())
}

fn tracks(texts: &[&str]) -> Vec<TrackDefinition> {
    texts.iter().map(|t| track(t)).collect()
}

fn layout(grid: &mut Grid, children: &mut TestChildren, size: Size) -> Size {
    let desired = grid.measure(size, children);
    grid.arrange(size, children);
    desired
}

// ==================== Scenarios ====================

#[test]
fn test_fixed_auto_and_weighted_columns() {
    init_tracing();
    for strategy in STRATEGIES {
        let mut grid = Grid::builder()
            .columns(tracks(&["100", "auto", "2*"]))
            .star_resolution(strategy)
            .build();
        let mut children = TestChildren::new();
        children.fixed(CellPlacement::at(0, 1), 50.0, 10.0);

        layout(&mut grid, &mut children, Size::new(300.0, 10.0));
        assert_track_sizes(grid.columns(), &[100.0, 50.0, 150.0]);
    }
}

#[test]
fn test_weighted_columns_split_remaining_space() {
    init_tracing();
    for strategy in STRATEGIES {
        let mut grid = Grid::builder()
            .columns(tracks(&["*", "3*"]))
            .star_resolution(strategy)
            .build();
        let mut children = TestChildren::new();
        layout(&mut grid, &mut children, Size::new(400.0, 10.0));
        assert_track_sizes(grid.columns(), &[100.0, 300.0]);
    }
}

#[test]
fn test_capped_weighted_column_resolves_first() {
    init_tracing();
    let mut grid = Grid::builder()
        .column(track("*").with_max(50.0).unwrap())
        .column(track("*"))
        .build();
    let mut children = TestChildren::new();
    layout(&mut grid, &mut children, Size::new(200.0, 10.0));
    assert_track_sizes(grid.columns(), &[50.0, 150.0]);
}

#[test]
fn test_auto_star_cycle_converges() {
    init_tracing();
    let mut grid = Grid::builder()
        .columns(tracks(&["auto", "*"]))
        .rows(tracks(&["auto", "*"]))
        .build();
    let mut children = TestChildren::new();
    // Auto column, star row.
    let label = children.fixed(CellPlacement::at(1, 0), 40.0, 10.0);
    // Star column, auto row: height depends on the resolved width.
    let text = children.wrap(CellPlacement::at(0, 1), 1000.0);

    let available = Size::new(240.0, 200.0);
    let desired = layout(&mut grid, &mut children, available);

    match grid.last_measure_path() {
        MeasurePath::Cyclic { rounds, converged } => {
            assert!(converged);
            assert!(rounds <= 5, "took {} rounds", rounds);
        }
        other => panic!("expected the cyclic path, got {:?}", other),
    }
    assert_eq!(desired, Size::new(240.0, 15.0));
    assert_track_sizes(grid.columns(), &[40.0, 200.0]);
    assert_track_sizes(grid.rows(), &[5.0, 195.0]);

    let label_rect = children.rect(label).unwrap();
    assert_eq!((label_rect.y, label_rect.height), (5.0, 195.0));
    let text_rect = children.rect(text).unwrap();
    assert_eq!((text_rect.x, text_rect.width), (40.0, 200.0));
}

#[test]
fn test_cycle_stops_at_cap() {
    init_tracing();
    let mut grid = Grid::builder()
        .columns(tracks(&["auto", "*"]))
        .rows(tracks(&["auto", "*"]))
        .build();
    let mut children = TestChildren::new();
    // Grows every time it is measured, so its width never settles.
    let mut calls = 0.0;
    let restless = children.with(CellPlacement::at(1, 0), move |_| {
        calls += 1.0;
        Size::new(20.0 + calls, 10.0)
    });
    children.wrap(CellPlacement::at(0, 1), 1000.0);

    grid.measure(Size::new(240.0, 200.0), &mut children);

    assert_eq!(
        grid.last_measure_path(),
        MeasurePath::Cyclic {
            rounds: 6,
            converged: false
        }
    );
    // One unbounded probe plus one per round.
    assert_eq!(children.measure_calls(restless), 7);
}

#[test]
fn test_layout_rounding_fractional_dpi() {
    init_tracing();
    for strategy in STRATEGIES {
        let mut grid = Grid::builder()
            .columns(tracks(&["*", "*", "*"]))
            .star_resolution(strategy)
            .layout_rounding(true)
            .dpi_scale(1.25)
            .unwrap()
            .build();
        let mut children = TestChildren::new();
        layout(&mut grid, &mut children, Size::new(100.0, 10.0));

        let sizes = track_sizes(grid.columns());
        assert_conserved(grid.columns(), 100.0);
        for size in sizes {
            assert!(size >= 0.0);
            let device = size * 1.25;
            assert!(
                (device - device.round()).abs() < 1e-6,
                "{} is not on the device grid",
                size
            );
        }
    }
}

// ==================== Properties ====================

#[test]
fn test_conservation_over_mixed_tracks() {
    init_tracing();
    for strategy in STRATEGIES {
        let mut grid = Grid::builder()
            .columns(tracks(&["50", "auto", "2*", "*"]))
            .star_resolution(strategy)
            .build();
        grid.columns_mut().set_user_min(3, 20.0).unwrap();
        let mut children = TestChildren::new();
        children.fixed(CellPlacement::at(0, 1), 30.0, 10.0);

        for width in [100.0, 250.0, 1000.0] {
            layout(&mut grid, &mut children, Size::new(width, 10.0));
            assert_conserved(grid.columns(), width);
        }
    }
}

#[test]
fn test_bounds_hold_for_constrained_stars() {
    init_tracing();
    let constraints = [(0.0, 60.0), (80.0, f64::INFINITY), (10.0, 30.0), (0.0, f64::INFINITY)];
    for strategy in STRATEGIES {
        let mut builder = Grid::builder().star_resolution(strategy);
        for (min, max) in constraints {
            builder = builder.column(track("*").with_min(min).unwrap().with_max(max).unwrap());
        }
        let mut grid = builder.build();
        let mut children = TestChildren::new();

        for width in [150.0, 400.0, 900.0] {
            layout(&mut grid, &mut children, Size::new(width, 10.0));
            for (size, (min, max)) in track_sizes(grid.columns()).into_iter().zip(constraints) {
                assert!(size >= min - 1e-9, "{} below min {}", size, min);
                assert!(size <= max.max(min) + 1e-9, "{} above max {}", size, max);
            }
        }
    }
}

#[test]
fn test_unconstrained_stars_are_proportional() {
    init_tracing();
    for strategy in STRATEGIES {
        let mut grid = Grid::builder()
            .columns(tracks(&["100", "*", "2*", "5*"]))
            .star_resolution(strategy)
            .build();
        let mut children = TestChildren::new();
        layout(&mut grid, &mut children, Size::new(900.0, 10.0));

        let sizes = track_sizes(grid.columns());
        assert_close(sizes[2] / sizes[1], 2.0);
        assert_close(sizes[3] / sizes[1], 5.0);
        assert_track_sizes(grid.columns(), &[100.0, 100.0, 200.0, 500.0]);
    }
}

#[test]
fn test_repeated_layout_is_bit_identical() {
    init_tracing();
    let mut grid = Grid::builder()
        .columns(tracks(&["auto", "*", "3*"]))
        .rows(tracks(&["auto", "*"]))
        .layout_rounding(true)
        .dpi_scale(1.5)
        .unwrap()
        .build();
    let mut children = TestChildren::new();
    children.fixed(CellPlacement::at(1, 0), 33.3, 10.0);
    children.wrap(CellPlacement::at(0, 1).with_spans(1, 2), 5000.0);

    let available = Size::new(333.0, 211.0);
    let first_desired = layout(&mut grid, &mut children, available);
    let first: Vec<u64> = track_sizes(grid.columns())
        .into_iter()
        .chain(track_sizes(grid.rows()))
        .map(f64::to_bits)
        .collect();

    let second_desired = layout(&mut grid, &mut children, available);
    let second: Vec<u64> = track_sizes(grid.columns())
        .into_iter()
        .chain(track_sizes(grid.rows()))
        .map(f64::to_bits)
        .collect();

    assert_eq!(first_desired, second_desired);
    assert_eq!(first, second);
}

// ==================== Strategies ====================

#[test]
fn test_strategies_differ_on_min_bound() {
    init_tracing();
    let mut probes = Vec::new();
    for strategy in STRATEGIES {
        let mut grid = Grid::builder()
            .column(track("*"))
            .column(track("*").with_min(150.0).unwrap())
            .star_resolution(strategy)
            .build();
        let mut children = TestChildren::new();
        let child = children.fixed(CellPlacement::at(0, 0), 10.0, 10.0);

        layout(&mut grid, &mut children, Size::new(200.0, 10.0));
        probes.push(children.constraints(child)[0].width);
        // Arrange always fits the final size.
        assert_track_sizes(grid.columns(), &[50.0, 150.0]);
    }
    // Max-discrepancy pins the bound first; legacy splits before clamping.
    assert_eq!(probes, vec![50.0, 100.0]);
}

#[test]
fn test_config_switch_takes_effect() {
    init_tracing();
    let mut grid = Grid::builder().columns(tracks(&["*", "*", "*"])).build();
    let mut children = TestChildren::new();
    layout(&mut grid, &mut children, Size::new(100.0, 10.0));
    assert!(track_sizes(grid.columns()).iter().all(|s| s.fract() != 0.0));

    grid.set_config(GridConfig {
        use_layout_rounding: true,
        ..GridConfig::default()
    })
    .unwrap();
    assert!(!grid.is_layout_valid());
    layout(&mut grid, &mut children, Size::new(100.0, 10.0));
    assert_track_sizes(grid.columns(), &[34.0, 33.0, 33.0]);
}

// ==================== Spans & Margins ====================

#[test]
fn test_spanning_cell_distributes_over_auto_rows() {
    init_tracing();
    let mut grid = Grid::builder().rows(tracks(&["auto", "auto", "auto"])).build();
    let mut children = TestChildren::new();
    children.fixed(CellPlacement::at(0, 0), 10.0, 10.0);
    children.fixed(CellPlacement::at(0, 0).with_spans(3, 1), 10.0, 90.0);

    let desired = layout(&mut grid, &mut children, Size::new(50.0, 300.0));
    assert_close(desired.height, 90.0);

    let rows = track_sizes(grid.rows());
    assert!(rows[0] > rows[1]);
    assert_close(rows[1], rows[2]);
    assert_close(rows.iter().sum::<f64>(), 90.0);
}

#[test]
fn test_margins_reach_desired_size_and_constraint() {
    init_tracing();
    let mut grid = Grid::builder()
        .columns(tracks(&["*"]))
        .rows(tracks(&["auto"]))
        .build();
    let mut children = TestChildren::new();
    let child = children.fixed(CellPlacement::at(0, 0), 40.0, 20.0);
    children.set_margin(child, Thickness::uniform(4.0));

    let desired = grid.measure(Size::new(100.0, 100.0), &mut children);
    assert_eq!(desired, Size::new(48.0, 28.0));
    assert_eq!(children.constraints(child)[0], Size::new(92.0, f64::INFINITY));
}

#[test]
fn test_placements_out_of_range_are_clamped() {
    init_tracing();
    let mut grid = Grid::builder()
        .columns(tracks(&["20", "30"]))
        .rows(tracks(&["10"]))
        .build();
    let mut children = TestChildren::new();
    let child = children.fixed(CellPlacement::at(7, 1).with_spans(0, 9), 5.0, 5.0);

    layout(&mut grid, &mut children, Size::new(50.0, 10.0));
    let rect = children.rect(child).unwrap();
    assert_eq!((rect.x, rect.y, rect.width, rect.height), (20.0, 0.0, 30.0, 10.0));
}

// ==================== Shared Sizes ====================

#[test]
fn test_shared_group_aligns_sibling_grids() {
    init_tracing();
    let scope = SharedSizeScope::new();
    let build = || {
        Grid::builder()
            .column(track("auto").with_shared_group("labels"))
            .column(track("*"))
            .shared_scope(scope.clone())
            .build()
    };
    let mut wide = build();
    let mut narrow = build();

    let mut wide_children = TestChildren::new();
    wide_children.fixed(CellPlacement::at(0, 0), 80.0, 10.0);
    let mut narrow_children = TestChildren::new();
    narrow_children.fixed(CellPlacement::at(0, 0), 30.0, 10.0);

    let size = Size::new(300.0, 20.0);
    layout(&mut wide, &mut wide_children, size);
    layout(&mut narrow, &mut narrow_children, size);
    assert_track_sizes(narrow.columns(), &[30.0, 270.0]);

    let stale = scope.settle_shared_groups();
    let narrow_id = narrow.shared_id().unwrap();
    assert!(stale.contains(&narrow_id));
    assert!(!narrow.is_layout_valid());
    assert_eq!(scope.shared_min_size("labels"), Some(80.0));

    // Second pass picks up the aggregate.
    layout(&mut wide, &mut wide_children, size);
    layout(&mut narrow, &mut narrow_children, size);
    assert!(scope.settle_shared_groups().is_empty());
    assert!(wide.is_layout_valid() && narrow.is_layout_valid());
    assert_track_sizes(wide.columns(), &[80.0, 220.0]);
    assert_track_sizes(narrow.columns(), &[80.0, 220.0]);
}

#[test]
fn test_shared_group_takes_largest_fixed_size() {
    init_tracing();
    let scope = SharedSizeScope::new();
    let mut small = Grid::builder()
        .column(track("60").with_shared_group("g"))
        .shared_scope(scope.clone())
        .build();
    let mut large = Grid::builder()
        .column(track("auto").with_shared_group("g"))
        .column(track("90").with_shared_group("other"))
        .shared_scope(scope.clone())
        .build();

    let mut children = TestChildren::new();
    let size = Size::new(200.0, 10.0);
    layout(&mut small, &mut children, size);
    layout(&mut large, &mut children, size);
    assert_eq!(scope.group_count(), 2);

    // The auto member follows the fixed aggregate.
    assert_track_sizes(large.columns(), &[60.0, 90.0]);
    assert_eq!(scope.shared_min_size("g"), Some(60.0));

    drop(large);
    assert_eq!(scope.group_count(), 1);
    assert_eq!(scope.member_count("g"), 1);
}

// ==================== Collections ====================

#[test]
fn test_collection_edits_between_passes() {
    init_tracing();
    let mut grid = Grid::builder().columns(tracks(&["100", "*"])).build();
    let mut children = TestChildren::new();
    let child = children.fixed(CellPlacement::at(0, 1), 10.0, 10.0);
    layout(&mut grid, &mut children, Size::new(300.0, 10.0));
    assert_track_sizes(grid.columns(), &[100.0, 200.0]);

    grid.columns_mut().insert(0, track("50")).unwrap();
    assert_eq!(grid.columns().actual_size(0), None);

    layout(&mut grid, &mut children, Size::new(300.0, 10.0));
    assert_track_sizes(grid.columns(), &[50.0, 100.0, 150.0]);
    // Same placement now lands on the fixed 100 column.
    assert_eq!(children.rect(child).unwrap().x, 50.0);

    grid.columns_mut().set_user_size(2, GridLength::AUTO).unwrap();
    layout(&mut grid, &mut children, Size::new(300.0, 10.0));
    assert_track_sizes(grid.columns(), &[50.0, 100.0, 0.0]);
}
