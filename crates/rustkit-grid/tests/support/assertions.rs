//! Custom assertions for grid tests.

use rustkit_grid::TrackCollection;

/// Tolerance for sizes that pass through star resolution.
pub const TOLERANCE: f64 = 1e-9;

/// Assert that two lengths match within [`TOLERANCE`].
#[track_caller]
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= TOLERANCE,
        "Length mismatch: expected {}, got {}",
        expected,
        actual
    );
}

/// Arranged sizes of every track in `tracks`.
#[track_caller]
pub fn track_sizes(tracks: &TrackCollection) -> Vec<f64> {
    (0..tracks.len())
        .map(|i| {
            tracks
                .actual_size(i)
                .unwrap_or_else(|| panic!("Track {} has no arranged size", i))
        })
        .collect()
}

/// Assert that the arranged track sizes match `expected` within tolerance.
#[track_caller]
pub fn assert_track_sizes(tracks: &TrackCollection, expected: &[f64]) {
    let actual = track_sizes(tracks);
    assert_eq!(
        actual.len(),
        expected.len(),
        "Track count mismatch: expected {:?}, got {:?}",
        expected,
        actual
    );
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a - e).abs() <= TOLERANCE,
            "Track sizes differ: expected {:?}, got {:?}",
            expected,
            actual
        );
    }
}

/// Assert that the arranged tracks add up to `final_size`.
#[track_caller]
pub fn assert_conserved(tracks: &TrackCollection, final_size: f64) {
    let total: f64 = track_sizes(tracks).iter().sum();
    assert!(
        (total - final_size).abs() <= 1e-6,
        "Track sizes sum to {}, expected {}",
        total,
        final_size
    );
}
