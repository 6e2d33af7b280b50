//! Grid configuration and builder.

use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::collection::TrackCollection;
use crate::grid::Grid;
use crate::shared::SharedSizeScope;
use crate::track::TrackDefinition;
use crate::{GridError, GridResult};

/// Star-weight resolution algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarResolution {
    /// Pin the most-violated bound first; exact proportions for the rest.
    #[default]
    MaxDiscrepancy,
    /// Single proportional sweep in max/weight order.
    Legacy,
}

/// Grid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Star resolution algorithm used by measure and arrange.
    pub star_resolution: StarResolution,
    /// Snap arranged track sizes to device pixels.
    pub use_layout_rounding: bool,
    /// Device pixels per layout unit for columns.
    pub dpi_scale_x: f64,
    /// Device pixels per layout unit for rows.
    pub dpi_scale_y: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            star_resolution: StarResolution::MaxDiscrepancy,
            use_layout_rounding: false,
            dpi_scale_x: 1.0,
            dpi_scale_y: 1.0,
        }
    }
}

impl GridConfig {
    /// DPI scale for `axis`.
    pub fn dpi_scale(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.dpi_scale_x,
            Axis::Vertical => self.dpi_scale_y,
        }
    }

    /// Reject DPI scales that are not positive and finite.
    pub fn validate(&self) -> GridResult<()> {
        check_dpi_scale("dpi_scale_x", self.dpi_scale_x)?;
        check_dpi_scale("dpi_scale_y", self.dpi_scale_y)
    }
}

fn check_dpi_scale(name: &'static str, value: f64) -> GridResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GridError::InvalidConstraint { name, value })
    }
}

/// Builder for [`Grid`].
pub struct GridBuilder {
    config: GridConfig,
    columns: Vec<TrackDefinition>,
    rows: Vec<TrackDefinition>,
    scope: Option<SharedSizeScope>,
}

impl GridBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: GridConfig::default(),
            columns: Vec::new(),
            rows: Vec::new(),
            scope: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: GridConfig) -> GridResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn column(mut self, track: TrackDefinition) -> Self {
        self.columns.push(track);
        self
    }

    pub fn columns(mut self, tracks: impl IntoIterator<Item = TrackDefinition>) -> Self {
        self.columns.extend(tracks);
        self
    }

    pub fn row(mut self, track: TrackDefinition) -> Self {
        self.rows.push(track);
        self
    }

    pub fn rows(mut self, tracks: impl IntoIterator<Item = TrackDefinition>) -> Self {
        self.rows.extend(tracks);
        self
    }

    /// Set the star resolution algorithm.
    pub fn star_resolution(mut self, strategy: StarResolution) -> Self {
        self.config.star_resolution = strategy;
        self
    }

    /// Enable or disable layout rounding.
    pub fn layout_rounding(mut self, enabled: bool) -> Self {
        self.config.use_layout_rounding = enabled;
        self
    }

    /// Set the DPI scale of both axes.
    pub fn dpi_scale(mut self, scale: f64) -> GridResult<Self> {
        check_dpi_scale("dpi_scale", scale)?;
        self.config.dpi_scale_x = scale;
        self.config.dpi_scale_y = scale;
        Ok(self)
    }

    /// Participate in shared size groups of `scope`.
    pub fn shared_scope(mut self, scope: SharedSizeScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Build the grid.
    pub fn build(self) -> Grid {
        let columns = TrackCollection::from_tracks(Axis::Horizontal, self.columns);
        let rows = TrackCollection::from_tracks(Axis::Vertical, self.rows);
        Grid::from_parts(self.config, columns, rows, self.scope)
    }
}

impl Default for GridBuilder {
    fn default() -> Self {
        Self::new()
    }
}
