//! RustKit Grid Smoke Harness
//!
//! Runs one grid scenario through measure and arrange and prints a JSON
//! report: resolved column and row sizes with offsets, the desired size, the
//! measure path taken and every child's cell rectangle.
//!
//! ```text
//! rustkit-grid-smoke [scenario.json] [--dump]
//! ```
//!
//! Without a scenario file the built-in demo runs (an auto/star cross-axis
//! cycle). `--dump` pretty-prints the report and includes the parsed tracks.

use anyhow::{Context, Result};
use rustkit_grid::{
    CellPlacement, Grid, GridChildren, GridConfig, GridLength, Rect, Size, Thickness,
    TrackCollection, TrackDefinition,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

const DEMO: &str = r#"{
    "name": "demo: auto/star cycle",
    "columns": ["auto", "*"],
    "rows": ["auto", "*"],
    "available": { "width": 240, "height": 200 },
    "children": [
        { "row": 1, "column": 0, "content": { "type": "fixed", "width": 40, "height": 10 } },
        { "row": 0, "column": 1, "content": { "type": "wrap", "area": 1000 } }
    ]
}"#;

/// Parse command line arguments
struct Args {
    scenario: Option<String>,
    dump: bool,
}

impl Args {
    fn parse() -> Self {
        let mut scenario = None;
        let mut dump = false;

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--dump" => dump = true,
                _ if scenario.is_none() => scenario = Some(arg),
                _ => {}
            }
        }

        Self { scenario, dump }
    }

    fn load_scenario(&self) -> Result<Scenario> {
        let text = match &self.scenario {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read scenario {}", path))?,
            None => DEMO.to_string(),
        };
        serde_json::from_str(&text).context("Invalid scenario JSON")
    }
}

// ==================== Scenario Model ====================

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    config: GridConfig,
    #[serde(default)]
    columns: Vec<TrackSpec>,
    #[serde(default)]
    rows: Vec<TrackSpec>,
    available: SizeSpec,
    #[serde(default, rename = "final")]
    final_size: Option<SizeSpec>,
    #[serde(default)]
    children: Vec<ChildSpec>,
}

/// A track as `"2*"` or `{ "size": "2*", "min": 10, "max": 80 }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackSpec {
    Size(GridLength),
    Detailed {
        size: GridLength,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl TrackSpec {
    fn build(&self) -> Result<TrackDefinition> {
        let (size, min, max) = match self {
            TrackSpec::Size(size) => (*size, None, None),
            TrackSpec::Detailed { size, min, max } => (*size, *min, *max),
        };
        let mut track = TrackDefinition::new(size);
        if let Some(min) = min {
            track = track.with_min(min)?;
        }
        if let Some(max) = max {
            track = track.with_max(max)?;
        }
        Ok(track)
    }
}

/// A size whose missing or null components mean "size to content".
#[derive(Debug, Clone, Copy, Deserialize)]
struct SizeSpec {
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
}

impl SizeSpec {
    fn to_size(self) -> Size {
        Size::new(
            self.width.unwrap_or(f64::INFINITY),
            self.height.unwrap_or(f64::INFINITY),
        )
    }
}

fn default_span() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct ChildSpec {
    #[serde(default)]
    row: usize,
    #[serde(default)]
    column: usize,
    #[serde(default = "default_span")]
    row_span: usize,
    #[serde(default = "default_span")]
    column_span: usize,
    /// `[left, top, right, bottom]`
    #[serde(default)]
    margin: [f64; 4],
    content: ContentSpec,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentSpec {
    /// Constant desired size.
    Fixed { width: f64, height: f64 },
    /// Text-like content of a given area, wrapped to the offered width.
    Wrap { area: f64 },
}

impl ContentSpec {
    fn desired(self, constraint: Size) -> Size {
        match self {
            ContentSpec::Fixed { width, height } => Size::new(width, height),
            ContentSpec::Wrap { area } => {
                let width = if constraint.width.is_finite() {
                    constraint.width.max(1.0)
                } else {
                    area.sqrt()
                };
                Size::new(width, area / width)
            }
        }
    }
}

// ==================== Children Host ====================

struct ScenarioChildren {
    specs: Vec<ChildSpec>,
    measure_calls: Vec<usize>,
    rects: Vec<Option<Rect>>,
}

impl ScenarioChildren {
    fn new(specs: Vec<ChildSpec>) -> Self {
        let count = specs.len();
        Self {
            specs,
            measure_calls: vec![0; count],
            rects: vec![None; count],
        }
    }
}

impl GridChildren for ScenarioChildren {
    fn len(&self) -> usize {
        self.specs.len()
    }

    fn placement(&self, index: usize) -> CellPlacement {
        let spec = &self.specs[index];
        CellPlacement::at(spec.row, spec.column).with_spans(spec.row_span, spec.column_span)
    }

    fn margin(&self, index: usize) -> Thickness {
        let [left, top, right, bottom] = self.specs[index].margin;
        Thickness::new(left, top, right, bottom)
    }

    fn measure(&mut self, index: usize, constraint: Size) -> Size {
        self.measure_calls[index] += 1;
        let desired = self.specs[index].content.desired(constraint);
        debug!(index, ?constraint, ?desired, "Child measured");
        desired
    }

    fn arrange(&mut self, index: usize, cell: Rect) {
        self.rects[index] = Some(cell);
    }
}

// ==================== Report ====================

fn tracks_report(tracks: &TrackCollection) -> Value {
    let entries: Vec<Value> = (0..tracks.len())
        .map(|i| {
            json!({
                "size": tracks.actual_size(i),
                "offset": tracks.offset(i),
            })
        })
        .collect();
    Value::Array(entries)
}

fn tracks_dump(tracks: &TrackCollection) -> Value {
    tracks
        .iter()
        .map(|t| {
            let max = t.user_max().is_finite().then_some(t.user_max());
            json!({
                "size": t.user_size(),
                "min": t.user_min(),
                "max": max,
            })
        })
        .collect()
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let scenario = args.load_scenario()?;
    info!(
        scenario = ?args.scenario,
        name = ?scenario.name,
        columns = scenario.columns.len(),
        rows = scenario.rows.len(),
        children = scenario.children.len(),
        "Running grid scenario"
    );

    let columns = scenario
        .columns
        .iter()
        .enumerate()
        .map(|(i, spec)| spec.build().with_context(|| format!("Invalid column {}", i)))
        .collect::<Result<Vec<_>>>()?;
    let rows = scenario
        .rows
        .iter()
        .enumerate()
        .map(|(i, spec)| spec.build().with_context(|| format!("Invalid row {}", i)))
        .collect::<Result<Vec<_>>>()?;

    let mut grid = Grid::builder()
        .config(scenario.config.clone())
        .context("Invalid grid config")?
        .columns(columns)
        .rows(rows)
        .build();
    let mut children = ScenarioChildren::new(scenario.children);

    let available = scenario.available.to_size();
    let desired = grid.measure(available, &mut children);

    // Arrange at the desired size on axes sized to content.
    let final_size = match scenario.final_size {
        Some(spec) => spec.to_size(),
        None => Size::new(
            if available.width.is_finite() { available.width } else { desired.width },
            if available.height.is_finite() { available.height } else { desired.height },
        ),
    };
    grid.arrange(final_size, &mut children);
    info!(
        width = final_size.width,
        height = final_size.height,
        "Grid arranged"
    );

    let child_reports: Vec<Value> = children
        .rects
        .iter()
        .zip(&children.measure_calls)
        .map(|(rect, calls)| json!({ "rect": rect, "measure_calls": calls }))
        .collect();

    let mut result = json!({
        "status": "ok",
        "name": scenario.name,
        "measure_path": format!("{:?}", grid.last_measure_path()),
        "desired": desired,
        "final": final_size,
        "columns": tracks_report(grid.columns()),
        "rows": tracks_report(grid.rows()),
        "children": child_reports,
    });

    if args.dump {
        result["config"] = serde_json::to_value(grid.config())?;
        result["column_definitions"] = tracks_dump(grid.columns());
        result["row_definitions"] = tracks_dump(grid.rows());
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result);
    }

    Ok(())
}
