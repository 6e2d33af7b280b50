//! Closure-driven children host.

use rustkit_grid::{CellPlacement, GridChildren, Rect, Size, Thickness};

/// Desired-size model of a test child.
pub type Content = Box<dyn FnMut(Size) -> Size>;

struct TestChild {
    placement: CellPlacement,
    margin: Thickness,
    content: Content,
    measure_calls: usize,
    constraints: Vec<Size>,
    rect: Option<Rect>,
}

/// Children whose desired sizes come from closures.
#[derive(Default)]
pub struct TestChildren {
    children: Vec<TestChild>,
}

impl TestChildren {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child with a constant desired size. Returns its index.
    pub fn fixed(&mut self, placement: CellPlacement, width: f64, height: f64) -> usize {
        self.with(placement, move |_| Size::new(width, height))
    }

    /// Add a child whose content of `area` wraps to the offered width.
    pub fn wrap(&mut self, placement: CellPlacement, area: f64) -> usize {
        self.with(placement, move |constraint| {
            let width = if constraint.width.is_finite() {
                constraint.width.max(1.0)
            } else {
                area.sqrt()
            };
            Size::new(width, area / width)
        })
    }

    /// Add a child driven by `content`. Returns its index.
    pub fn with(
        &mut self,
        placement: CellPlacement,
        content: impl FnMut(Size) -> Size + 'static,
    ) -> usize {
        self.children.push(TestChild {
            placement,
            margin: Thickness::default(),
            content: Box::new(content),
            measure_calls: 0,
            constraints: Vec::new(),
            rect: None,
        });
        self.children.len() - 1
    }

    pub fn set_margin(&mut self, index: usize, margin: Thickness) {
        self.children[index].margin = margin;
    }

    pub fn set_placement(&mut self, index: usize, placement: CellPlacement) {
        self.children[index].placement = placement;
    }

    pub fn measure_calls(&self, index: usize) -> usize {
        self.children[index].measure_calls
    }

    /// Constraints handed to child `index`, oldest first.
    pub fn constraints(&self, index: usize) -> &[Size] {
        &self.children[index].constraints
    }

    /// Cell rectangle from the last arrange.
    pub fn rect(&self, index: usize) -> Option<Rect> {
        self.children[index].rect
    }
}

impl GridChildren for TestChildren {
    fn len(&self) -> usize {
        self.children.len()
    }

    fn placement(&self, index: usize) -> CellPlacement {
        self.children[index].placement
    }

    fn margin(&self, index: usize) -> Thickness {
        self.children[index].margin
    }

    fn measure(&mut self, index: usize, constraint: Size) -> Size {
        let child = &mut self.children[index];
        child.measure_calls += 1;
        child.constraints.push(constraint);
        (child.content)(constraint)
    }

    fn arrange(&mut self, index: usize, cell: Rect) {
        self.children[index].rect = Some(cell);
    }
}
