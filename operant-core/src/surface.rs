use operant_cache::Atom;
use std::collections::HashMap;

pub type Rgba = [u8; 4];

pub const BLACK: Rgba = [0, 0, 0, 255];
pub const WHITE: Rgba = [255, 255, 255, 255];

/// Axis-aligned bounding box in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Bounds {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn centered(center: (f32, f32), width: f32, height: f32) -> Self {
        Self::new(
            center.0 - width / 2.0,
            center.1 - height / 2.0,
            center.0 + width / 2.0,
            center.1 + height / 2.0,
        )
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Grows (or shrinks, for negative `by`) every edge
    pub fn inflate(&self, by: f32) -> Self {
        Self::new(self.x0 - by, self.y0 - by, self.x1 + by, self.y1 + by)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    fn oval_contains(&self, x: f32, y: f32) -> bool {
        let (cx, cy) = self.center();
        let rx = self.width() / 2.0;
        let ry = self.height() / 2.0;
        if rx <= 0.0 || ry <= 0.0 {
            return false;
        }
        let dx = (x - cx) / rx;
        let dy = (y - cy) / ry;
        dx * dx + dy * dy <= 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect,
    Oval,
    Image { id: Atom },
    Text { content: Atom, size: f32 },
}

/// One primitive on the canvas, stacked in drawing order
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub shape: Shape,
    pub bounds: Bounds,
    pub fill: Option<Rgba>,
    pub outline: Option<Rgba>,
    pub tag: Option<Atom>,
}

impl DrawItem {
    /// Text and unfilled outlines let clicks through to whatever lies beneath
    fn is_hit_target(&self) -> bool {
        match self.shape {
            Shape::Text { .. } => false,
            Shape::Image { .. } => true,
            Shape::Rect | Shape::Oval => self.fill.is_some(),
        }
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        match self.shape {
            Shape::Oval => self.bounds.oval_contains(x, y),
            _ => self.bounds.contains(x, y),
        }
    }
}

/// What a bound canvas region does when pecked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickAction {
    ItiPeck,
    BackgroundPeck,
    StartSignalPress,
    KeyPeck,
    /// Painting on the post-session reward screen
    RewardPeck,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("presentation surface is no longer attached to a window")]
    Detached,
}

/// Drawing capability the session runner presents trials on
pub trait Surface {
    /// Removes every item and binding
    fn clear(&mut self) -> Result<(), SurfaceError>;
    fn draw_rect(
        &mut self,
        bounds: Bounds,
        fill: Option<Rgba>,
        outline: Option<Rgba>,
        tag: Option<&str>,
    );
    fn draw_oval(
        &mut self,
        bounds: Bounds,
        fill: Option<Rgba>,
        outline: Option<Rgba>,
        tag: Option<&str>,
    );
    fn draw_image(&mut self, center: (f32, f32), size: (f32, f32), image: &str, tag: Option<&str>);
    fn draw_text(&mut self, center: (f32, f32), text: &str, size: f32, color: Rgba);
    /// Binds every item carrying `tag`, replacing any earlier binding
    fn bind_click(&mut self, tag: &str, action: ClickAction);
    /// Resolves a click against the topmost item under the pointer
    fn hit(&self, x: f32, y: f32) -> Option<ClickAction>;
}

/// Headless retained canvas: an ordered item list plus tag bindings
#[derive(Debug, Default, Clone)]
pub struct DisplayList {
    items: Vec<DrawItem>,
    bindings: HashMap<Atom, ClickAction>,
    generation: u64,
    detached: bool,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn binding(&self, tag: &str) -> Option<ClickAction> {
        self.bindings.get(&Atom::from(tag)).copied()
    }

    /// Bumped on every mutation, so renderers can skip unchanged frames
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks the backing window as gone; later draws are dropped
    pub fn detach(&mut self) {
        self.detached = true;
        self.items.clear();
        self.bindings.clear();
        self.generation += 1;
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Texts currently on screen, topmost last
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match &item.shape {
            Shape::Text { content, .. } => Some(content.as_ref()),
            _ => None,
        })
    }

    fn push(&mut self, item: DrawItem) {
        if self.detached {
            return;
        }
        self.items.push(item);
        self.generation += 1;
    }
}

impl Surface for DisplayList {
    fn clear(&mut self) -> Result<(), SurfaceError> {
        if self.detached {
            return Err(SurfaceError::Detached);
        }
        self.items.clear();
        self.bindings.clear();
        self.generation += 1;
        Ok(())
    }

    fn draw_rect(
        &mut self,
        bounds: Bounds,
        fill: Option<Rgba>,
        outline: Option<Rgba>,
        tag: Option<&str>,
    ) {
        self.push(DrawItem {
            shape: Shape::Rect,
            bounds,
            fill,
            outline,
            tag: tag.map(Atom::from),
        });
    }

    fn draw_oval(
        &mut self,
        bounds: Bounds,
        fill: Option<Rgba>,
        outline: Option<Rgba>,
        tag: Option<&str>,
    ) {
        self.push(DrawItem {
            shape: Shape::Oval,
            bounds,
            fill,
            outline,
            tag: tag.map(Atom::from),
        });
    }

    fn draw_image(&mut self, center: (f32, f32), size: (f32, f32), image: &str, tag: Option<&str>) {
        self.push(DrawItem {
            shape: Shape::Image { id: Atom::from(image) },
            bounds: Bounds::centered(center, size.0, size.1),
            fill: None,
            outline: None,
            tag: tag.map(Atom::from),
        });
    }

    fn draw_text(&mut self, center: (f32, f32), text: &str, size: f32, color: Rgba) {
        self.push(DrawItem {
            shape: Shape::Text {
                content: Atom::from(text),
                size,
            },
            bounds: Bounds::new(center.0, center.1, center.0, center.1),
            fill: Some(color),
            outline: None,
            tag: None,
        });
    }

    fn bind_click(&mut self, tag: &str, action: ClickAction) {
        if self.detached {
            return;
        }
        self.bindings.insert(Atom::from(tag), action);
    }

    fn hit(&self, x: f32, y: f32) -> Option<ClickAction> {
        let item = self
            .items
            .iter()
            .rev()
            .find(|item| item.is_hit_target() && item.contains(x, y))?;
        item.tag.as_ref().and_then(|tag| self.bindings.get(tag)).copied()
    }
}
