use crate::text::TextCache;
use ab_glyph::FontArc;
use anyhow::{Context, Result, anyhow};
use operant_cache::Atom;
use operant_core::{Bounds, ClickAction, DisplayList, DrawItem, Rgba, Shape, Surface, SurfaceError};
use std::collections::HashMap;
use std::path::Path;
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};
use tracing::{debug, warn};

pub const CANVAS_WIDTH: u32 = 1024;
pub const CANVAS_HEIGHT: u32 = 768;

/// Uniform scale plus letterbox offset from the fixed canvas to a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn fit(width: u32, height: u32) -> Self {
        let sx = width as f32 / CANVAS_WIDTH as f32;
        let sy = height as f32 / CANVAS_HEIGHT as f32;
        let scale = sx.min(sy).max(f32::MIN_POSITIVE);
        Self {
            scale,
            offset_x: (width as f32 - CANVAS_WIDTH as f32 * scale) * 0.5,
            offset_y: (height as f32 - CANVAS_HEIGHT as f32 * scale) * 0.5,
            width,
            height,
        }
    }

    /// Window pixel to canvas coordinates; `None` inside the letterbox bars
    pub fn to_canvas(&self, x: f64, y: f64) -> Option<(f32, f32)> {
        let cx = (x as f32 - self.offset_x) / self.scale;
        let cy = (y as f32 - self.offset_y) / self.scale;
        let inside = (0.0..=CANVAS_WIDTH as f32).contains(&cx)
            && (0.0..=CANVAS_HEIGHT as f32).contains(&cy);
        inside.then_some((cx, cy))
    }
}

/// Window-backed presentation surface. Items go to a [`DisplayList`] for hit
/// testing and are rasterized onto a 1024×768 canvas when the list changes.
pub struct SkiaSurface {
    list: DisplayList,
    canvas: Pixmap,
    images: HashMap<Atom, Pixmap>,
    missing: Vec<Atom>,
    text_cache: Option<TextCache>,
    rendered: Option<u64>,
}

impl SkiaSurface {
    /// Without a font, text items are kept for hit testing but never drawn.
    pub fn new(font: Option<FontArc>) -> Result<Self> {
        let mut canvas = Pixmap::new(CANVAS_WIDTH, CANVAS_HEIGHT)
            .ok_or_else(|| anyhow!("cannot allocate canvas"))?;
        canvas.fill(Color::BLACK);
        if font.is_none() {
            warn!("No font loaded; on-screen text will not be drawn");
        }
        Ok(Self {
            list: DisplayList::new(),
            canvas,
            images: HashMap::new(),
            missing: Vec::new(),
            text_cache: font.map(TextCache::new),
            rendered: None,
        })
    }

    pub fn load_font(path: &Path) -> Result<FontArc> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
        FontArc::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
    }

    /// Decodes an image file, scales it to `size`×`size` and registers it
    /// under `name` for later `draw_image` calls.
    pub fn load_image(&mut self, name: &str, path: &Path, size: u32) -> Result<()> {
        let img = image::open(path)
            .with_context(|| format!("loading stimulus {}", path.display()))?
            .resize_exact(size, size, image::imageops::FilterType::Lanczos3)
            .into_rgba8();
        let (w, h) = img.dimensions();
        let mut data = img.into_raw();
        for px in data.chunks_exact_mut(4) {
            let a = px[3] as u16;
            for c in &mut px[..3] {
                *c = ((*c as u16 * a + 127) / 255) as u8;
            }
        }
        let size = IntSize::from_wh(w, h).ok_or_else(|| anyhow!("empty image {}", path.display()))?;
        let pixmap = Pixmap::from_vec(data, size)
            .ok_or_else(|| anyhow!("bad image {}", path.display()))?;
        debug!("Loaded stimulus {} ({}×{})", name, w, h);
        self.images.insert(Atom::from(name), pixmap);
        self.rendered = None;
        Ok(())
    }

    /// Loads every named file from `dir`; returns how many were loaded
    pub fn preload_stimuli<'a>(
        &mut self,
        dir: &Path,
        names: impl IntoIterator<Item = &'a str>,
        size: u32,
    ) -> Result<usize> {
        let mut loaded = 0;
        for name in names {
            if self.images.contains_key(&Atom::from(name)) {
                continue;
            }
            self.load_image(name, &dir.join(name), size)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.images.contains_key(&Atom::from(name))
    }

    pub fn display_list(&self) -> &DisplayList {
        &self.list
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Marks the window as gone
    pub fn detach(&mut self) {
        self.list.detach();
    }

    /// Redraws the canvas if the display list changed; returns whether it did
    pub fn rasterize(&mut self) -> bool {
        let generation = self.list.generation();
        if self.rendered == Some(generation) {
            return false;
        }
        self.canvas.fill(Color::BLACK);
        for item in self.list.items().to_vec() {
            self.draw_item(&item);
        }
        self.rendered = Some(generation);
        true
    }

    fn draw_item(&mut self, item: &DrawItem) {
        match &item.shape {
            Shape::Rect => {
                if let Some(rect) = to_rect(item.bounds) {
                    let path = PathBuilder::from_rect(rect);
                    self.fill_and_stroke(&path, item.fill, item.outline);
                }
            }
            Shape::Oval => {
                if let Some(path) = to_rect(item.bounds).and_then(PathBuilder::from_oval) {
                    self.fill_and_stroke(&path, item.fill, item.outline);
                }
            }
            Shape::Image { id } => {
                let Some(pm) = self.images.get(id) else {
                    if !self.missing.contains(id) {
                        warn!("Stimulus image {} was never loaded", id);
                        self.missing.push(id.clone());
                    }
                    return;
                };
                let sx = item.bounds.width() / pm.width() as f32;
                let sy = item.bounds.height() / pm.height() as f32;
                let transform =
                    Transform::from_translate(item.bounds.x0, item.bounds.y0).pre_scale(sx, sy);
                let paint = PixmapPaint {
                    quality: FilterQuality::Bilinear,
                    ..PixmapPaint::default()
                };
                self.canvas.draw_pixmap(0, 0, pm.as_ref(), &paint, transform, None);
            }
            Shape::Text { content, size } => {
                let color = item.fill.unwrap_or(operant_core::surface::WHITE);
                let Some(cache) = self.text_cache.as_mut() else {
                    return;
                };
                let Some(pm) = cache.get_or_render(content, *size, color) else {
                    return;
                };
                let (cx, cy) = item.bounds.center();
                let x = (cx - pm.width() as f32 * 0.5).round() as i32;
                let y = (cy - pm.height() as f32 * 0.5).round() as i32;
                self.canvas.draw_pixmap(
                    x,
                    y,
                    Pixmap::as_ref(&pm),
                    &PixmapPaint::default(),
                    Transform::identity(),
                    None,
                );
            }
        }
    }

    fn fill_and_stroke(
        &mut self,
        path: &tiny_skia::Path,
        fill: Option<Rgba>,
        outline: Option<Rgba>,
    ) {
        if let Some(c) = fill {
            self.canvas
                .fill_path(path, &paint(c), FillRule::Winding, Transform::identity(), None);
        }
        if let Some(c) = outline {
            let stroke = Stroke {
                width: 1.0,
                ..Stroke::default()
            };
            self.canvas
                .stroke_path(path, &paint(c), &stroke, Transform::identity(), None);
        }
    }

    /// Copies the canvas into an RGBA frame buffer of `viewport` size,
    /// nearest-neighbour scaled and letterboxed in black.
    pub fn present(&self, viewport: &Viewport, frame: &mut [u8]) {
        let (fw, fh) = (viewport.width as usize, viewport.height as usize);
        if frame.len() < fw * fh * 4 {
            return;
        }
        let src = self.canvas.data();
        let src_stride = CANVAS_WIDTH as usize * 4;
        for y in 0..fh {
            let cy = (y as f32 + 0.5 - viewport.offset_y) / viewport.scale;
            let row = &mut frame[y * fw * 4..(y + 1) * fw * 4];
            if cy < 0.0 || cy >= CANVAS_HEIGHT as f32 {
                row.chunks_exact_mut(4).for_each(|px| px.copy_from_slice(&[0, 0, 0, 255]));
                continue;
            }
            let src_row = &src[cy as usize * src_stride..(cy as usize + 1) * src_stride];
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let cx = (x as f32 + 0.5 - viewport.offset_x) / viewport.scale;
                if cx < 0.0 || cx >= CANVAS_WIDTH as f32 {
                    px.copy_from_slice(&[0, 0, 0, 255]);
                } else {
                    let i = cx as usize * 4;
                    px.copy_from_slice(&src_row[i..i + 4]);
                }
            }
        }
    }
}

fn to_rect(b: Bounds) -> Option<Rect> {
    Rect::from_ltrb(b.x0, b.y0, b.x1, b.y1)
}

fn paint(c: Rgba) -> Paint<'static> {
    let mut p = Paint::default();
    p.set_color_rgba8(c[0], c[1], c[2], c[3]);
    p
}

impl Surface for SkiaSurface {
    fn clear(&mut self) -> Result<(), SurfaceError> {
        self.list.clear()
    }

    fn draw_rect(
        &mut self,
        bounds: Bounds,
        fill: Option<Rgba>,
        outline: Option<Rgba>,
        tag: Option<&str>,
    ) {
        self.list.draw_rect(bounds, fill, outline, tag);
    }

    fn draw_oval(
        &mut self,
        bounds: Bounds,
        fill: Option<Rgba>,
        outline: Option<Rgba>,
        tag: Option<&str>,
    ) {
        self.list.draw_oval(bounds, fill, outline, tag);
    }

    fn draw_image(&mut self, center: (f32, f32), size: (f32, f32), image: &str, tag: Option<&str>) {
        self.list.draw_image(center, size, image, tag);
    }

    fn draw_text(&mut self, center: (f32, f32), text: &str, size: f32, color: Rgba) {
        self.list.draw_text(center, text, size, color);
    }

    fn bind_click(&mut self, tag: &str, action: ClickAction) {
        self.list.bind_click(tag, action);
    }

    fn hit(&self, x: f32, y: f32) -> Option<ClickAction> {
        self.list.hit(x, y)
    }
}
