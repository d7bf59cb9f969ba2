use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use operant_cache::Atom;
use operant_core::Rgba;
use std::collections::HashMap;
use std::sync::Arc;
use tiny_skia::{Pixmap, PremultipliedColorU8};

/// Rendered captions, keyed by content, size and colour
pub struct TextCache {
    font: FontArc,
    map: HashMap<(Atom, u32, Rgba), Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    pub fn get_or_render(&mut self, text: &Atom, size_px: f32, color: Rgba) -> Option<Arc<Pixmap>> {
        let key = (text.clone(), size_px.to_bits(), color);
        if let Some(p) = self.map.get(&key) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(text.as_ref(), size_px, &self.font, color)?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Rasterizes `text` into a tight, transparent pixmap. Lines split on `\n`
/// are centred on each other. `None` when nothing in the text has an outline.
pub fn render_text_pixmap(
    text: &str,
    font_size: f32,
    font: &FontArc,
    color: Rgba,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);
    let line_height = sf.height() + sf.line_gap();

    // 1) Layout each line from x = 0, baseline at ascent
    let mut lines: Vec<(Vec<Glyph>, f32)> = Vec::new();
    for (row, line) in text.split('\n').enumerate() {
        let baseline = sf.ascent() + row as f32 * line_height;
        let mut pen_x = 0.0f32;
        let mut glyphs = Vec::<Glyph>::new();
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = glyphs.last() {
                pen_x += sf.kern(prev.id, id);
            }
            glyphs.push(Glyph {
                id,
                scale,
                position: point(pen_x, baseline),
            });
            pen_x += sf.h_advance(id);
        }
        lines.push((glyphs, pen_x));
    }

    // 2) Centre lines on the widest one
    let widest = lines.iter().map(|(_, w)| *w).fold(0.0f32, f32::max);
    let glyphs: Vec<Glyph> = lines
        .into_iter()
        .flat_map(|(glyphs, w)| {
            let shift = (widest - w) * 0.5;
            glyphs.into_iter().map(move |mut g| {
                g.position.x += shift;
                g
            })
        })
        .collect();

    // 3) Union pixel bounds from outlined glyphs
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    if outlines.is_empty() {
        return None;
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;

    // 4) Coverage blended over transparent, premultiplied
    let stride = w as usize;
    let dst = pm.pixels_mut();
    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let premul = |c: u8| ((c as f32 * a) as u8).min(sa);
            let bg = dst[i];
            let inv = 1.0 - a;
            let over = |s: u8, d: u8| s.saturating_add((d as f32 * inv) as u8);
            let r = over(premul(color[0]), bg.red());
            let g = over(premul(color[1]), bg.green());
            let bl = over(premul(color[2]), bg.blue());
            let al = over(sa, bg.alpha());
            let px = PremultipliedColorU8::from_rgba(r.min(al), g.min(al), bl.min(al), al);
            if let Some(px) = px {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}
