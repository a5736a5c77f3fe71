use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use anyhow::{Context, Result};
use locex_cache::{label_text, LabelId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("invalid font file {}", path.display()))
}

/// Rasterizes one line of text into a tight, transparent pixmap.
///
/// Returns `None` for text with no visible glyphs.
pub fn render_text_pixmap(text: &str, font_size: f32, font: &FontVec, color: Color) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::with_capacity(text.len());
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    let rgba = color.to_color_u8();
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

            // source-over in premultiplied space
            let a = (cov * rgba.alpha() as f32 / 255.0).clamp(0.0, 1.0);
            let inv = 1.0 - a;
            let bg = dst[i];
            let mix = |src: u8, dst: u8| (src as f32 * a + dst as f32 * inv).round() as u8;
            let alpha = (a * 255.0 + bg.alpha() as f32 * inv).round() as u8;
            let r = mix(rgba.red(), bg.red()).min(alpha);
            let g = mix(rgba.green(), bg.green()).min(alpha);
            let bl = mix(rgba.blue(), bg.blue()).min(alpha);
            if let Some(px) = PremultipliedColorU8::from_rgba(r, g, bl, alpha) {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextKey {
    label: LabelId,
    size_px: u32,
    rgba: [u8; 4],
}

/// Rendered label pixmaps, keyed by interned text, size and colour.
pub struct TextCache {
    font: FontVec,
    map: HashMap<TextKey, Option<Arc<Pixmap>>>,
}

impl TextCache {
    pub fn new(font: FontVec) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    pub fn get_or_render(&mut self, label: LabelId, size_px: f32, color: Color) -> Option<Arc<Pixmap>> {
        let c = color.to_color_u8();
        let key = TextKey {
            label,
            size_px: size_px.round().max(1.0) as u32,
            rgba: [c.red(), c.green(), c.blue(), c.alpha()],
        };
        if let Some(cached) = self.map.get(&key) {
            return cached.clone();
        }
        let rendered = label_text(label)
            .and_then(|text| render_text_pixmap(&text, key.size_px as f32, &self.font, color))
            .map(Arc::new);
        self.map.insert(key, rendered.clone());
        rendered
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
