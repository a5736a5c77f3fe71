use crate::camera::{OrbitCamera, Projected};
use crate::text::TextCache;
use ab_glyph::FontVec;
use anyhow::{bail, Context, Result};
use locex_cache::{degree_label, intern_label, LabelId};
use locex_core::{SphericalCoordinate, TargetGrid};
use locex_timing::Timer;
use std::time::Duration;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform};

const BACKGROUND: [u8; 4] = [18, 20, 28, 255];
const RING_FRONT: [u8; 4] = [120, 130, 160, 255];
const RING_BACK: [u8; 4] = [50, 55, 70, 255];
const DOT_IDLE: [u8; 4] = [235, 235, 235, 255];
const DOT_ACTIVE: [u8; 4] = [250, 210, 40, 255];
const DOT_TRUTH: [u8; 4] = [230, 50, 50, 255];
const TEXT: [u8; 4] = [255, 255, 255, 255];
const TEXT_DIM: [u8; 4] = [170, 170, 180, 255];

const RING_SEGMENTS: usize = 72;
const LABEL_STEP: f32 = 30.0;
const LABEL_RADIUS: f32 = 1.14;

const TITLE_PX: f32 = 34.0;
const BODY_PX: f32 = 24.0;
const SMALL_PX: f32 = 18.0;

/// What the stage shows around (or instead of) the sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overlay<'a> {
    /// Experiment, samples or cues are still being fetched.
    Loading,
    FetchError,
    Start { ready: bool },
    /// Pre-roll confirmation before the first trial.
    Ready,
    Trial,
    End { status: &'a str },
}

/// A snapshot of everything the stage needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageView<'a> {
    pub overlay: Overlay<'a>,
    pub experiment_name: &'a str,
    pub progress: Option<(usize, usize)>,
    pub selection: Option<SphericalCoordinate>,
    pub hover: Option<SphericalCoordinate>,
    pub highlight: Option<SphericalCoordinate>,
    pub training: bool,
    pub can_verify: bool,
    pub can_advance: bool,
}

impl<'a> StageView<'a> {
    pub fn new(overlay: Overlay<'a>, experiment_name: &'a str) -> Self {
        Self {
            overlay,
            experiment_name,
            progress: None,
            selection: None,
            hover: None,
            highlight: None,
            training: false,
            can_verify: false,
            can_advance: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub sphere: Duration,
    pub text: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dots: usize,
}

/// Draws the localization stage into an RGBA frame buffer.
pub struct StageRenderer {
    width: u32,
    height: u32,
    canvas: Pixmap,
    camera: OrbitCamera,
    grid: TargetGrid,
    text: Option<TextCache>,
    targets: Vec<SphericalCoordinate>,
}

impl StageRenderer {
    /// Without a font the stage still draws every shape but no text.
    pub fn new(width: u32, height: u32, font: Option<FontVec>) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .with_context(|| format!("cannot allocate {width}x{height} canvas"))?;
        let grid = TargetGrid::default();
        Ok(Self {
            width,
            height,
            canvas,
            camera: OrbitCamera::new(width, height),
            targets: grid.targets(),
            grid,
            text: font.map(TextCache::new),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width, height)
            .with_context(|| format!("cannot allocate {width}x{height} canvas"))?;
        self.width = width;
        self.height = height;
        self.camera.resize(width, height);
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn grid(&self) -> &TargetGrid {
        &self.grid
    }

    pub fn has_font(&self) -> bool {
        self.text.is_some()
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Grid target under the pointer, snapped, ignoring the sphere's far side.
    pub fn pick(&self, screen_x: f32, screen_y: f32) -> Option<SphericalCoordinate> {
        self.camera
            .pick(&self.grid, screen_x, screen_y, self.pick_tolerance())
    }

    fn pick_tolerance(&self) -> f32 {
        (self.camera.scale() * 0.09).max(6.0)
    }

    /// Draws `view` and copies the result into `frame` (RGBA8, row-major).
    pub fn render_frame<T: Timer>(
        &mut self,
        view: &StageView<'_>,
        frame: &mut [u8],
        timer: &T,
    ) -> Result<FrameStats> {
        let start = timer.now();
        self.canvas.fill(rgba(BACKGROUND));

        let t = timer.now();
        let dots = if view.overlay == Overlay::Trial {
            self.draw_sphere(view)
        } else {
            0
        };
        let sphere = timer.elapsed(t);

        let t = timer.now();
        self.draw_overlay(view);
        let text = timer.elapsed(t);

        let t = timer.now();
        let data = self.canvas.data();
        if frame.len() != data.len() {
            bail!(
                "frame buffer is {} bytes, canvas is {}",
                frame.len(),
                data.len()
            );
        }
        // the canvas is fully opaque, so premultiplied equals straight alpha
        frame.copy_from_slice(data);
        let copy = timer.elapsed(t);

        Ok(FrameStats {
            sphere,
            text,
            copy,
            total: timer.elapsed(start),
            dots,
        })
    }

    fn draw_sphere(&mut self, view: &StageView<'_>) -> usize {
        let camera = self.camera.clone();

        let mut front = PathBuilder::new();
        let mut back = PathBuilder::new();
        for azimuth in self.grid.azimuth_angles() {
            let ring = (0..=RING_SEGMENTS).map(|i| {
                let elevation = -90.0 + 180.0 * i as f32 / RING_SEGMENTS as f32;
                camera.project(SphericalCoordinate { azimuth, elevation }, 1.0)
            });
            push_polyline(&mut front, &mut back, ring);
        }
        let equator = (0..=RING_SEGMENTS).map(|i| {
            let azimuth = 360.0 * i as f32 / RING_SEGMENTS as f32;
            camera.project(SphericalCoordinate { azimuth, elevation: 0.0 }, 1.0)
        });
        push_polyline(&mut front, &mut back, equator);

        self.stroke(back, RING_BACK, 1.0);
        self.stroke(front, RING_FRONT, 1.5);

        let hover = if view.highlight.is_some() { None } else { view.hover };
        let mut dots: Vec<(Projected, [u8; 4], f32)> = self
            .targets
            .iter()
            .map(|target| {
                let p = camera.project(*target, 1.0);
                let color = if Some(*target) == view.highlight {
                    DOT_TRUTH
                } else if Some(*target) == view.selection || Some(*target) == hover {
                    DOT_ACTIVE
                } else {
                    DOT_IDLE
                };
                let radius = if p.is_front() { 4.0 } else { 2.0 };
                (p, dim_if_back(color, p), radius)
            })
            .collect();

        // ground truth may sit off-grid
        if let Some(truth) = view.highlight {
            if !self.grid.contains(truth) {
                let p = camera.project(truth, 1.0);
                dots.push((p, dim_if_back(DOT_TRUTH, p), 5.0));
            }
        }

        dots.sort_by(|a, b| a.0.depth.total_cmp(&b.0.depth));
        for (p, color, radius) in &dots {
            self.fill_circle(p.x, p.y, *radius, *color);
        }

        for azimuth in (0..12).map(|i| i as f32 * LABEL_STEP) {
            let p = camera.project(SphericalCoordinate { azimuth, elevation: 0.0 }, LABEL_RADIUS);
            if p.is_front() {
                self.blit_label(degree_label(azimuth), SMALL_PX, TEXT_DIM, (p.x, p.y));
            }
        }

        dots.len()
    }

    fn draw_overlay(&mut self, view: &StageView<'_>) {
        let (cx, cy) = (self.width as f32 * 0.5, self.height as f32 * 0.5);
        match view.overlay {
            Overlay::Loading => {
                self.blit_text("Loading...", BODY_PX, TEXT_DIM, (cx, cy));
            }
            Overlay::FetchError => {
                self.blit_text(
                    "There was an error when fetching your data.",
                    BODY_PX,
                    TEXT,
                    (cx, cy),
                );
            }
            Overlay::Start { ready } => {
                let title = format!("You are about to start {}", view.experiment_name);
                self.blit_text(&title, TITLE_PX, TEXT, (cx, cy - 30.0));
                let hint = if ready { "Press Space to begin" } else { "Loading..." };
                self.blit_text(hint, BODY_PX, TEXT_DIM, (cx, cy + 30.0));
            }
            Overlay::Ready => {
                self.blit_text("Training is about to begin", TITLE_PX, TEXT, (cx, cy - 30.0));
                self.blit_text("Press Space when you are ready", BODY_PX, TEXT_DIM, (cx, cy + 30.0));
            }
            Overlay::Trial => self.draw_trial_overlay(view),
            Overlay::End { status } => {
                self.blit_text("Thank you!", TITLE_PX, TEXT, (cx, cy - 30.0));
                self.blit_text(status, BODY_PX, TEXT_DIM, (cx, cy + 30.0));
            }
        }
    }

    fn draw_trial_overlay(&mut self, view: &StageView<'_>) {
        let (w, h) = (self.width as f32, self.height as f32);

        let header = if view.training {
            format!("{} (training)", view.experiment_name)
        } else {
            view.experiment_name.to_owned()
        };
        self.blit_text(&header, BODY_PX, TEXT, (w * 0.5, 32.0));

        if let Some((current, total)) = view.progress {
            self.draw_progress(current, total);
        }

        if let Some(selection) = view.selection {
            let readout = format!(
                "Azimuth: {}°   Elevation: {}°",
                selection.azimuth.round() as i32,
                selection.elevation.round() as i32
            );
            self.blit_text(&readout, BODY_PX, TEXT, (w * 0.5, h - 72.0));
        }

        let hint = if view.can_verify {
            Some("Press V to verify")
        } else if view.can_advance {
            Some("Press Enter for the next sample")
        } else {
            None
        };
        if let Some(hint) = hint {
            self.blit_text(hint, SMALL_PX, TEXT_DIM, (w * 0.5, h - 40.0));
        }
    }

    /// One dot per trial, filled up to and including the current one.
    fn draw_progress(&mut self, current: usize, total: usize) {
        if total == 0 {
            return;
        }
        let spacing = (self.width as f32 * 0.6 / total as f32).clamp(4.0, 18.0);
        let radius = (spacing * 0.3).max(1.5);
        let start_x = self.width as f32 * 0.5 - spacing * (total - 1) as f32 * 0.5;
        let y = 64.0;
        for i in 0..total {
            let color = if i < current { DOT_ACTIVE } else { RING_BACK };
            self.fill_circle(start_x + i as f32 * spacing, y, radius, color);
        }
    }

    fn stroke(&mut self, builder: PathBuilder, color: [u8; 4], width: f32) {
        let Some(path) = builder.finish() else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(rgba(color));
        paint.anti_alias = true;
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.canvas
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: [u8; 4]) {
        let Some(path) = PathBuilder::from_circle(x, y, radius) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(rgba(color));
        paint.anti_alias = true;
        self.canvas
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    fn blit_text(&mut self, text: &str, size_px: f32, color: [u8; 4], center: (f32, f32)) {
        if self.text.is_none() || text.is_empty() {
            return;
        }
        self.blit_label(intern_label(text), size_px, color, center);
    }

    fn blit_label(&mut self, label: LabelId, size_px: f32, color: [u8; 4], center: (f32, f32)) {
        let Some(cache) = self.text.as_mut() else {
            return;
        };
        let Some(pm) = cache.get_or_render(label, size_px, rgba(color)) else {
            return;
        };
        let pm: &Pixmap = &pm;
        let (w, h) = (pm.width() as i32, pm.height() as i32);
        let x = (center.0 - w as f32 * 0.5).round() as i32;
        let y = (center.1 - h as f32 * 0.5).round() as i32;
        if x + w <= 0 || y + h <= 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        self.canvas.draw_pixmap(
            x,
            y,
            pm.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

fn rgba(c: [u8; 4]) -> Color {
    Color::from_rgba8(c[0], c[1], c[2], c[3])
}

fn dim_if_back(color: [u8; 4], p: Projected) -> [u8; 4] {
    if p.is_front() {
        return color;
    }
    [color[0] / 3, color[1] / 3, color[2] / 3, color[3]]
}

/// Splits a projected polyline into front-facing and back-facing segments.
fn push_polyline(front: &mut PathBuilder, back: &mut PathBuilder, points: impl Iterator<Item = Projected>) {
    let mut prev: Option<Projected> = None;
    for p in points {
        if let Some(q) = prev {
            let target = if (q.depth + p.depth) * 0.5 >= 0.0 {
                &mut *front
            } else {
                &mut *back
            };
            target.move_to(q.x, q.y);
            target.line_to(p.x, p.y);
        }
        prev = Some(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locex_timing::ManualTimer;

    fn pixel(r: &StageRenderer, x: u32, y: u32) -> [u8; 4] {
        let c = r
            .canvas()
            .pixel(x, y)
            .expect("pixel in bounds")
            .demultiply();
        [c.red(), c.green(), c.blue(), c.alpha()]
    }

    #[test]
    fn renders_without_font() {
        let mut r = StageRenderer::new(320, 240, None).unwrap();
        let mut frame = vec![0u8; 320 * 240 * 4];
        let view = StageView {
            progress: Some((1, 3)),
            ..StageView::new(Overlay::Trial, "Frontal plane")
        };
        let stats = r.render_frame(&view, &mut frame, &ManualTimer::new()).unwrap();
        assert_eq!(stats.dots, TargetGrid::default().targets().len());
        assert_eq!(&frame[..], r.canvas().data());
        assert!(frame.chunks(4).all(|px| px[3] == 255));
    }

    #[test]
    fn highlight_is_drawn_in_red() {
        let mut r = StageRenderer::new(400, 400, None).unwrap();
        r.camera_mut().orbit(0.0, -crate::camera::DEFAULT_PITCH);
        let mut frame = vec![0u8; 400 * 400 * 4];
        let truth = SphericalCoordinate::new(0.0, 0.0);
        let view = StageView {
            selection: Some(SphericalCoordinate::new(15.0, 0.0)),
            highlight: Some(truth),
            training: true,
            can_advance: true,
            ..StageView::new(Overlay::Trial, "t")
        };
        r.render_frame(&view, &mut frame, &ManualTimer::new()).unwrap();
        let p = r.camera().project(truth, 1.0);
        let [red, green, blue, _] = pixel(&r, p.x as u32, p.y as u32);
        assert!(red > 200 && green < 100 && blue < 100, "got {red},{green},{blue}");
    }

    #[test]
    fn rejects_mismatched_frame() {
        let mut r = StageRenderer::new(64, 64, None).unwrap();
        let mut frame = vec![0u8; 10];
        let view = StageView::new(Overlay::Loading, "");
        assert!(r.render_frame(&view, &mut frame, &ManualTimer::new()).is_err());
    }

    #[test]
    fn pick_goes_through_camera() {
        let mut r = StageRenderer::new(600, 600, None).unwrap();
        r.resize(800, 600).unwrap();
        let target = SphericalCoordinate::new(345.0, 30.0);
        let p = r.camera().project(target, 1.0);
        assert_eq!(r.pick(p.x, p.y), Some(target));
    }

    #[test]
    fn zero_sized_canvas_is_an_error() {
        assert!(StageRenderer::new(0, 10, None).is_err());
    }
}
