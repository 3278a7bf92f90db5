//! Overlay drawing.
//!
//! [`OverlayRenderer::draw`] repaints the whole surface from the current
//! detection set on every call; nothing is carried over between calls, so
//! it is safe to invoke once per displayed frame.

use roadwatch_core::detection::{Detection, Rgb};
use roadwatch_core::geometry::{Rect, RenderGeometry, Size};

/// Stroke width of detection rectangles.
pub const BOX_LINE_WIDTH: f64 = 3.0;

/// Height of the label background above a box.
pub const LABEL_HEIGHT: f64 = 24.0;

/// Horizontal padding on each side of the label text.
pub const LABEL_PADDING: f64 = 6.0;

/// Distance from the box top edge up to the label text baseline.
pub const LABEL_BASELINE_OFFSET: f64 = 7.0;

/// Font used for detection labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFont {
    pub css: &'static str,
    pub size_px: f64,
}

impl Default for LabelFont {
    fn default() -> Self {
        Self {
            css: "14px Inter, system-ui, sans-serif",
            size_px: 14.0,
        }
    }
}

/// 2D drawing surface laid over the visible video region.
pub trait Surface: Send {
    /// Current surface size in pixels.
    fn size(&self) -> Size;

    fn resize(&mut self, size: Size);

    /// Erase everything drawn so far.
    fn clear(&mut self);

    fn stroke_rect(&mut self, rect: Rect, color: Rgb, line_width: f64);

    fn fill_rect(&mut self, rect: Rect, color: Rgb);

    /// Rendered width of `text` in `font`.
    fn measure_text(&self, text: &str, font: &LabelFont) -> f64;

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgb, font: &LabelFont);
}

/// Outcome of one [`OverlayRenderer::draw`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawReport {
    /// Detections drawn.
    pub drawn: usize,
    /// Detections skipped because their box was malformed or degenerate.
    pub skipped: usize,
    /// The video's intrinsic size was unknown, so nothing was drawn.
    pub deferred: bool,
}

#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    enabled: bool,
    font: LabelFont,
}

impl OverlayRenderer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            font: LabelFont::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Draw `detections` over a video of intrinsic size `video`.
    ///
    /// Geometry is derived from the sizes passed in on every call, so a
    /// resized surface or a newly known video size takes effect at once.
    pub fn draw(
        &self,
        surface: &mut dyn Surface,
        video: Option<Size>,
        detections: &[Detection],
    ) -> DrawReport {
        surface.clear();

        let mut report = DrawReport::default();
        if !self.enabled || detections.is_empty() {
            return report;
        }

        let Some(geometry) = video.and_then(|video| RenderGeometry::contain(video, surface.size()))
        else {
            report.deferred = true;
            return report;
        };

        for detection in detections {
            let bounding_box = match detection.parse_box() {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(frame = detection.frame_id, error = %e, "Skipping detection");
                    report.skipped += 1;
                    continue;
                }
            };
            let Some(rect) = geometry.map_box(&bounding_box) else {
                tracing::debug!(
                    frame = detection.frame_id,
                    bounding_box = ?detection.bounding_box,
                    "Detection box has no area",
                );
                report.skipped += 1;
                continue;
            };

            self.draw_detection(surface, rect, detection);
            report.drawn += 1;
        }

        report
    }

    fn draw_detection(&self, surface: &mut dyn Surface, rect: Rect, detection: &Detection) {
        let color = detection.severity.color();
        surface.stroke_rect(rect, color, BOX_LINE_WIDTH);

        let label = detection.label();
        let text_width = surface.measure_text(&label, &self.font);
        surface.fill_rect(
            Rect::new(
                rect.x,
                rect.y - LABEL_HEIGHT,
                text_width + 2.0 * LABEL_PADDING,
                LABEL_HEIGHT,
            ),
            color,
        );
        surface.fill_text(
            &label,
            rect.x + LABEL_PADDING,
            rect.y - LABEL_BASELINE_OFFSET,
            Rgb::WHITE,
            &self.font,
        );
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

/* --------------------------------------------------------------------------
Recording surface
-------------------------------------------------------------------------- */

/// A drawing operation captured by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    StrokeRect { rect: Rect, color: Rgb, line_width: f64 },
    FillRect { rect: Rect, color: Rgb },
    FillText { text: String, x: f64, y: f64, color: Rgb },
}

/// Headless surface keeping the operations issued since the last clear.
///
/// Text is measured as `0.6 × font size` per character.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    size: Size,
    ops: Vec<DrawOp>,
    clears: u64,
}

impl RecordingSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Operations currently on the surface.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Stroked rectangles currently on the surface.
    pub fn rects(&self) -> Vec<Rect> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::StrokeRect { rect, .. } => Some(*rect),
                _ => None,
            })
            .collect()
    }

    pub fn is_blank(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clears(&self) -> u64 {
        self.clears
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
        self.ops.clear();
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.clears += 1;
    }

    fn stroke_rect(&mut self, rect: Rect, color: Rgb, line_width: f64) {
        self.ops.push(DrawOp::StrokeRect {
            rect,
            color,
            line_width,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn measure_text(&self, text: &str, font: &LabelFont) -> f64 {
        text.chars().count() as f64 * font.size_px * 0.6
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgb, _font: &LabelFont) {
        self.ops.push(DrawOp::FillText {
            text: text.to_string(),
            x,
            y,
            color,
        });
    }
}
