//! Contain-fit geometry between a video's intrinsic size and the drawing
//! surface that overlays it.
//!
//! The player letterboxes the picture (`object-fit: contain`), so source
//! coordinates have to be scaled by the fitted size and shifted by the
//! letterbox offset before they line up with the visible picture.

use crate::detection::BoundingBox;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// `true` when both dimensions are positive and finite.
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

/// Axis-aligned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// Mapping from source-video pixels to surface pixels for one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderGeometry {
    pub render_width: f64,
    pub render_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl RenderGeometry {
    /// Fit `video` inside `surface` preserving aspect ratio.
    ///
    /// A video relatively wider than the surface fills the surface width
    /// and is centred vertically; otherwise it fills the height and is
    /// centred horizontally. Returns `None` while either size is unknown
    /// or degenerate.
    pub fn contain(video: Size, surface: Size) -> Option<Self> {
        if !video.is_usable() || !surface.is_usable() {
            return None;
        }

        let video_aspect = video.aspect();
        let (render_width, render_height, offset_x, offset_y) = if video_aspect > surface.aspect() {
            let render_height = surface.width / video_aspect;
            (
                surface.width,
                render_height,
                0.0,
                (surface.height - render_height) / 2.0,
            )
        } else {
            let render_width = surface.height * video_aspect;
            (
                render_width,
                surface.height,
                (surface.width - render_width) / 2.0,
                0.0,
            )
        };

        Some(Self {
            render_width,
            render_height,
            offset_x,
            offset_y,
            scale_x: render_width / video.width,
            scale_y: render_height / video.height,
        })
    }

    /// Map a source-space box onto the surface.
    ///
    /// Returns `None` when the mapped width or height is not positive.
    pub fn map_box(&self, b: &BoundingBox) -> Option<Rect> {
        let width = b.width() * self.scale_x;
        let height = b.height() * self.scale_y;
        if !(width > 0.0 && height > 0.0) {
            return None;
        }
        Some(Rect {
            x: b.x1 * self.scale_x + self.offset_x,
            y: b.y1 * self.scale_y + self.offset_y,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn wide_video_fits_width_and_letterboxes_vertically() {
        let g = RenderGeometry::contain(Size::new(1920.0, 1080.0), Size::new(800.0, 600.0)).unwrap();
        assert!(approx(g.render_width, 800.0));
        assert!(approx(g.render_height, 450.0));
        assert!(approx(g.offset_x, 0.0));
        assert!(approx(g.offset_y, 75.0));
    }

    #[test]
    fn bottom_right_quadrant_maps_into_picture() {
        let g = RenderGeometry::contain(Size::new(1920.0, 1080.0), Size::new(800.0, 600.0)).unwrap();
        let b = BoundingBox::parse("960,540,1920,1080").unwrap();
        let r = g.map_box(&b).unwrap();
        assert!(approx(r.x, 400.0));
        assert!(approx(r.y, 300.0));
        assert!(approx(r.width, 400.0));
        assert!(approx(r.height, 225.0));
        // Bottom edge lands exactly on the bottom of the picture area.
        assert!(approx(r.y + r.height, g.offset_y + g.render_height));
    }

    #[test]
    fn tall_video_fits_height_and_pillarboxes() {
        let g = RenderGeometry::contain(Size::new(1080.0, 1920.0), Size::new(800.0, 600.0)).unwrap();
        assert!(approx(g.render_height, 600.0));
        assert!(approx(g.render_width, 337.5));
        assert!(approx(g.offset_x, 231.25));
        assert!(approx(g.offset_y, 0.0));
        assert!(approx(g.scale_x, g.scale_y));
    }

    #[test]
    fn equal_aspect_has_no_offsets() {
        let g = RenderGeometry::contain(Size::new(1280.0, 720.0), Size::new(640.0, 360.0)).unwrap();
        assert!(approx(g.offset_x, 0.0));
        assert!(approx(g.offset_y, 0.0));
        assert!(approx(g.scale_x, 0.5));
    }

    #[test]
    fn unknown_sizes_yield_none() {
        assert!(RenderGeometry::contain(Size::new(0.0, 0.0), Size::new(800.0, 600.0)).is_none());
        assert!(RenderGeometry::contain(Size::new(1920.0, 1080.0), Size::new(0.0, 600.0)).is_none());
        assert!(RenderGeometry::contain(Size::new(f64::NAN, 1080.0), Size::new(800.0, 600.0)).is_none());
    }

    #[test]
    fn inverted_box_rejected() {
        let g = RenderGeometry::contain(Size::new(100.0, 100.0), Size::new(100.0, 100.0)).unwrap();
        assert!(g.map_box(&BoundingBox::parse("50,50,10,90").unwrap()).is_none());
        assert!(g.map_box(&BoundingBox::parse("10,50,50,50").unwrap()).is_none());
    }
}
