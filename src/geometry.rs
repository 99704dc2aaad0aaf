use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in normalized image coordinates (0.0 ..= 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The whole image
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn width(&self) -> f32 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.max_y - self.min_y).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Overlapping region, `None` when the rectangles do not overlap
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let rect = Rect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );

        if rect.max_x > rect.min_x && rect.max_y > rect.min_y {
            Some(rect)
        } else {
            None
        }
    }

    /// Intersection over union. Two empty rectangles have an IOU of 0.
    pub fn iou(&self, other: &Rect) -> f32 {
        let intersection = match self.intersection(other) {
            Some(rect) => rect.area(),
            None => return 0.0,
        };
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// True when the rectangle is non-degenerate and lies within the unit square
    pub fn is_valid_normalized(&self) -> bool {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());

        finite
            && self.min_x >= 0.0
            && self.min_y >= 0.0
            && self.max_x <= 1.0
            && self.max_y <= 1.0
            && self.max_x > self.min_x
            && self.max_y > self.min_y
    }

    /// Grow the rectangle by `padding` (fraction of its own size) on each side,
    /// clamped to the unit square
    pub fn padded(&self, padding: f32) -> Rect {
        let dx = self.width() * padding;
        let dy = self.height() * padding;
        Rect::new(
            self.min_x - dx,
            self.min_y - dy,
            self.max_x + dx,
            self.max_y + dy,
        )
        .clamped()
    }

    pub fn clamped(&self) -> Rect {
        Rect::new(
            self.min_x.clamp(0.0, 1.0),
            self.min_y.clamp(0.0, 1.0),
            self.max_x.clamp(0.0, 1.0),
            self.max_y.clamp(0.0, 1.0),
        )
    }

    /// Map a rectangle expressed relative to `region` back into the
    /// coordinate space `region` itself is expressed in
    pub fn to_outer(&self, region: &Rect) -> Rect {
        let w = region.width();
        let h = region.height();
        Rect::new(
            region.min_x + self.min_x * w,
            region.min_y + self.min_y * h,
            region.min_x + self.max_x * w,
            region.min_y + self.max_y * h,
        )
    }

    /// Convert to integer pixel bounds `(x, y, width, height)` for an image
    /// of the given size, rounding edges to the nearest pixel. Always at
    /// least one pixel wide and tall.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let rect = self.clamped();
        let x0 = (rect.min_x * width as f32).round() as u32;
        let y0 = (rect.min_y * height as f32).round() as u32;
        let x1 = ((rect.max_x * width as f32).round() as u32).min(width);
        let y1 = ((rect.max_y * height as f32).round() as u32).min(height);
        let x0 = x0.min(width.saturating_sub(1));
        let y0 = y0.min(height.saturating_sub(1));
        (x0, y0, x1.saturating_sub(x0).max(1), y1.saturating_sub(y0).max(1))
    }
}

/// The largest centered square of a `width` x `height` frame, in normalized
/// frame coordinates
pub fn center_square(width: u32, height: u32) -> Rect {
    if width == 0 || height == 0 {
        return Rect::unit();
    }

    if width > height {
        let side = height as f32 / width as f32;
        let offset = (1.0 - side) / 2.0;
        Rect::new(offset, 0.0, offset + side, 1.0)
    } else {
        let side = width as f32 / height as f32;
        let offset = (1.0 - side) / 2.0;
        Rect::new(0.0, offset, 1.0, offset + side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = Rect::new(0.1, 0.1, 0.5, 0.5);
        let b = Rect::new(0.6, 0.6, 0.9, 0.9);

        assert!(approx(a.iou(&a), 1.0));
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(b.iou(&a), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // Equal boxes sharing half their width: 0.08 / 0.24
        let a = Rect::new(0.0, 0.0, 0.4, 0.4);
        let b = Rect::new(0.2, 0.0, 0.6, 0.4);
        assert!(approx(a.iou(&b), 1.0 / 3.0));
    }

    #[test]
    fn test_touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 0.5, 0.5);
        let b = Rect::new(0.5, 0.0, 1.0, 0.5);
        assert!(a.intersection(&b).is_none());
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_normalized_validity() {
        assert!(Rect::new(0.0, 0.0, 1.0, 1.0).is_valid_normalized());
        assert!(!Rect::new(-0.1, 0.0, 0.5, 0.5).is_valid_normalized());
        assert!(!Rect::new(0.2, 0.2, 1.2, 0.5).is_valid_normalized());
        assert!(!Rect::new(0.5, 0.5, 0.5, 0.9).is_valid_normalized());
        assert!(!Rect::new(0.1, f32::NAN, 0.5, 0.9).is_valid_normalized());
    }

    #[test]
    fn test_center_square_landscape_and_portrait() {
        let landscape = center_square(1920, 1080);
        assert!(approx(landscape.width(), 1080.0 / 1920.0));
        assert!(approx(landscape.height(), 1.0));
        assert!(approx(landscape.min_x, (1.0 - 1080.0 / 1920.0) / 2.0));

        let portrait = center_square(480, 640);
        assert!(approx(portrait.width(), 1.0));
        assert!(approx(portrait.min_y, 0.125));
        assert!(approx(portrait.max_y, 0.875));
    }

    #[test]
    fn test_to_outer_maps_crop_coordinates() {
        let crop = Rect::new(0.25, 0.0, 0.75, 1.0);
        let inner = Rect::new(0.0, 0.5, 1.0, 1.0);
        let outer = inner.to_outer(&crop);

        assert!(approx(outer.min_x, 0.25));
        assert!(approx(outer.max_x, 0.75));
        assert!(approx(outer.min_y, 0.5));
        assert!(approx(outer.max_y, 1.0));
    }

    #[test]
    fn test_padding_is_clamped() {
        let rect = Rect::new(0.0, 0.4, 0.5, 0.6).padded(0.5);
        assert_eq!(rect.min_x, 0.0);
        assert!(approx(rect.max_x, 0.75));
        assert!(approx(rect.min_y, 0.3));
        assert!(approx(rect.max_y, 0.7));
    }

    #[test]
    fn test_to_pixels_never_empty() {
        let (x, y, w, h) = Rect::new(0.5, 0.5, 0.5, 0.5).to_pixels(100, 100);
        assert_eq!((x, y), (50, 50));
        assert_eq!((w, h), (1, 1));

        let (x, y, w, h) = Rect::unit().to_pixels(64, 48);
        assert_eq!((x, y, w, h), (0, 0, 64, 48));
    }
}
