//! QR code decoding for the secondary signal, backed by `rqrr`.

use image::{imageops, RgbImage};
use tracing::{debug, trace};

use crate::analyzer::secondary::{SecondarySignal, SignalBackend, Symbology};
use crate::error::SignalError;
use crate::geometry::Rect;

/// Finds and decodes the first QR code inside the region of interest
#[derive(Debug, Clone, Default)]
pub struct RqrrBackend;

impl RqrrBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SignalBackend for RqrrBackend {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn find(&self, image: &RgbImage, region: Rect) -> Result<Option<SecondarySignal>, SignalError> {
        let region = region.clamped();
        if region.area() <= 0.0 {
            return Err(SignalError::EmptyRegion);
        }

        let (image_w, image_h) = image.dimensions();
        let (x, y, w, h) = region.to_pixels(image_w, image_h);
        let gray = imageops::grayscale(&imageops::crop_imm(image, x, y, w, h).to_image());

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            w as usize,
            h as usize,
            |px, py| gray.get_pixel(px as u32, py as u32)[0],
        );
        let grids = prepared.detect_grids();
        trace!("rqrr found {} candidate grids in {}x{} region", grids.len(), w, h);

        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    let xs = grid.bounds.iter().map(|p| p.x);
                    let ys = grid.bounds.iter().map(|p| p.y);
                    let (min_x, max_x) = (xs.clone().min().unwrap_or(0), xs.max().unwrap_or(0));
                    let (min_y, max_y) = (ys.clone().min().unwrap_or(0), ys.max().unwrap_or(0));

                    let to_norm_x = |v: i32| (x as f32 + v as f32) / image_w as f32;
                    let to_norm_y = |v: i32| (y as f32 + v as f32) / image_h as f32;
                    let bounds = Rect::new(
                        to_norm_x(min_x),
                        to_norm_y(min_y),
                        to_norm_x(max_x),
                        to_norm_y(max_y),
                    )
                    .clamped();

                    return Ok(Some(SecondarySignal {
                        symbology: Symbology::Qr,
                        payload: content,
                        bounds: Some(bounds),
                    }));
                }
                Err(e) => {
                    debug!("QR grid failed to decode: {}", e);
                    last_error = Some(e);
                }
            }
        }

        // Grids were located but none decoded
        match last_error {
            Some(e) => Err(SignalError::Decode {
                details: e.to_string(),
            }),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_blank_image_has_no_code() {
        let image = RgbImage::from_pixel(120, 80, Rgb([255, 255, 255]));
        let result = RqrrBackend::new().find(&image, Rect::unit()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_region_is_rejected() {
        let image = RgbImage::new(40, 40);
        let result = RqrrBackend::new().find(&image, Rect::new(0.5, 0.5, 0.5, 0.9));
        assert!(matches!(result, Err(SignalError::EmptyRegion)));
    }
}
