use image::{Rgb, RgbImage};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::error::{Result, ScanError};

/// Frame format enumeration supporting different video formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Motion JPEG format - compressed JPEG frames
    Mjpeg,
    /// YUV 4:2:2 format - uncompressed YUV data
    Yuyv,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Mjpeg => 0, // Variable size, compressed
            FrameFormat::Yuyv => 2,
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// Camera capture settings in effect when a frame was taken
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Exposure duration in seconds
    pub exposure_duration: Option<f64>,
    /// Sensor ISO
    pub iso: Option<f32>,
    /// Lens focus position (0.0 near .. 1.0 far)
    pub lens_position: Option<f32>,
    /// Scene brightness reported by the camera
    pub brightness: Option<f32>,
    /// Whether the torch was lit
    pub torch_on: bool,
}

/// Where a frame's capture metadata comes from.
///
/// Camera collaborators usually keep one live record they update as exposure
/// settles; frames share it and the scanner copies the values out once.
#[derive(Debug, Clone)]
pub enum MetadataSource {
    Fixed(CaptureMetadata),
    Live(Arc<RwLock<CaptureMetadata>>),
}

impl MetadataSource {
    pub fn snapshot(&self) -> CaptureMetadata {
        match self {
            MetadataSource::Fixed(metadata) => metadata.clone(),
            MetadataSource::Live(shared) => shared.read().clone(),
        }
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Wall-clock capture time
    pub timestamp: SystemTime,
    /// Monotonic capture time, used for every elapsed-time decision
    pub captured_at: Instant,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
    /// Capture metadata, possibly still changing
    pub metadata: MetadataSource,
}

impl FrameData {
    /// Create a new frame data instance captured now
    pub fn new(id: u64, data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            captured_at: Instant::now(),
            data: Arc::new(data),
            width,
            height,
            format,
            metadata: MetadataSource::Fixed(CaptureMetadata::default()),
        }
    }

    /// Wrap an already decoded RGB image
    pub fn from_rgb_image(id: u64, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(id, image.into_raw(), width, height, FrameFormat::Rgb24)
    }

    /// Override the monotonic capture time
    pub fn with_captured_at(mut self, captured_at: Instant) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn with_metadata(mut self, metadata: CaptureMetadata) -> Self {
        self.metadata = MetadataSource::Fixed(metadata);
        self
    }

    pub fn with_live_metadata(mut self, metadata: Arc<RwLock<CaptureMetadata>>) -> Self {
        self.metadata = MetadataSource::Live(metadata);
        self
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true,
        }
    }

    /// Decode the frame into an RGB image
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        if !self.validate_size() {
            return Err(ScanError::frame(format!(
                "frame {} holds {} bytes, expected {:?} for {}x{} {:?}",
                self.id,
                self.data.len(),
                self.expected_size(),
                self.width,
                self.height,
                self.format
            )));
        }

        match self.format {
            FrameFormat::Rgb24 => RgbImage::from_raw(self.width, self.height, self.data.to_vec())
                .ok_or_else(|| ScanError::frame("failed to create RGB image from raw data")),
            FrameFormat::Yuyv => Ok(self.yuyv_to_rgb()),
            FrameFormat::Mjpeg => Ok(image::load_from_memory(&self.data)?.to_rgb8()),
        }
    }

    /// Expand the luma plane of a YUYV frame into grey RGB
    fn yuyv_to_rgb(&self) -> RgbImage {
        let width = self.width;
        let mut image = RgbImage::new(width, self.height);

        // YUYV: Y0 U Y1 V (4 bytes for 2 pixels)
        for (index, luma) in self.data.iter().step_by(2).enumerate() {
            let x = index as u32 % width;
            let y = index as u32 / width;
            if y >= self.height {
                break;
            }
            image.put_pixel(x, y, Rgb([*luma, *luma, *luma]));
        }

        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format_properties() {
        assert_eq!(FrameFormat::Mjpeg.bytes_per_pixel(), 0);
        assert_eq!(FrameFormat::Yuyv.bytes_per_pixel(), 2);
        assert_eq!(FrameFormat::Rgb24.bytes_per_pixel(), 3);
        assert!(FrameFormat::Mjpeg.is_compressed());
        assert!(!FrameFormat::Rgb24.is_compressed());
    }

    #[test]
    fn test_frame_size_validation() {
        let valid = FrameData::new(1, vec![0u8; 64 * 48 * 3], 64, 48, FrameFormat::Rgb24);
        assert!(valid.validate_size());

        let invalid = FrameData::new(2, vec![0u8; 100], 64, 48, FrameFormat::Yuyv);
        assert!(!invalid.validate_size());
        assert!(invalid.to_rgb_image().is_err());

        let mjpeg = FrameData::new(3, vec![0u8; 5000], 640, 480, FrameFormat::Mjpeg);
        assert!(mjpeg.validate_size());
    }

    #[test]
    fn test_yuyv_luma_expansion() {
        // 2x1 frame: Y0=10 U Y1=200 V
        let frame = FrameData::new(1, vec![10, 128, 200, 128], 2, 1, FrameFormat::Yuyv);
        let image = frame.to_rgb_image().unwrap();

        assert_eq!(image.get_pixel(0, 0), &Rgb([10, 10, 10]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([200, 200, 200]));
    }

    #[test]
    fn test_live_metadata_snapshot_is_detached() {
        let live = Arc::new(RwLock::new(CaptureMetadata {
            iso: Some(100.0),
            ..Default::default()
        }));
        let frame = FrameData::new(1, vec![0u8; 3], 1, 1, FrameFormat::Rgb24)
            .with_live_metadata(Arc::clone(&live));

        let snapshot = frame.metadata.snapshot();
        live.write().iso = Some(800.0);

        assert_eq!(snapshot.iso, Some(100.0));
        assert_eq!(frame.metadata.snapshot().iso, Some(800.0));
    }

    #[test]
    fn test_corrupt_mjpeg_is_an_error() {
        let frame = FrameData::new(1, vec![0u8; 16], 4, 4, FrameFormat::Mjpeg);
        assert!(matches!(frame.to_rgb_image(), Err(ScanError::Image(_))));
    }
}
