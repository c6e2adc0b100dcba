//! Frame conversion helpers: inference buffers, captures and uploads

use crate::error::ScanError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageFormat, RgbaImage};
use nutriscan_core::{ImageBlob, ImageSource};
use std::fmt;

const RGBA_CHANNELS: usize = 4;

/// Raw RGBA samples at a fixed resolution, handed to the recognition worker.
///
/// Deliberately not `Clone`: sending a buffer to the worker moves it, and the
/// sender has nothing left to read.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ScanError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|p| p.checked_mul(RGBA_CHANNELS))
            .ok_or_else(|| ScanError::Config("Pixel buffer dimensions overflow".to_string()))?;
        if width == 0 || height == 0 {
            return Err(ScanError::Config("Pixel buffer dimensions cannot be zero".to_string()));
        }
        if data.len() != expected {
            return Err(ScanError::Config(format!(
                "Pixel buffer holds {} bytes, expected {} for {}x{} RGBA",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Mean luma over all pixels, 0.0 (black) to 1.0 (white)
    pub fn mean_luma(&self) -> f32 {
        let pixels = self.data.len() / RGBA_CHANNELS;
        if pixels == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .data
            .chunks_exact(RGBA_CHANNELS)
            .map(|px| 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64)
            .sum();
        (sum / pixels as f64 / 255.0) as f32
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Squash a live frame into a `size`x`size` RGBA buffer for the worker
pub fn downscale_frame(frame: &RgbaImage, size: u32) -> Result<PixelBuffer, ScanError> {
    if size == 0 {
        return Err(ScanError::Config("Target size cannot be zero".to_string()));
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ScanError::Config("Cannot downscale an empty frame".to_string()));
    }
    let resized = imageops::resize(frame, size, size, FilterType::Triangle);
    PixelBuffer::new(size, size, resized.into_raw())
}

/// Freeze a live frame as a JPEG still
pub fn encode_capture(frame: &RgbaImage, quality: u8) -> Result<ImageBlob, ScanError> {
    let rgb = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(ImageBlob::new(jpeg, "image/jpeg", ImageSource::DeviceCapture)?)
}

/// Wrap a user-selected file, rejecting anything that is not a known image format
pub fn blob_from_upload(bytes: Vec<u8>) -> Result<ImageBlob, ScanError> {
    let format = image::guess_format(&bytes)?;
    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        other => {
            return Err(ScanError::Config(format!("Unsupported upload format {:?}", other)));
        }
    };
    Ok(ImageBlob::new(bytes, mime, ImageSource::FileUpload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn test_pixel_buffer_length_checked() {
        assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_ok());
        assert!(PixelBuffer::new(2, 2, vec![0; 15]).is_err());
        assert!(PixelBuffer::new(0, 2, Vec::new()).is_err());
    }

    #[test]
    fn test_downscale_to_fixed_size() {
        let buffer = downscale_frame(&solid(640, 480, 200), 224).unwrap();
        assert_eq!(buffer.width(), 224);
        assert_eq!(buffer.height(), 224);
        assert_eq!(buffer.as_bytes().len(), 224 * 224 * 4);
    }

    #[test]
    fn test_downscale_rejects_zero() {
        assert!(downscale_frame(&solid(10, 10, 0), 0).is_err());
    }

    #[test]
    fn test_mean_luma() {
        let white = downscale_frame(&solid(8, 8, 255), 4).unwrap();
        assert!(white.mean_luma() > 0.99);
        let black = downscale_frame(&solid(8, 8, 0), 4).unwrap();
        assert!(black.mean_luma() < 0.01);
    }

    #[test]
    fn test_encode_capture_is_jpeg() {
        let blob = encode_capture(&solid(32, 24, 128), 85).unwrap();
        assert_eq!(blob.mime(), "image/jpeg");
        assert_eq!(blob.source(), ImageSource::DeviceCapture);
        assert_eq!(image::guess_format(blob.data()).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_upload_sniffing() {
        let jpeg = encode_capture(&solid(8, 8, 10), 80).unwrap();
        let blob = blob_from_upload(jpeg.data().to_vec()).unwrap();
        assert_eq!(blob.mime(), "image/jpeg");
        assert_eq!(blob.source(), ImageSource::FileUpload);

        assert!(blob_from_upload(b"definitely not an image".to_vec()).is_err());
    }
}
