//! Raw sensor frame and its PNG/base64 encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{GrayImage, ImageFormat};
use std::io::Cursor;

/// A raw grayscale fingerprint frame as read from the sensor.
#[derive(Clone)]
pub struct RawFrame {
    /// Grayscale pixel data (at least width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Average pixel brightness (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f32).sum::<f32>() / self.data.len() as f32
    }

    /// Encode the frame as an 8-bit grayscale PNG.
    ///
    /// Uses the first `width * height` bytes; trailing bytes are ignored.
    pub fn to_png(&self) -> Result<Vec<u8>, FrameError> {
        let expected = self.width as usize * self.height as usize;
        if self.data.len() < expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: self.data.len(),
            });
        }

        let img = GrayImage::from_raw(self.width, self.height, self.data[..expected].to_vec())
            .ok_or(FrameError::InvalidLength {
                expected,
                actual: self.data.len(),
            })?;

        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| FrameError::Encode(e.to_string()))?;
        Ok(png)
    }

    /// PNG bytes, standard base64 encoded.
    pub fn to_base64_png(&self) -> Result<String, FrameError> {
        Ok(STANDARD.encode(self.to_png()?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("not enough image data: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..width * height).map(|i| (i % 256) as u8).collect()
    }

    #[test]
    fn test_png_roundtrip_dimensions() {
        let frame = RawFrame::new(gradient(12, 7), 12, 7);
        let png = frame.to_png().unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), 12);
        assert_eq!(decoded.height(), 7);
        assert_eq!(decoded.to_luma8().into_raw(), frame.data);
    }

    #[test]
    fn test_png_ignores_trailing_bytes() {
        let mut data = gradient(4, 4);
        data.extend([255u8; 10]);
        let frame = RawFrame::new(data, 4, 4);

        let decoded = image::load_from_memory(&frame.to_png().unwrap()).unwrap();
        assert_eq!(decoded.to_luma8().into_raw(), gradient(4, 4));
    }

    #[test]
    fn test_png_short_buffer() {
        let frame = RawFrame::new(vec![0u8; 10], 4, 4);
        match frame.to_png() {
            Err(FrameError::InvalidLength { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 10);
            }
            other => panic!("expected InvalidLength, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_base64_png_decodes() {
        let frame = RawFrame::new(gradient(8, 8), 8, 8);
        let encoded = frame.to_base64_png().unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn test_avg_brightness() {
        let frame = RawFrame::new(vec![0, 100, 200], 3, 1);
        assert!((frame.avg_brightness() - 100.0).abs() < 1e-4);
        assert_eq!(RawFrame::new(Vec::new(), 0, 0).avg_brightness(), 0.0);
    }
}
