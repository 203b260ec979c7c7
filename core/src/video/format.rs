use serde::{Deserialize, Serialize};

use super::VideoError;

/// Pixel layout of a video buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 16-bit little-endian 5:6:5
    Rgb565,
    Bgra8,
    Rgba8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
        }
    }

    /// Layout of rendered frames for a buffer in this format
    pub const fn output(self) -> PixelFormat {
        match self {
            PixelFormat::Rgb565 => PixelFormat::Bgra8,
            other => other,
        }
    }
}

/// Dimensions and layout of the bridge's video buffer, fixed for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoFormat {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl VideoFormat {
    pub const fn new(pixel_format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            pixel_format,
            width,
            height,
        }
    }

    pub fn validate(&self) -> Result<(), VideoError> {
        if self.width == 0 || self.height == 0 {
            return Err(VideoError::InvalidFormat {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub const fn bytes_per_pixel(&self) -> usize {
        self.pixel_format.bytes_per_pixel()
    }

    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub const fn buffer_size(&self) -> usize {
        self.pixel_count() * self.bytes_per_pixel()
    }
}

/// Expand `src` (laid out per `format`) into 8-bit four-channel pixels.
///
/// Rgb565 becomes Bgra8 with opaque alpha; 8-bit formats are copied as-is.
pub(super) fn convert_to_output(format: &VideoFormat, src: &[u8], dst: &mut Vec<u8>) {
    dst.clear();
    dst.reserve(format.pixel_count() * 4);

    match format.pixel_format {
        PixelFormat::Rgb565 => {
            for pixel in src.chunks_exact(2) {
                let value = u16::from_le_bytes([pixel[0], pixel[1]]);
                let r = ((value >> 11) & 0x1f) as u8;
                let g = ((value >> 5) & 0x3f) as u8;
                let b = (value & 0x1f) as u8;
                dst.extend_from_slice(&[
                    (b << 3) | (b >> 2),
                    (g << 2) | (g >> 4),
                    (r << 3) | (r >> 2),
                    0xff,
                ]);
            }
        }
        PixelFormat::Bgra8 | PixelFormat::Rgba8 => dst.extend_from_slice(src),
    }
}
