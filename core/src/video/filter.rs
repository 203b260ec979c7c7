//! Post-processing applied on the render thread

use std::fmt;

use serde::{Deserialize, Serialize};

use super::PixelFormat;

/// A converted frame ready for presentation (always 4 bytes per pixel)
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
    /// Seed of the published frame this was rendered from
    pub seed: u64,
}

impl fmt::Debug for RenderedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_format", &self.pixel_format)
            .field("bytes", &self.data.len())
            .field("seed", &self.seed)
            .finish()
    }
}

impl RenderedFrame {
    /// The four bytes of pixel (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }
}

/// Crop rectangle in source pixels, supplied by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersect with a `width` x `height` frame. `None` if nothing remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Viewport> {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let right = self.x.saturating_add(self.width).min(width);
        let bottom = self.y.saturating_add(self.height).min(height);
        if right <= x || bottom <= y {
            return None;
        }
        Some(Viewport::new(x, y, right - x, bottom - y))
    }
}

/// Copy the `viewport` region out of `frame`. The viewport must already be clamped.
pub(super) fn crop(frame: RenderedFrame, viewport: Viewport) -> RenderedFrame {
    if viewport == Viewport::new(0, 0, frame.width, frame.height) {
        return frame;
    }

    let row_bytes = viewport.width as usize * 4;
    let mut data = Vec::with_capacity(row_bytes * viewport.height as usize);
    for row in viewport.y..viewport.y + viewport.height {
        let start = (row as usize * frame.width as usize + viewport.x as usize) * 4;
        data.extend_from_slice(&frame.data[start..start + row_bytes]);
    }

    RenderedFrame {
        width: viewport.width,
        height: viewport.height,
        data,
        ..frame
    }
}

/// Sampling used when resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerMode {
    #[default]
    Nearest,
    Linear,
}

/// A pure frame transform.
///
/// Filters never see the producer's buffers and must return the same output
/// for the same input.
pub trait FrameFilter: Send {
    fn apply(&self, frame: &RenderedFrame) -> RenderedFrame;
}

/// Ordered list of filters
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn FrameFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl FrameFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    pub fn push(&mut self, filter: impl FrameFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, frame: RenderedFrame) -> RenderedFrame {
        self.filters
            .iter()
            .fold(frame, |frame, filter| filter.apply(&frame))
    }
}

/// Largest supported [`ScaleFilter`] factor
pub const MAX_SCALE_FACTOR: u32 = 8;

/// Integer upscale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleFilter {
    factor: u32,
    sampler: SamplerMode,
}

impl ScaleFilter {
    /// `factor` is clamped to `1..=MAX_SCALE_FACTOR`.
    pub fn new(factor: u32, sampler: SamplerMode) -> Self {
        Self {
            factor: factor.clamp(1, MAX_SCALE_FACTOR),
            sampler,
        }
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    fn sample_linear(frame: &RenderedFrame, fx: f32, fy: f32) -> [u8; 4] {
        let max_x = frame.width - 1;
        let max_y = frame.height - 1;
        let fx = fx.clamp(0.0, max_x as f32);
        let fy = fy.clamp(0.0, max_y as f32);
        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(max_x);
        let y1 = (y0 + 1).min(max_y);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let (p00, p10) = (frame.pixel(x0, y0), frame.pixel(x1, y0));
        let (p01, p11) = (frame.pixel(x0, y1), frame.pixel(x1, y1));

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = p00[c] as f32 + (p10[c] as f32 - p00[c] as f32) * tx;
            let bottom = p01[c] as f32 + (p11[c] as f32 - p01[c] as f32) * tx;
            out[c] = (top + (bottom - top) * ty).round() as u8;
        }
        out
    }
}

impl FrameFilter for ScaleFilter {
    fn apply(&self, frame: &RenderedFrame) -> RenderedFrame {
        if self.factor == 1 || frame.width == 0 || frame.height == 0 {
            return frame.clone();
        }

        let width = frame.width * self.factor;
        let height = frame.height * self.factor;
        let scale = self.factor as f32;
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);

        for y in 0..height {
            for x in 0..width {
                let pixel = match self.sampler {
                    SamplerMode::Nearest => frame.pixel(x / self.factor, y / self.factor),
                    SamplerMode::Linear => Self::sample_linear(
                        frame,
                        (x as f32 + 0.5) / scale - 0.5,
                        (y as f32 + 0.5) / scale - 0.5,
                    ),
                };
                data.extend_from_slice(&pixel);
            }
        }

        RenderedFrame {
            width,
            height,
            pixel_format: frame.pixel_format,
            data,
            seed: frame.seed,
        }
    }
}
