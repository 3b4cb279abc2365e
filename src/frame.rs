//! Owned image buffers and the rectangle type used for crop regions.
//!
//! The pipeline never interprets pixel content beyond extracting a single
//! channel for motion estimation and resampling whole frames for the
//! corrective warp, so [`Frame`] stays a plain interleaved byte buffer.

use crate::homography::Homography;
use crate::{Error, Result};

/// Pixel layout of a [`Frame`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Single-channel 8-bit grayscale.
    Gray8,
    /// Interleaved 8-bit RGB.
    Rgb8,
    /// Interleaved 8-bit YUV (4:4:4).
    Yuv8,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Yuv8 => 3,
        }
    }
}

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// An owned image buffer with dimensions and pixel-format metadata.
///
/// Empty frames (`width == 0 || height == 0`) are a valid, checked state
/// signalling "no data yet"; every consumer tests [`Frame::is_empty`] before
/// touching pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Frame {
    /// An empty frame with no pixel data.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            format: PixelFormat::Gray8,
        }
    }

    /// A zero-filled frame of the given dimensions.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.channels();
        Self {
            data: vec![0; len],
            width,
            height,
            format,
        }
    }

    /// Wrap an existing buffer, validating its length against the metadata.
    pub fn from_parts(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(Error::FrameSizeMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Read one channel of one pixel. Coordinates must be in bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32, channel: usize) -> u8 {
        self.data[y as usize * self.stride() + x as usize * self.channels() + channel]
    }

    /// Write one channel of one pixel. Coordinates must be in bounds.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, channel: usize, value: u8) {
        let idx = y as usize * self.stride() + x as usize * self.channels() + channel;
        self.data[idx] = value;
    }

    /// Extract a single channel as a new `Gray8` frame.
    ///
    /// The tracker operates on one channel only (luma for YUV input).
    pub fn extract_channel(&self, channel: usize) -> Frame {
        let channel = channel.min(self.channels().saturating_sub(1));
        let mut out = Frame::new(self.width, self.height, PixelFormat::Gray8);
        for y in 0..self.height {
            for x in 0..self.width {
                out.set_pixel(x, y, 0, self.pixel(x, y, channel));
            }
        }
        out
    }

    /// Copy out a sub-rectangle, clamped to the frame bounds.
    pub fn crop(&self, region: Rect) -> Frame {
        let x0 = region.x.min(self.width);
        let y0 = region.y.min(self.height);
        let w = region.width.min(self.width - x0);
        let h = region.height.min(self.height - y0);

        let mut out = Frame::new(w, h, self.format);
        let channels = self.channels();
        for y in 0..h {
            for x in 0..w {
                for c in 0..channels {
                    out.set_pixel(x, y, c, self.pixel(x0 + x, y0 + y, c));
                }
            }
        }
        out
    }

    /// Warp the frame content by `transform` using inverse-mapped bilinear
    /// resampling. Samples falling outside the source frame are black.
    ///
    /// A transform within floating-point noise of the identity short-circuits
    /// to a plain clone so an uncorrected frame passes through bit-identical.
    pub fn warp(&self, transform: &Homography) -> Frame {
        if self.is_empty() || transform.is_identity(1e-10) {
            return self.clone();
        }

        // Output pixel p takes its value from the source at inverse(p)
        let inverse = match transform.try_inverse() {
            Some(inv) => inv,
            None => {
                tracing::warn!("non-invertible warp transform, passing frame through");
                return self.clone();
            }
        };

        let channels = self.channels();
        let mut out = Frame::new(self.width, self.height, self.format);
        for y in 0..self.height {
            for x in 0..self.width {
                let src = inverse.apply([x as f64, y as f64]);
                for c in 0..channels {
                    let value = self.sample_bilinear(src[0], src[1], c);
                    out.set_pixel(x, y, c, value);
                }
            }
        }
        out
    }

    /// Bilinear sample of one channel at a fractional position.
    fn sample_bilinear(&self, x: f64, y: f64, channel: usize) -> u8 {
        if x < 0.0 || y < 0.0 {
            return 0;
        }
        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        if x0 >= self.width || y0 >= self.height {
            return 0;
        }

        let fx = x - x0 as f64;
        let fy = y - y0 as f64;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let p00 = self.pixel(x0, y0, channel) as f64;
        let p10 = self.pixel(x1, y0, channel) as f64;
        let p01 = self.pixel(x0, y1, channel) as f64;
        let p11 = self.pixel(x1, y1, channel) as f64;

        let top = p00 * (1.0 - fx) + p10 * fx;
        let bottom = p01 * (1.0 - fx) + p11 * fx;
        (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(width: u32, height: u32) -> Frame {
        let mut frame = Frame::new(width, height, PixelFormat::Gray8);
        for y in 0..height {
            for x in 0..width {
                let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)) as u8;
                frame.set_pixel(x, y, 0, v);
            }
        }
        frame
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::empty();
        assert!(frame.is_empty());
        assert_eq!(frame.width(), 0);
    }

    #[test]
    fn test_new_frame_is_zeroed() {
        let frame = Frame::new(4, 3, PixelFormat::Rgb8);
        assert!(!frame.is_empty());
        assert_eq!(frame.data().len(), 4 * 3 * 3);
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_parts_validates_length() {
        let ok = Frame::from_parts(vec![0; 12], 2, 2, PixelFormat::Rgb8);
        assert!(ok.is_ok());

        let bad = Frame::from_parts(vec![0; 11], 2, 2, PixelFormat::Rgb8);
        assert!(matches!(
            bad,
            Err(Error::FrameSizeMismatch {
                expected: 12,
                got: 11
            })
        ));
    }

    #[test]
    fn test_extract_channel() {
        let mut frame = Frame::new(2, 2, PixelFormat::Rgb8);
        frame.set_pixel(0, 0, 1, 99);
        frame.set_pixel(1, 1, 1, 42);

        let channel = frame.extract_channel(1);
        assert_eq!(channel.format(), PixelFormat::Gray8);
        assert_eq!(channel.pixel(0, 0, 0), 99);
        assert_eq!(channel.pixel(1, 1, 0), 42);
        assert_eq!(channel.pixel(1, 0, 0), 0);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let frame = textured(8, 8);
        let cropped = frame.crop(Rect::new(6, 6, 10, 10));
        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 2);
        assert_eq!(cropped.pixel(0, 0, 0), frame.pixel(6, 6, 0));
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = textured(8, 8);
        let cropped = frame.crop(Rect::new(2, 1, 4, 3));
        assert_eq!(cropped.width(), 4);
        assert_eq!(cropped.height(), 3);
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(cropped.pixel(x, y, 0), frame.pixel(x + 2, y + 1, 0));
            }
        }
    }

    #[test]
    fn test_warp_identity_is_bit_identical() {
        let frame = textured(16, 16);
        let warped = frame.warp(&Homography::identity());
        assert_eq!(warped, frame);
    }

    #[test]
    fn test_warp_integer_translation() {
        let frame = textured(16, 16);
        let warped = frame.warp(&Homography::translation(3.0, 2.0));

        // Content moved by (+3, +2); interior pixels must match the source
        for y in 2..16 {
            for x in 3..16 {
                assert_eq!(warped.pixel(x, y, 0), frame.pixel(x - 3, y - 2, 0));
            }
        }
        // Uncovered border is black
        assert_eq!(warped.pixel(0, 0, 0), 0);
    }

    #[test]
    fn test_warp_empty_frame() {
        let frame = Frame::empty();
        let warped = frame.warp(&Homography::translation(1.0, 1.0));
        assert!(warped.is_empty());
    }
}
