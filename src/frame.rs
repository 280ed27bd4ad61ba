//! Frame ownership and color-order tracking.
//!
//! A `Frame` is one decoded image from the video stream: an owned pixel
//! buffer plus dimensions and a `ColorOrder` tag. Frames move by ownership
//! through the pipeline (source -> worker -> channel -> display); nothing
//! copies pixel data except the explicit capture-to-display conversion.
//!
//! The capture side of the pipeline works in BGR (camera convention); the
//! display side expects RGB. `Frame::into_display_order` is the single
//! conversion point between the two.

use anyhow::{anyhow, Result};

/// Bytes per pixel. All frames are 3-channel, 8 bits per channel.
pub const CHANNELS: usize = 3;

/// Channel order of a frame's pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorOrder {
    /// Capture-native order, as produced by the camera pipeline.
    Bgr,
    /// Display-native order, as expected by display sinks.
    Rgb,
}

/// One decoded video frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    order: ColorOrder,
}

impl Frame {
    /// Create a frame from an owned pixel buffer.
    ///
    /// The buffer length must be exactly `width * height * 3`.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, order: ColorOrder) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame buffer length {} does not match {}x{}x{}",
                pixels.len(),
                width,
                height,
                CHANNELS
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            order,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ColorOrder {
        self.order
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Convert to display-native (RGB) order, consuming the frame.
    ///
    /// A no-op for frames already in RGB order; otherwise swaps the first
    /// and third channel of every pixel in place.
    pub fn into_display_order(mut self) -> Frame {
        if self.order == ColorOrder::Bgr {
            for pixel in self.pixels.chunks_exact_mut(CHANNELS) {
                pixel.swap(0, 2);
            }
            self.order = ColorOrder::Rgb;
        }
        self
    }

    /// Read one pixel as (r, g, b), regardless of the buffer's order.
    pub fn pixel_rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let raw = &self.pixels[offset..offset + CHANNELS];
        Some(match self.order {
            ColorOrder::Rgb => [raw[0], raw[1], raw[2]],
            ColorOrder::Bgr => [raw[2], raw[1], raw[0]],
        })
    }

    /// Draw a 2px rectangle outline, clipped to the frame bounds.
    ///
    /// `rgb` is given in RGB and mapped through the frame's channel order,
    /// so annotation colors are stable across the conversion step.
    pub fn draw_box(&mut self, x1: u32, y1: u32, x2: u32, y2: u32, rgb: [u8; 3]) {
        const THICKNESS: u32 = 2;
        let x1 = x1.min(self.width.saturating_sub(1));
        let y1 = y1.min(self.height.saturating_sub(1));
        let x2 = x2.min(self.width.saturating_sub(1));
        let y2 = y2.min(self.height.saturating_sub(1));
        if x1 >= x2 || y1 >= y2 {
            return;
        }
        for t in 0..THICKNESS {
            for x in x1..=x2 {
                self.put_pixel(x, (y1 + t).min(y2), rgb);
                self.put_pixel(x, y2.saturating_sub(t).max(y1), rgb);
            }
            for y in y1..=y2 {
                self.put_pixel((x1 + t).min(x2), y, rgb);
                self.put_pixel(x2.saturating_sub(t).max(x1), y, rgb);
            }
        }
    }

    fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        match self.order {
            ColorOrder::Rgb => self.pixels[offset..offset + CHANNELS].copy_from_slice(&rgb),
            ColorOrder::Bgr => {
                self.pixels[offset] = rgb[2];
                self.pixels[offset + 1] = rgb[1];
                self.pixels[offset + 2] = rgb[0];
            }
        }
    }
}
