// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The 8-bit RGB working image passed between pipeline stages, with
// on-demand grayscale and HSV views, rotation and PNG output.

use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use tracewerk_core::error::{Result, TracewerkError};
use tracing::{debug, info, instrument};

use super::color::HsvPlanes;

/// An immutable 8-bit RGB raster.
///
/// Grayscale inputs are expanded to three equal channels; `was_grayscale`
/// remembers that the colour channels carry no information, which the colour
/// grid-removal strategy uses to skip its saturation test.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: RgbImage,
    was_grayscale: bool,
}

impl RasterImage {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, TIFF, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data).map_err(|err| {
            TracewerkError::ImageDecode(format!("failed to decode image: {}", err))
        })?;
        info!(width = img.width(), height = img.height(), "Image decoded");
        Ok(Self::from_dynamic(img))
    }

    /// Wrap a decoded `DynamicImage`, dropping any alpha channel.
    pub fn from_dynamic(img: DynamicImage) -> Self {
        let was_grayscale = matches!(
            img,
            DynamicImage::ImageLuma8(_)
                | DynamicImage::ImageLumaA8(_)
                | DynamicImage::ImageLuma16(_)
                | DynamicImage::ImageLumaA16(_)
        );
        Self {
            pixels: img.to_rgb8(),
            was_grayscale,
        }
    }

    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            pixels,
            was_grayscale: false,
        }
    }

    /// A new raster of the same provenance holding processed pixels.
    pub fn with_pixels(&self, pixels: RgbImage) -> Self {
        Self {
            pixels,
            was_grayscale: self.was_grayscale,
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }

    pub fn was_grayscale(&self) -> bool {
        self.was_grayscale
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    // -- Views ----------------------------------------------------------------

    /// Luma view using ITU-R BT.601 weights.
    pub fn gray(&self) -> GrayImage {
        super::color::luma(&self.pixels)
    }

    /// Hue, saturation and value planes (hue 0..180, others 0..255).
    pub fn hsv(&self) -> HsvPlanes {
        HsvPlanes::from_rgb(&self.pixels)
    }

    // -- Geometry -------------------------------------------------------------

    /// Rotate about the image centre by `degrees`, keeping the canvas size.
    ///
    /// Positive angles undo a clockwise tilt (rows that descend to the right
    /// become level). Samples outside the source replicate the nearest edge
    /// pixel so no black wedges appear in the corners.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotated(&self, degrees: f64) -> Self {
        let (w, h) = self.pixels.dimensions();
        if w == 0 || h == 0 {
            return self.clone();
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        let cx = (w as f64 - 1.0) / 2.0;
        let cy = (h as f64 - 1.0) / 2.0;

        let mut out = RgbImage::new(w, h);
        for y in 0..h {
            let dy = y as f64 - cy;
            for x in 0..w {
                let dx = x as f64 - cx;
                let sx = cx + dx * cos - dy * sin;
                let sy = cy + dx * sin + dy * cos;
                out.put_pixel(x, y, sample_bilinear_replicate(&self.pixels, sx, sy));
            }
        }

        debug!(width = w, height = h, "Rotation complete");
        Self {
            pixels: out,
            was_grayscale: self.was_grayscale,
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&DynamicImage::ImageRgb8(self.pixels.clone()))
    }
}

/// Write a single-channel mask or intermediate to a file.
pub fn save_gray(gray: &GrayImage, path: impl AsRef<std::path::Path>) -> Result<()> {
    gray.save(path.as_ref()).map_err(|err| {
        TracewerkError::ImageEncode(format!(
            "failed to save image to {}: {}",
            path.as_ref().display(),
            err
        ))
    })
}

/// Encode a `DynamicImage` as PNG, returning the raw bytes.
fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| TracewerkError::ImageEncode(format!("PNG encoding failed: {}", err)))?;
    Ok(buffer)
}

fn sample_bilinear_replicate(src: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (w, h) = src.dimensions();
    let max_x = (w - 1) as f64;
    let max_y = (h - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
