//! Pixel-buffer primitives.
//!
//! The pipeline works on a plain owned RGBA buffer (`PixelBuffer`) with no
//! platform dependency: constructible and clonable without any rendering
//! surface. Every transform states whether it mutates in place or returns a
//! new buffer; callers must not assume aliasing either way.

use anyhow::{Context, Result};

/// Owned RGBA image, tightly packed, 4 bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Build a buffer filled with an opaque color.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Build a `PixelBuffer` from tightly packed RGBA bytes.
    ///
    /// The buffer is expected to hold exactly `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self> {
        anyhow::ensure!(
            bytes.len() == (width * height * 4) as usize,
            "rgba buffer size mismatch: {}x{} needs {} bytes, got {}",
            width,
            height,
            width * height * 4,
            bytes.len()
        );
        Ok(Self {
            width,
            height,
            data: bytes,
        })
    }

    /// Decode a PNG (or any format `image` understands) into a buffer.
    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)
            .context("decode image")?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            width,
            height,
            data: img.into_raw(),
        })
    }

    /// Encode as PNG (used by the debug sink).
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        // Degenerate buffers are encoded as a single transparent pixel so the
        // debug sink can always write something inspectable.
        let (w, h, data) = if self.is_empty() {
            (1, 1, vec![0u8; 4])
        } else {
            (self.width, self.height, self.data.clone())
        };
        let img = image::RgbaImage::from_raw(w, h, data).context("RgbaImage::from_raw failed")?;
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .context("encode png")?;
        Ok(out)
    }

    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    fn idx(&self, x: u32, y: u32) -> usize {
        ((y * self.width + x) * 4) as usize
    }

    #[inline]
    pub fn color_at(&self, x: u32, y: u32) -> Color {
        let i = self.idx(x, y);
        Color::new(self.data[i], self.data[i + 1], self.data[i + 2])
    }

    pub fn set_color(&mut self, x: u32, y: u32, color: Color) {
        let i = self.idx(x, y);
        self.data[i] = color.r;
        self.data[i + 1] = color.g;
        self.data[i + 2] = color.b;
    }

    /// Threshold to binary black/white. **Mutates in place** and returns
    /// `&mut self` for chaining.
    ///
    /// Luminance is the mean of R, G and B; a pixel becomes pure white when
    /// `luminance > cutoff` differs from `invert`, else pure black. Alpha is
    /// untouched. Idempotent for a fixed `cutoff`.
    pub fn threshold(&mut self, invert: bool, cutoff: u8) -> &mut Self {
        for px in self.data.chunks_exact_mut(4) {
            let luminance = (px[0] as u32 + px[1] as u32 + px[2] as u32) as f32 / 3.0;
            let v = if (luminance > cutoff as f32) != invert {
                255
            } else {
                0
            };
            px[0] = v;
            px[1] = v;
            px[2] = v;
        }
        self
    }

    /// 3x3 Sobel gradient magnitude per RGB channel. **Returns a new buffer.**
    ///
    /// The border ring (first/last row and column) is copied from the source,
    /// not computed; alpha is copied everywhere.
    pub fn edge_magnitude(&self) -> PixelBuffer {
        let mut out = self.clone();
        if self.width < 3 || self.height < 3 {
            return out;
        }

        const GX: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
        const GY: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

        for y in 1..self.height - 1 {
            for x in 1..self.width - 1 {
                for c in 0..3usize {
                    let mut gx = 0i32;
                    let mut gy = 0i32;
                    for ky in 0..3u32 {
                        for kx in 0..3u32 {
                            let v = self.data[self.idx(x + kx - 1, y + ky - 1) + c] as i32;
                            gx += GX[ky as usize][kx as usize] * v;
                            gy += GY[ky as usize][kx as usize] * v;
                        }
                    }
                    let mag = ((gx * gx + gy * gy) as f64).sqrt().min(255.0) as u8;
                    let i = out.idx(x, y);
                    out.data[i + c] = mag;
                }
            }
        }
        out
    }

    /// Crop to the bounding box of all pixels exactly matching `color`,
    /// expanded by `padding` (clamped to the buffer). **Returns a new buffer.**
    ///
    /// When no pixel matches, the result is an empty 0x0 buffer; callers that
    /// need pixels fall back to their pre-extraction input.
    pub fn bounding_box_of_color(&self, color: Color, padding: u32) -> PixelBuffer {
        let mut min_x = self.width;
        let mut min_y = self.height;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut found = false;

        for y in 0..self.height {
            for x in 0..self.width {
                if self.color_at(x, y) == color {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                    found = true;
                }
            }
        }

        if !found {
            log::debug!("bounding_box_of_color: no pixel matches {color:?}");
            return PixelBuffer {
                width: 0,
                height: 0,
                data: Vec::new(),
            };
        }

        let x1 = min_x.saturating_sub(padding);
        let y1 = min_y.saturating_sub(padding);
        let x2 = (max_x + padding + 1).min(self.width);
        let y2 = (max_y + padding + 1).min(self.height);
        self.crop(x1, x2, y1, y2)
    }

    /// Bilinear resample to `floor(w*factor) x floor(h*factor)`.
    /// **Returns a new buffer.** A zero target dimension yields an empty buffer.
    pub fn scale(&self, factor: f32) -> PixelBuffer {
        let width = (self.width as f32 * factor).floor() as u32;
        let height = (self.height as f32 * factor).floor() as u32;
        if width == 0 || height == 0 || self.is_empty() {
            return PixelBuffer {
                width,
                height,
                data: Vec::new(),
            };
        }
        if width == self.width && height == self.height {
            return self.clone();
        }

        let src = fast_image_resize::images::ImageRef::new(
            self.width,
            self.height,
            &self.data,
            fast_image_resize::PixelType::U8x4,
        )
        .expect("fast_image_resize: ImageRef::new failed");

        let mut dst =
            fast_image_resize::images::Image::new(width, height, fast_image_resize::PixelType::U8x4);

        let mut resizer = fast_image_resize::Resizer::new();
        let options = fast_image_resize::ResizeOptions::new().resize_alg(
            fast_image_resize::ResizeAlg::Interpolation(fast_image_resize::FilterType::Bilinear),
        );

        resizer
            .resize(&src, &mut dst, &Some(options))
            .expect("fast_image_resize: resize failed");

        PixelBuffer {
            width,
            height,
            data: dst.into_vec(),
        }
    }

    /// Inclusive-exclusive rectangle crop. **Returns a new buffer.**
    ///
    /// Out-of-range bounds are clamped. An inverted range (`x1 >= x2` or
    /// `y1 >= y2`) resets that axis to the full original extent; this is a
    /// defensive fallback for misdetected boundaries, not a fatal condition.
    pub fn crop(&self, x1: u32, x2: u32, y1: u32, y2: u32) -> PixelBuffer {
        if self.is_empty() {
            return self.clone();
        }
        let mut x1 = x1.min(self.width);
        let mut x2 = x2.min(self.width);
        let mut y1 = y1.min(self.height);
        let mut y2 = y2.min(self.height);

        if y1 >= y2 {
            log::warn!(
                "crop with y1:{y1} y2:{y2}, with src height {}; using full height",
                self.height
            );
            y1 = 0;
            y2 = self.height;
        }
        if x1 >= x2 {
            log::warn!(
                "crop with x1:{x1} x2:{x2}, with src width {}; using full width",
                self.width
            );
            x1 = 0;
            x2 = self.width;
        }

        let width = x2 - x1;
        let height = y2 - y1;
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in y1..y2 {
            let start = self.idx(x1, y);
            let end = self.idx(x2.saturating_sub(1), y) + 4;
            data.extend_from_slice(&self.data[start..end]);
        }

        PixelBuffer {
            width,
            height,
            data,
        }
    }
}

// ----------

/// RGB color (alpha is never part of matching).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Per-channel tolerance band around this color (saturating).
    pub fn band(&self, delta: u8) -> ColorBand {
        ColorBand {
            lo: Color::new(
                self.r.saturating_sub(delta),
                self.g.saturating_sub(delta),
                self.b.saturating_sub(delta),
            ),
            hi: Color::new(
                self.r.saturating_add(delta),
                self.g.saturating_add(delta),
                self.b.saturating_add(delta),
            ),
        }
    }
}

/// Inclusive per-channel color range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBand {
    pub lo: Color,
    pub hi: Color,
}

impl ColorBand {
    #[inline]
    pub fn matches(&self, c: Color) -> bool {
        (self.lo.r..=self.hi.r).contains(&c.r)
            && (self.lo.g..=self.hi.g).contains(&c.g)
            && (self.lo.b..=self.hi.b).contains(&c.b)
    }
}

/// Colors of the card UI elements the segmenter keys on.
pub mod palette {
    use super::{Color, ColorBand};

    /// Tolerance applied around each palette color.
    pub const BAND_DELTA: u8 = 20;

    pub const CARD_BACKGROUND: Color = Color::new(233, 229, 220);
    pub const STAR_GOLD: Color = Color::new(255, 204, 50);
    pub const GREEN_TEXT: Color = Color::new(93, 178, 88);
    pub const EQUIP_BANNER: Color = Color::new(255, 231, 187);
    pub const LOCK_ICON: Color = Color::new(255, 137, 117);

    pub fn card_background_band() -> ColorBand {
        CARD_BACKGROUND.band(BAND_DELTA)
    }
    pub fn star_band() -> ColorBand {
        STAR_GOLD.band(BAND_DELTA)
    }
    pub fn green_text_band() -> ColorBand {
        GREEN_TEXT.band(BAND_DELTA)
    }
    pub fn equip_band() -> ColorBand {
        EQUIP_BANNER.band(BAND_DELTA)
    }
    pub fn lock_band() -> ColorBand {
        LOCK_ICON.band(BAND_DELTA)
    }
}
