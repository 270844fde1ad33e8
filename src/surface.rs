//! # Drawable Surface
//!
//! Screens draw through the [`Surface`] trait: filled rectangles, text in a
//! handful of sizes, small image blits, and two flush operations (whole
//! surface and a rectangle). The trait keeps the screen code independent of
//! the physical display; the kiosk binary decides where flushed pixels go by
//! supplying a [`FlushSink`].
//!
//! [`BufferSurface`] is the standard implementation: an RGB888 canvas
//! rendered with the `embedded-graphics` 10x20 mono font. Larger font sizes
//! are produced by an integer magnifier that expands each font pixel into a
//! scale-by-scale block, which keeps glyphs readable on a 1024x600 panel
//! without shipping a TrueType rasterizer.

use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    text::{Baseline, Text},
};

/// Color type used throughout the screen code.
pub type Color = Rgb888;

/// A small RGB888 raster, used for spinner frames and similar decorations.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB888, 3 bytes per pixel.
    pub data: Vec<u8>,
}

impl Sprite {
    /// Solid-color sprite, mostly useful as a building block.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[color.r(), color.g(), color.b()]);
        }
        Sprite {
            width,
            height,
            data,
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x < self.width && y < self.height {
            let idx = ((y * self.width + x) * 3) as usize;
            self.data[idx] = color.r();
            self.data[idx + 1] = color.g();
            self.data[idx + 2] = color.b();
        }
    }
}

/// Where finished pixels go. The sink owns the raster-to-panel conversion
/// (RGB565 framebuffer, terminal preview, a test recorder, ...).
pub trait FlushSink: Send {
    /// Present the whole canvas.
    fn flush(&mut self, pixels: &[u8], width: i32, height: i32);

    /// Present only the given rectangle. Return `false` if partial updates
    /// are unsupported; the caller then falls back to a full flush.
    fn flush_rect(
        &mut self,
        _pixels: &[u8],
        _width: i32,
        _height: i32,
        _x: i32,
        _y: i32,
        _w: i32,
        _h: i32,
    ) -> bool {
        false
    }
}

/// The drawable surface consumed by the screen manager.
pub trait Surface: Send {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    /// Select the text size (pixel height) for subsequent draws.
    fn set_font_size(&mut self, px: u32);

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Color);

    /// Draw text centered horizontally and vertically on `(x, y)`.
    fn draw_text_anchored(&mut self, text: &str, x: i32, y: i32, color: Color);

    /// Draw text starting at `x`, vertically centered on `y`.
    fn draw_text(&mut self, text: &str, x: i32, y: i32, color: Color);

    fn draw_image(&mut self, sprite: &Sprite, x: i32, y: i32);

    /// Present the whole surface.
    fn flush(&mut self);

    /// Present only a rectangle. Returns `false` when unsupported.
    fn flush_rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> bool;

    /// Fill the whole surface with one color.
    fn fill_background(&mut self, color: Color) {
        let (w, h) = (self.width(), self.height());
        self.fill_rect(0, 0, w, h, color);
    }
}

/// RGB888 canvas with a pluggable sink.
pub struct BufferSurface {
    width: i32,
    height: i32,
    font_px: u32,
    pixels: Vec<u8>,
    sink: Box<dyn FlushSink>,
}

impl BufferSurface {
    pub fn new(width: i32, height: i32, sink: Box<dyn FlushSink>) -> Self {
        BufferSurface {
            width,
            height,
            font_px: 20,
            pixels: vec![0; (width * height * 3) as usize],
            sink,
        }
    }

    /// Integer magnification factor for the current font size. The base font
    /// is 10x20; sizes up to 28 use it directly.
    fn scale(&self) -> i32 {
        match self.font_px {
            0..=28 => 1,
            29..=48 => 2,
            49..=68 => 3,
            _ => 4,
        }
    }

    fn draw_text_at(&mut self, text: &str, top_left: Point, color: Color) {
        let scale = self.scale();
        let style = MonoTextStyle::new(&FONT_10X20, color);
        let mut canvas = PixelCanvas {
            pixels: &mut self.pixels,
            width: self.width,
            height: self.height,
        };
        if scale == 1 {
            let _ = Text::with_baseline(text, top_left, style, Baseline::Top).draw(&mut canvas);
        } else {
            let mut magnify = Magnify {
                target: &mut canvas,
                scale,
                origin: top_left,
            };
            let _ = Text::with_baseline(text, Point::zero(), style, Baseline::Top)
                .draw(&mut magnify);
        }
    }

    fn text_width(&self, text: &str) -> i32 {
        text.chars().count() as i32 * 10 * self.scale()
    }

    fn glyph_height(&self) -> i32 {
        20 * self.scale()
    }
}

impl Surface for BufferSurface {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn set_font_size(&mut self, px: u32) {
        self.font_px = px;
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Color) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(self.width);
        let y1 = (y + h).min(self.height);
        let rgb = [color.r(), color.g(), color.b()];
        for row in y0..y1 {
            for col in x0..x1 {
                let idx = ((row * self.width + col) * 3) as usize;
                self.pixels[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
    }

    fn draw_text_anchored(&mut self, text: &str, x: i32, y: i32, color: Color) {
        let top_left = Point::new(x - self.text_width(text) / 2, y - self.glyph_height() / 2);
        self.draw_text_at(text, top_left, color);
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, color: Color) {
        let top_left = Point::new(x, y - self.glyph_height() / 2);
        self.draw_text_at(text, top_left, color);
    }

    fn draw_image(&mut self, sprite: &Sprite, x: i32, y: i32) {
        for row in 0..sprite.height as i32 {
            let dst_y = y + row;
            if dst_y < 0 || dst_y >= self.height {
                continue;
            }
            for col in 0..sprite.width as i32 {
                let dst_x = x + col;
                if dst_x < 0 || dst_x >= self.width {
                    continue;
                }
                let src = ((row as u32 * sprite.width + col as u32) * 3) as usize;
                let dst = ((dst_y * self.width + dst_x) * 3) as usize;
                self.pixels[dst..dst + 3].copy_from_slice(&sprite.data[src..src + 3]);
            }
        }
    }

    fn flush(&mut self) {
        self.sink.flush(&self.pixels, self.width, self.height);
    }

    fn flush_rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> bool {
        self.sink
            .flush_rect(&self.pixels, self.width, self.height, x, y, w, h)
    }
}

/// Surface that draws nowhere. Used headless and in tests that only care
/// about screen logic.
pub struct NullSurface {
    pub width: i32,
    pub height: i32,
}

impl NullSurface {
    pub fn new(width: i32, height: i32) -> Self {
        NullSurface { width, height }
    }
}

impl Surface for NullSurface {
    fn width(&self) -> i32 {
        self.width
    }
    fn height(&self) -> i32 {
        self.height
    }
    fn set_font_size(&mut self, _px: u32) {}
    fn fill_rect(&mut self, _x: i32, _y: i32, _w: i32, _h: i32, _color: Color) {}
    fn draw_text_anchored(&mut self, _text: &str, _x: i32, _y: i32, _color: Color) {}
    fn draw_text(&mut self, _text: &str, _x: i32, _y: i32, _color: Color) {}
    fn draw_image(&mut self, _sprite: &Sprite, _x: i32, _y: i32) {}
    fn flush(&mut self) {}
    fn flush_rect(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) -> bool {
        true
    }
}

/// Raw pixel access for the embedded-graphics renderers.
struct PixelCanvas<'a> {
    pixels: &'a mut Vec<u8>,
    width: i32,
    height: i32,
}

impl OriginDimensions for PixelCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl DrawTarget for PixelCanvas<'_> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.x < self.width && point.y >= 0 && point.y < self.height {
                let idx = ((point.y * self.width + point.x) * 3) as usize;
                self.pixels[idx] = color.r();
                self.pixels[idx + 1] = color.g();
                self.pixels[idx + 2] = color.b();
            }
        }
        Ok(())
    }
}

/// Draw-target adapter that expands every pixel into a `scale` by `scale`
/// block anchored at `origin`. Text laid out at the font's native size comes
/// out magnified, which is how the large amount and title glyphs are drawn.
struct Magnify<'a, T> {
    target: &'a mut T,
    scale: i32,
    origin: Point,
}

impl<T: DrawTarget<Color = Rgb888>> OriginDimensions for Magnify<'_, T> {
    fn size(&self) -> Size {
        self.target.bounding_box().size
    }
}

impl<T: DrawTarget<Color = Rgb888>> DrawTarget for Magnify<'_, T> {
    type Color = Rgb888;
    type Error = T::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let block = embedded_graphics::primitives::Rectangle::new(
                Point::new(
                    self.origin.x + point.x * self.scale,
                    self.origin.y + point.y * self.scale,
                ),
                Size::new(self.scale as u32, self.scale as u32),
            );
            self.target.fill_solid(&block, color)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        flushes: Arc<AtomicUsize>,
    }

    impl FlushSink for CountingSink {
        fn flush(&mut self, _pixels: &[u8], _width: i32, _height: i32) {
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn surface(flushes: &Arc<AtomicUsize>) -> BufferSurface {
        BufferSurface::new(
            200,
            100,
            Box::new(CountingSink {
                flushes: Arc::clone(flushes),
            }),
        )
    }

    #[test]
    fn fill_rect_writes_and_clips() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let mut s = surface(&flushes);
        s.fill_rect(190, 90, 50, 50, Color::new(10, 20, 30));
        // Inside the clipped area.
        let idx = ((95 * 200 + 195) * 3) as usize;
        assert_eq!(&s.pixels[idx..idx + 3], &[10, 20, 30]);
        // Out-of-bounds coordinates must not have wrapped onto other rows.
        let idx = ((96 * 200 + 0) * 3) as usize;
        assert_eq!(&s.pixels[idx..idx + 3], &[0, 0, 0]);
    }

    #[test]
    fn anchored_text_lands_around_the_anchor() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let mut s = surface(&flushes);
        s.set_font_size(20);
        s.draw_text_anchored("W", 100, 50, Color::new(255, 255, 255));
        let lit = s.pixels.iter().filter(|&&b| b != 0).count();
        assert!(lit > 0, "glyph should have set pixels");
        // Nothing outside a generous box around the anchor.
        for y in 0..100i32 {
            for x in 0..200i32 {
                let idx = ((y * 200 + x) * 3) as usize;
                if s.pixels[idx] != 0 {
                    assert!((85..=115).contains(&x), "x = {x}");
                    assert!((35..=65).contains(&y), "y = {y}");
                }
            }
        }
    }

    #[test]
    fn magnified_text_is_larger() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let mut s = surface(&flushes);
        s.set_font_size(20);
        s.draw_text_anchored("I", 50, 50, Color::new(255, 255, 255));
        let small = s.pixels.iter().filter(|&&b| b != 0).count();

        let mut s = surface(&flushes);
        s.set_font_size(48);
        s.draw_text_anchored("I", 100, 50, Color::new(255, 255, 255));
        let large = s.pixels.iter().filter(|&&b| b != 0).count();
        assert_eq!(large, small * 4, "scale 2 quadruples lit pixels");
    }

    #[test]
    fn flush_goes_to_the_sink_and_rect_reports_unsupported() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let mut s = surface(&flushes);
        s.flush();
        assert_eq!(flushes.load(Ordering::SeqCst), 1);
        assert!(!s.flush_rect(0, 0, 10, 10), "default sink lacks partial");
    }

    #[test]
    fn sprite_blit_clips_at_edges() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let mut s = surface(&flushes);
        let sprite = Sprite::solid(10, 10, Color::new(1, 2, 3));
        s.draw_image(&sprite, -5, -5);
        let idx = 0;
        assert_eq!(&s.pixels[idx..idx + 3], &[1, 2, 3]);
    }
}
