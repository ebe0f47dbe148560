use std::{fs, path::Path};

use fontdue::FontSettings;
use log::debug;

use crate::{
    geom::{Point, Rect},
    surface::{Rgba, Surface},
    Error, Result,
};

pub const DEFAULT_FONT: &str = "/usr/share/fonts/noto/NotoSansMono-Regular.ttf";

/// Turns a string into glyph coverage masks. Implementations must be cheap to
/// share between render tasks.
pub trait Rasterize: Send + Sync {
    fn rasterize(&self, text: &str, px: f32) -> Result<Coverage, String>;
}

/// One glyph's 8-bit alpha mask, placed relative to the pen's start on the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub left: i32,
    /// Row of the mask's top edge; negative is above the baseline.
    pub top: i32,
    pub width: usize,
    pub height: usize,
    pub alpha: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coverage {
    pub masks: Vec<Mask>,
}

impl Coverage {
    /// Paints `color` through every mask with the baseline origin at `anchor`,
    /// never touching pixels outside `clip`.
    pub fn draw<B>(&self, surface: &mut Surface<B>, anchor: Point, color: Rgba, clip: &Rect)
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        for m in &self.masks {
            let origin = Point::new(anchor.x + m.left, anchor.y + m.top);
            let area = Rect::new(
                origin.x,
                origin.y,
                origin.x + m.width as i32,
                origin.y + m.height as i32,
            )
            .intersect(clip);
            for p in area.points() {
                let i = (p.y - origin.y) as usize * m.width + (p.x - origin.x) as usize;
                surface.blend(p.x, p.y, color, m.alpha[i]);
            }
        }
    }
}

/// A TrueType/OpenType font, rasterized on the CPU.
pub struct Font {
    inner: fontdue::Font,
}

impl Font {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| Error::FontLoad { path: path.to_owned(), reason: e.to_string() })?;
        let font = Self::from_bytes(&data)
            .map_err(|reason| Error::FontLoad { path: path.to_owned(), reason })?;
        debug!("[text] loaded {} ({} bytes)", path.display(), data.len());
        Ok(font)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, String> {
        let inner = fontdue::Font::from_bytes(data, FontSettings::default())?;
        Ok(Self { inner })
    }
}

impl Rasterize for Font {
    fn rasterize(&self, text: &str, px: f32) -> Result<Coverage, String> {
        if !px.is_finite() || px <= 0. {
            return Err(format!("bad font size {px}"));
        }
        let mut masks = Vec::with_capacity(text.len());
        let mut pen = 0f32;
        let mut prev = None;
        for c in text.chars() {
            if let Some(p) = prev {
                pen += self.inner.horizontal_kern(p, c, px).unwrap_or(0.);
            }
            let (metrics, alpha) = self.inner.rasterize(c, px);
            if metrics.width > 0 && metrics.height > 0 {
                masks.push(Mask {
                    left: (pen + metrics.xmin as f32).round() as i32,
                    top: -(metrics.ymin + metrics.height as i32),
                    width: metrics.width,
                    height: metrics.height,
                    alpha,
                });
            }
            pen += metrics.advance_width;
            prev = Some(c);
        }
        Ok(Coverage { masks })
    }
}

/// Stand-in glyphs for tests: every non-space char is a solid block sitting
/// on the baseline, half as wide as it is tall.
#[cfg(test)]
pub(crate) struct Blocks;

#[cfg(test)]
impl Rasterize for Blocks {
    fn rasterize(&self, text: &str, px: f32) -> Result<Coverage, String> {
        let height = px as usize;
        let width = height / 2;
        let masks = text
            .chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(i, _)| Mask {
                left: (i * (width + 1)) as i32,
                top: -(height as i32),
                width,
                height,
                alpha: vec![255; width * height],
            })
            .collect();
        Ok(Coverage { masks })
    }
}

#[cfg(test)]
pub(crate) struct Broken;

#[cfg(test)]
impl Rasterize for Broken {
    fn rasterize(&self, _: &str, _: f32) -> Result<Coverage, String> {
        Err("no glyphs today".to_owned())
    }
}

/// [`Blocks`] that takes its time, and counts how often it was asked.
#[cfg(test)]
pub(crate) struct Slow {
    pub delay: std::time::Duration,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl Slow {
    pub(crate) fn new(delay: std::time::Duration) -> Self {
        Self { delay, calls: Default::default() }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Rasterize for Slow {
    fn rasterize(&self, text: &str, px: f32) -> Result<Coverage, String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Blocks.rasterize(text, px)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn masks_are_clipped() {
        let mut s = Surface::new(20, 20);
        let cov = Blocks.rasterize("ab", 8.).unwrap();
        assert_eq!(cov.masks.len(), 2);
        let clip = Rect::new(2, 4, 7, 10);
        cov.draw(&mut s, Point::new(2, 10), Rgba::WHITE, &clip);
        for p in s.bounds().points() {
            let inked = s.at(p.x, p.y) != Rgba::TRANSPARENT;
            // First block covers x 2..6, second starts at 7: outside the clip.
            let expected = clip.contains(p) && p.x < 6 && p.y >= 2;
            assert_eq!(inked, expected, "{p:?}");
        }
    }

    #[test]
    fn spaces_advance_without_ink() {
        let cov = Blocks.rasterize("1 2", 10.).unwrap();
        let lefts: Vec<_> = cov.masks.iter().map(|m| m.left).collect();
        assert_eq!(lefts, [0, 12]);
    }

    #[test]
    fn garbage_is_not_a_font() {
        assert!(Font::from_bytes(b"definitely not a font").is_err());
    }

    #[test]
    fn missing_font_file() {
        let err = Font::load("/nonexistent/font.ttf").err().unwrap();
        assert!(matches!(err, Error::FontLoad { .. }), "{err}");
    }
}
