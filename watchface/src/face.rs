use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};

use log::{debug, trace};

use crate::{
    geom::{Point, Rect},
    surface::{self, Rgba, Surface},
    text::Rasterize,
    Error, Result,
};

/// Average advance of a monospace glyph, relative to the font size.
pub const GLYPH_RATIO: f32 = 0.85;

/// Where one label lives on screen and how it looks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRegion {
    pub name: &'static str,
    pub rect: Rect,
    pub size: f32,
    pub color: Rgba,
}

impl TextRegion {
    /// A box at (`x`, `y`) wide enough for `chars` glyphs of `size` pixels.
    #[must_use]
    pub fn text(name: &'static str, x: i32, y: i32, chars: u32, size: f32, color: Rgba) -> Self {
        let width = (chars as f32 * size * GLYPH_RATIO) as i32;
        let rect = Rect::new(x, y, x + width, y + size as i32);
        Self { name, rect, size, color }
    }

    /// Text sits on the bottom edge, starting at the left edge.
    #[inline]
    #[must_use]
    pub fn baseline(&self) -> Point {
        Point::new(self.rect.min.x, self.rect.max.y)
    }
}

struct Canvas<B> {
    staging: Surface<Vec<u8>>,
    screen: Surface<B>,
}

/// Draws labels off-screen, then copies just their rectangles onto the screen.
///
/// Regions are registered up front and never overlap, so concurrent renders
/// of different labels never race on the same pixels.
pub struct Face<B> {
    glyphs: Arc<dyn Rasterize>,
    bounds: Rect,
    regions: RwLock<Vec<TextRegion>>,
    canvas: Mutex<Canvas<B>>,
    flushes: AtomicUsize,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Face<B> {
    pub fn new(screen: Surface<B>, glyphs: Arc<dyn Rasterize>) -> Self {
        let staging = Surface::new(screen.width(), screen.height());
        Self {
            glyphs,
            bounds: screen.bounds(),
            regions: RwLock::new(Vec::new()),
            canvas: Mutex::new(Canvas { staging, screen }),
            flushes: AtomicUsize::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Number of rectangles flushed to the screen so far.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    fn canvas(&self) -> MutexGuard<'_, Canvas<B>> {
        // A panicking render leaves at worst a half-drawn label behind.
        self.canvas.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blanks the whole screen, staging included.
    pub fn clear(&self) {
        let mut canvas = self.canvas();
        let Canvas { staging, screen } = &mut *canvas;
        staging.fill(&self.bounds, Rgba::TRANSPARENT);
        screen.fill(&self.bounds, Rgba::TRANSPARENT);
        debug!("[face] cleared {}", self.bounds);
    }

    fn check(&self, region: &TextRegion, others: &[TextRegion]) -> Result<()> {
        let fail = |reason: String| Err(Error::Region { name: region.name, reason });
        if region.rect.is_empty() {
            return fail(format!("empty rectangle {}", region.rect));
        }
        if !self.bounds.contains_rect(&region.rect) {
            return fail(format!("{} is not inside the screen {}", region.rect, self.bounds));
        }
        for other in others {
            if other.name == region.name {
                return fail(format!("name already taken by {}", other.rect));
            }
            if other.rect.overlaps(&region.rect) {
                return fail(format!("{} overlaps {} at {}", region.rect, other.name, other.rect));
            }
        }
        Ok(())
    }

    pub fn register(&self, region: &TextRegion) -> Result<()> {
        let mut regions = self.regions.write().unwrap_or_else(PoisonError::into_inner);
        if regions.contains(region) {
            return Ok(());
        }
        self.check(region, &regions)?;
        debug!("[face] registered {} at {}", region.name, region.rect);
        regions.push(*region);
        Ok(())
    }

    /// Swaps the whole registry at once; on error the old one stays.
    pub fn replace_regions(&self, next: &[TextRegion]) -> Result<()> {
        let mut checked: Vec<TextRegion> = Vec::with_capacity(next.len());
        for region in next {
            if checked.contains(region) {
                continue;
            }
            self.check(region, &checked)?;
            checked.push(*region);
        }
        let names: Vec<_> = checked.iter().map(|r| r.name).collect();
        debug!("[face] regions now {names:?}");
        *self.regions.write().unwrap_or_else(PoisonError::into_inner) = checked;
        Ok(())
    }

    fn is_registered(&self, region: &TextRegion) -> bool {
        self.regions.read().unwrap_or_else(PoisonError::into_inner).contains(region)
    }

    /// Clears `region` off-screen, draws `content` into it, then flushes only
    /// that rectangle onto the screen.
    pub fn render_text(&self, region: &TextRegion, content: &str) -> Result<()> {
        if !self.is_registered(region) {
            return Err(Error::Render { region: region.name, reason: "not registered".to_owned() });
        }
        // Rasterizing is the slow part and needs no pixels.
        let coverage = self
            .glyphs
            .rasterize(content, region.size)
            .map_err(|reason| Error::Render { region: region.name, reason })?;

        let mut canvas = self.canvas();
        let Canvas { staging, screen } = &mut *canvas;
        staging.fill(&region.rect, Rgba::TRANSPARENT);
        coverage.draw(staging, region.baseline(), region.color, &region.rect);
        surface::copy(screen, staging, &region.rect);
        drop(canvas);

        self.flushes.fetch_add(1, Ordering::Relaxed);
        trace!("[face] {} <- {content:?}", region.name);
        Ok(())
    }

    /// Read access to both surfaces, e.g. to snapshot what is on screen.
    pub fn inspect<R>(&self, f: impl FnOnce(&Surface<Vec<u8>>, &Surface<B>) -> R) -> R {
        let canvas = self.canvas();
        f(&canvas.staging, &canvas.screen)
    }

    pub fn into_screen(self) -> Surface<B> {
        self.canvas.into_inner().unwrap_or_else(PoisonError::into_inner).screen
    }
}
