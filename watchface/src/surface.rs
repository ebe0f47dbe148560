use crate::{
    geom::{Point, Rect},
    Error, Result,
};

pub const BYTES_PER_PIXEL: usize = 4;

/// Premultiplied RGBA, stored in memory as `[r, g, b, a]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const GRAY: Rgba = Rgba::new(60, 60, 60, 60);
    pub const LIGHT_GRAY: Rgba = Rgba::new(150, 150, 150, 150);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; BYTES_PER_PIXEL] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    #[must_use]
    pub const fn from_bytes([r, g, b, a]: [u8; BYTES_PER_PIXEL]) -> Self {
        Self { r, g, b, a }
    }

    /// Porter-Duff "over": `self` masked by `coverage`, composited onto `dst`.
    #[must_use]
    pub fn over(self, dst: Rgba, coverage: u8) -> Rgba {
        let m = u32::from(coverage);
        let sa = u32::from(self.a) * m / 255;
        let mix = |s: u8, d: u8| {
            let v = u32::from(s) * m / 255 + u32::from(d) * (255 - sa) / 255;
            v.min(255) as u8
        };
        Rgba {
            r: mix(self.r, dst.r),
            g: mix(self.g, dst.g),
            b: mix(self.b, dst.b),
            a: mix(self.a, dst.a),
        }
    }
}

/// A grid of 4-byte pixels over some byte buffer whose rows may be padded.
///
/// The buffer is either heap memory (staging) or a device mapping; see
/// [`crate::fb::Device::into_surface`].
pub struct Surface<B> {
    buf: B,
    width: usize,
    height: usize,
    stride: usize,
}

impl Surface<Vec<u8>> {
    /// A zeroed, unpadded heap surface.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let stride = width * BYTES_PER_PIXEL;
        Self { buf: vec![0; stride * height], width, height, stride }
    }
}

impl<B: AsRef<[u8]>> Surface<B> {
    pub fn from_raw(buf: B, width: usize, height: usize, stride: usize) -> Result<Self> {
        let fits = width.checked_mul(BYTES_PER_PIXEL).is_some_and(|row| row <= stride);
        if !fits {
            return Err(Error::Geometry(format!(
                "stride {stride} cannot hold {width} pixels of {BYTES_PER_PIXEL} bytes"
            )));
        }
        let len = buf.as_ref().len();
        if stride.checked_mul(height).map_or(true, |total| total > len) {
            return Err(Error::Geometry(format!(
                "{height} rows of {stride} bytes overflow a {len} byte buffer"
            )));
        }
        Ok(Self { buf, width, height, stride })
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::sized(self.width, self.height)
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    #[inline]
    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if !self.bounds().contains(Point::new(x, y)) {
            return None;
        }
        Some(y as usize * self.stride + x as usize * BYTES_PER_PIXEL)
    }

    /// Out-of-bounds reads are transparent.
    #[must_use]
    pub fn at(&self, x: i32, y: i32) -> Rgba {
        let Some(i) = self.offset(x, y) else { return Rgba::TRANSPARENT };
        let px = &self.buf.as_ref()[i..i + BYTES_PER_PIXEL];
        Rgba::new(px[0], px[1], px[2], px[3])
    }

    /// Byte range of row `y` between columns `x0` and `x1` (exclusive).
    /// Callers clip to bounds first.
    #[inline]
    fn span(&self, y: i32, x0: i32, x1: i32) -> std::ops::Range<usize> {
        let start = y as usize * self.stride + x0 as usize * BYTES_PER_PIXEL;
        start..start + (x1 - x0) as usize * BYTES_PER_PIXEL
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Surface<B> {
    /// Out-of-bounds writes are dropped.
    pub fn set(&mut self, x: i32, y: i32, c: Rgba) {
        if let Some(i) = self.offset(x, y) {
            self.buf.as_mut()[i..i + BYTES_PER_PIXEL].copy_from_slice(&c.to_bytes());
        }
    }

    pub fn blend(&mut self, x: i32, y: i32, c: Rgba, coverage: u8) {
        if coverage == 0 {
            return;
        }
        if self.offset(x, y).is_some() {
            let dst = self.at(x, y);
            self.set(x, y, c.over(dst, coverage));
        }
    }

    pub fn fill(&mut self, rect: &Rect, c: Rgba) {
        let r = rect.intersect(&self.bounds());
        let bytes = c.to_bytes();
        for y in r.min.y..r.max.y {
            let span = self.span(y, r.min.x, r.max.x);
            for px in self.buf.as_mut()[span].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&bytes);
            }
        }
    }
}

/// Copies `rect` from `src` into `dst`, row by row, honouring each side's stride.
pub fn copy<D, S>(dst: &mut Surface<D>, src: &Surface<S>, rect: &Rect)
where
    D: AsRef<[u8]> + AsMut<[u8]>,
    S: AsRef<[u8]>,
{
    let r = rect.intersect(&dst.bounds()).intersect(&src.bounds());
    for y in r.min.y..r.max.y {
        let from = src.span(y, r.min.x, r.max.x);
        let to = dst.span(y, r.min.x, r.max.x);
        dst.buf.as_mut()[to].copy_from_slice(&src.buf.as_ref()[from]);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const RED: Rgba = Rgba::new(255, 0, 0, 255);

    fn checkerboard(w: usize, h: usize) -> Surface<Vec<u8>> {
        let mut s = Surface::new(w, h);
        for p in s.bounds().points() {
            let v = ((p.x + p.y) % 2 * 200) as u8;
            s.set(p.x, p.y, Rgba::new(v, v, v, 255));
        }
        s
    }

    #[test]
    fn fill_touches_only_the_rectangle() {
        let mut s = checkerboard(16, 12);
        let before = checkerboard(16, 12);
        let r = Rect::new(3, 2, 9, 7);
        s.fill(&r, RED);
        for p in s.bounds().points() {
            if r.contains(p) {
                assert_eq!(s.at(p.x, p.y), RED, "{p:?}");
            } else {
                assert_eq!(s.at(p.x, p.y), before.at(p.x, p.y), "{p:?}");
            }
        }
    }

    #[test]
    fn fill_clips_to_bounds() {
        let mut s = Surface::new(4, 4);
        s.fill(&Rect::new(-2, -2, 2, 100), RED);
        assert_eq!(s.at(0, 3), RED);
        assert_eq!(s.at(1, 0), RED);
        assert_eq!(s.at(2, 0), Rgba::TRANSPARENT);
    }

    #[test]
    fn copy_matches_inside_and_preserves_outside() {
        let src = checkerboard(20, 10);
        let mut dst = Surface::new(20, 10);
        dst.fill(&dst.bounds(), RED);
        let r = Rect::new(5, 1, 12, 9);
        copy(&mut dst, &src, &r);
        for p in dst.bounds().points() {
            if r.contains(p) {
                assert_eq!(dst.at(p.x, p.y), src.at(p.x, p.y), "{p:?}");
            } else {
                assert_eq!(dst.at(p.x, p.y), RED, "{p:?}");
            }
        }
    }

    #[test]
    fn copy_between_different_strides() {
        let src = checkerboard(8, 4);
        let mut dst = Surface::from_raw(vec![0; 48 * 4], 8, 4, 48).unwrap();
        copy(&mut dst, &src, &src.bounds());
        for p in src.bounds().points() {
            assert_eq!(dst.at(p.x, p.y), src.at(p.x, p.y));
        }
    }

    #[test]
    fn padded_stride_keeps_rows_apart() {
        // 5 pixels wide, 8 bytes of padding per row.
        let mut s = Surface::from_raw(vec![0; 28 * 3], 5, 3, 28).unwrap();
        s.set(0, 1, RED);
        s.set(4, 0, Rgba::WHITE);
        assert_eq!(s.at(0, 1), RED);
        assert_eq!(s.at(4, 0), Rgba::WHITE);
        // Row 0's padding is untouched.
        assert!(s.into_inner()[20..28].iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_bounds_is_transparent_and_ignored() {
        let mut s = Surface::new(3, 3);
        s.fill(&s.bounds(), RED);
        assert_eq!(s.at(3, 0), Rgba::TRANSPARENT);
        assert_eq!(s.at(0, -1), Rgba::TRANSPARENT);
        s.set(3, 0, Rgba::WHITE);
        s.set(-1, 2, Rgba::WHITE);
        assert_eq!(s.at(0, 1), RED);
        assert_eq!(s.at(2, 1), RED);
    }

    #[test]
    fn from_raw_rejects_short_buffers() {
        assert!(matches!(Surface::from_raw(vec![0; 10], 2, 2, 8), Err(Error::Geometry(_))));
        assert!(matches!(Surface::from_raw(vec![0; 64], 4, 2, 12), Err(Error::Geometry(_))));
        assert!(Surface::from_raw(vec![0; 64], 4, 2, 16).is_ok());
    }

    #[test]
    fn from_raw_rejects_overflowing_sizes() {
        let huge = Surface::from_raw(vec![0; 64], usize::MAX / 2, 1, usize::MAX);
        assert!(matches!(huge, Err(Error::Geometry(_))));
        let tall = Surface::from_raw(vec![0; 64], 2, usize::MAX / 4, 16);
        assert!(matches!(tall, Err(Error::Geometry(_))));
    }

    #[test]
    fn over_blends_premultiplied() {
        let c = Rgba::LIGHT_GRAY;
        assert_eq!(c.over(Rgba::TRANSPARENT, 255), c);
        assert_eq!(c.over(RED, 0), RED);
        assert_eq!(Rgba::WHITE.over(RED, 255), Rgba::WHITE);
        let half = c.over(Rgba::TRANSPARENT, 128);
        assert_eq!(half, Rgba::new(75, 75, 75, 75));
    }
}
