//! Kernel fbdev ioctls, see `include/uapi/linux/fb.h`.

use std::{io, os::fd::RawFd};

use crate::{surface::BYTES_PER_PIXEL, Error, Result};

pub const FBIOGET_VSCREENINFO: u32 = 0x4600;
pub const FBIOGET_FSCREENINFO: u32 = 0x4602;
pub const FBIOBLANK: u32 = 0x4611;

pub const FB_BLANK_UNBLANK: libc::c_int = 0;
pub const FB_BLANK_POWERDOWN: libc::c_int = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FixScreenInfo {
    pub id: [u8; 16],
    pub smem_start: libc::c_ulong,
    pub smem_len: u32,
    pub type_: u32,
    pub type_aux: u32,
    pub visual: u32,
    pub xpanstep: u16,
    pub ypanstep: u16,
    pub ywrapstep: u16,
    pub line_length: u32,
    pub mmio_start: libc::c_ulong,
    pub mmio_len: u32,
    pub accel: u32,
    pub capabilities: u16,
    pub reserved: [u16; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct BitField {
    pub offset: u32,
    pub length: u32,
    pub msb_right: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct VarScreenInfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub grayscale: u32,
    pub red: BitField,
    pub green: BitField,
    pub blue: BitField,
    pub transp: BitField,
    pub nonstd: u32,
    pub activate: u32,
    pub height: u32,
    pub width: u32,
    pub accel_flags: u32,
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

/// Calls a "read into this struct" ioctl.
fn read_info<T: Default>(fd: RawFd, request: u32, name: &'static str) -> Result<T> {
    let mut value = T::default();
    // SAFETY: `T` is one of the `#[repr(C)]` mirrors above, which match the
    // kernel layout the request writes into.
    let rc = unsafe { libc::ioctl(fd, request as _, &mut value as *mut T) };
    if rc < 0 {
        return Err(Error::Ioctl { request: name, source: io::Error::last_os_error() });
    }
    Ok(value)
}

pub fn fix_screeninfo(fd: RawFd) -> Result<FixScreenInfo> {
    read_info(fd, FBIOGET_FSCREENINFO, "FBIOGET_FSCREENINFO")
}

pub fn var_screeninfo(fd: RawFd) -> Result<VarScreenInfo> {
    read_info(fd, FBIOGET_VSCREENINFO, "FBIOGET_VSCREENINFO")
}

pub fn blank(fd: RawFd, level: libc::c_int) -> Result<()> {
    // SAFETY: FBIOBLANK takes its argument by value.
    let rc = unsafe { libc::ioctl(fd, FBIOBLANK as _, level) };
    if rc < 0 {
        return Err(Error::Ioctl { request: "FBIOBLANK", source: io::Error::last_os_error() });
    }
    Ok(())
}

/// What the rest of the crate needs to know about the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
    /// Bytes per row, padding included.
    pub stride: usize,
    /// Bytes to map, as reported by the driver.
    pub len: usize,
}

impl Geometry {
    pub fn new(fix: &FixScreenInfo, var: &VarScreenInfo) -> Result<Self> {
        let g = Self {
            width: var.xres as usize,
            height: var.yres as usize,
            stride: fix.line_length as usize,
            len: fix.smem_len as usize,
        };
        if g.width == 0 || g.height == 0 {
            return Err(Error::Geometry(format!("empty resolution {}x{}", g.width, g.height)));
        }
        if g.width.checked_mul(BYTES_PER_PIXEL).map_or(true, |row| g.stride < row) {
            return Err(Error::Geometry(format!(
                "line length {} shorter than {} pixels",
                g.stride, g.width
            )));
        }
        if g.stride.checked_mul(g.height).map_or(true, |total| total > g.len) {
            return Err(Error::Geometry(format!(
                "{} rows of {} bytes do not fit in {} mapped bytes",
                g.height, g.stride, g.len
            )));
        }
        Ok(g)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn infos(xres: u32, yres: u32, line_length: u32, smem_len: u32) -> (FixScreenInfo, VarScreenInfo) {
        let fix = FixScreenInfo { line_length, smem_len, ..Default::default() };
        let var = VarScreenInfo { xres, yres, bits_per_pixel: 32, ..Default::default() };
        (fix, var)
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn layouts_match_the_kernel() {
        assert_eq!(std::mem::size_of::<FixScreenInfo>(), 80);
        assert_eq!(std::mem::size_of::<VarScreenInfo>(), 160);
    }

    #[test]
    #[cfg(target_pointer_width = "32")]
    fn layouts_match_the_kernel() {
        assert_eq!(std::mem::size_of::<FixScreenInfo>(), 68);
        assert_eq!(std::mem::size_of::<VarScreenInfo>(), 160);
    }

    #[test]
    fn geometry_keeps_reported_stride_and_length() {
        // Padded rows and a double-buffered mapping.
        let (fix, var) = infos(320, 240, 1408, 1408 * 480);
        let g = Geometry::new(&fix, &var).unwrap();
        assert_eq!(g, Geometry { width: 320, height: 240, stride: 1408, len: 1408 * 480 });
    }

    #[test]
    fn geometry_rejects_inconsistent_descriptors() {
        let (fix, var) = infos(320, 240, 1000, 1_000_000);
        assert!(matches!(Geometry::new(&fix, &var), Err(Error::Geometry(_))));
        let (fix, var) = infos(320, 240, 1280, 1280 * 239);
        assert!(matches!(Geometry::new(&fix, &var), Err(Error::Geometry(_))));
        let (fix, var) = infos(0, 240, 1280, 1280 * 240);
        assert!(matches!(Geometry::new(&fix, &var), Err(Error::Geometry(_))));
    }

    #[test]
    #[cfg(target_pointer_width = "32")]
    fn geometry_rejects_overflowing_descriptors() {
        // Rows times line length wraps past the address space.
        let (fix, var) = infos(1024, 0x10000, 0x10000, u32::MAX);
        assert!(matches!(Geometry::new(&fix, &var), Err(Error::Geometry(_))));
        let (fix, var) = infos(u32::MAX, 1, u32::MAX, u32::MAX);
        assert!(matches!(Geometry::new(&fix, &var), Err(Error::Geometry(_))));
    }

    #[test]
    fn geometry_accepts_the_largest_descriptors() {
        let (fix, var) = infos(u32::MAX / 4, 1, u32::MAX - 3, u32::MAX);
        let g = Geometry::new(&fix, &var).unwrap();
        assert_eq!(g.stride, (u32::MAX - 3) as usize);
    }
}
