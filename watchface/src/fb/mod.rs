use std::{
    fs::{File, OpenOptions},
    os::fd::AsRawFd,
    path::Path,
};

use log::{debug, info, warn};
use memmap2::{MmapMut, MmapOptions};

use crate::{surface::Surface, Error, Result};

pub mod ioctl;

pub use ioctl::Geometry;

pub const DEFAULT_DEVICE: &str = "/dev/fb0";

const POWER_CYCLE: [libc::c_int; 3] =
    [ioctl::FB_BLANK_UNBLANK, ioctl::FB_BLANK_POWERDOWN, ioctl::FB_BLANK_UNBLANK];

/// An open, memory-mapped framebuffer.
///
/// Dropping it unmaps the memory and closes the file; [`Device::close`] does
/// the same but says so in the logs.
pub struct Device {
    // Field order matters: the mapping goes before the file.
    map: MmapMut,
    file: File,
    geometry: Geometry,
}

impl Device {
    /// Opens `path` with the blank/unblank dance that puts panels in a known state.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, true)
    }

    pub fn open_with(path: impl AsRef<Path>, power_cycle: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::DeviceOpen { path: path.to_owned(), source })?;
        let fd = file.as_raw_fd();

        if power_cycle {
            for level in POWER_CYCLE {
                if let Err(e) = ioctl::blank(fd, level) {
                    warn!("[fb] {}: blank({level}): {e}", path.display());
                }
            }
        }

        let fix = ioctl::fix_screeninfo(fd)?;
        let var = ioctl::var_screeninfo(fd)?;
        if var.bits_per_pixel != 32 {
            let bpp = var.bits_per_pixel;
            warn!("[fb] {} reports {bpp} bits per pixel, drawing 32 anyway", path.display());
        }
        let geometry = Geometry::new(&fix, &var)?;
        debug!("[fb] {}: {geometry:?}", path.display());

        // SAFETY: the mapping is shared with the display hardware. Nothing in
        // this process truncates or remaps the device while `Device` lives.
        let map = match unsafe { MmapOptions::new().len(geometry.len).map_mut(&file) } {
            Ok(map) => map,
            Err(source) => {
                drop(file);
                return Err(Error::Mmap { len: geometry.len, source });
            }
        };

        info!(
            "[fb] opened {} {}x{} stride={} len={}",
            path.display(),
            geometry.width,
            geometry.height,
            geometry.stride,
            geometry.len
        );
        Ok(Self { map, file, geometry })
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// The whole visible screen as a surface. The device travels inside it and
    /// comes back out through [`Surface::into_inner`].
    pub fn into_surface(self) -> Result<Surface<Device>> {
        let Geometry { width, height, stride, .. } = self.geometry;
        Surface::from_raw(self, width, height, stride)
    }

    pub fn close(self) {
        let Self { map, file, geometry } = self;
        drop(map);
        drop(file);
        info!("[fb] closed {}x{} framebuffer", geometry.width, geometry.height);
    }
}

impl AsRef<[u8]> for Device {
    fn as_ref(&self) -> &[u8] {
        &self.map
    }
}

impl AsMut<[u8]> for Device {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}
