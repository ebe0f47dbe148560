use std::{io, path::PathBuf};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot open framebuffer {}: {source}", path.display())]
    DeviceOpen { path: PathBuf, source: io::Error },

    #[error("{request} failed: {source}")]
    Ioctl { request: &'static str, source: io::Error },

    /// The screen descriptors came back but do not describe a usable surface.
    #[error("unusable screen geometry: {0}")]
    Geometry(String),

    #[error("cannot map {len} bytes of framebuffer memory: {source}")]
    Mmap { len: usize, source: io::Error },

    #[error("cannot load font {}: {reason}", path.display())]
    FontLoad { path: PathBuf, reason: String },

    #[error("cannot read {}: {source}", path.display())]
    SysfsRead { path: PathBuf, source: io::Error },

    #[error("cannot render {region}: {reason}")]
    Render { region: &'static str, reason: String },

    #[error("cannot register region {name}: {reason}")]
    Region { name: &'static str, reason: String },

    #[error("scheduler is not running")]
    SchedulerGone,

    #[error("face still borrowed by {0} render task(s)")]
    FaceBusy(usize),
}

impl Error {
    /// Errors that only cost one element one redraw.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SysfsRead { .. } | Error::Render { .. })
    }
}
