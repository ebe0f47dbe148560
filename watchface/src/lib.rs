pub mod apps;
pub mod error;
pub mod face;
pub mod fb;
pub mod geom;
pub mod scheduler;
pub mod surface;
pub mod sysfs;
pub mod text;

pub use error::{Error, Result};
