use std::{fs, path::Path};

use crate::{Error, Result};

/// Reads a one-value sysfs attribute, without its trailing newline.
pub fn read_value(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|source| Error::SysfsRead { path: path.to_owned(), source })?;
    Ok(raw.trim_matches('\n').to_owned())
}
