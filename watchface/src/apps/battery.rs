use std::path::Path;

use once_cell::sync::Lazy;

use crate::{
    face::{Face, TextRegion},
    surface::Rgba,
    sysfs, Result,
};

pub const CAPACITY_PATH: &str = "/sys/class/power_supply/battery/capacity";

pub static BATTERY: Lazy<TextRegion> =
    Lazy::new(|| TextRegion::text("Battery", 90, 240, 3, 24., Rgba::LIGHT_GRAY));

/// Two digits and a percent sign; a full battery is a happy battery.
#[must_use]
pub fn format_capacity(raw: &str) -> String {
    match raw.trim_matches('\n') {
        "100" => "uwu".to_owned(),
        v if v.len() == 1 => format!("0{v}%"),
        v => format!("{v}%"),
    }
}

pub(crate) fn draw<B>(face: &Face<B>, capacity: &Path) -> Result<()>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    let value = sysfs::read_value(capacity)?;
    face.render_text(&BATTERY, &format_capacity(&value))
}
