use chrono::NaiveTime;
use once_cell::sync::Lazy;

use crate::{
    face::{Face, TextRegion},
    surface::Rgba,
    Result,
};

pub static CLOCK_TIME: Lazy<TextRegion> =
    Lazy::new(|| TextRegion::text("ClockTime", 62, 162, 8, 36., Rgba::LIGHT_GRAY));
pub static SIMPLE_CLOCK_TIME: Lazy<TextRegion> =
    Lazy::new(|| TextRegion::text("SimpleClockTime", 108, 162, 5, 36., Rgba::LIGHT_GRAY));

pub(crate) fn draw_seconds<B>(face: &Face<B>, now: NaiveTime) -> Result<()>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    face.render_text(&CLOCK_TIME, &now.format("%H:%M:%S").to_string())
}

pub(crate) fn draw_minutes<B>(face: &Face<B>, now: NaiveTime) -> Result<()>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    face.render_text(&SIMPLE_CLOCK_TIME, &now.format("%H:%M").to_string())
}
