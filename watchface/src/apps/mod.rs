use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{NaiveTime, Timelike};

use crate::{
    face::{Face, TextRegion},
    Result,
};

pub mod battery;
pub mod clock;

/// Something that owns one label on the face and knows when to redraw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum App {
    /// `HH:MM:SS`, every tick.
    SecondsClock,
    /// `HH:MM`, once a minute.
    MinutesClock,
    /// Charge level read from a sysfs capacity file, once a minute.
    Battery(PathBuf),
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            App::SecondsClock => write!(f, "SecondsClock"),
            App::MinutesClock => write!(f, "MinutesClock"),
            App::Battery(path) => write!(f, "Battery<{}>", path.display()),
        }
    }
}

impl App {
    #[must_use]
    pub fn region(&self) -> TextRegion {
        match self {
            App::SecondsClock => *clock::CLOCK_TIME,
            App::MinutesClock => *clock::SIMPLE_CLOCK_TIME,
            App::Battery(_) => *battery::BATTERY,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: NaiveTime) -> bool {
        match self {
            App::SecondsClock => true,
            App::MinutesClock | App::Battery(_) => now.second() == 0,
        }
    }

    /// First paint, whatever the time.
    pub fn initialize<B>(&self, face: &Face<B>, now: NaiveTime) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.draw(face, now)
    }

    /// Called every tick. Returns whether anything was drawn.
    pub fn render<B>(&self, face: &Face<B>, now: NaiveTime) -> Result<bool>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        if !self.is_due(now) {
            return Ok(false);
        }
        self.draw(face, now)?;
        Ok(true)
    }

    fn draw<B>(&self, face: &Face<B>, now: NaiveTime) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        match self {
            App::SecondsClock => clock::draw_seconds(face, now),
            App::MinutesClock => clock::draw_minutes(face, now),
            App::Battery(capacity) => battery::draw(face, capacity),
        }
    }
}

/// Which apps share the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Layout {
    /// Seconds clock and battery.
    Clock,
    /// Minutes clock and battery.
    #[default]
    Simple,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Layout::Clock => write!(f, "clock"),
            Layout::Simple => write!(f, "simple"),
        }
    }
}

impl Layout {
    #[must_use]
    pub fn apps(self, capacity: &Path) -> Vec<App> {
        let battery = App::Battery(capacity.to_owned());
        match self {
            Layout::Clock => vec![App::SecondsClock, battery],
            Layout::Simple => vec![App::MinutesClock, battery],
        }
    }

    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Layout::Clock => Layout::Simple,
            Layout::Simple => Layout::Clock,
        }
    }
}

#[cfg(test)]
mod test {
    use std::{env, fs};

    use super::*;
    use crate::{
        face::test::{face, screen_pixels},
        surface::Rgba,
        Error,
    };

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn capacity_file(name: &str, contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("watchface-{name}-{}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    fn registered(apps: &[App]) -> Face<Vec<u8>> {
        let face = face(320, 280);
        let regions: Vec<_> = apps.iter().map(App::region).collect();
        face.replace_regions(&regions).unwrap();
        face
    }

    #[test]
    fn minutes_clock_redraws_on_the_minute() {
        let face = registered(&[App::MinutesClock]);
        assert!(App::MinutesClock.render(&face, at(9, 5, 0)).unwrap());
        assert_eq!(face.flushes(), 1);
        face.inspect(|_, screen| {
            let r = App::MinutesClock.region();
            assert!(r.rect.points().any(|p| screen.at(p.x, p.y) != Rgba::TRANSPARENT));
        });
    }

    #[test]
    fn minutes_clock_idles_mid_minute() {
        let face = registered(&[App::MinutesClock]);
        let before = screen_pixels(&face);
        assert!(!App::MinutesClock.render(&face, at(9, 5, 30)).unwrap());
        assert_eq!(face.flushes(), 0);
        assert_eq!(screen_pixels(&face), before);
    }

    #[test]
    fn seconds_clock_redraws_every_tick() {
        let face = registered(&[App::SecondsClock]);
        for s in [0, 1, 30, 59] {
            assert!(App::SecondsClock.render(&face, at(23, 59, s)).unwrap());
        }
        assert_eq!(face.flushes(), 4);
    }

    #[test]
    fn initialize_always_draws() {
        let face = registered(&[App::MinutesClock]);
        App::MinutesClock.initialize(&face, at(12, 34, 56)).unwrap();
        assert_eq!(face.flushes(), 1);
    }

    #[test]
    fn battery_reads_on_the_minute() {
        let path = capacity_file("battery", "7\n");
        let app = App::Battery(path.clone());
        let face = registered(&[app.clone()]);
        assert!(!app.render(&face, at(8, 0, 1)).unwrap());
        assert!(app.render(&face, at(8, 1, 0)).unwrap());
        assert_eq!(face.flushes(), 1);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn unreadable_battery_is_recoverable() {
        let app = App::Battery("/nonexistent/capacity".into());
        let face = registered(&[app.clone()]);
        let err = app.initialize(&face, at(8, 0, 0)).unwrap_err();
        assert!(matches!(err, Error::SysfsRead { .. }));
        assert!(err.is_recoverable());
        assert_eq!(face.flushes(), 0);
    }

    #[test]
    fn layouts_fit_and_do_not_overlap() {
        for layout in [Layout::Clock, Layout::Simple] {
            let face = face(320, 280);
            let regions: Vec<_> = layout.apps(Path::new("x")).iter().map(App::region).collect();
            face.replace_regions(&regions).unwrap();
        }
    }

    #[test]
    fn layout_toggles() {
        assert_eq!(Layout::default(), Layout::Simple);
        assert_eq!(Layout::Simple.toggle(), Layout::Clock);
        assert_eq!(Layout::Clock.toggle().toggle(), Layout::Clock);
        assert_eq!(Layout::Clock.apps(Path::new("cap"))[0], App::SecondsClock);
    }
}
