//! # Status Indicators
//!
//! LEDs and neopixel strips reflect kiosk state independently of the
//! screen. [`PipeIndicator`] speaks the pattern-string protocol of the
//! external LED controller over its FIFO; [`ScreenIndicator`] adapts the
//! display so a kiosk with only a panel still shows every state;
//! [`MultiIndicator`] fans out to several at once.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::display::Display;
use crate::event::AccessInfo;

/// Something that can show the kiosk's coarse state.
pub trait Indicator: Send {
    fn idle(&mut self);
    fn granted(&mut self, info: Option<&AccessInfo>);
    fn denied(&mut self, info: Option<&AccessInfo>);
    fn opening(&mut self, info: Option<&AccessInfo>);
    fn connection_lost(&mut self);
    fn shutdown(&mut self);
    fn release(&mut self) {}
}

pub struct NoopIndicator;

impl Indicator for NoopIndicator {
    fn idle(&mut self) {}
    fn granted(&mut self, _info: Option<&AccessInfo>) {}
    fn denied(&mut self, _info: Option<&AccessInfo>) {}
    fn opening(&mut self, _info: Option<&AccessInfo>) {}
    fn connection_lost(&mut self) {}
    fn shutdown(&mut self) {}
}

// Pattern strings understood by the LED controller: pattern id, cycle time,
// and color bytes.
const PATTERN_IDLE: &str = "@3 !150000 400000";
const PATTERN_GRANTED: &str = "@1 !50000 8000";
const PATTERN_DENIED: &str = "@2 !10000 ff";
const PATTERN_OPENING: &str = "@1 !50000 808000";
const PATTERN_CONNECTION_LOST: &str = "@2 !150000 001010";
const PATTERN_SHUTDOWN: &str = "@0 010101";

/// Writes pattern strings to the LED controller FIFO. Write errors are
/// logged and dropped; a dead LED strip must never block access control.
pub struct PipeIndicator {
    pipe: std::fs::File,
}

impl PipeIndicator {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let pipe = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(PipeIndicator { pipe })
    }

    fn send(&mut self, pattern: &str) {
        if let Err(err) = self.pipe.write_all(pattern.as_bytes()) {
            log::warn!("indicator: LED pipe write failed: {err}");
        }
    }
}

impl Indicator for PipeIndicator {
    fn idle(&mut self) {
        self.send(PATTERN_IDLE);
    }
    fn granted(&mut self, _info: Option<&AccessInfo>) {
        self.send(PATTERN_GRANTED);
    }
    fn denied(&mut self, _info: Option<&AccessInfo>) {
        self.send(PATTERN_DENIED);
    }
    fn opening(&mut self, _info: Option<&AccessInfo>) {
        self.send(PATTERN_OPENING);
    }
    fn connection_lost(&mut self) {
        self.send(PATTERN_CONNECTION_LOST);
    }
    fn shutdown(&mut self) {
        self.send(PATTERN_SHUTDOWN);
    }
}

/// Adapts the screen system to the indicator interface, so application code
/// announces state once and both the panel and any LEDs follow.
pub struct ScreenIndicator {
    display: Arc<Display>,
}

impl ScreenIndicator {
    pub fn new(display: Arc<Display>) -> Self {
        ScreenIndicator { display }
    }
}

impl Indicator for ScreenIndicator {
    fn idle(&mut self) {
        self.display.idle();
    }
    fn granted(&mut self, info: Option<&AccessInfo>) {
        self.display.granted(info.unwrap_or(&AccessInfo::default()));
    }
    fn denied(&mut self, info: Option<&AccessInfo>) {
        self.display.denied(info.unwrap_or(&AccessInfo::default()));
    }
    fn opening(&mut self, info: Option<&AccessInfo>) {
        self.display.opening(info.unwrap_or(&AccessInfo::default()));
    }
    fn connection_lost(&mut self) {
        self.display.connection_lost();
    }
    fn shutdown(&mut self) {
        self.display.shutdown();
    }
}

/// Fan-out to several indicators.
pub struct MultiIndicator {
    indicators: Vec<Box<dyn Indicator>>,
}

impl MultiIndicator {
    pub fn new(indicators: Vec<Box<dyn Indicator>>) -> Self {
        MultiIndicator { indicators }
    }
}

impl Indicator for MultiIndicator {
    fn idle(&mut self) {
        for i in &mut self.indicators {
            i.idle();
        }
    }
    fn granted(&mut self, info: Option<&AccessInfo>) {
        for i in &mut self.indicators {
            i.granted(info);
        }
    }
    fn denied(&mut self, info: Option<&AccessInfo>) {
        for i in &mut self.indicators {
            i.denied(info);
        }
    }
    fn opening(&mut self, info: Option<&AccessInfo>) {
        for i in &mut self.indicators {
            i.opening(info);
        }
    }
    fn connection_lost(&mut self) {
        for i in &mut self.indicators {
            i.connection_lost();
        }
    }
    fn shutdown(&mut self) {
        for i in &mut self.indicators {
            i.shutdown();
        }
    }
    fn release(&mut self) {
        for i in &mut self.indicators {
            i.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl Indicator for Counting {
        fn idle(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn granted(&mut self, _info: Option<&AccessInfo>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn denied(&mut self, _info: Option<&AccessInfo>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn opening(&mut self, _info: Option<&AccessInfo>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn connection_lost(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn shutdown(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn multi_indicator_fans_out() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let mut multi = MultiIndicator::new(vec![
            Box::new(Counting(Arc::clone(&a))),
            Box::new(Counting(Arc::clone(&b))),
        ]);
        multi.idle();
        multi.granted(None);
        multi.connection_lost();
        assert_eq!(a.load(Ordering::SeqCst), 3);
        assert_eq!(b.load(Ordering::SeqCst), 3);
    }
}
