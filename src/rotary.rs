//! # Rotary Encoder Input
//!
//! Quadrature decode for the selection knob plus its push button, sampled
//! from three GPIO lines on a 1 kHz polling thread. Turns, short presses,
//! and long presses are delivered through callbacks; the application maps
//! them onto [`Event`](crate::event::Event)s for the screen manager.
//!
//! Only compiled with the `hardware` feature on Linux.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rppal::gpio::{Gpio, Level};

use crate::config::RotarySettings;

/// Callbacks for knob activity. All are invoked on the polling thread.
pub struct Handlers {
    /// +1 per clockwise detent, -1 per counter-clockwise detent.
    pub on_turn: Box<dyn Fn(i32) + Send>,
    pub on_press: Box<dyn Fn() + Send>,
    pub on_long_press: Box<dyn Fn() + Send>,
}

/// Held-down time after which a press becomes a long press.
const LONG_PRESS: Duration = Duration::from_millis(1000);

const SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

pub struct Rotary {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Rotary {
    /// Start the polling thread. Returns `None` when no pins are
    /// configured, which disables the knob entirely.
    pub fn spawn(settings: &RotarySettings, handlers: Handlers) -> anyhow::Result<Option<Self>> {
        let (Some(clk_pin), Some(dt_pin)) = (settings.clk_pin, settings.dt_pin) else {
            return Ok(None);
        };

        let gpio = Gpio::new()?;
        let clk = gpio.get(clk_pin)?.into_input_pullup();
        let dt = gpio.get(dt_pin)?.into_input_pullup();
        let button = match settings.button_pin {
            Some(pin) => Some(gpio.get(pin)?.into_input_pullup()),
            None => None,
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("kiosk-rotary".into())
            .spawn(move || {
                let mut last_clk = clk.read();
                let mut pressed_at: Option<Instant> = None;
                let mut long_fired = false;

                while !stop_flag.load(Ordering::SeqCst) {
                    // Quadrature: direction is the DT level at the CLK edge.
                    let clk_now = clk.read();
                    if clk_now != last_clk {
                        if clk_now == Level::Low {
                            let delta = if dt.read() == Level::High { 1 } else { -1 };
                            (handlers.on_turn)(delta);
                        }
                        last_clk = clk_now;
                    }

                    if let Some(button) = &button {
                        let down = button.read() == Level::Low;
                        match (down, pressed_at) {
                            (true, None) => {
                                pressed_at = Some(Instant::now());
                                long_fired = false;
                            }
                            (true, Some(since)) => {
                                if !long_fired && since.elapsed() >= LONG_PRESS {
                                    long_fired = true;
                                    (handlers.on_long_press)();
                                }
                            }
                            (false, Some(_)) => {
                                if !long_fired {
                                    (handlers.on_press)();
                                }
                                pressed_at = None;
                            }
                            (false, None) => {}
                        }
                    }

                    thread::sleep(SAMPLE_INTERVAL);
                }
            })?;

        Ok(Some(Rotary {
            stop,
            handle: Some(handle),
        }))
    }
}

impl Drop for Rotary {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
