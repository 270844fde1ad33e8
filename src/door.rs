//! # Door Actuators
//!
//! The physical lock is driven through [`DoorOpener`]. Real hardware
//! (strike on a GPIO pin, servo latch on PWM) is only compiled with the
//! `hardware` feature on Linux; everywhere else the no-op actuator keeps
//! the rest of the kiosk testable.

use crate::config::DoorSettings;

/// Door/lock control.
pub trait DoorOpener: Send {
    /// Unlock or open the door.
    fn open(&mut self) -> anyhow::Result<()>;

    /// Lock or close the door.
    fn close(&mut self) -> anyhow::Result<()>;

    /// Release hardware resources.
    fn release(&mut self) {}
}

/// Actuator that does nothing; default when no pin is configured.
pub struct NoopDoor;

impl DoorOpener for NoopDoor {
    fn open(&mut self) -> anyhow::Result<()> {
        log::info!("door: open (noop)");
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        log::info!("door: close (noop)");
        Ok(())
    }
}

/// Build an actuator from configuration.
pub fn from_settings(settings: &DoorSettings) -> anyhow::Result<Box<dyn DoorOpener>> {
    match settings.kind.as_str() {
        #[cfg(all(target_os = "linux", feature = "hardware"))]
        "gpio_high" | "gpio_low" => {
            let pin = settings
                .pin
                .ok_or_else(|| anyhow::anyhow!("door.pin required for {}", settings.kind))?;
            Ok(Box::new(hardware::GpioDoor::new(
                pin,
                settings.kind == "gpio_high",
            )?))
        }
        #[cfg(all(target_os = "linux", feature = "hardware"))]
        "servo" => Ok(Box::new(hardware::ServoDoor::new(
            settings.servo_open_us,
            settings.servo_close_us,
        )?)),
        "none" => Ok(Box::new(NoopDoor)),
        other => {
            log::warn!("door: unsupported kind {other:?} in this build, using noop");
            Ok(Box::new(NoopDoor))
        }
    }
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hardware {
    use super::DoorOpener;
    use rppal::gpio::{Gpio, OutputPin};
    use rppal::pwm::{Channel, Polarity, Pwm};
    use std::time::Duration;

    /// Electric strike on a single GPIO line.
    pub struct GpioDoor {
        pin: OutputPin,
        active_high: bool,
    }

    impl GpioDoor {
        pub fn new(pin: u8, active_high: bool) -> anyhow::Result<Self> {
            let mut pin = Gpio::new()?.get(pin)?.into_output();
            if active_high {
                pin.set_low();
            } else {
                pin.set_high();
            }
            Ok(GpioDoor { pin, active_high })
        }
    }

    impl DoorOpener for GpioDoor {
        fn open(&mut self) -> anyhow::Result<()> {
            if self.active_high {
                self.pin.set_high();
            } else {
                self.pin.set_low();
            }
            Ok(())
        }

        fn close(&mut self) -> anyhow::Result<()> {
            if self.active_high {
                self.pin.set_low();
            } else {
                self.pin.set_high();
            }
            Ok(())
        }
    }

    /// Servo latch on the hardware PWM channel, standard 50 Hz frame.
    pub struct ServoDoor {
        pwm: Pwm,
        open_us: u64,
        close_us: u64,
    }

    impl ServoDoor {
        pub fn new(open_us: u64, close_us: u64) -> anyhow::Result<Self> {
            let pwm = Pwm::with_period(
                Channel::Pwm0,
                Duration::from_millis(20),
                Duration::from_micros(close_us),
                Polarity::Normal,
                true,
            )?;
            Ok(ServoDoor {
                pwm,
                open_us,
                close_us,
            })
        }
    }

    impl DoorOpener for ServoDoor {
        fn open(&mut self) -> anyhow::Result<()> {
            self.pwm
                .set_pulse_width(Duration::from_micros(self.open_us))?;
            Ok(())
        }

        fn close(&mut self) -> anyhow::Result<()> {
            self.pwm
                .set_pulse_width(Duration::from_micros(self.close_us))?;
            Ok(())
        }

        fn release(&mut self) {
            let _ = self.pwm.disable();
        }
    }
}
