//! # Access Kiosk Core Library
//!
//! Controller library for an unattended access-control terminal: an RFID
//! reader, a door actuator, LED indicators, and a small framebuffer panel
//! whose only input device is a rotary-encoder knob. The same machine can
//! run a self-service vending flow on the panel.
//!
//! ## Architecture
//!
//! The center of the crate is the screen manager ([`manager::Manager`]), a
//! mutex-guarded finite-state machine. Independent producer threads (tag
//! reader, rotary knob, messaging callbacks, the debug event socket, timer
//! expirations) all call into it concurrently; it dispatches into exactly
//! one active [`screen::Screen`] at a time. Screens draw on a shared
//! [`surface::Surface`], schedule one-shot timers that are torn down
//! automatically when the screen exits, and request transitions.
//!
//! Everything else is a collaborator consumed through a trait so the core
//! stays testable on any host:
//!
//! - [`acl`]: cached member list with on-disk persistence and API refresh
//! - [`reader`]: blocking tag readers
//! - [`door`]: strike/servo actuators (`hardware` feature)
//! - [`indicator`]: LED and screen-backed status indicators
//! - [`eventpipe`]: line-oriented debug channel over a Unix socket
//! - [`mqtt`]: broker topic layout and command validation
//!
//! ## Concurrency contract
//!
//! All public manager entry points are safe from any thread. Screen
//! callbacks receive a capability token ([`manager::Ctx`]) instead of
//! taking locks; `exit` runs locked and tokenless. See the `manager`
//! module docs for the full rules.

// Module declarations
pub mod acl;
pub mod config;
pub mod display;
pub mod door;
pub mod event;
pub mod eventpipe;
pub mod indicator;
pub mod manager;
pub mod mqtt;
pub mod reader;
pub mod screen;
pub mod screens;
pub mod surface;
pub mod timer;
pub mod vending;

#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod rotary;

pub use config::Config;
pub use display::Display;
pub use event::{AccessInfo, Event, PinId};
pub use manager::{Ctx, Manager, VendingSession};
pub use screen::{Screen, ScreenId};
pub use surface::{BufferSurface, Color, FlushSink, NullSurface, Surface};
pub use timer::TimerId;
