//! # Screen Capability
//!
//! One state of the kiosk UI is a [`Screen`]. The manager owns one boxed
//! instance per [`ScreenId`], registered once at startup and reused across
//! activations; a screen resets its own transient fields in [`Screen::exit`]
//! and assigns them fresh in [`Screen::init`].
//!
//! ## Locking contract
//!
//! `init`, `update`, and `handle_event` are always invoked with the manager
//! lock already held *on the caller's behalf*, surfaced as the
//! [`Ctx`](crate::manager::Ctx) capability token. Everything a screen may
//! legally do from a callback (switch screens, arm and cancel timers, read
//! the vending session, draw, flush) is a method on the token, so no callback
//! can ever deadlock against the manager.
//!
//! `exit` is different: it runs while the manager is mid-transition, after
//! the screen's timers have already been cancelled, and therefore receives
//! no token. An `exit` implementation can only zero its own fields. This
//! replaces the "never call ClearTimeout from Exit" comment convention of
//! older firmware with a signature that will not compile otherwise.

use std::any::Any;
use std::fmt;

use crate::event::Event;
use crate::manager::Ctx;

/// Identifies a registered screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScreenId {
    Idle,
    Granted,
    Denied,
    Opening,
    ConnectionLost,
    Shutdown,
    // Vending flow
    SelectAmount,
    Confirm,
    InsufficientFunds,
    Processing,
    Success,
    PaymentFailed,
    Aborted,
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The interface every screen implements.
pub trait Screen: Send {
    /// Called when this screen becomes current. May arm timers, read
    /// manager-held session state, or immediately redirect via
    /// [`Ctx::switch_to`]; on redirect the manager skips the `update` that
    /// would normally follow.
    fn init(&mut self, ctx: &mut Ctx<'_>);

    /// Redraw unconditionally from current field state.
    fn update(&mut self, ctx: &mut Ctx<'_>);

    /// Process an input event. Returning `true` means the event was consumed
    /// and the caller must not apply its own default reaction.
    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool;

    /// Called when leaving this screen, with the manager lock held and this
    /// screen's timers already cancelled. Reset transient fields only.
    fn exit(&mut self);

    /// Diagnostic label.
    fn name(&self) -> &'static str;

    /// Downcast seam, used by timer callbacks and by the display wrapper to
    /// reach a concrete screen behind the trait object.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
