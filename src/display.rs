//! # Display Wrapper
//!
//! [`Display`] is what the rest of the application talks to: it builds the
//! screen manager over a surface, registers every screen once, and exposes
//! the convenience entry points the access-control logic uses (show granted,
//! show denied, start a vending session, ...). Screens never reach each
//! other directly; everything goes through the manager.

use std::sync::Arc;

use crate::event::{AccessInfo, Event};
use crate::manager::Manager;
use crate::screen::ScreenId;
use crate::screens::{
    ConnectionLostScreen, DeniedScreen, GrantedScreen, IdleScreen, OpeningScreen, ShutdownScreen,
};
use crate::surface::{Color, Surface};
use crate::vending::{
    AbortedScreen, ConfirmScreen, InsufficientFundsScreen, PaymentFailedScreen, ProcessingScreen,
    SelectAmountScreen, SuccessScreen,
};

pub struct Display {
    manager: Arc<Manager>,
}

impl Display {
    /// Build the manager, register the full screen set, and blank the panel.
    /// The caller decides when to show the first screen (usually `idle`).
    pub fn new(surface: Box<dyn Surface>) -> Self {
        let manager = Manager::new(surface);

        manager.register(ScreenId::Idle, Box::<IdleScreen>::default());
        manager.register(ScreenId::Granted, Box::<GrantedScreen>::default());
        manager.register(ScreenId::Denied, Box::<DeniedScreen>::default());
        manager.register(ScreenId::Opening, Box::<OpeningScreen>::default());
        manager.register(ScreenId::ConnectionLost, Box::<ConnectionLostScreen>::default());
        manager.register(ScreenId::Shutdown, Box::<ShutdownScreen>::default());

        manager.register(ScreenId::SelectAmount, Box::<SelectAmountScreen>::default());
        manager.register(ScreenId::Confirm, Box::<ConfirmScreen>::default());
        manager.register(
            ScreenId::InsufficientFunds,
            Box::<InsufficientFundsScreen>::default(),
        );
        manager.register(ScreenId::Processing, Box::<ProcessingScreen>::default());
        manager.register(ScreenId::Success, Box::<SuccessScreen>::default());
        manager.register(ScreenId::PaymentFailed, Box::<PaymentFailedScreen>::default());
        manager.register(ScreenId::Aborted, Box::<AbortedScreen>::default());

        manager.fill_background(Color::new(0, 0, 0));
        manager.flush();

        Display { manager }
    }

    /// Direct access for producers that feed events or timers.
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn send_event(&self, event: Event) -> bool {
        self.manager.send_event(event)
    }

    pub fn idle(&self) {
        self.manager.switch_to(ScreenId::Idle);
    }

    pub fn granted(&self, info: &AccessInfo) {
        self.manager
            .with_screen(ScreenId::Granted, |s: &mut GrantedScreen| {
                s.set_info(info.clone())
            });
        self.manager.switch_to(ScreenId::Granted);
    }

    pub fn denied(&self, info: &AccessInfo) {
        self.manager
            .with_screen(ScreenId::Denied, |s: &mut DeniedScreen| {
                s.set_info(info.clone())
            });
        self.manager.switch_to(ScreenId::Denied);
    }

    pub fn opening(&self, info: &AccessInfo) {
        self.manager
            .with_screen(ScreenId::Opening, |s: &mut OpeningScreen| {
                s.set_info(info.clone())
            });
        self.manager.switch_to(ScreenId::Opening);
    }

    pub fn connection_lost(&self) {
        self.manager.switch_to(ScreenId::ConnectionLost);
    }

    pub fn shutdown(&self) {
        self.manager.switch_to(ScreenId::Shutdown);
    }

    /// Open a vending session for an authorized member and enter the
    /// amount-selection flow.
    pub fn start_vending(&self, member: &str, nickname: &str, balance: u32) {
        self.manager.clear_vending_session();
        self.manager.set_vending_session(member, nickname, 0);
        self.manager.set_vending_balance(balance);
        self.manager.switch_to(ScreenId::SelectAmount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::NullSurface;

    fn display() -> Display {
        Display::new(Box::new(NullSurface::new(320, 240)))
    }

    #[test]
    fn entry_points_reach_the_expected_screens() {
        let d = display();
        d.idle();
        assert_eq!(d.manager().current(), Some(ScreenId::Idle));

        let info = AccessInfo {
            member: "m.smith".into(),
            allowed: true,
            ..AccessInfo::default()
        };
        d.granted(&info);
        assert_eq!(d.manager().current(), Some(ScreenId::Granted));
        d.opening(&info);
        assert_eq!(d.manager().current(), Some(ScreenId::Opening));
        d.connection_lost();
        assert_eq!(d.manager().current(), Some(ScreenId::ConnectionLost));
        d.shutdown();
        assert_eq!(d.manager().current(), Some(ScreenId::Shutdown));
    }

    #[test]
    fn start_vending_seeds_the_session_and_enters_select_amount() {
        let d = display();
        d.start_vending("m.smith", "Morgan", 250);
        assert_eq!(d.manager().current(), Some(ScreenId::SelectAmount));

        let session = d.manager().vending_session().unwrap();
        assert_eq!(session.balance, 250);
        // SelectAmount applied its default purchase amount on entry.
        assert_eq!(session.amount, 100);
    }
}
