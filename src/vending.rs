//! # Vending Flow Screens
//!
//! Seven screens implement the on-device purchase flow:
//!
//! ```text
//! SelectAmount -> Confirm -> Processing -> Success | PaymentFailed
//!                    |  ^
//!                    v  |
//!            InsufficientFunds
//! ```
//!
//! plus Aborted, reachable from every non-terminal step by long press or
//! inactivity timeout. The terminal screens (Success, PaymentFailed,
//! Aborted) clear the vending session on entry and fall back to Idle.
//!
//! The two knob-driven screens coalesce redraws: a turn updates the session
//! amount synchronously (so the insufficiency check on Confirm always sees
//! the latest value) but defers the partial redraw behind a short timer, so
//! a fast-spinning encoder cannot saturate the flush path.

use std::any::Any;
use std::sync::OnceLock;
use std::time::Duration;

use crate::event::Event;
use crate::manager::{cents, Ctx};
use crate::screen::{Screen, ScreenId};
use crate::surface::{Color, Sprite};
use crate::timer::TimerId;

const WHITE: Color = Color::new(255, 255, 255);
const YELLOW: Color = Color::new(255, 255, 0);
const LIGHT: Color = Color::new(230, 230, 230);
const GRAY: Color = Color::new(204, 204, 204);

const BLUE_BG: Color = Color::new(0, 102, 153);
const GREEN_BG: Color = Color::new(0, 153, 0);
const ORANGE_BG: Color = Color::new(153, 76, 0);
const RED_BG: Color = Color::new(153, 0, 0);

/// How long the redraw of a knob-driven value may lag behind the value
/// itself. Within one interval any number of turns produce one flush.
const REDRAW_INTERVAL: Duration = Duration::from_millis(50);

fn cents_signed(amount: i64) -> String {
    if amount < 0 {
        format!("-{}", cents((-amount) as u32))
    } else {
        cents(amount as u32)
    }
}

/// Pick the purchase amount with the knob.
#[derive(Default)]
pub struct SelectAmountScreen {
    member: String,
    nickname: String,
    amount: u32,
    balance: u32,
    timeout: Option<TimerId>,
    redraw_timer: Option<TimerId>,
    pending_redraw: bool,
}

impl SelectAmountScreen {
    const MIN: u32 = 75;
    const MAX: u32 = 500;
    const STEP: u32 = 25;
    const DEFAULT: u32 = 100;
    const TIMEOUT: Duration = Duration::from_secs(30);

    fn amount_rect(ctx: &Ctx<'_>) -> (i32, i32, i32, i32) {
        ((ctx.width() - 260) / 2, ctx.height() / 2 - 8, 260, 96)
    }

    fn start_timeout(&mut self, ctx: &mut Ctx<'_>) {
        self.timeout = Some(ctx.set_timeout(Self::TIMEOUT, |_, ctx| {
            ctx.switch_to(ScreenId::Aborted)
        }));
    }

    fn draw_amount(&self, ctx: &mut Ctx<'_>) {
        let (x, y, w, h) = Self::amount_rect(ctx);
        ctx.fill_rect(x, y, w, h, BLUE_BG);
        ctx.set_font_size(72);
        ctx.draw_centered(&cents(self.amount), ctx.height() / 2 + 40, YELLOW);
        ctx.flush_rect(x, y, w, h);
    }
}

impl Screen for SelectAmountScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        let session = ctx.vending_session().unwrap_or_default();
        self.member = session.member;
        self.nickname = session.nickname;
        self.amount = session.amount;
        self.balance = session.balance;

        if self.amount == 0 {
            self.amount = Self::DEFAULT;
            ctx.set_vending_session(&self.member, &self.nickname, self.amount);
        }

        self.pending_redraw = false;
        self.redraw_timer = None;
        self.start_timeout(ctx);
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(BLUE_BG);
        let mid = ctx.height() / 2;

        ctx.set_font_size(48);
        ctx.draw_centered("Select Amount", mid - 90, WHITE);

        let name = if self.nickname.is_empty() {
            &self.member
        } else {
            &self.nickname
        };
        if !name.is_empty() {
            ctx.set_font_size(28);
            ctx.draw_centered(name, mid - 55, LIGHT);
        }

        ctx.set_font_size(20);
        ctx.draw_centered(&format!("Balance: {}", cents(self.balance)), mid - 25, GRAY);

        ctx.set_font_size(72);
        ctx.draw_centered(&cents(self.amount), mid + 40, YELLOW);

        ctx.set_font_size(20);
        ctx.draw_centered("Turn knob to adjust", mid + 100, LIGHT);
        ctx.draw_centered("Press to confirm", mid + 130, LIGHT);

        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        match event {
            Event::RotaryTurn { delta } => {
                // The authoritative value moves immediately; only the redraw
                // is deferred.
                let stepped = self.amount as i64 + *delta as i64 * Self::STEP as i64;
                self.amount = stepped.clamp(Self::MIN as i64, Self::MAX as i64) as u32;
                ctx.set_vending_session(&self.member, &self.nickname, self.amount);

                if !self.pending_redraw {
                    self.pending_redraw = true;
                    self.redraw_timer =
                        Some(ctx.set_timeout(REDRAW_INTERVAL, |screen, ctx| {
                            if let Some(s) =
                                screen.as_any_mut().downcast_mut::<SelectAmountScreen>()
                            {
                                if s.redraw_timer.take().is_some() {
                                    s.pending_redraw = false;
                                    s.draw_amount(ctx);
                                }
                            }
                        }));
                }

                // Every turn restarts the inactivity countdown.
                if let Some(id) = self.timeout.take() {
                    ctx.clear_timeout(id);
                }
                self.start_timeout(ctx);
                true
            }
            Event::RotaryPress => {
                ctx.switch_to(ScreenId::Confirm);
                true
            }
            Event::RotaryLongPress => {
                ctx.switch_to(ScreenId::Aborted);
                true
            }
            _ => false,
        }
    }

    fn exit(&mut self) {
        self.member.clear();
        self.nickname.clear();
        self.amount = 0;
        self.balance = 0;
        self.timeout = None;
        self.redraw_timer = None;
        self.pending_redraw = false;
    }

    fn name(&self) -> &'static str {
        "SelectAmount"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Final confirmation. Redirects straight to InsufficientFunds when the
/// balance (plus any pending top-up) cannot cover the purchase; in that
/// case no timeout is armed and this screen never draws.
#[derive(Default)]
pub struct ConfirmScreen {
    member: String,
    nickname: String,
    amount: u32,
    balance: u32,
    add_amount: u32,
    timeout: Option<TimerId>,
}

impl ConfirmScreen {
    const TIMEOUT: Duration = Duration::from_secs(10);
}

impl Screen for ConfirmScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        let session = ctx.vending_session().unwrap_or_default();
        self.member = session.member;
        self.nickname = session.nickname;
        self.amount = session.amount;
        self.balance = session.balance;
        self.add_amount = session.add_amount;

        if self.amount > self.balance + self.add_amount {
            // Not enough credit: hand off without arming our own timeout.
            ctx.switch_to(ScreenId::InsufficientFunds);
            return;
        }

        self.timeout = Some(ctx.set_timeout(Self::TIMEOUT, |_, ctx| {
            ctx.switch_to(ScreenId::Aborted)
        }));
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(GREEN_BG);
        let mid = ctx.height() / 2;

        ctx.set_font_size(48);
        ctx.draw_centered("Confirm Payment", mid - 90, WHITE);

        let name = if self.nickname.is_empty() {
            self.member.clone()
        } else {
            self.nickname.clone()
        };
        if !name.is_empty() {
            ctx.set_font_size(28);
            ctx.draw_centered(&name, mid - 50, LIGHT);
        }

        if self.add_amount > 0 {
            ctx.set_font_size(24);
            ctx.draw_centered(&format!("Purchase: {}", cents(self.amount)), mid - 10, WHITE);
            ctx.draw_centered(&format!("Adding: {}", cents(self.add_amount)), mid + 20, YELLOW);

            let remaining = self.balance + self.add_amount - self.amount;
            ctx.set_font_size(20);
            ctx.draw_centered(
                &format!("New Balance: {}", cents(remaining)),
                mid + 55,
                Color::new(204, 255, 204),
            );
        } else {
            ctx.set_font_size(64);
            ctx.draw_centered(&cents(self.amount), mid + 10, YELLOW);

            let remaining = self.balance - self.amount;
            ctx.set_font_size(24);
            ctx.draw_centered(&format!("Remaining: {}", cents(remaining)), mid + 60, LIGHT);
        }

        ctx.set_font_size(20);
        ctx.draw_centered("Press to complete", mid + 95, LIGHT);
        ctx.draw_centered("Hold to cancel", mid + 120, LIGHT);

        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        match event {
            Event::RotaryPress => {
                ctx.switch_to(ScreenId::Processing);
                true
            }
            Event::RotaryLongPress => {
                ctx.switch_to(ScreenId::Aborted);
                true
            }
            _ => false,
        }
    }

    fn exit(&mut self) {
        self.member.clear();
        self.nickname.clear();
        self.amount = 0;
        self.balance = 0;
        self.add_amount = 0;
        self.timeout = None;
    }

    fn name(&self) -> &'static str {
        "Confirm"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Pick a top-up amount when the balance cannot cover the purchase.
#[derive(Default)]
pub struct InsufficientFundsScreen {
    purchase: u32,
    balance: u32,
    add_amount: u32,
    timeout: Option<TimerId>,
    redraw_timer: Option<TimerId>,
    pending_redraw: bool,
}

impl InsufficientFundsScreen {
    const MIN_ADD: u32 = 100;
    const MAX_ADD: u32 = 1000;
    const STEP: u32 = 100;
    const DEFAULT_ADD: u32 = 500;
    const TIMEOUT: Duration = Duration::from_secs(30);

    fn amounts_rect(ctx: &Ctx<'_>) -> (i32, i32, i32, i32) {
        ((ctx.width() - 300) / 2, ctx.height() / 2 - 45, 300, 150)
    }

    fn start_timeout(&mut self, ctx: &mut Ctx<'_>) {
        self.timeout = Some(ctx.set_timeout(Self::TIMEOUT, |_, ctx| {
            ctx.switch_to(ScreenId::Aborted)
        }));
    }

    fn draw_amounts(&self, ctx: &mut Ctx<'_>) {
        let mid = ctx.height() / 2;

        ctx.set_font_size(20);
        ctx.draw_centered(&format!("Purchase: {}", cents(self.purchase)), mid - 50, WHITE);
        ctx.draw_centered(&format!("Balance: {}", cents(self.balance)), mid - 20, WHITE);

        ctx.set_font_size(32);
        ctx.draw_centered(&format!("Add: {}", cents(self.add_amount)), mid + 20, YELLOW);

        let after = self.balance as i64 + self.add_amount as i64 - self.purchase as i64;
        let color = if after >= 0 {
            Color::new(230, 255, 230)
        } else {
            Color::new(128, 128, 128)
        };
        ctx.set_font_size(24);
        ctx.draw_centered(&format!("After: {}", cents_signed(after)), mid + 60, color);
    }

    fn redraw_amounts(&self, ctx: &mut Ctx<'_>) {
        let (x, y, w, h) = Self::amounts_rect(ctx);
        ctx.fill_rect(x, y, w, h, ORANGE_BG);
        self.draw_amounts(ctx);
        ctx.flush_rect(x, y, w, h);
    }
}

impl Screen for InsufficientFundsScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        let session = ctx.vending_session().unwrap_or_default();
        self.purchase = session.amount;
        self.balance = session.balance;
        self.add_amount = session.add_amount;

        if self.add_amount == 0 {
            self.add_amount = Self::DEFAULT_ADD;
            ctx.set_vending_add_amount(self.add_amount);
        }

        self.pending_redraw = false;
        self.redraw_timer = None;
        self.start_timeout(ctx);
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(ORANGE_BG);
        let mid = ctx.height() / 2;

        ctx.set_font_size(36);
        ctx.draw_centered("Insufficient Funds", mid - 100, WHITE);

        self.draw_amounts(ctx);

        ctx.set_font_size(18);
        ctx.draw_centered("Turn knob to adjust", mid + 110, LIGHT);
        ctx.draw_centered("Press to confirm", mid + 135, LIGHT);

        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        match event {
            Event::RotaryTurn { delta } => {
                let stepped = self.add_amount as i64 + *delta as i64 * Self::STEP as i64;
                self.add_amount =
                    stepped.clamp(Self::MIN_ADD as i64, Self::MAX_ADD as i64) as u32;
                ctx.set_vending_add_amount(self.add_amount);

                if !self.pending_redraw {
                    self.pending_redraw = true;
                    self.redraw_timer =
                        Some(ctx.set_timeout(REDRAW_INTERVAL, |screen, ctx| {
                            if let Some(s) = screen
                                .as_any_mut()
                                .downcast_mut::<InsufficientFundsScreen>()
                            {
                                if s.redraw_timer.take().is_some() {
                                    s.pending_redraw = false;
                                    s.redraw_amounts(ctx);
                                }
                            }
                        }));
                }

                if let Some(id) = self.timeout.take() {
                    ctx.clear_timeout(id);
                }
                self.start_timeout(ctx);
                true
            }
            Event::RotaryPress => {
                // Back to Confirm, which re-checks the new total.
                ctx.switch_to(ScreenId::Confirm);
                true
            }
            Event::RotaryLongPress => {
                ctx.switch_to(ScreenId::Aborted);
                true
            }
            _ => false,
        }
    }

    fn exit(&mut self) {
        self.purchase = 0;
        self.balance = 0;
        self.add_amount = 0;
        self.timeout = None;
        self.redraw_timer = None;
        self.pending_redraw = false;
    }

    fn name(&self) -> &'static str {
        "InsufficientFunds"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

const SPINNER_SIZE: i32 = 48;
const SPINNER_FRAME_COUNT: usize = 8;

/// Dot positions and tail fade for the spinner, generated once.
fn spinner_frames() -> &'static [Sprite] {
    static FRAMES: OnceLock<Vec<Sprite>> = OnceLock::new();
    FRAMES.get_or_init(|| {
        const DOTS: [(u32, u32); SPINNER_FRAME_COUNT] = [
            (41, 24),
            (36, 36),
            (24, 41),
            (12, 36),
            (7, 24),
            (12, 12),
            (24, 7),
            (36, 12),
        ];
        const FADE: [u8; SPINNER_FRAME_COUNT] = [255, 200, 160, 125, 100, 80, 65, 55];

        (0..SPINNER_FRAME_COUNT)
            .map(|frame| {
                let mut sprite =
                    Sprite::solid(SPINNER_SIZE as u32, SPINNER_SIZE as u32, BLUE_BG);
                for (dot, &(cx, cy)) in DOTS.iter().enumerate() {
                    let age = (dot + SPINNER_FRAME_COUNT - frame) % SPINNER_FRAME_COUNT;
                    let v = FADE[age];
                    let color = Color::new(v, v, v);
                    for dy in 0..5u32 {
                        for dx in 0..5u32 {
                            sprite.set_pixel(cx + dx - 2, cy + dy - 2, color);
                        }
                    }
                }
                sprite
            })
            .collect()
    })
}

/// Spinner while the (stand-in) payment settles; the outcome is decided by
/// a timer, not by user input.
#[derive(Default)]
pub struct ProcessingScreen {
    frame: usize,
    timeout: Option<TimerId>,
    spinner_timer: Option<TimerId>,
}

impl ProcessingScreen {
    const DECIDE_AFTER: Duration = Duration::from_secs(5);
    const FRAME_INTERVAL: Duration = Duration::from_millis(100);

    fn spinner_pos(ctx: &Ctx<'_>) -> (i32, i32) {
        ((ctx.width() - SPINNER_SIZE) / 2, ctx.height() / 2 + 30)
    }

    fn draw_spinner(&self, ctx: &mut Ctx<'_>) {
        let (x, y) = Self::spinner_pos(ctx);
        ctx.draw_image(&spinner_frames()[self.frame], x, y);
        ctx.flush_rect(x, y, SPINNER_SIZE, SPINNER_SIZE);
    }

    fn start_spinner(&mut self, ctx: &mut Ctx<'_>) {
        self.spinner_timer = Some(ctx.set_timeout(Self::FRAME_INTERVAL, |screen, ctx| {
            if let Some(s) = screen.as_any_mut().downcast_mut::<ProcessingScreen>() {
                if s.spinner_timer.take().is_some() {
                    s.frame = (s.frame + 1) % SPINNER_FRAME_COUNT;
                    s.draw_spinner(ctx);
                    s.start_spinner(ctx);
                }
            }
        }));
    }
}

impl Screen for ProcessingScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        self.frame = 0;
        self.start_spinner(ctx);

        // Placeholder outcome until a payment backend exists.
        self.timeout = Some(ctx.set_timeout(Self::DECIDE_AFTER, |_, ctx| {
            if rand::random::<bool>() {
                ctx.switch_to(ScreenId::Success);
            } else {
                ctx.switch_to(ScreenId::PaymentFailed);
            }
        }));
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(BLUE_BG);
        let mid = ctx.height() / 2;

        ctx.set_font_size(48);
        ctx.draw_centered("Processing", mid - 40, WHITE);
        ctx.set_font_size(24);
        ctx.draw_centered("Please wait...", mid + 5, LIGHT);

        let (x, y) = Self::spinner_pos(ctx);
        ctx.draw_image(&spinner_frames()[self.frame], x, y);

        ctx.flush();
    }

    fn handle_event(&mut self, _ctx: &mut Ctx<'_>, _event: &Event) -> bool {
        false
    }

    fn exit(&mut self) {
        self.frame = 0;
        self.timeout = None;
        self.spinner_timer = None;
    }

    fn name(&self) -> &'static str {
        "Processing"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Payment went through. Clears the session on entry.
#[derive(Default)]
pub struct SuccessScreen {
    amount: u32,
    add_amount: u32,
    timer: Option<TimerId>,
}

impl SuccessScreen {
    const DWELL: Duration = Duration::from_secs(10);
}

impl Screen for SuccessScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        let session = ctx.vending_session().unwrap_or_default();
        self.amount = session.amount;
        self.add_amount = session.add_amount;
        ctx.clear_vending_session();

        self.timer = Some(ctx.set_timeout(Self::DWELL, |_, ctx| ctx.switch_to(ScreenId::Idle)));
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(GREEN_BG);
        let mid = ctx.height() / 2;

        ctx.set_font_size(48);
        ctx.draw_centered("Success!", mid - 30, WHITE);

        ctx.set_font_size(24);
        ctx.draw_centered(&format!("Paid: {}", cents(self.amount)), mid + 30, LIGHT);
        if self.add_amount > 0 {
            ctx.draw_centered(&format!("Added: {}", cents(self.add_amount)), mid + 60, LIGHT);
        }

        ctx.set_font_size(20);
        ctx.draw_centered("Press button to continue", mid + 120, GRAY);

        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        if matches!(event, Event::RotaryPress | Event::RotaryLongPress) {
            ctx.switch_to(ScreenId::Idle);
            return true;
        }
        false
    }

    fn exit(&mut self) {
        self.amount = 0;
        self.add_amount = 0;
        self.timer = None;
    }

    fn name(&self) -> &'static str {
        "Success"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Payment bounced. Clears the session on entry.
#[derive(Default)]
pub struct PaymentFailedScreen {
    amount: u32,
    add_amount: u32,
    timer: Option<TimerId>,
}

impl PaymentFailedScreen {
    const DWELL: Duration = Duration::from_secs(10);
}

impl Screen for PaymentFailedScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        let session = ctx.vending_session().unwrap_or_default();
        self.amount = session.amount;
        self.add_amount = session.add_amount;
        ctx.clear_vending_session();

        self.timer = Some(ctx.set_timeout(Self::DWELL, |_, ctx| ctx.switch_to(ScreenId::Idle)));
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(RED_BG);
        let mid = ctx.height() / 2;

        ctx.set_font_size(48);
        ctx.draw_centered("Payment Failed", mid - 30, WHITE);

        ctx.set_font_size(24);
        ctx.draw_centered(&format!("Amount: {}", cents(self.amount)), mid + 30, LIGHT);
        if self.add_amount > 0 {
            ctx.draw_centered(&format!("Add: {}", cents(self.add_amount)), mid + 60, LIGHT);
        }

        ctx.set_font_size(20);
        ctx.draw_centered("Press button to continue", mid + 120, GRAY);

        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        if matches!(event, Event::RotaryPress | Event::RotaryLongPress) {
            ctx.switch_to(ScreenId::Idle);
            return true;
        }
        false
    }

    fn exit(&mut self) {
        self.amount = 0;
        self.add_amount = 0;
        self.timer = None;
    }

    fn name(&self) -> &'static str {
        "PaymentFailed"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Cancelled, by long press or inactivity. Clears the session on entry.
#[derive(Default)]
pub struct AbortedScreen {
    timer: Option<TimerId>,
}

impl AbortedScreen {
    const DWELL: Duration = Duration::from_secs(5);
}

impl Screen for AbortedScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        ctx.clear_vending_session();
        self.timer = Some(ctx.set_timeout(Self::DWELL, |_, ctx| ctx.switch_to(ScreenId::Idle)));
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(RED_BG);
        let mid = ctx.height() / 2;

        ctx.set_font_size(64);
        ctx.draw_centered("Cancelled", mid - 20, WHITE);
        ctx.set_font_size(24);
        ctx.draw_centered("Press button to continue", mid + 40, LIGHT);

        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        if matches!(event, Event::RotaryPress | Event::RotaryLongPress) {
            ctx.switch_to(ScreenId::Idle);
            return true;
        }
        false
    }

    fn exit(&mut self) {
        self.timer = None;
    }

    fn name(&self) -> &'static str {
        "Aborted"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
