//! # Access-Control Screens
//!
//! The generic reactions of the kiosk: Idle, Granted, Denied, Opening,
//! ConnectionLost, and Shutdown. The application decides when to enter them
//! (via the [`Display`](crate::display::Display) convenience entry points);
//! the screens themselves only draw, run their dismiss timers, and react to
//! the rotary button.

use std::any::Any;
use std::time::Duration;

use chrono::Local;

use crate::event::{AccessInfo, Event};
use crate::manager::Ctx;
use crate::screen::{Screen, ScreenId};
use crate::surface::Color;
use crate::timer::TimerId;

const WHITE: Color = Color::new(255, 255, 255);
const YELLOW: Color = Color::new(255, 255, 0);
const LIGHT: Color = Color::new(230, 230, 230);

/// Ready state; destination of every terminal screen.
#[derive(Default)]
pub struct IdleScreen {
    debug_count: i32,
    debug_visible: bool,
    hide_timer: Option<TimerId>,
}

impl IdleScreen {
    const BG: Color = Color::new(0, 128, 0);
    const BAR: Color = Color::new(0, 64, 0);
    const HIDE_AFTER: Duration = Duration::from_secs(10);

    fn status_bar_rect(ctx: &Ctx<'_>) -> (i32, i32, i32, i32) {
        (0, ctx.height() - 40, ctx.width(), 40)
    }

    fn counter_rect(ctx: &Ctx<'_>) -> (i32, i32, i32, i32) {
        ((ctx.width() - 220) / 2, 50, 220, 60)
    }

    fn draw_status_bar(&self, ctx: &mut Ctx<'_>) {
        let (x, y, w, h) = Self::status_bar_rect(ctx);
        ctx.fill_rect(x, y, w, h, Self::BAR);
        ctx.set_font_size(20);
        let clock = Local::now().format("%b %-d  %-I:%M%P").to_string();
        ctx.draw_left(&clock, 12, y + h / 2, LIGHT);
        let (label, color) = if ctx.is_mqtt_connected() {
            ("online", Color::new(128, 255, 128))
        } else {
            ("OFFLINE", Color::new(255, 128, 128))
        };
        let x = ctx.width() - 12 - label.len() as i32 * 10;
        ctx.draw_left(label, x, y + h / 2, color);
    }

    fn draw_counter(&self, ctx: &mut Ctx<'_>) {
        let (x, y, w, h) = Self::counter_rect(ctx);
        ctx.fill_rect(x, y, w, h, Self::BAR);
        ctx.set_font_size(24);
        ctx.draw_anchored(
            &format!("knob {:+}", self.debug_count),
            x + w / 2,
            y + h / 2,
            YELLOW,
        );
    }

    fn reset_hide_timer(&mut self, ctx: &mut Ctx<'_>) {
        if let Some(id) = self.hide_timer.take() {
            ctx.clear_timeout(id);
        }
        self.hide_timer = Some(ctx.set_timeout(Self::HIDE_AFTER, |screen, ctx| {
            if let Some(idle) = screen.as_any_mut().downcast_mut::<IdleScreen>() {
                idle.debug_visible = false;
                idle.hide_timer = None;
                idle.update(ctx);
            }
        }));
    }
}

impl Screen for IdleScreen {
    fn init(&mut self, _ctx: &mut Ctx<'_>) {}

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(Self::BG);
        ctx.set_font_size(64);
        ctx.draw_centered("Ready", ctx.height() / 2 - 40, WHITE);
        ctx.set_font_size(28);
        ctx.draw_centered("Swipe fob to enter", ctx.height() / 2 + 30, LIGHT);
        self.draw_status_bar(ctx);
        if self.debug_visible {
            self.draw_counter(ctx);
        }
        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        match event {
            Event::RotaryTurn { delta } => {
                self.debug_count += delta;
                self.debug_visible = true;
                self.draw_counter(ctx);
                let (x, y, w, h) = Self::counter_rect(ctx);
                ctx.flush_rect(x, y, w, h);
                self.reset_hide_timer(ctx);
                true
            }
            Event::RotaryPress => {
                if self.debug_visible {
                    if let Some(id) = self.hide_timer.take() {
                        ctx.clear_timeout(id);
                    }
                    self.debug_visible = false;
                    self.update(ctx);
                    return true;
                }
                false
            }
            Event::MqttConnected | Event::MqttDisconnected => {
                self.draw_status_bar(ctx);
                let (x, y, w, h) = Self::status_bar_rect(ctx);
                ctx.flush_rect(x, y, w, h);
                true
            }
            _ => false,
        }
    }

    fn exit(&mut self) {
        self.debug_count = 0;
        self.debug_visible = false;
        self.hide_timer = None;
    }

    fn name(&self) -> &'static str {
        "Idle"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Shared drawing for the three member-info screens.
fn draw_member_lines(ctx: &mut Ctx<'_>, info: &AccessInfo, title_color: Color, warn_color: Color) {
    let y = ctx.height() / 2 - 40;
    let name = info.display_name();
    if !name.is_empty() {
        ctx.set_font_size(48);
        ctx.draw_centered(name, y + 70, title_color);
    }
    if !info.warning.is_empty() {
        ctx.set_font_size(32);
        ctx.draw_centered(&info.warning, y + 130, warn_color);
    }
}

/// Access granted; auto-returns to Idle after a short delay.
#[derive(Default)]
pub struct GrantedScreen {
    info: AccessInfo,
    timer: Option<TimerId>,
}

impl GrantedScreen {
    const BG: Color = Color::new(0, 178, 0);
    const DWELL: Duration = Duration::from_secs(5);

    /// Member info to display; supplied by the caller before switching in.
    pub fn set_info(&mut self, info: AccessInfo) {
        self.info = info;
    }
}

impl Screen for GrantedScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        self.timer = Some(ctx.set_timeout(Self::DWELL, |_, ctx| ctx.switch_to(ScreenId::Idle)));
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(Self::BG);
        ctx.set_font_size(64);
        ctx.draw_centered("Access Granted", ctx.height() / 2 - 40, WHITE);
        draw_member_lines(ctx, &self.info, WHITE, YELLOW);
        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        if matches!(event, Event::RotaryPress) {
            ctx.switch_to(ScreenId::Idle);
            return true;
        }
        false
    }

    fn exit(&mut self) {
        self.info = AccessInfo::default();
        self.timer = None;
    }

    fn name(&self) -> &'static str {
        "Granted"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Access denied; auto-returns to Idle a little faster than Granted.
#[derive(Default)]
pub struct DeniedScreen {
    info: AccessInfo,
    timer: Option<TimerId>,
}

impl DeniedScreen {
    const BG: Color = Color::new(178, 0, 0);
    const DWELL: Duration = Duration::from_secs(3);

    pub fn set_info(&mut self, info: AccessInfo) {
        self.info = info;
    }
}

impl Screen for DeniedScreen {
    fn init(&mut self, ctx: &mut Ctx<'_>) {
        self.timer = Some(ctx.set_timeout(Self::DWELL, |_, ctx| ctx.switch_to(ScreenId::Idle)));
    }

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(Self::BG);
        ctx.set_font_size(64);
        ctx.draw_centered("Access Denied", ctx.height() / 2 - 40, WHITE);
        draw_member_lines(ctx, &self.info, WHITE, YELLOW);
        ctx.flush();
    }

    fn handle_event(&mut self, ctx: &mut Ctx<'_>, event: &Event) -> bool {
        if matches!(event, Event::RotaryPress) {
            ctx.switch_to(ScreenId::Idle);
            return true;
        }
        false
    }

    fn exit(&mut self) {
        self.info = AccessInfo::default();
        self.timer = None;
    }

    fn name(&self) -> &'static str {
        "Denied"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Door actuation in progress; driven externally, no auto-timeout.
#[derive(Default)]
pub struct OpeningScreen {
    info: AccessInfo,
}

impl OpeningScreen {
    const BG: Color = Color::new(178, 178, 0);

    pub fn set_info(&mut self, info: AccessInfo) {
        self.info = info;
    }
}

impl Screen for OpeningScreen {
    fn init(&mut self, _ctx: &mut Ctx<'_>) {}

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(Self::BG);
        let black = Color::new(0, 0, 0);
        ctx.set_font_size(64);
        ctx.draw_centered("Opening...", ctx.height() / 2 - 40, black);
        draw_member_lines(ctx, &self.info, black, Color::new(178, 0, 0));
        ctx.flush();
    }

    fn handle_event(&mut self, _ctx: &mut Ctx<'_>, _event: &Event) -> bool {
        false
    }

    fn exit(&mut self) {
        self.info = AccessInfo::default();
    }

    fn name(&self) -> &'static str {
        "Opening"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Broker connection lost; driven externally.
#[derive(Default)]
pub struct ConnectionLostScreen;

impl Screen for ConnectionLostScreen {
    fn init(&mut self, _ctx: &mut Ctx<'_>) {}

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(Color::new(128, 76, 0));
        ctx.set_font_size(64);
        ctx.draw_centered("Connection Lost", ctx.height() / 2, WHITE);
        ctx.flush();
    }

    fn handle_event(&mut self, _ctx: &mut Ctx<'_>, _event: &Event) -> bool {
        false
    }

    fn exit(&mut self) {}

    fn name(&self) -> &'static str {
        "ConnectionLost"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Blank screen shown while the process shuts down.
#[derive(Default)]
pub struct ShutdownScreen;

impl Screen for ShutdownScreen {
    fn init(&mut self, _ctx: &mut Ctx<'_>) {}

    fn update(&mut self, ctx: &mut Ctx<'_>) {
        ctx.fill_background(Color::new(0, 0, 0));
        ctx.flush();
    }

    fn handle_event(&mut self, _ctx: &mut Ctx<'_>, _event: &Event) -> bool {
        false
    }

    fn exit(&mut self) {}

    fn name(&self) -> &'static str {
        "Shutdown"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
