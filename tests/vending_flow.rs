//! End-to-end tests for the screen machine: the vending purchase path,
//! debounced knob redraws, dismiss timers, and the screen reset contract.
//! Everything runs against a recording surface; no hardware involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use access_kiosk_lib::surface::{Color, Sprite, Surface};
use access_kiosk_lib::{AccessInfo, Display, Event, ScreenId};

/// Shared record of everything a test surface was asked to draw.
#[derive(Default)]
struct Recorder {
    ops: Mutex<Vec<String>>,
    full_flushes: AtomicUsize,
    partial_flushes: AtomicUsize,
}

impl Recorder {
    fn push(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    fn contains(&self, needle: &str) -> bool {
        self.ops.lock().unwrap().iter().any(|op| op.contains(needle))
    }

    /// Take and return everything recorded so far.
    fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.ops.lock().unwrap())
    }

    fn partial_flushes(&self) -> usize {
        self.partial_flushes.load(Ordering::SeqCst)
    }

    fn full_flushes(&self) -> usize {
        self.full_flushes.load(Ordering::SeqCst)
    }
}

struct RecordingSurface {
    recorder: Arc<Recorder>,
    font: u32,
}

impl RecordingSurface {
    fn new(recorder: Arc<Recorder>) -> Self {
        RecordingSurface { recorder, font: 20 }
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> i32 {
        1024
    }
    fn height(&self) -> i32 {
        600
    }
    fn set_font_size(&mut self, px: u32) {
        self.font = px;
    }
    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, _color: Color) {
        self.recorder.push(format!("fill {x},{y} {w}x{h}"));
    }
    fn draw_text_anchored(&mut self, text: &str, x: i32, y: i32, _color: Color) {
        self.recorder
            .push(format!("text[{}] '{text}' @{x},{y}", self.font));
    }
    fn draw_text(&mut self, text: &str, x: i32, y: i32, _color: Color) {
        self.recorder
            .push(format!("left[{}] '{text}' @{x},{y}", self.font));
    }
    fn draw_image(&mut self, sprite: &Sprite, x: i32, y: i32) {
        self.recorder
            .push(format!("image {}x{} @{x},{y}", sprite.width, sprite.height));
    }
    fn flush(&mut self) {
        self.recorder.full_flushes.fetch_add(1, Ordering::SeqCst);
        self.recorder.push("flush".to_string());
    }
    fn flush_rect(&mut self, x: i32, y: i32, w: i32, h: i32) -> bool {
        self.recorder.partial_flushes.fetch_add(1, Ordering::SeqCst);
        self.recorder.push(format!("flushrect {x},{y} {w}x{h}"));
        true
    }
}

fn kiosk() -> (Arc<Recorder>, Display) {
    let recorder = Arc::new(Recorder::default());
    let display = Display::new(Box::new(RecordingSurface::new(Arc::clone(&recorder))));
    (recorder, display)
}

#[test]
fn vending_path_with_top_up_lands_on_a_terminal_screen() {
    let (recorder, display) = kiosk();
    let manager = display.manager();

    // Broke member starts a $2.00 purchase.
    display.start_vending("alice", "", 0);
    assert_eq!(manager.current(), Some(ScreenId::SelectAmount));
    assert_eq!(manager.vending_session().unwrap().amount, 100);

    for _ in 0..4 {
        display.send_event(Event::RotaryTurn { delta: 1 });
    }
    assert_eq!(manager.vending_session().unwrap().amount, 200);

    // Confirm sees the shortfall during init and hands off without drawing.
    display.send_event(Event::RotaryPress);
    assert_eq!(manager.current(), Some(ScreenId::InsufficientFunds));
    assert!(
        !recorder.contains("Confirm Payment"),
        "Confirm must not draw when redirecting"
    );

    // The top-up screen seeded its $5.00 default into the session.
    assert_eq!(manager.vending_session().unwrap().add_amount, 500);

    display.send_event(Event::RotaryPress);
    assert_eq!(manager.current(), Some(ScreenId::Confirm));
    assert!(recorder.contains("New Balance: $3.00"));

    display.send_event(Event::RotaryPress);
    assert_eq!(manager.current(), Some(ScreenId::Processing));

    // The stand-in gateway decides after five seconds.
    std::thread::sleep(Duration::from_millis(5600));
    let current = manager.current().unwrap();
    assert!(
        matches!(current, ScreenId::Success | ScreenId::PaymentFailed),
        "unexpected screen {current:?}"
    );
    assert!(
        manager.vending_session().is_none(),
        "terminal screens must clear the session"
    );
}

#[test]
fn rapid_turns_update_the_value_but_coalesce_redraws() {
    let (recorder, display) = kiosk();
    let manager = display.manager();

    display.start_vending("alice", "", 1000);
    let partial_before = recorder.partial_flushes();
    let full_before = recorder.full_flushes();

    for _ in 0..20 {
        display.send_event(Event::RotaryTurn { delta: 1 });
    }

    // Value is current immediately, clamped at the $5.00 ceiling.
    assert_eq!(manager.vending_session().unwrap().amount, 500);

    // Redraws are deferred behind the coalescing timer.
    std::thread::sleep(Duration::from_millis(200));
    let partials = recorder.partial_flushes() - partial_before;
    assert!(
        (1..=2).contains(&partials),
        "expected 1-2 coalesced redraws, saw {partials}"
    );
    assert_eq!(
        recorder.full_flushes(),
        full_before,
        "turns must never trigger a full flush"
    );
}

#[test]
fn denied_screen_is_dismissed_by_press_with_no_late_timer() {
    let (_recorder, display) = kiosk();
    let manager = display.manager();
    let info = AccessInfo {
        member: "j.doe".into(),
        ..AccessInfo::default()
    };

    display.denied(&info);
    assert_eq!(manager.current(), Some(ScreenId::Denied));

    // Early dismiss.
    assert!(display.send_event(Event::RotaryPress));
    assert_eq!(manager.current(), Some(ScreenId::Idle));

    // If Denied's 3 s auto-timer survived the switch it would now yank us
    // out of Granted; park there across the deadline to prove it is gone.
    display.granted(&info);
    std::thread::sleep(Duration::from_millis(3400));
    assert_eq!(manager.current(), Some(ScreenId::Granted));
}

#[test]
fn denied_screen_auto_returns_to_idle() {
    let (_recorder, display) = kiosk();
    let manager = display.manager();
    let info = AccessInfo {
        member: "j.doe".into(),
        ..AccessInfo::default()
    };

    display.denied(&info);
    assert_eq!(manager.current(), Some(ScreenId::Denied));
    std::thread::sleep(Duration::from_millis(3500));
    assert_eq!(manager.current(), Some(ScreenId::Idle));
}

#[test]
fn granted_screen_auto_returns_to_idle() {
    let (_recorder, display) = kiosk();
    let manager = display.manager();
    let info = AccessInfo {
        member: "m.smith".into(),
        nickname: "Morgan".into(),
        warning: String::new(),
        allowed: true,
    };

    display.granted(&info);
    assert_eq!(manager.current(), Some(ScreenId::Granted));
    std::thread::sleep(Duration::from_millis(5500));
    assert_eq!(manager.current(), Some(ScreenId::Idle));
}

#[test]
fn reactivating_a_screen_draws_identically() {
    let (recorder, display) = kiosk();
    let info = AccessInfo {
        member: "m.smith".into(),
        nickname: "Morgan".into(),
        warning: "payment due".into(),
        allowed: true,
    };

    recorder.drain();
    display.granted(&info);
    let first = recorder.drain();

    display.idle();
    recorder.drain();

    display.granted(&info);
    let second = recorder.drain();

    assert_eq!(first, second, "screen state leaked across activations");
}

#[test]
fn connectivity_change_redraws_only_the_idle_status_bar() {
    let (recorder, display) = kiosk();
    let manager = display.manager();

    display.idle();
    recorder.drain();
    let full_before = recorder.full_flushes();

    manager.set_mqtt_connected(true);

    assert_eq!(recorder.full_flushes(), full_before, "expected partial flush only");
    assert!(recorder.contains("flushrect"));
    assert!(recorder.contains("online"));
}
