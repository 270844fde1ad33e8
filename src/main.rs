//! # Access Kiosk Entry Point
//!
//! Wires the collaborators around the screen manager: framebuffer (or
//! terminal simulation) behind the surface, tag reader thread, ACL cache
//! with background refresh, LED indicators, door actuator, keep-alive
//! publisher, and the debug event socket. Runs until SIGINT, then parks the
//! panel on the Shutdown screen and releases the hardware.
//!
//! `access-kiosk --sim` runs entirely host-side: the panel renders as ASCII
//! frames on stdout and events come in over the Unix socket.

use std::env;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use access_kiosk_lib::acl::AclCache;
use access_kiosk_lib::door::{self, DoorOpener};
use access_kiosk_lib::eventpipe::EventSocket;
use access_kiosk_lib::indicator::{Indicator, MultiIndicator, PipeIndicator, ScreenIndicator};
use access_kiosk_lib::mqtt::{AccessReport, Messaging, NoopMessaging, PingStatus, Topics, PING_INTERVAL};
use access_kiosk_lib::reader::{LineReader, ReaderError, TagReader};
use access_kiosk_lib::{AccessInfo, BufferSurface, Config, Display, Event, FlushSink};

/// Everything the producer threads share.
struct Kiosk {
    config: Config,
    display: Arc<Display>,
    indicator: Mutex<MultiIndicator>,
    door: Mutex<Box<dyn DoorOpener>>,
    acl: Arc<AclCache>,
    messaging: Mutex<Box<dyn Messaging>>,
    topics: Topics,
}

impl Kiosk {
    /// Full grant sequence: opening screen, door held open, then the
    /// granted screen (which dismisses itself back to idle).
    fn unlock(&self, info: &AccessInfo) {
        self.indicator.lock().unwrap().opening(Some(info));
        if let Err(err) = self.door.lock().unwrap().open() {
            log::error!("door: open failed: {err}");
        }
        thread::sleep(Duration::from_secs(self.config.door.hold_secs));
        if let Err(err) = self.door.lock().unwrap().close() {
            log::error!("door: close failed: {err}");
        }
        self.indicator.lock().unwrap().granted(Some(info));
    }

    fn publish_access(&self, member: &str, allowed: bool) {
        let report = AccessReport {
            allowed: allowed as u8,
            member,
        };
        if let Ok(payload) = serde_json::to_vec(&report) {
            self.messaging
                .lock()
                .unwrap()
                .publish(&self.topics.access, &payload);
        }
    }

    fn publish_ping(&self) {
        if let Ok(payload) = serde_json::to_vec(&PingStatus { status: "ok" }) {
            self.messaging
                .lock()
                .unwrap()
                .publish(&self.topics.ping, &payload);
        }
    }
}

/// Authorize one credential read and react on every output device.
fn badge_tag(kiosk: &Kiosk, tag: u64) {
    if tag == 0 {
        return;
    }
    match kiosk.acl.lookup(tag) {
        Some(record) if record.allowed => {
            log::info!("badge: tag {tag} allowed, member {:?}", record.member);
            let info = AccessInfo::from(&record);
            kiosk.publish_access(&record.member, true);
            if kiosk.config.vending.enabled {
                kiosk.display.start_vending(
                    &record.member,
                    &record.nickname,
                    kiosk.config.vending.default_balance,
                );
            } else {
                kiosk.unlock(&info);
            }
        }
        Some(record) => {
            log::info!("badge: tag {tag} denied, member {:?}", record.member);
            let info = AccessInfo::from(&record);
            kiosk.publish_access(&record.member, false);
            kiosk.indicator.lock().unwrap().denied(Some(&info));
        }
        None => {
            log::info!("badge: tag {tag} not in ACL");
            let info = AccessInfo {
                warning: "Unknown fob".to_string(),
                ..AccessInfo::default()
            };
            kiosk.indicator.lock().unwrap().denied(Some(&info));
        }
    }
}

/// Sink that only logs; used when no framebuffer is available.
struct LogSink;

impl FlushSink for LogSink {
    fn flush(&mut self, _pixels: &[u8], width: i32, height: i32) {
        log::debug!("display: flush {width}x{height}");
    }
    fn flush_rect(
        &mut self,
        _pixels: &[u8],
        _width: i32,
        _height: i32,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) -> bool {
        log::debug!("display: flush rect {w}x{h}+{x}+{y}");
        true
    }
}

/// Development sink: renders each full frame as ASCII on stdout, the same
/// idea as running a chart renderer in terminal mode before touching
/// hardware.
struct AsciiSink {
    cols: i32,
    rows: i32,
}

impl FlushSink for AsciiSink {
    fn flush(&mut self, pixels: &[u8], width: i32, height: i32) {
        const RAMP: &[u8] = b" .:-=+*#%@";
        let mut out = String::with_capacity(((self.cols + 1) * self.rows) as usize);
        for row in 0..self.rows {
            let y = row * height / self.rows;
            for col in 0..self.cols {
                let x = col * width / self.cols;
                let idx = ((y * width + x) * 3) as usize;
                let lum =
                    (pixels[idx] as u32 + pixels[idx + 1] as u32 + pixels[idx + 2] as u32) / 3;
                let step = (lum as usize * (RAMP.len() - 1)) / 255;
                out.push(RAMP[step] as char);
            }
            out.push('\n');
        }
        println!("{out}");
    }

    fn flush_rect(
        &mut self,
        _pixels: &[u8],
        _width: i32,
        _height: i32,
        _x: i32,
        _y: i32,
        _w: i32,
        _h: i32,
    ) -> bool {
        // Partial updates would just spam the terminal; pretend success and
        // wait for the next full frame.
        true
    }
}

/// RGB565 little-endian framebuffer writer.
#[cfg(all(target_os = "linux", feature = "hardware"))]
struct FramebufferSink {
    file: std::fs::File,
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
impl FramebufferSink {
    fn open(path: &str) -> anyhow::Result<Self> {
        let file = std::fs::OpenOptions::new().write(true).open(path)?;
        Ok(FramebufferSink { file })
    }

    fn convert_row(pixels: &[u8], out: &mut Vec<u8>) {
        for px in pixels.chunks_exact(3) {
            let value = (((px[0] as u16) >> 3) << 11)
                | (((px[1] as u16) >> 2) << 5)
                | ((px[2] as u16) >> 3);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
impl FlushSink for FramebufferSink {
    fn flush(&mut self, pixels: &[u8], width: i32, height: i32) {
        use std::os::unix::fs::FileExt;
        let mut out = Vec::with_capacity((width * height * 2) as usize);
        Self::convert_row(pixels, &mut out);
        if let Err(err) = self.file.write_all_at(&out, 0) {
            log::warn!("display: framebuffer write failed: {err}");
        }
    }

    fn flush_rect(
        &mut self,
        pixels: &[u8],
        width: i32,
        _height: i32,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) -> bool {
        use std::os::unix::fs::FileExt;
        let mut out = Vec::with_capacity((w * 2) as usize);
        for row in y..y + h {
            out.clear();
            let start = ((row * width + x) * 3) as usize;
            let end = start + (w * 3) as usize;
            Self::convert_row(&pixels[start..end], &mut out);
            let offset = ((row * width + x) * 2) as u64;
            if let Err(err) = self.file.write_all_at(&out, offset) {
                log::warn!("display: framebuffer write failed: {err}");
                return true;
            }
        }
        true
    }
}

fn build_sink(config: &Config, simulate: bool) -> Box<dyn FlushSink> {
    if simulate {
        return Box::new(AsciiSink { cols: 96, rows: 28 });
    }

    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        match FramebufferSink::open(&config.display.framebuffer) {
            Ok(sink) => return Box::new(sink),
            Err(err) => {
                log::warn!(
                    "display: cannot open {}: {err}, falling back to log sink",
                    config.display.framebuffer
                );
            }
        }
    }
    let _ = config;
    Box::new(LogSink)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Command line: --config <path>, --sim for terminal rendering
    let args: Vec<String> = env::args().collect();
    let simulate = args.iter().any(|arg| arg == "--sim");
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "kiosk.toml".to_string());

    let config = Config::load_from_path(&config_path);
    log::info!("access-kiosk starting, node {:?}", config.client_id);

    // Panel and screen system
    let sink = build_sink(&config, simulate);
    let surface = BufferSurface::new(config.display.width, config.display.height, sink);
    let display = Arc::new(Display::new(Box::new(surface)));

    // Indicators: the panel always, the LED strip when configured
    let mut indicators: Vec<Box<dyn Indicator>> =
        vec![Box::new(ScreenIndicator::new(Arc::clone(&display)))];
    if let Some(pipe) = &config.indicator.led_pipe {
        match PipeIndicator::open(pipe) {
            Ok(leds) => indicators.push(Box::new(leds)),
            Err(err) => log::warn!("indicator: LED pipe {pipe:?} unavailable: {err}"),
        }
    }

    // Credential cache: disk first, then keep refreshing from the API
    let acl = Arc::new(AclCache::new(&config.acl.tag_file));
    if let Err(err) = acl.load() {
        log::warn!("acl: load failed: {err}");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    if !config.acl.api.url.is_empty() {
        let acl = Arc::clone(&acl);
        let api = config.acl.api.clone();
        let every = config.acl.refresh_secs;
        runtime.spawn(async move {
            loop {
                if let Err(err) = acl.refresh(&api).await {
                    log::warn!("acl: refresh failed: {err}");
                }
                if every == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(every)).await;
            }
        });
    }

    let door = door::from_settings(&config.door)?;
    let topics = Topics::new(&config.client_id);
    let kiosk = Arc::new(Kiosk {
        display: Arc::clone(&display),
        indicator: Mutex::new(MultiIndicator::new(indicators)),
        door: Mutex::new(door),
        acl,
        messaging: Mutex::new(Box::new(NoopMessaging)),
        topics,
        config,
    });

    kiosk.indicator.lock().unwrap().idle();

    // Keep-alive publisher
    {
        let kiosk = Arc::clone(&kiosk);
        thread::spawn(move || loop {
            kiosk.publish_ping();
            thread::sleep(PING_INTERVAL);
        });
    }

    // Tag reader loop; reopens the device when it goes away
    if let Some(device) = kiosk.config.reader.device.clone() {
        let kiosk = Arc::clone(&kiosk);
        thread::spawn(move || loop {
            let mut reader = match LineReader::open(&device) {
                Ok(reader) => reader,
                Err(err) => {
                    log::warn!("reader: cannot open {device:?}: {err}");
                    thread::sleep(Duration::from_secs(5));
                    continue;
                }
            };
            loop {
                match reader.read() {
                    Ok(tag) => badge_tag(&kiosk, tag),
                    Err(ReaderError::Closed) => break,
                    Err(err) => {
                        log::warn!("reader: {err}");
                        break;
                    }
                }
            }
            reader.close();
            thread::sleep(Duration::from_secs(1));
        });
    }

    // Rotary knob (hardware builds); maps straight onto events
    #[cfg(all(target_os = "linux", feature = "hardware"))]
    let _rotary = {
        use access_kiosk_lib::rotary::{Handlers, Rotary};
        let turn_display = Arc::clone(&display);
        let press_display = Arc::clone(&display);
        let long_display = Arc::clone(&display);
        Rotary::spawn(
            &kiosk.config.rotary,
            Handlers {
                on_turn: Box::new(move |delta| {
                    turn_display.send_event(Event::RotaryTurn { delta });
                }),
                on_press: Box::new(move || {
                    press_display.send_event(Event::RotaryPress);
                }),
                on_long_press: Box::new(move || {
                    long_display.send_event(Event::RotaryLongPress);
                }),
            },
        )?
    };

    // Debug event channel
    let event_socket = match kiosk.config.event_socket.clone() {
        Some(path) => {
            let kiosk = Arc::clone(&kiosk);
            Some(EventSocket::bind(path, move |event| {
                // Screens get first refusal; unconsumed credential reads
                // fall back to the badge flow.
                let consumed = kiosk.display.send_event(event.clone());
                if !consumed {
                    if let Event::Rfid { tag } = event {
                        badge_tag(&kiosk, tag);
                    }
                }
            })?)
        }
        None => None,
    };

    log::info!("access-kiosk ready");
    runtime.block_on(tokio::signal::ctrl_c())?;
    log::info!("access-kiosk shutting down");

    if let Some(socket) = event_socket {
        socket.close();
    }
    {
        let mut indicator = kiosk.indicator.lock().unwrap();
        indicator.shutdown();
        indicator.release();
    }
    kiosk.door.lock().unwrap().release();
    kiosk.messaging.lock().unwrap().disconnect();

    Ok(())
}
