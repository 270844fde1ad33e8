//! # Event Socket
//!
//! Debug and operations channel: a Unix domain socket accepting a
//! line-oriented protocol that maps one-to-one onto the [`Event`] union.
//!
//! ```text
//! rfid <id>            raw credential read (decimal or hex)
//! tag <id>             alias for rfid
//! rotary <±delta>      knob turn
//! rotary press         knob short press
//! rotary longpress     knob long press
//! pin <name> <0|1>     GPIO input change (0 = released, 1 = pressed)
//! ```
//!
//! Blank lines and `#` comments are ignored; unknown commands are logged and
//! skipped. Handy for exercising the whole screen machine from a shell:
//! `echo "rotary 1" | nc -U /tmp/kiosk.sock`.

use std::io::{BufRead, BufReader};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::event::Event;
use crate::reader::parse_tag;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PipeError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0}")]
    BadArgument(String),
}

/// Parse one command line into an event.
pub fn parse_line(line: &str) -> Result<Event, PipeError> {
    let mut parts = line.split_whitespace();
    let command = parts.next().ok_or(PipeError::Empty)?;

    match command.to_ascii_lowercase().as_str() {
        "rfid" | "tag" => {
            let arg = parts
                .next()
                .ok_or_else(|| PipeError::BadArgument("rfid requires a tag id".into()))?;
            let tag = parse_tag(arg)
                .ok_or_else(|| PipeError::BadArgument(format!("invalid tag id: {arg}")))?;
            Ok(Event::Rfid { tag })
        }
        "rotary" => {
            let arg = parts.next().ok_or_else(|| {
                PipeError::BadArgument("rotary requires a delta, 'press' or 'longpress'".into())
            })?;
            match arg.to_ascii_lowercase().as_str() {
                "press" => Ok(Event::RotaryPress),
                "longpress" | "hold" => Ok(Event::RotaryLongPress),
                delta => delta
                    .parse::<i32>()
                    .map(|delta| Event::RotaryTurn { delta })
                    .map_err(|_| PipeError::BadArgument(format!("invalid rotary delta: {delta}"))),
            }
        }
        "pin" => {
            let name = parts
                .next()
                .ok_or_else(|| PipeError::BadArgument("pin requires <name> <0|1>".into()))?;
            let state = parts
                .next()
                .ok_or_else(|| PipeError::BadArgument("pin requires <name> <0|1>".into()))?;
            let pin = name.parse().map_err(PipeError::BadArgument)?;
            let pressed = state == "1" || state.eq_ignore_ascii_case("true");
            Ok(Event::Pin { pin, pressed })
        }
        other => Err(PipeError::UnknownCommand(other.to_string())),
    }
}

/// Listener that feeds parsed events to a handler, one thread for the
/// accept loop. Removing a stale socket file from a previous run is part of
/// binding.
pub struct EventSocket {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EventSocket {
    pub fn bind<P: AsRef<Path>, F>(path: P, handler: F) -> std::io::Result<Self>
    where
        F: Fn(Event) + Send + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)?;
        log::info!("eventpipe: listening on {}", path.display());

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("kiosk-eventpipe".into())
            .spawn(move || {
                for stream in listener.incoming() {
                    if stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    match stream {
                        Ok(stream) => serve(stream, &handler),
                        Err(err) => log::warn!("eventpipe: accept failed: {err}"),
                    }
                }
            })?;

        Ok(EventSocket {
            path,
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the listener and remove the socket file.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wake the accept loop with one last connection.
        let _ = UnixStream::connect(&self.path);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let _ = std::fs::remove_file(&self.path);
    }
}

impl Drop for EventSocket {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

fn serve<F: Fn(Event)>(stream: UnixStream, handler: &F) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { return };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok(event) => handler(event),
            Err(err) => log::warn!("eventpipe: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PinId;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn parses_every_documented_command() {
        assert_eq!(parse_line("rfid 12345").unwrap(), Event::Rfid { tag: 12345 });
        assert_eq!(parse_line("tag beef").unwrap(), Event::Rfid { tag: 0xbeef });
        assert_eq!(
            parse_line("rotary -2").unwrap(),
            Event::RotaryTurn { delta: -2 }
        );
        assert_eq!(parse_line("rotary +1").unwrap(), Event::RotaryTurn { delta: 1 });
        assert_eq!(parse_line("rotary press").unwrap(), Event::RotaryPress);
        assert_eq!(parse_line("rotary longpress").unwrap(), Event::RotaryLongPress);
        assert_eq!(
            parse_line("pin estop 1").unwrap(),
            Event::Pin {
                pin: PinId::Estop,
                pressed: true
            }
        );
        assert_eq!(
            parse_line("pin 17 0").unwrap(),
            Event::Pin {
                pin: PinId::Other(17),
                pressed: false
            }
        );
    }

    #[test]
    fn rejects_malformed_input_without_panicking() {
        assert!(parse_line("").is_err());
        assert!(parse_line("frobnicate").is_err());
        assert!(parse_line("rfid").is_err());
        assert!(parse_line("rfid xyzzy").is_err());
        assert!(parse_line("rotary sideways").is_err());
        assert!(parse_line("pin estop").is_err());
        assert!(parse_line("pin nosuchpin 1").is_err());
    }

    #[test]
    fn socket_delivers_parsed_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.sock");

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let socket = EventSocket::bind(&path, move |event| {
            sink.lock().unwrap().push(event);
        })
        .unwrap();

        {
            let mut stream = UnixStream::connect(&path).unwrap();
            writeln!(stream, "# comment").unwrap();
            writeln!(stream, "rfid 42").unwrap();
            writeln!(stream, "bogus").unwrap();
            writeln!(stream, "rotary press").unwrap();
        }

        // The accept loop runs on its own thread; give it a moment.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            if received.lock().unwrap().len() >= 2 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "events never arrived");
            std::thread::sleep(Duration::from_millis(10));
        }

        let events = received.lock().unwrap();
        assert_eq!(events[0], Event::Rfid { tag: 42 });
        assert_eq!(events[1], Event::RotaryPress);
        drop(events);
        socket.close();
        assert!(!path.exists());
    }
}
