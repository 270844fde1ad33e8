//! # Input Events
//!
//! Everything the kiosk can react to is described by the closed [`Event`]
//! union: credential reads and their authorization results, rotary knob
//! input, GPIO pin edges, connectivity changes, and inbound messages from
//! the broker. Events are plain data. They are produced by the hardware and
//! network threads, handed to the screen manager, and consumed at most once
//! by the active screen's `handle_event`.
//!
//! Keeping the union closed means a new event kind fails to compile at every
//! dispatch site until it is handled.

use std::fmt;
use std::str::FromStr;

/// Member information attached to an access attempt, as resolved against the
/// access-control list. `warning` is an optional operator-facing note shown
/// alongside the result ("payment overdue", "training required", ...).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessInfo {
    pub member: String,
    pub nickname: String,
    pub warning: String,
    pub allowed: bool,
}

impl AccessInfo {
    /// Preferred display name: nickname when present, member id otherwise.
    pub fn display_name(&self) -> &str {
        if self.nickname.is_empty() {
            &self.member
        } else {
            &self.nickname
        }
    }
}

/// Identity of a monitored GPIO input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PinId {
    Button1,
    Button2,
    Sensor1,
    Sensor2,
    Estop,
    Door,
    Safelight,
    Activity,
    Enable,
    /// A pin addressed by raw number rather than role.
    Other(u16),
}

impl FromStr for PinId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "button1" | "btn1" => Ok(PinId::Button1),
            "button2" | "btn2" => Ok(PinId::Button2),
            "sensor1" => Ok(PinId::Sensor1),
            "sensor2" => Ok(PinId::Sensor2),
            "estop" => Ok(PinId::Estop),
            "door" => Ok(PinId::Door),
            "safelight" => Ok(PinId::Safelight),
            "activity" => Ok(PinId::Activity),
            "enable" => Ok(PinId::Enable),
            other => other
                .parse::<u16>()
                .map(PinId::Other)
                .map_err(|_| format!("unknown pin: {other}")),
        }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinId::Button1 => write!(f, "button1"),
            PinId::Button2 => write!(f, "button2"),
            PinId::Sensor1 => write!(f, "sensor1"),
            PinId::Sensor2 => write!(f, "sensor2"),
            PinId::Estop => write!(f, "estop"),
            PinId::Door => write!(f, "door"),
            PinId::Safelight => write!(f, "safelight"),
            PinId::Activity => write!(f, "activity"),
            PinId::Enable => write!(f, "enable"),
            PinId::Other(n) => write!(f, "{n}"),
        }
    }
}

/// An input occurrence delivered to the active screen.
///
/// Immutable after construction. The manager never interprets events itself;
/// it only routes them.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Raw credential read, before any ACL lookup.
    Rfid { tag: u64 },
    /// ACL lookup succeeded and the holder is allowed in.
    Authorized(AccessInfo),
    /// ACL lookup failed or the holder is not allowed.
    Denied(AccessInfo),
    /// Rotary knob turned; `delta` is +1 per clockwise detent, -1 per
    /// counter-clockwise detent (multiple detents may be batched).
    RotaryTurn { delta: i32 },
    /// Rotary knob pressed and released quickly.
    RotaryPress,
    /// Rotary knob held down past the long-press threshold.
    RotaryLongPress,
    /// A monitored GPIO input changed level.
    Pin { pin: PinId, pressed: bool },
    /// The messaging client (re)established its broker connection.
    MqttConnected,
    /// The messaging client lost its broker connection.
    MqttDisconnected,
    /// An inbound message the application chose to forward to the screen.
    Message { topic: String, payload: Vec<u8> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_id_parses_names_and_numbers() {
        assert_eq!("estop".parse::<PinId>().unwrap(), PinId::Estop);
        assert_eq!("BTN1".parse::<PinId>().unwrap(), PinId::Button1);
        assert_eq!("17".parse::<PinId>().unwrap(), PinId::Other(17));
        assert!("bogus".parse::<PinId>().is_err());
    }

    #[test]
    fn display_name_prefers_nickname() {
        let mut info = AccessInfo {
            member: "m.smith".into(),
            ..AccessInfo::default()
        };
        assert_eq!(info.display_name(), "m.smith");
        info.nickname = "Morgan".into();
        assert_eq!(info.display_name(), "Morgan");
    }
}
