//! # Messaging Glue
//!
//! The kiosk reports status and takes commands over MQTT, but the TLS
//! client itself (connect, reconnect, certificate handling) lives outside
//! this crate. Here are the pieces the kiosk owns: the [`Messaging`] trait
//! the application codes against, the topic layout, the payload types, and
//! validation of remote-open commands.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimal broker client surface. Callbacks for connect/disconnect/message
/// are wired by the application when it constructs the concrete client.
pub trait Messaging: Send {
    fn connect(&mut self);
    fn disconnect(&mut self);
    fn subscribe(&mut self, topic: &str);
    fn publish(&mut self, topic: &str, payload: &[u8]);
}

/// Stand-in client used when no broker is configured. Publishes go to the
/// log so field debugging still shows the traffic.
pub struct NoopMessaging;

impl Messaging for NoopMessaging {
    fn connect(&mut self) {}
    fn disconnect(&mut self) {}
    fn subscribe(&mut self, topic: &str) {
        log::debug!("mqtt: subscribe {topic} (noop)");
    }
    fn publish(&mut self, topic: &str, payload: &[u8]) {
        log::debug!(
            "mqtt: publish {topic} {} (noop)",
            String::from_utf8_lossy(payload)
        );
    }
}

/// Topic layout for one kiosk node.
#[derive(Clone, Debug)]
pub struct Topics {
    pub ping: String,
    pub access: String,
    pub acl_updated: String,
    pub acl_update_broadcast: String,
    pub remote_open: String,
}

impl Topics {
    pub fn new(client_id: &str) -> Self {
        Topics {
            ping: format!("kiosk/status/node/{client_id}/ping"),
            access: format!("kiosk/status/node/{client_id}/access"),
            acl_updated: format!("kiosk/status/node/{client_id}/acl/update"),
            acl_update_broadcast: "kiosk/control/broadcast/acl/update".to_string(),
            remote_open: format!("kiosk/control/node/{client_id}/open"),
        }
    }

    /// Classify an inbound control topic.
    pub fn route(&self, topic: &str) -> Route {
        if topic == self.acl_update_broadcast {
            Route::AclUpdate
        } else if topic == self.remote_open {
            Route::RemoteOpen
        } else {
            Route::Unknown
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    AclUpdate,
    RemoteOpen,
    Unknown,
}

/// Remote-open command payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenRequest {
    pub member: String,
    #[serde(rename = "tool")]
    pub tool_name: String,
    /// Seconds since the Unix epoch at the sender.
    pub timestamp: u64,
}

/// Keep-alive status payload.
#[derive(Debug, Serialize)]
pub struct PingStatus {
    pub status: &'static str,
}

/// Access report published after a badge decision.
#[derive(Debug, Serialize)]
pub struct AccessReport<'a> {
    pub allowed: u8,
    pub member: &'a str,
}

/// Interval between keep-alive pings.
pub const PING_INTERVAL: Duration = Duration::from_secs(120);

/// Remote-open commands older or newer than this are rejected.
pub const OPEN_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OpenError {
    #[error("open request for wrong tool {got:?}, expected {expected:?}")]
    WrongTool { got: String, expected: String },
    #[error("open request outside the allowed time window")]
    Expired,
}

/// Validate a remote-open request against this kiosk's tool name and the
/// current Unix time. Transport authentication is the broker's TLS layer.
pub fn validate_open(request: &OpenRequest, tool_name: &str, now_unix: u64) -> Result<(), OpenError> {
    if request.tool_name != tool_name {
        return Err(OpenError::WrongTool {
            got: request.tool_name.clone(),
            expected: tool_name.to_string(),
        });
    }
    let window = OPEN_WINDOW.as_secs();
    let earliest = request.timestamp.saturating_sub(window);
    let latest = request.timestamp.saturating_add(window);
    if now_unix < earliest || now_unix > latest {
        return Err(OpenError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_control_topics() {
        let topics = Topics::new("frontdoor");
        assert_eq!(
            topics.route("kiosk/control/broadcast/acl/update"),
            Route::AclUpdate
        );
        assert_eq!(
            topics.route("kiosk/control/node/frontdoor/open"),
            Route::RemoteOpen
        );
        assert_eq!(
            topics.route("kiosk/control/node/backdoor/open"),
            Route::Unknown
        );
    }

    #[test]
    fn open_request_round_trips_as_json() {
        let request = OpenRequest {
            member: "m.smith".into(),
            tool_name: "frontdoor".into(),
            timestamp: 1_700_000_000,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"tool\":\"frontdoor\""));
        let parsed: OpenRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.member, "m.smith");
        assert_eq!(parsed.timestamp, 1_700_000_000);
    }

    #[test]
    fn validates_tool_and_window() {
        let request = OpenRequest {
            member: "m.smith".into(),
            tool_name: "frontdoor".into(),
            timestamp: 10_000,
        };
        assert!(validate_open(&request, "frontdoor", 10_000).is_ok());
        assert!(validate_open(&request, "frontdoor", 10_000 + 299).is_ok());
        assert_eq!(
            validate_open(&request, "frontdoor", 10_000 + 301),
            Err(OpenError::Expired)
        );
        assert!(matches!(
            validate_open(&request, "backdoor", 10_000),
            Err(OpenError::WrongTool { .. })
        ));
    }
}
