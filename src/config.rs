//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! kiosk.toml file: display geometry, reader and door hardware, rotary
//! pins, LED indicator, ACL source, broker identity, and the vending flow.
//! Every section has working defaults so a kiosk boots (in noop/simulation
//! form) with no config file at all.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::acl::ApiSettings;

/// Application configuration loaded from kiosk.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node identity used in broker topics and status reports
    pub client_id: String,
    pub display: DisplaySettings,
    pub reader: ReaderSettings,
    pub door: DoorSettings,
    pub rotary: RotarySettings,
    pub indicator: IndicatorSettings,
    pub acl: AclSettings,
    pub mqtt: MqttSettings,
    pub vending: VendingSettings,
    /// Unix socket path for the debug event channel; disabled when unset
    pub event_socket: Option<String>,
}

/// Panel geometry and framebuffer device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub width: i32,
    pub height: i32,
    pub framebuffer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Character device or FIFO emitting one tag per line; disabled when unset
    pub device: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorSettings {
    /// "servo", "gpio_high", "gpio_low", or "none"
    pub kind: String,
    pub pin: Option<u8>,
    /// Servo pulse widths in microseconds
    pub servo_open_us: u64,
    pub servo_close_us: u64,
    /// How long the door stays open after a grant
    pub hold_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotarySettings {
    pub clk_pin: Option<u8>,
    pub dt_pin: Option<u8>,
    pub button_pin: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    /// FIFO of the external LED controller; disabled when unset
    pub led_pipe: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AclSettings {
    pub tag_file: String,
    /// Periodic refresh interval; 0 disables background refresh
    pub refresh_secs: u64,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    /// Tool name accepted in remote-open commands
    pub tool_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VendingSettings {
    /// When enabled, an authorized badge starts the purchase flow instead
    /// of opening the door
    pub enabled: bool,
    /// Stand-in account balance in cents until a billing backend exists
    pub default_balance: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            client_id: "kiosk".to_string(),
            display: DisplaySettings::default(),
            reader: ReaderSettings::default(),
            door: DoorSettings::default(),
            rotary: RotarySettings::default(),
            indicator: IndicatorSettings::default(),
            acl: AclSettings::default(),
            mqtt: MqttSettings::default(),
            vending: VendingSettings::default(),
            event_socket: None,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        DisplaySettings {
            width: 1024,
            height: 600,
            framebuffer: "/dev/fb0".to_string(),
        }
    }
}

impl Default for ReaderSettings {
    fn default() -> Self {
        ReaderSettings { device: None }
    }
}

impl Default for DoorSettings {
    fn default() -> Self {
        DoorSettings {
            kind: "none".to_string(),
            pin: None,
            servo_open_us: 1200,
            servo_close_us: 2000,
            hold_secs: 5,
        }
    }
}

impl Default for RotarySettings {
    fn default() -> Self {
        RotarySettings {
            clk_pin: None,
            dt_pin: None,
            button_pin: None,
        }
    }
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings { led_pipe: None }
    }
}

impl Default for AclSettings {
    fn default() -> Self {
        AclSettings {
            tag_file: "/var/lib/access-kiosk/tags".to_string(),
            refresh_secs: 3600,
            api: ApiSettings::default(),
        }
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        MqttSettings {
            host: String::new(),
            port: 8883,
            tool_name: "frontdoor".to_string(),
        }
    }
}

impl Default for VendingSettings {
    fn default() -> Self {
        VendingSettings {
            enabled: false,
            default_balance: 100,
        }
    }
}

impl Config {
    /// Load configuration from kiosk.toml
    /// Falls back to default configuration if the file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path("kiosk.toml")
    }

    /// Load configuration from the specified path
    /// Falls back to default configuration if the file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    log::info!("config: loaded node {:?}", config.client_id);
                    config
                }
                Err(err) => {
                    log::warn!("config: invalid file format: {err}");
                    log::warn!("config: using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("config: no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.client_id, "kiosk");
        assert_eq!(config.display.width, 1024);
        assert_eq!(config.display.height, 600);
        assert_eq!(config.door.kind, "none");
        assert_eq!(config.door.hold_secs, 5);
        assert!(!config.vending.enabled);
        assert!(config.event_socket.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.client_id = "frontdoor".to_string();
        config.vending.enabled = true;
        config.acl.api.url = "https://members.example.org".to_string();

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.client_id, "frontdoor");
        assert!(parsed.vending.enabled);
        assert_eq!(parsed.acl.api.url, "https://members.example.org");
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            client_id = "sidedoor"

            [door]
            kind = "gpio_high"
            pin = 17
            "#,
        )
        .unwrap();
        assert_eq!(parsed.client_id, "sidedoor");
        assert_eq!(parsed.door.kind, "gpio_high");
        assert_eq!(parsed.door.pin, Some(17));
        // Untouched sections keep their defaults.
        assert_eq!(parsed.display.width, 1024);
        assert_eq!(parsed.acl.refresh_secs, 3600);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.client_id, "kiosk");
    }
}
