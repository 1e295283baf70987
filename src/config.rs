//! Server configuration.
//!
//! Strings are fixed-capacity `heapless::String`s so a configuration can be
//! copied around freely and loaded from small embedded stores as well as from
//! JSON files on a desktop.
//!
//! # Example
//!
//! ```rust
//! use rs_layout::config::{Config, SessionConfig, WebConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.web.port, 8080);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_web(WebConfig::default().with_port(3000))
//!     .with_session(SessionConfig::default().with_idle_timeout_ms(5_000));
//! assert_eq!(config.session.idle_timeout_ms, 5_000);
//! ```

use heapless::String as HString;

/// Maximum length for short config strings (hostnames, names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;


// ============================================================================
// Helpers for creating heapless strings
// ============================================================================

fn truncate_to<const N: usize>(s: &str) -> HString<N> {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut hs = HString::new();
    // Cannot fail: `end <= N`.
    let _ = hs.push_str(&s[..end]);
    hs
}

/// Create a ShortString from a &str, truncating at a character boundary
pub fn short_string(s: &str) -> ShortString {
    truncate_to(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete server configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// HTTP server configuration
    pub web: WebConfig,
    /// Session lifetime configuration
    pub session: SessionConfig,
    /// Hardware event feed configuration
    pub feed: FeedConfig,
    /// Server identification and bus device
    pub device: DeviceConfig,
}

impl Config {
    /// Set web configuration
    pub fn with_web(mut self, web: WebConfig) -> Self {
        self.web = web;
        self
    }

    /// Set session configuration
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set event feed configuration
    pub fn with_feed(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Parse a JSON document. Missing sections and fields take their defaults.
    ///
    /// ```rust
    /// use rs_layout::config::Config;
    ///
    /// let config = Config::from_json(r#"{ "web": { "port": 9000 } }"#).unwrap();
    /// assert_eq!(config.web.port, 9000);
    /// assert_eq!(config.session.idle_timeout_ms, 60_000);
    /// ```
    #[cfg(feature = "web")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Web Config
// ============================================================================

/// HTTP server configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WebConfig {
    /// Address to bind to
    pub bind_address: ShortString,
    /// Port to listen on
    pub port: u16,
    /// Whether to enable CORS for all origins
    pub cors_permissive: bool,
    /// Whether the web server is enabled
    pub enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: short_string("0.0.0.0"),
            port: 8080,
            cors_permissive: true,
            enabled: true,
        }
    }
}

impl WebConfig {
    /// Set the bind address
    pub fn with_bind_address(mut self, addr: &str) -> Self {
        self.bind_address = short_string(addr);
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set CORS mode
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }

    /// Enable or disable the web server
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// ============================================================================
// Session Config
// ============================================================================

/// Session lifetime configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Idle time after which a session is terminated (0 = never)
    pub idle_timeout_ms: u64,
    /// How often idle sessions are looked for
    pub expiry_check_ms: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 60_000,
            expiry_check_ms: 1_000,
        }
    }
}

impl SessionConfig {
    /// Set the idle timeout
    pub fn with_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = ms;
        self
    }

    /// Set the expiry check interval (at least 1 ms)
    pub fn with_expiry_check_ms(mut self, ms: u32) -> Self {
        self.expiry_check_ms = ms.max(1);
        self
    }
}

// ============================================================================
// Feed Config
// ============================================================================

/// Hardware event feed configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FeedConfig {
    /// Capacity of the event channel between the bus reader and the store
    pub channel_capacity: usize,
    /// Populate a demonstration layout at startup (mock bus only)
    pub demo_layout: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            demo_layout: false,
        }
    }
}

impl FeedConfig {
    /// Set the channel capacity (at least 1)
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Enable or disable the demonstration layout
    pub fn with_demo_layout(mut self, demo: bool) -> Self {
        self.demo_layout = demo;
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Server identification
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Human-readable server name
    pub name: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("rs-layout"),
        }
    }
}

impl DeviceConfig {
    /// Set the server name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
