//! Gate configuration.
//!
//! `GateConfig` controls how eagerly a [`DeferredMountGate`](crate::gate::DeferredMountGate)
//! starts loading its heavy visual subsystem, and how the placeholder reserves space while it
//! waits.
//!
//! `GateConfig` provides sensible defaults via [`Default`] and a fluent
//! [`GateConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use landing_mount::config::GateConfig;
//! let cfg = GateConfig::default();
//! assert_eq!(cfg.margin_px, 200);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use landing_mount::config::GateConfig;
//! use std::time::Duration;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = GateConfig::builder()
//!     .margin_px(400)
//!     .idle_timeout(Duration::from_millis(1500))
//!     .min_placeholder_height(720)
//!     .build()?; // returns Result<GateConfig, GateConfigError>
//! # Ok(()) }
//! ```
//!
//! ## Load from JSON
//! Durations are written in milliseconds. Missing fields keep their default.
//! ```rust
//! use landing_mount::config::GateConfig;
//! let cfg = GateConfig::from_json_str(r#"{ "margin_px": 300, "idle_timeout_ms": 500 }"#).unwrap();
//! assert_eq!(cfg.margin_px, 300);
//! assert_eq!(cfg.idle_timeout.as_millis(), 500);
//! ```
//!
//! # Fields (summary)
//! - `margin_px`: Distance around the viewport at which loading starts (default: 200).
//! - `idle_timeout`: Upper bound on how long an idle callback may be deferred (default: 1s).
//! - `fallback_delay`: Delay used when no idle scheduling is available (default: 0, next turn).
//! - `min_placeholder_height`: Height reserved by the placeholder in CSS px (default: 800).
//! - `narrow_breakpoint`: Viewport widths below this count as narrow (default: 768).
//! - `event_capacity`: Capacity of the gate event broadcast channel (default: 64).
//!
//! # Errors
//!
//! Builder validation can return [`GateConfigError`] if values are invalid (e.g. a zero
//! placeholder height, or a fallback delay longer than the idle timeout).

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MARGIN_PX: u32 = 200;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_MIN_PLACEHOLDER_HEIGHT: u32 = 800;
pub const DEFAULT_NARROW_BREAKPOINT: u32 = 768;
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    pub margin_px: u32,
    pub idle_timeout: Duration,
    pub fallback_delay: Duration,
    pub min_placeholder_height: u32,
    pub narrow_breakpoint: u32,
    pub event_capacity: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            margin_px: DEFAULT_MARGIN_PX,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            fallback_delay: Duration::ZERO,
            min_placeholder_height: DEFAULT_MIN_PLACEHOLDER_HEIGHT,
            narrow_breakpoint: DEFAULT_NARROW_BREAKPOINT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl GateConfig {
    pub fn builder() -> GateConfigBuilder {
        GateConfigBuilder::default()
    }

    /// Parses a JSON document into a validated config.
    pub fn from_json_str(json: &str) -> Result<GateConfig, GateConfigError> {
        let file: GateConfigFile =
            serde_json::from_str(json).map_err(|e| GateConfigError::Parse(e.to_string()))?;
        file.into_builder().build()
    }

    /// Reads and parses a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<GateConfig, GateConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| GateConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

/// On-disk shape of the config. Durations are in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GateConfigFile {
    margin_px: Option<u32>,
    idle_timeout_ms: Option<u64>,
    fallback_delay_ms: Option<u64>,
    min_placeholder_height: Option<u32>,
    narrow_breakpoint: Option<u32>,
    event_capacity: Option<usize>,
}

impl GateConfigFile {
    fn into_builder(self) -> GateConfigBuilder {
        GateConfig::builder().with(|c| {
            if let Some(v) = self.margin_px {
                c.margin_px = v;
            }
            if let Some(ms) = self.idle_timeout_ms {
                c.idle_timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = self.fallback_delay_ms {
                c.fallback_delay = Duration::from_millis(ms);
            }
            if let Some(v) = self.min_placeholder_height {
                c.min_placeholder_height = v;
            }
            if let Some(v) = self.narrow_breakpoint {
                c.narrow_breakpoint = v;
            }
            if let Some(v) = self.event_capacity {
                c.event_capacity = v;
            }
        })
    }
}

/// Builder for [`GateConfig`].
#[derive(Debug, Clone, Default)]
pub struct GateConfigBuilder {
    inner: GateConfig,
}

impl GateConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut GateConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn margin_px(self, px: u32) -> Self { self.map(|c| c.margin_px = px) }
    pub fn idle_timeout(self, d: Duration) -> Self { self.map(|c| c.idle_timeout = d) }
    pub fn fallback_delay(self, d: Duration) -> Self { self.map(|c| c.fallback_delay = d) }
    pub fn min_placeholder_height(self, px: u32) -> Self { self.map(|c| c.min_placeholder_height = px) }
    pub fn narrow_breakpoint(self, px: u32) -> Self { self.map(|c| c.narrow_breakpoint = px) }
    pub fn event_capacity(self, n: usize) -> Self { self.map(|c| c.event_capacity = n) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut GateConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<GateConfig, GateConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum GateConfigError {
    ZeroPlaceholderHeight,
    ZeroIdleTimeout,
    ZeroEventCapacity,
    FallbackExceedsIdleTimeout { fallback: Duration, idle_timeout: Duration },
    Parse(String),
    Io(String),
}

impl fmt::Display for GateConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPlaceholderHeight => write!(f, "min_placeholder_height must be > 0"),
            Self::ZeroIdleTimeout => write!(f, "idle_timeout must be > 0"),
            Self::ZeroEventCapacity => write!(f, "event_capacity must be > 0"),
            Self::FallbackExceedsIdleTimeout { fallback, idle_timeout } => write!(
                f,
                "fallback_delay ({}ms) must not exceed idle_timeout ({}ms)",
                fallback.as_millis(),
                idle_timeout.as_millis()
            ),
            Self::Parse(e) => write!(f, "cannot parse config: {e}"),
            Self::Io(e) => write!(f, "cannot read config: {e}"),
        }
    }
}

impl std::error::Error for GateConfigError {}

fn validate(c: &GateConfig) -> Result<(), GateConfigError> {
    if c.min_placeholder_height == 0 {
        return Err(GateConfigError::ZeroPlaceholderHeight);
    }
    if c.idle_timeout.is_zero() {
        return Err(GateConfigError::ZeroIdleTimeout);
    }
    if c.event_capacity == 0 {
        return Err(GateConfigError::ZeroEventCapacity);
    }
    if c.fallback_delay > c.idle_timeout {
        return Err(GateConfigError::FallbackExceedsIdleTimeout {
            fallback: c.fallback_delay,
            idle_timeout: c.idle_timeout,
        });
    }
    Ok(())
}
