//! Centralized default constants for the feedback daemon.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration types in the other crates fall back to these when the
//! corresponding environment variable is unset or unparseable.

// =============================================================================
// COLLECTOR
// =============================================================================

/// Path of the external report collector.
pub const COLLECTOR_PATH: &str = "/usr/bin/deepin-feedback-cli";

/// Deadline for one report generation run (seconds).
pub const REPORT_TIMEOUT_SECS: u64 = 600;

/// Deadline for each distro query invocation (seconds).
pub const DISTRO_TIMEOUT_SECS: u64 = 10;

/// Collector flag that restricts collection of private data.
pub const PRIVACY_MODE_FLAG: &str = "--privacy-mode";

/// Collector flag printing the distribution name.
pub const DISTRO_NAME_FLAG: &str = "--distro-name";

/// Collector flag printing the distribution release.
pub const DISTRO_RELEASE_FLAG: &str = "--distro-release";

// =============================================================================
// OUTPUT NAMING
// =============================================================================

/// Leading component of every report stem.
pub const OUTPUT_PREFIX: &str = "deepin-feedback";

/// Extension appended to the stem for the path handed to the collector.
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// chrono format of the timestamp component of a stem (`YYYYMMDD-HHMMSS`).
pub const STEM_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast buffer for the event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// SSE keep-alive interval (seconds).
pub const SSE_KEEPALIVE_SECS: u64 = 15;

// =============================================================================
// SERVER
// =============================================================================

/// Default listen host. Loopback only: caller identity is resolved from local sockets.
pub const SERVER_HOST: &str = "127.0.0.1";

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 7075;

/// Idle shutdown delay (seconds). Zero disables idle shutdown.
pub const IDLE_EXIT_SECS: u64 = 0;

// =============================================================================
// IDENTITY
// =============================================================================

/// Kernel socket tables consulted for peer uid lookup.
pub const PROC_NET_TCP_PATHS: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];
