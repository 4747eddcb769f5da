//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config`]).

/// API group of the Email and EmailSenderConfig resources
pub const API_GROUP: &str = "example.com";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default base URL of the MailerSend API
pub const DEFAULT_MAILER_API_BASE_URL: &str = "https://api.mailersend.com";

/// Default timeout for a single outbound send request (seconds)
pub const DEFAULT_MAILER_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Secret key that holds the provider API token
pub const DEFAULT_API_TOKEN_KEY: &str = "apiToken";

/// Smallest requeue delay after a store failure (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Largest requeue delay after repeated store failures (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting a watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Field manager recorded on status patches
pub const DEFAULT_FIELD_MANAGER: &str = "email-dispatch-controller";
