//! # Configuration
//!
//! Controller configuration loaded from environment variables.
//!
//! Environment variables are populated from a ConfigMap using `envFrom` in the
//! deployment. Command-line flags on the controller binary take precedence
//! over the environment for the handful of settings they cover.

mod controller;

pub use controller::{ControllerConfig, LogFormat};
