//! Flick notification shade
//!
//! Heads-up drag recognition, scrim blending, visibility reporting and the
//! panel state machine tying them together. Rendering and the notification
//! stack itself live elsewhere in the shell and plug in through
//! `shade::collaborators`.

pub mod config;
pub mod demo;
pub mod error;
pub mod input;
pub mod shade;
pub mod state;

pub use config::ShadeConfig;
pub use shade::{PanelState, Shade};
