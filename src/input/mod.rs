//! Input handling - touch events and heads-up gesture recognition
//!
//! This module provides:
//! - Raw touch events and their assembly into pointer-set motion events
//! - The heads-up drag tracker that decides when a touch pulls the shade down

pub mod gestures;
pub mod touch;

pub use gestures::*;
pub use touch::*;
