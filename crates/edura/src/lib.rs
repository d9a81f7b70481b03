//! An out-of-the-box classroom that puts the lesson engine together with
//! the OpenAI-compatible provider.
//!
//! The crate includes a CLI tool that teaches a topic in the terminal. The
//! console collaborators can also be used as a library to drive a lesson
//! without a real avatar or video surface.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod console;

pub use console::{ClassroomEvent, ConsoleNarrator, ConsoleVideo};

/// Re-exports of [`edura_core`] crate.
pub mod core {
    pub use edura_core::*;
}

/// Re-exports of [`edura_model`] crate.
pub mod model {
    pub use edura_model::*;
}
