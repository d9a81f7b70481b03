//! Core logic of the lesson engine: script flattening, the lesson state
//! machine, streaming answer assembly and question framing.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod assembler;
pub mod avatar;
mod chat_client;
pub mod context;
pub mod conversation;
mod lesson;
pub mod narration;
pub mod script;
mod tutor;

pub use lesson::{
    Effect, Lesson, LessonBuilder, LessonClosedError, LessonMachine,
    LessonSnapshot, LessonState,
};
pub use tutor::{
    Answer, DEFAULT_FILLER_PHRASES, DEFAULT_SYSTEM_PROMPT, TurnError, Tutor,
    TutorBuilder,
};
