//! Provider-neutral types for talking to a streaming chat model.
//!
//! The tutor never looks at a provider's wire format directly. It sends a
//! [`ChatRequest`] and reads back raw text fragments of the provider's
//! line-delimited event stream through [`ChatResponse`]; framing and event
//! decoding happen later, in the answer assembler of `edura-core`.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that provider implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
