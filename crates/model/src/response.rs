use std::pin::Pin;
use std::task::{self, Poll};

use crate::provider::ChatProviderError;

/// A streaming response from the chat provider.
///
/// The response yields the provider's event stream as raw text fragments.
/// A fragment is an arbitrarily sized slice of the stream: it may hold
/// several events, or end in the middle of one. Callers must not assume any
/// alignment between fragment boundaries and event boundaries.
pub trait ChatResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ChatProviderError;

    /// Attempts to pull out the next fragment from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next fragment. Implementations will ensure that the current
    ///   task will be notified when the next fragment may be ready.
    /// - `Poll::Ready(Ok(Some(fragment)))` means the response has a
    ///   fragment to deliver, and may produce further fragments on
    ///   subsequent `poll_next_fragment` calls.
    /// - `Poll::Ready(Ok(None))` means the stream has ended.
    /// - `Poll::Ready(Err(error))` means the connection failed. Fragments
    ///   delivered before the error remain valid.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>>;
}
