//! A local fake chat provider for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use edura_model::{
    ChatProvider, ChatProviderError, ChatRequest, ChatResponse, ChatRole,
    ErrorKind,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ChatProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestChatResponse {
    preset: PresetResponse,
    fragment_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ChatResponse for TestChatResponse {
    type Error = crate::Error;

    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        let delay = this.delay;
        let pending = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(pending.as_mut().poll(cx));
        this.sleep = None;

        if let PresetOutcome::FailAfter(count) = this.preset.outcome {
            if this.fragment_idx == count {
                this.fragment_idx = usize::MAX;
                return Poll::Ready(Err(Error {
                    message: "connection reset",
                    kind: ErrorKind::Transport,
                }));
            }
        }

        // A failed response sits at `usize::MAX` and reports the end.
        let Some(fragment) = this.preset.fragments.get(this.fragment_idx)
        else {
            return Poll::Ready(Ok(None));
        };
        this.fragment_idx += 1;
        Poll::Ready(Ok(Some(fragment.clone())))
    }
}

/// A local fake chat provider for testing purpose.
///
/// Before sending requests, you need to queue up the responses. The response
/// is selected by the number of user messages in the request, so the first
/// question gets the first response, the second question the second one, and
/// so on. If there are not enough responses, an error will be returned.
///
/// Every request is recorded and can be inspected with [`Self::requests`].
#[derive(Clone, Default)]
pub struct TestChatProvider {
    responses: Vec<PresetResponse>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl TestChatProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.responses.push(preset);
    }

    /// Sets the delay before each fragment is delivered.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl ChatProvider for TestChatProvider {
    type Error = crate::Error;
    type Response = TestChatResponse;

    fn send_request(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }

        let question_count = req
            .messages
            .iter()
            .filter(|msg| msg.role == ChatRole::User)
            .count();
        let result = match question_count
            .checked_sub(1)
            .and_then(|idx| self.responses.get(idx))
        {
            None => Err(Error {
                message: "no preset response for this question",
                kind: ErrorKind::Other,
            }),
            Some(preset) if preset.outcome == PresetOutcome::Rejected => {
                Err(Error {
                    message: "request rejected",
                    kind: ErrorKind::Upstream,
                })
            }
            Some(preset) => Ok(TestChatResponse {
                preset: preset.clone(),
                fragment_idx: 0,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
            }),
        };
        ready(result)
    }
}
