use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;

use edura_model::{
    ChatProvider, ChatProviderError, ChatRequest, ChatResponse,
};
use tracing::Instrument;

type BoxedResponse = Pin<
    Box<dyn DynChatResponse<Error = Box<dyn ChatProviderError>> + Send>,
>;
type SendRequestResult = Result<BoxedResponse, Box<dyn ChatProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ChatRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// Object-safe view of a [`ChatResponse`] with its error boxed.
pub(crate) trait DynChatResponse {
    type Error;

    fn poll_next_fragment_dyn(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<Option<String>, Self::Error>>;
}

impl<R: ChatResponse> DynChatResponse for R {
    type Error = Box<dyn ChatProviderError>;

    #[inline]
    fn poll_next_fragment_dyn(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<Option<String>, Self::Error>> {
        self.poll_next_fragment(cx)
            .map_err(|err| Box::new(err) as Box<dyn ChatProviderError>)
    }
}

/// A wrapper around a chat provider that provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ChatClient {
    handler_fn: HandlerFn,
}

impl ChatClient {
    #[inline]
    pub fn new<P: ChatProvider + 'static>(provider: P) -> Self {
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("sending request with {} messages", req.messages.len());
                    match fut.await {
                        Ok(resp) => Ok(Box::pin(resp) as BoxedResponse),
                        Err(err) => {
                            error!("request failed: {err}");
                            Err(Box::new(err) as Box<dyn ChatProviderError>)
                        }
                    }
                }
                .instrument(trace_span!("chat client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the streaming response.
    #[inline]
    pub async fn send_request(
        &self,
        req: ChatRequest,
    ) -> Result<ChatClientResponse, Box<dyn ChatProviderError>> {
        let inner = (self.handler_fn)(req).await?;
        Ok(ChatClientResponse { inner })
    }
}

/// A streaming response from [`ChatClient`].
pub struct ChatClientResponse {
    inner: BoxedResponse,
}

impl ChatClientResponse {
    /// Waits for the next fragment. `None` means the stream has ended.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the response stops the stream.
    #[inline]
    pub async fn next_fragment(
        &mut self,
    ) -> Result<Option<String>, Box<dyn ChatProviderError>> {
        poll_fn(|cx| self.inner.as_mut().poll_next_fragment_dyn(cx)).await
    }
}

#[cfg(test)]
mod tests {
    use edura_model::{ChatMessage, ErrorKind};
    use edura_test_model::{PresetResponse, TestChatProvider};

    use super::*;

    fn request(question: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user(question)],
            use_search: false,
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestChatProvider::default();
        provider.add_response(PresetResponse::with_fragments([
            "How ", "are ", "you?",
        ]));
        let client = ChatClient::new(provider);

        for _ in 0..3 {
            let mut resp = client.send_request(request("Hi")).await.unwrap();
            let mut body = String::new();
            while let Some(fragment) = resp.next_fragment().await.unwrap() {
                body.push_str(&fragment);
            }
            assert_eq!(body, "How are you?");
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let client = ChatClient::new(TestChatProvider::default());
        let err = client.send_request(request("Hi")).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);

        let mut provider = TestChatProvider::default();
        provider.add_response(
            PresetResponse::with_fragments(["a", "b"]).fail_after(1),
        );
        let client = ChatClient::new(provider);
        let mut resp = client.send_request(request("Hi")).await.unwrap();
        assert_eq!(resp.next_fragment().await.unwrap().as_deref(), Some("a"));
        let err = resp.next_fragment().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
