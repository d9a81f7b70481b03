use std::pin::Pin;
use std::task::{Context, Poll, ready};

use edura_model::{ChatResponse, ErrorKind};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::{Fragments, FragmentsError};

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextFragment = Result<(Option<String>, Fragments), Error>;

pin_project! {
    /// A streaming completion body, delivered as text fragments.
    pub struct OpenAIResponse {
        next_fragment_fut: Option<PinnedFuture<NextFragment>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub(crate) fn from_fragments(fragments: Fragments) -> Self {
        Self {
            next_fragment_fut: Some(Box::pin(next_fragment(fragments))),
        }
    }
}

impl ChatResponse for OpenAIResponse {
    type Error = Error;

    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.project();
        let Some(next_fragment_fut) = this.next_fragment_fut else {
            return Poll::Ready(Ok(None));
        };
        match ready!(next_fragment_fut.as_mut().poll(cx)) {
            Ok((Some(fragment), fragments)) => {
                *this.next_fragment_fut =
                    Some(Box::pin(next_fragment(fragments)));
                Poll::Ready(Ok(Some(fragment)))
            }
            Ok((None, _)) => {
                *this.next_fragment_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_fragment_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }
}

async fn next_fragment(mut fragments: Fragments) -> NextFragment {
    match fragments.next_fragment().await {
        Ok(fragment) => Ok((fragment, fragments)),
        Err(FragmentsError::Transport(err)) => {
            warn!("stream interrupted: {err:?}");
            Err(Error::new(format!("{:?}", err.0), ErrorKind::Transport))
        }
        Err(FragmentsError::InvalidPayload) => Err(Error::new(
            "response body is not valid UTF-8",
            ErrorKind::Transport,
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::Chunks;

    #[tokio::test]
    async fn test_fragments_in_order() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(
                    b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel",
                ),
                Bytes::from_static(b"lo\"}}]}\n\ndata: [DONE]\n\n"),
            ]
            .into(),
        );
        let mut resp =
            pin!(OpenAIResponse::from_fragments(Fragments::new(chunks)));
        let mut body = String::new();
        while let Some(fragment) =
            poll_fn(|cx| resp.as_mut().poll_next_fragment(cx))
                .await
                .unwrap()
        {
            body.push_str(&fragment);
        }
        assert_eq!(
            body,
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: [DONE]\n\n"
        );
        // Exhausted responses keep reporting the end of the stream.
        let after =
            poll_fn(|cx| resp.as_mut().poll_next_fragment(cx)).await.unwrap();
        assert_eq!(after, None);
    }

    #[tokio::test]
    async fn test_truncated_body_is_transport_error() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"data: \xe4\xbd")].into(),
        );
        let mut resp =
            pin!(OpenAIResponse::from_fragments(Fragments::new(chunks)));
        let first =
            poll_fn(|cx| resp.as_mut().poll_next_fragment(cx)).await.unwrap();
        assert_eq!(first.as_deref(), Some("data: "));
        let err = poll_fn(|cx| resp.as_mut().poll_next_fragment(cx))
            .await
            .unwrap_err();
        assert_eq!(edura_model::ChatProviderError::kind(&err), ErrorKind::Transport);
    }
}
