//! A chat provider for OpenAI-compatible APIs, including Azure OpenAI
//! deployments grounded on a Cognitive Search index.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use edura_model::{ChatProvider, ChatProviderError, ChatRequest, ErrorKind};
use mime::Mime;
use reqwest::{Client, header};

pub use config::{AZURE_API_VERSION, OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, Fragments};
pub use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {}

impl ChatProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible chat provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ChatProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let config = Arc::clone(&self.config);
        let body = proto::create_request(req, &config);
        let url = config.completions_url(req.use_search);
        let mut builder = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&body);
        builder = if config.azure.is_some() {
            builder.header("api-key", &config.api_key)
        } else {
            builder.bearer_auth(&config.api_key)
        };

        async move {
            if config.api_key.is_empty() {
                return Err(Error::new(
                    "no API key configured",
                    ErrorKind::Configuration,
                ));
            }

            debug!("sending chat request to {url}");
            let resp = builder.send().await.map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::Transport)
            })?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                warn!("chat request failed with {status}: {text}");
                return Err(Error::new(
                    format!("{status}: {text}"),
                    ErrorKind::Upstream,
                ));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned);
            let is_event_stream = content_type
                .as_deref()
                .and_then(|v| v.parse::<Mime>().ok())
                .map(|m| {
                    m.type_() == mime::TEXT && m.subtype().as_str() == "event-stream"
                })
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::Upstream,
                ));
            }

            let fragments = Fragments::new(Chunks::from_response(resp));
            Ok(OpenAIResponse::from_fragments(fragments))
        }
    }
}
