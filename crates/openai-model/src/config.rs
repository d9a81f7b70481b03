use std::fmt::Debug;

/// The API version used for Azure OpenAI deployments.
pub const AZURE_API_VERSION: &str = "2023-06-01-preview";

/// An Azure OpenAI deployment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AzureDeployment {
    pub(crate) endpoint: String,
    pub(crate) deployment: String,
}

/// An Azure Cognitive Search index the model can ground its answers on.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SearchIndex {
    pub(crate) endpoint: String,
    pub(crate) key: String,
    pub(crate) index_name: String,
}

impl Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("index_name", &self.index_name)
            .finish()
    }
}

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    azure: Option<AzureDeployment>,
    search: Option<SearchIndex>,
    temperature: Option<f64>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            azure: None,
            search: None,
            temperature: None,
        }
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Targets an Azure OpenAI deployment instead of the OpenAI API.
    ///
    /// Azure selects the model by deployment name, so the configured
    /// model is not sent in the request body.
    #[inline]
    pub fn with_azure_deployment<S1: Into<String>, S2: Into<String>>(
        mut self,
        endpoint: S1,
        deployment: S2,
    ) -> Self {
        self.azure = Some(AzureDeployment {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
        });
        self
    }

    /// Attaches a search index for grounded answers. Only Azure
    /// deployments use it.
    #[inline]
    pub fn with_search_index<S1, S2, S3>(
        mut self,
        endpoint: S1,
        key: S2,
        index_name: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        self.search = Some(SearchIndex {
            endpoint: endpoint.into(),
            key: key.into(),
            index_name: index_name.into(),
        });
        self
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OpenAIConfig {
        let temperature = match (&self.temperature, &self.azure) {
            (Some(temperature), _) => Some(*temperature),
            (None, Some(_)) => Some(0.7),
            (None, None) => None,
        };
        OpenAIConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: self
                .base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            azure: self.azure,
            search: self.search,
            temperature,
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("azure", &self.azure)
            .field("search", &self.search)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) azure: Option<AzureDeployment>,
    pub(crate) search: Option<SearchIndex>,
    pub(crate) temperature: Option<f64>,
}

impl OpenAIConfig {
    /// Returns the completions endpoint for a request.
    ///
    /// Grounded requests against an Azure deployment with a search index go
    /// through the extensions endpoint.
    pub(crate) fn completions_url(&self, use_search: bool) -> String {
        let Some(azure) = &self.azure else {
            return format!("{}/chat/completions", self.base_url);
        };
        let extensions = if self.grounded(use_search) {
            "/extensions"
        } else {
            ""
        };
        format!(
            "{}/openai/deployments/{}{extensions}/chat/completions?api-version={AZURE_API_VERSION}",
            azure.endpoint.trim_end_matches('/'),
            azure.deployment,
        )
    }

    #[inline]
    pub(crate) fn grounded(&self, use_search: bool) -> bool {
        use_search && self.azure.is_some() && self.search.is_some()
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("azure", &self.azure)
            .field("search", &self.search)
            .field("temperature", &self.temperature)
            .finish()
    }
}
