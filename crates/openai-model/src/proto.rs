use edura_model::{ChatMessage, ChatRequest, ChatRole};
use serde::Serialize;

use crate::OpenAIConfig;
use crate::config::SearchIndex;

const DEFAULT_ROLE_INFORMATION: &str = "You represent an AI Agent.";

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    data_sources: Vec<DataSource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct DataSource {
    r#type: &'static str,
    parameters: SearchParameters,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchParameters {
    endpoint: String,
    key: String,
    index_name: String,
    semantic_configuration: &'static str,
    query_type: &'static str,
    fields_mapping: FieldsMapping,
    in_scope: bool,
    role_information: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldsMapping {
    content_fields_separator: &'static str,
    content_fields: Vec<&'static str>,
    filepath_field: Option<&'static str>,
    title_field: Option<&'static str>,
    url_field: Option<&'static str>,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ChatRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let data_sources = match &config.search {
        Some(search) if config.grounded(req.use_search) => {
            vec![create_data_source(search, &req.messages)]
        }
        _ => vec![],
    };
    ChatCompletionRequest {
        model: if config.azure.is_some() {
            None
        } else {
            Some(config.model.clone())
        },
        messages: req.messages.clone(),
        stream: true,
        temperature: config.temperature,
        data_sources,
    }
}

fn create_data_source(
    search: &SearchIndex,
    messages: &[ChatMessage],
) -> DataSource {
    // The search extension wants the persona separately from the messages.
    let role_information = messages
        .first()
        .filter(|msg| msg.role == ChatRole::System)
        .map(|msg| msg.content.clone())
        .unwrap_or_else(|| DEFAULT_ROLE_INFORMATION.to_owned());
    DataSource {
        r#type: "AzureCognitiveSearch",
        parameters: SearchParameters {
            endpoint: search.endpoint.clone(),
            key: search.key.clone(),
            index_name: search.index_name.clone(),
            semantic_configuration: "",
            query_type: "simple",
            fields_mapping: FieldsMapping {
                content_fields_separator: "\n",
                content_fields: vec!["content"],
                filepath_field: None,
                title_field: Some("title"),
                url_field: None,
            },
            in_scope: true,
            role_information,
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system("You are Edura, a warm teacher."),
                ChatMessage::user("What is a noun?"),
            ],
            use_search: true,
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();
        let expected = ChatCompletionRequest {
            model: Some("custom".to_owned()),
            messages: request.messages.clone(),
            stream: true,
            temperature: None,
            data_sources: vec![],
        };
        assert_eq!(create_request(&request, &config), expected);
    }

    #[test]
    fn test_create_grounded_request() {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system("You are Edura, a warm teacher."),
                ChatMessage::user("What is a noun?"),
            ],
            use_search: true,
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_azure_deployment("https://edura.openai.azure.com", "tutor")
            .with_search_index("https://search.windows.net", "key", "lessons")
            .build();
        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "messages": [
                    { "role": "system", "content": "You are Edura, a warm teacher." },
                    { "role": "user", "content": "What is a noun?" }
                ],
                "stream": true,
                "temperature": 0.7,
                "dataSources": [{
                    "type": "AzureCognitiveSearch",
                    "parameters": {
                        "endpoint": "https://search.windows.net",
                        "key": "key",
                        "indexName": "lessons",
                        "semanticConfiguration": "",
                        "queryType": "simple",
                        "fieldsMapping": {
                            "contentFieldsSeparator": "\n",
                            "contentFields": ["content"],
                            "filepathField": null,
                            "titleField": "title",
                            "urlField": null
                        },
                        "inScope": true,
                        "roleInformation": "You are Edura, a warm teacher."
                    }
                }]
            })
        );
    }

    #[test]
    fn test_role_information_fallback() {
        let request = ChatRequest {
            messages: vec![ChatMessage::user("Hi")],
            use_search: true,
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_azure_deployment("https://edura", "tutor")
            .with_search_index("https://search", "key", "lessons")
            .build();
        let req = create_request(&request, &config);
        assert_eq!(
            req.data_sources[0].parameters.role_information,
            DEFAULT_ROLE_INFORMATION
        );
    }
}
