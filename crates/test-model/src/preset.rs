use serde::{Deserialize, Serialize};
use serde_json::json;

/// How a preset response ends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetOutcome {
    /// Every fragment is delivered, then the stream ends.
    #[default]
    Complete,
    /// The request itself is refused with an upstream error.
    Rejected,
    /// The connection drops after the given number of fragments.
    FailAfter(usize),
}

/// The preset response for one learner question.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Raw fragments of the event stream, delivered one per poll.
    pub fragments: Vec<String>,
    /// How the response ends.
    #[serde(default)]
    pub outcome: PresetOutcome,
}

impl PresetResponse {
    /// Creates a `PresetResponse` from raw stream fragments.
    #[inline]
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            outcome: PresetOutcome::Complete,
        }
    }

    /// Creates a `PresetResponse` that streams the given content deltas as
    /// plain completion events, one event per fragment, followed by the
    /// end-of-stream sentinel.
    pub fn from_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fragments: Vec<String> = deltas
            .into_iter()
            .map(|delta| {
                let event = json!({
                    "choices": [{ "delta": { "content": delta.as_ref() } }]
                });
                format!("data: {event}\n\n")
            })
            .collect();
        fragments.push("data: [DONE]\n\n".to_owned());
        Self::with_fragments(fragments)
    }

    /// Creates a `PresetResponse` whose request is refused.
    #[inline]
    pub fn rejected() -> Self {
        Self {
            fragments: vec![],
            outcome: PresetOutcome::Rejected,
        }
    }

    /// Drops the connection after `count` fragments were delivered.
    #[inline]
    pub fn fail_after(mut self, count: usize) -> Self {
        self.outcome = PresetOutcome::FailAfter(count);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_deltas() {
        let response = PresetResponse::from_deltas(["Nouns ", "name \"things\"."]);
        assert_eq!(
            response.fragments,
            vec![
                "data: {\"choices\":[{\"delta\":{\"content\":\"Nouns \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"name \\\"things\\\".\"}}]}\n\n",
                "data: [DONE]\n\n",
            ]
        );
    }

    #[test]
    fn test_deserialize() {
        let response: PresetResponse = serde_json::from_str(
            r#"{ "fragments": ["data: [DONE]\n\n"], "outcome": { "fail_after": 0 } }"#,
        )
        .unwrap();
        assert_eq!(response.outcome, PresetOutcome::FailAfter(0));

        let response: PresetResponse =
            serde_json::from_str(r#"{ "fragments": [] }"#).unwrap();
        assert_eq!(response.outcome, PresetOutcome::Complete);
    }
}
