//! Lesson scripts and their flattening into playable actions.

use std::error::Error;
use std::fmt::{self, Display};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single unit of a lesson script.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptNode {
    /// A passage the narrator reads out.
    Speech {
        /// Node id, unique within the script.
        id: u64,
        /// Text to narrate.
        content: String,
    },
    /// A pre-recorded video, optionally wrapped by spoken lines.
    Video {
        /// Node id, unique within the script.
        id: u64,
        /// Location of the video file.
        path: String,
        /// Spoken before the video starts. Empty means nothing is said.
        #[serde(default)]
        intro: String,
        /// Spoken after the video ends. Empty means nothing is said.
        #[serde(default)]
        outro: String,
    },
}

impl ScriptNode {
    /// Returns the node id.
    #[inline]
    pub fn id(&self) -> u64 {
        match self {
            ScriptNode::Speech { id, .. } | ScriptNode::Video { id, .. } => {
                *id
            }
        }
    }
}

/// What a [`LessonAction`] asks the collaborators to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Narrate the payload.
    Speak,
    /// Play the video at the payload path.
    Video,
}

/// An atomic playable step of a lesson.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LessonAction {
    /// Stable id derived from the source node, e.g. `"3-intro"`.
    pub id: String,
    /// What to do.
    pub kind: ActionKind,
    /// Text to narrate or video path to play.
    pub payload: String,
    /// Id of the script node this action came from.
    pub source_node_id: u64,
    /// The script node this action came from.
    pub source_node: Arc<ScriptNode>,
}

impl LessonAction {
    fn new(
        suffix: &str,
        kind: ActionKind,
        payload: &str,
        source_node: &Arc<ScriptNode>,
    ) -> Self {
        let source_node_id = source_node.id();
        Self {
            id: format!("{source_node_id}-{suffix}"),
            kind,
            payload: payload.to_owned(),
            source_node_id,
            source_node: Arc::clone(source_node),
        }
    }
}

/// Turns script nodes into the ordered list of actions to play.
///
/// A speech node yields one `Speak`. A video node yields an intro `Speak`
/// when the intro is not empty, the `Video` itself, and an outro `Speak`
/// when the outro is not empty.
pub fn flatten(nodes: &[ScriptNode]) -> Vec<LessonAction> {
    let mut actions = Vec::with_capacity(nodes.len());
    for node in nodes {
        let source = Arc::new(node.clone());
        match node {
            ScriptNode::Speech { content, .. } => {
                actions.push(LessonAction::new(
                    "speech",
                    ActionKind::Speak,
                    content,
                    &source,
                ));
            }
            ScriptNode::Video {
                path, intro, outro, ..
            } => {
                if !intro.is_empty() {
                    actions.push(LessonAction::new(
                        "intro",
                        ActionKind::Speak,
                        intro,
                        &source,
                    ));
                }
                actions.push(LessonAction::new(
                    "video",
                    ActionKind::Video,
                    path,
                    &source,
                ));
                if !outro.is_empty() {
                    actions.push(LessonAction::new(
                        "outro",
                        ActionKind::Speak,
                        outro,
                        &source,
                    ));
                }
            }
        }
    }
    actions
}

/// Flattens an untyped script.
///
/// Input that is not a sequence of script nodes yields no actions. The
/// reason is reported through the log instead of being returned.
pub fn flatten_value(value: &Value) -> Vec<LessonAction> {
    flatten(Script::from_value(value).nodes())
}

/// The reason a script could not be read.
#[derive(Debug)]
pub struct MalformedScript {
    reason: String,
}

impl MalformedScript {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the reason.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for MalformedScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed script: {}", self.reason)
    }
}

impl Error for MalformedScript {}

/// An ordered lesson script.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Script {
    nodes: Vec<ScriptNode>,
}

impl Script {
    /// Creates a script from its nodes.
    #[inline]
    pub fn new(nodes: Vec<ScriptNode>) -> Self {
        Self { nodes }
    }

    /// Reads a script, failing if the value is not a sequence of
    /// well-formed nodes.
    pub fn try_from_value(value: &Value) -> Result<Self, MalformedScript> {
        let Value::Array(items) = value else {
            return Err(MalformedScript::new(format!(
                "expected a sequence of nodes, found {}",
                value_kind(value)
            )));
        };
        let nodes = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                ScriptNode::deserialize(item).map_err(|err| {
                    MalformedScript::new(format!("node {idx}: {err}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { nodes })
    }

    /// Reads a script, falling back to an empty one on malformed input.
    pub fn from_value(value: &Value) -> Self {
        match Self::try_from_value(value) {
            Ok(script) => script,
            Err(err) => {
                error!(reason = err.reason(), "cannot load lesson script");
                Self::default()
            }
        }
    }

    /// Returns the nodes in order.
    #[inline]
    pub fn nodes(&self) -> &[ScriptNode] {
        &self.nodes
    }

    /// Returns `true` if the script has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flattens the script into actions.
    #[inline]
    pub fn flatten(&self) -> Vec<LessonAction> {
        flatten(&self.nodes)
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "an object",
    }
}

/// A lesson topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic id.
    pub id: String,
    /// Title shown to the learner.
    pub title: String,
    /// Optional subject the topic belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// The lesson script. Loads empty when malformed.
    #[serde(default)]
    pub script: Script,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_nodes() -> Vec<ScriptNode> {
        serde_json::from_value(json!([
            { "id": 1, "type": "speech", "content": "A" },
            { "id": 2, "type": "video", "path": "p", "intro": "I", "outro": "O" },
            { "id": 3, "type": "video", "path": "q" },
            { "id": 4, "type": "video", "path": "r", "outro": "Bye" },
        ]))
        .unwrap()
    }

    #[test]
    fn test_flatten() {
        let actions = flatten(&sample_nodes());
        let summary: Vec<_> = actions
            .iter()
            .map(|a| (a.id.as_str(), a.kind, a.payload.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("1-speech", ActionKind::Speak, "A"),
                ("2-intro", ActionKind::Speak, "I"),
                ("2-video", ActionKind::Video, "p"),
                ("2-outro", ActionKind::Speak, "O"),
                ("3-video", ActionKind::Video, "q"),
                ("4-video", ActionKind::Video, "r"),
                ("4-outro", ActionKind::Speak, "Bye"),
            ]
        );
        assert_eq!(actions[2].source_node_id, 2);
        assert_eq!(*actions[2].source_node, sample_nodes()[1]);
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let first = flatten(&sample_nodes());
        let second = flatten(&sample_nodes());
        assert_eq!(first, second);
    }

    #[test]
    fn test_action_count() {
        let nodes = sample_nodes();
        let speech = 1;
        let video = 3;
        let intros = 1;
        let outros = 2;
        assert_eq!(flatten(&nodes).len(), speech + video + intros + outros);
    }

    #[test]
    fn test_malformed_input() {
        assert!(flatten_value(&json!({ "id": 1 })).is_empty());
        assert!(flatten_value(&json!("speech")).is_empty());
        assert!(flatten_value(&Value::Null).is_empty());
        assert!(flatten_value(&json!([{ "id": 1, "type": "quiz" }])).is_empty());

        let err = Script::try_from_value(&json!({})).unwrap_err();
        assert!(err.reason().contains("an object"));
        let err =
            Script::try_from_value(&json!([{ "type": "speech" }])).unwrap_err();
        assert!(err.reason().starts_with("node 0"));
    }

    #[test]
    fn test_topic_with_malformed_script() {
        let topic: Topic = serde_json::from_value(json!({
            "id": "nouns",
            "title": "Nouns",
            "script": "not a script"
        }))
        .unwrap();
        assert!(topic.script.is_empty());
        assert_eq!(topic.subject, None);

        let topic: Topic = serde_json::from_value(json!({
            "id": "nouns",
            "title": "Nouns",
            "subject": "English",
            "script": [{ "id": 1, "type": "speech", "content": "Hello" }]
        }))
        .unwrap();
        assert_eq!(topic.script.flatten().len(), 1);
    }
}
