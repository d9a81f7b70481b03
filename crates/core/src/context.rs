//! The neighborhood of the lesson sent along with a learner question.

use crate::script::{LessonAction, ScriptNode};

const NODES_BEFORE: usize = 4;
const NODES_AFTER: usize = 2;

/// Returns the script nodes around the node `current` was flattened from,
/// up to four before and two after.
///
/// The slice is empty when the script is empty, there is no current action,
/// or the source node is not part of the script.
pub fn context_slice<'a>(
    script: &'a [ScriptNode],
    current: Option<&LessonAction>,
) -> &'a [ScriptNode] {
    let Some(current) = current else {
        return &[];
    };
    let Some(idx) = script
        .iter()
        .position(|node| node.id() == current.source_node_id)
    else {
        return &[];
    };
    let start = idx.saturating_sub(NODES_BEFORE);
    let end = (idx + NODES_AFTER + 1).min(script.len());
    &script[start..end]
}

/// Wraps a learner question with the lesson context it was asked in.
pub fn frame_question(context: &[ScriptNode], question: &str) -> String {
    let context = serde_json::to_string(context).unwrap_or_else(|err| {
        warn!("cannot serialize lesson context: {err}");
        "[]".to_owned()
    });
    format!("[SYSTEM CONTEXT: {context}]\n\nUser Question: {question}")
}
