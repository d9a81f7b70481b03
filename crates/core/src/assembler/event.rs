use serde::Deserialize;
use serde_json::Value;

const DATA_MARKER: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// What a single stream line carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    /// A piece of the answer.
    Token(String),
    /// Grounding content for the answer, not meant to be narrated.
    Tool(String),
    /// The end-of-stream sentinel.
    Done,
    /// The server reported an error inside the stream.
    Error(String),
    /// Nothing of interest.
    Ignored,
}

#[derive(Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct Choice {
    delta: Option<Delta>,
    #[serde(default)]
    messages: Vec<GroundedMessage>,
}

#[derive(Deserialize)]
struct GroundedMessage {
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    role: Option<String>,
    content: Option<String>,
}

/// Parses one line of the event stream.
pub(crate) fn parse_line(line: &str) -> Result<StreamEvent, serde_json::Error> {
    let Some(payload) = line.trim().strip_prefix(DATA_MARKER) else {
        return Ok(StreamEvent::Ignored);
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Ok(StreamEvent::Done);
    }
    if payload.is_empty() {
        return Ok(StreamEvent::Ignored);
    }

    let chunk: Chunk = serde_json::from_str(payload)?;
    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Ok(StreamEvent::Error(message));
    }
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(StreamEvent::Ignored);
    };

    let grounded = choice
        .messages
        .into_iter()
        .next()
        .and_then(|message| message.delta);
    let event = match (grounded, choice.delta) {
        (Some(delta), _) if delta.role.as_deref() == Some("tool") => {
            StreamEvent::Tool(delta.content.unwrap_or_default())
        }
        (Some(delta), _) => {
            token_event(strip_citations(&delta.content.unwrap_or_default()))
        }
        (None, Some(delta)) => token_event(delta.content.unwrap_or_default()),
        (None, None) => StreamEvent::Ignored,
    };
    Ok(event)
}

#[inline]
fn token_event(token: String) -> StreamEvent {
    if token.is_empty() {
        StreamEvent::Ignored
    } else {
        StreamEvent::Token(token)
    }
}

/// Removes `[docN]` citation markers and the whitespace before them.
fn strip_citations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("[doc") {
        out.push_str(&rest[..start]);
        let after = &rest[start + "[doc".len()..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 && after[digits..].starts_with(']') {
            out.truncate(out.trim_end().len());
            rest = &after[digits + 1..];
        } else {
            out.push_str("[doc");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}
