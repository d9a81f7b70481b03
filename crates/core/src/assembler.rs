//! Assembly of a streamed answer: lines, tokens, the embedded example, and
//! speakable chunks.

mod event;
mod example;
mod lines;
mod segmenter;

use std::error::Error;
use std::fmt::{self, Display};

use event::{StreamEvent, parse_line};
pub use example::Example;
use example::ExampleExtractor;
use lines::LineBuffer;
pub use segmenter::SegmenterConfig;
use segmenter::Segmenter;

/// Something that happened while assembling an answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssemblerEvent {
    /// The reply grew by this token.
    Token(String),
    /// A chunk is ready to be narrated.
    SpeechChunk(String),
    /// The embedded example changed.
    ExampleUpdated(Example),
    /// The server ended the stream with an error. Nothing follows it.
    Failed(StreamError),
}

/// The server reported an error inside the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamError {
    message: String,
}

impl StreamError {
    /// Returns the message reported by the server.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream error: {}", self.message)
    }
}

impl Error for StreamError {}

/// Assembles one answer turn from raw stream fragments.
///
/// Feed fragments with [`Assembler::push_fragment`] in arrival order and
/// call [`Assembler::finish`] once the stream ends. The reply, the example
/// and the tool content stay readable after an error.
#[derive(Debug)]
pub struct Assembler {
    lines: LineBuffer,
    reply: String,
    example: ExampleExtractor,
    segmenter: Segmenter,
    tool_content: Option<String>,
    done: bool,
    failed: bool,
}

impl Assembler {
    /// Creates an assembler for a new turn.
    #[inline]
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            lines: LineBuffer::default(),
            reply: String::new(),
            example: ExampleExtractor::default(),
            segmenter: Segmenter::new(config),
            tool_content: None,
            done: false,
            failed: false,
        }
    }

    /// Returns the reply assembled so far.
    #[inline]
    pub fn reply(&self) -> &str {
        &self.reply
    }

    /// Returns the example, if the reply carries one.
    #[inline]
    pub fn example(&self) -> Option<&Example> {
        self.example.current()
    }

    /// Returns the grounding content sent alongside the reply.
    #[inline]
    pub fn tool_content(&self) -> Option<&str> {
        self.tool_content.as_deref()
    }

    /// Returns `true` once the end-of-stream sentinel was seen.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Processes a fragment of the stream.
    ///
    /// Events from lines before an error payload are returned ahead of the
    /// [`AssemblerEvent::Failed`] it produces.
    pub fn push_fragment(&mut self, fragment: &str) -> Vec<AssemblerEvent> {
        let mut events = vec![];
        if self.done {
            return events;
        }
        self.lines.push(fragment);
        while let Some(line) = self.lines.next_line() {
            self.process_line(&line, &mut events);
            if self.done {
                break;
            }
        }
        events
    }

    /// Processes what is left after the stream ended and flushes the last
    /// chunk. Nothing is flushed after an error payload.
    pub fn finish(&mut self) -> Vec<AssemblerEvent> {
        let mut events = vec![];
        if self.done && self.failed {
            return events;
        }
        if !self.done {
            if let Some(line) = self.lines.take_rest() {
                self.process_line(&line, &mut events);
            }
        }
        self.done = true;
        if self.failed {
            return events;
        }
        if let Some(chunk) = self.segmenter.finish() {
            events.push(AssemblerEvent::SpeechChunk(chunk));
        }
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<AssemblerEvent>) {
        let event = match parse_line(line) {
            Ok(event) => event,
            Err(err) => {
                warn!("dropping unreadable stream line: {err}");
                return;
            }
        };
        trace!("stream event: {event:?}");
        match event {
            StreamEvent::Token(token) => self.push_token(token, events),
            StreamEvent::Tool(content) => self.tool_content = Some(content),
            StreamEvent::Done => self.done = true,
            StreamEvent::Error(message) => {
                self.done = true;
                self.failed = true;
                events.push(AssemblerEvent::Failed(StreamError { message }));
            }
            StreamEvent::Ignored => {}
        }
    }

    fn push_token(&mut self, token: String, events: &mut Vec<AssemblerEvent>) {
        self.reply.push_str(&token);
        if let Some(example) = self.example.update(&self.reply) {
            events.push(AssemblerEvent::ExampleUpdated(example.clone()));
        }
        let chunk = self.segmenter.push(&token);
        events.push(AssemblerEvent::Token(token));
        if let Some(chunk) = chunk {
            events.push(AssemblerEvent::SpeechChunk(chunk));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn delta_line(content: &str) -> String {
        let event = json!({ "choices": [{ "delta": { "content": content } }] });
        format!("data: {event}\n\n")
    }

    fn chunks(events: &[AssemblerEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                AssemblerEvent::SpeechChunk(chunk) => Some(chunk.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_hello_world() {
        let mut assembler = Assembler::new(SegmenterConfig::default());
        let mut events = vec![];
        let body = format!(
            "{}{}data: [DONE]\n\n",
            delta_line("Hello"),
            delta_line(" world.")
        );
        // Split the body into two fragments in the middle of the first line.
        let (head, tail) = body.split_at(20);
        events.extend(assembler.push_fragment(head));
        assert!(events.is_empty());
        events.extend(assembler.push_fragment(tail));
        assert!(assembler.is_done());
        events.extend(assembler.finish());

        assert_eq!(assembler.reply(), "Hello world.");
        assert_eq!(chunks(&events), vec!["Hello world."]);
    }

    #[test]
    fn test_example_and_tool_content() {
        let mut assembler = Assembler::new(SegmenterConfig::default());
        let mut events = vec![];
        for token in ["Intro ", "<<<EXAMPLE:The cat", " sat>>", "> outro"] {
            events.extend(assembler.push_fragment(&delta_line(token)));
        }
        let tool = r#"data: {"choices":[{"messages":[{"delta":{"role":"tool","content":"citations"}}]}]}"#;
        events.extend(assembler.push_fragment(tool));
        // The last line has no terminator and is read at the end.
        events.extend(assembler.finish());

        let examples: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                AssemblerEvent::ExampleUpdated(example) => {
                    Some((example.text.as_str(), example.complete))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            examples,
            vec![("The cat", false), ("The cat sat", false), ("The cat sat", true)]
        );
        assert_eq!(assembler.tool_content(), Some("citations"));
        assert_eq!(assembler.reply(), "Intro <<<EXAMPLE:The cat sat>>> outro");
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let mut assembler = Assembler::new(SegmenterConfig::default());
        let body = format!(
            "event: ping\r\ndata: {{oops\r\n{}data: [DONE]\n\n{}",
            delta_line("Still here."),
            delta_line("ignored after done")
        );
        let events = assembler.push_fragment(&body);
        assert_eq!(chunks(&events), vec!["Still here."]);
        assert!(assembler.push_fragment(&delta_line("late")).is_empty());
        assert_eq!(assembler.reply(), "Still here.");
    }

    #[test]
    fn test_error_payload_keeps_reply() {
        let mut assembler = Assembler::new(SegmenterConfig::default());
        assembler.push_fragment(&delta_line("Partial"));
        let events = assembler
            .push_fragment("data: {\"error\":{\"message\":\"rate limited\"}}\n");
        let [AssemblerEvent::Failed(err)] = events.as_slice() else {
            panic!("unexpected events: {events:?}");
        };
        assert_eq!(err.message(), "rate limited");
        assert_eq!(assembler.reply(), "Partial");
        assert!(assembler.is_done());
        // The pending text is not flushed as speech after a failure.
        assert!(assembler.finish().is_empty());
    }

    #[test]
    fn test_events_before_error_payload_survive() {
        let mut assembler = Assembler::new(SegmenterConfig::default());
        let body = format!(
            "{}{}data: {{\"error\":{{\"message\":\"overloaded\"}}}}\n\n",
            delta_line("Cats purr. "),
            delta_line("<<<EXAMPLE:Tom purrs>>>"),
        );
        let events = assembler.push_fragment(&body);

        assert_eq!(chunks(&events).first(), Some(&"Cats purr."));
        assert!(events.iter().any(|event| matches!(
            event,
            AssemblerEvent::ExampleUpdated(example) if example.complete
        )));
        assert!(matches!(
            events.last(),
            Some(AssemblerEvent::Failed(err)) if err.message() == "overloaded"
        ));
        assert_eq!(assembler.example().map(|e| e.text.as_str()), Some("Tom purrs"));
    }
}
