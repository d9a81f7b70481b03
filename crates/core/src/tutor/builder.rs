use edura_model::ChatProvider;

use super::{
    DEFAULT_FILLER_PHRASES, DEFAULT_SYSTEM_PROMPT, ExampleFn, ReplyFn, Tutor,
};
use crate::assembler::{Example, SegmenterConfig};
use crate::chat_client::ChatClient;
use crate::conversation::Conversation;
use crate::lesson::Lesson;

/// [`Tutor`] builder.
pub struct TutorBuilder {
    client: ChatClient,
    lesson: Lesson,
    system_prompt: String,
    fillers: Vec<String>,
    segmenter: SegmenterConfig,
    use_search: bool,
    on_reply: Option<ReplyFn>,
    on_example: Option<ExampleFn>,
}

impl TutorBuilder {
    /// Creates a new builder with the chat provider and the lesson the
    /// answers are narrated through.
    #[inline]
    pub fn new<P: ChatProvider + 'static>(provider: P, lesson: Lesson) -> Self {
        Self {
            client: ChatClient::new(provider),
            lesson,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            fillers: DEFAULT_FILLER_PHRASES
                .iter()
                .map(|phrase| (*phrase).to_owned())
                .collect(),
            segmenter: SegmenterConfig::default(),
            use_search: false,
            on_reply: None,
            on_example: None,
        }
    }

    /// Replaces the system prompt.
    #[inline]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Replaces the filler phrases. An empty list disables fillers.
    #[inline]
    pub fn with_filler_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fillers = phrases.into_iter().map(Into::into).collect();
        self
    }

    /// Sets where answers are cut into narration chunks.
    #[inline]
    pub fn with_segmenter(mut self, config: SegmenterConfig) -> Self {
        self.segmenter = config;
        self
    }

    /// Asks the provider to ground answers on its search index.
    #[inline]
    pub fn with_search(mut self, use_search: bool) -> Self {
        self.use_search = use_search;
        self
    }

    /// Attaches a callback to be invoked whenever the reply grows.
    #[inline]
    pub fn on_reply(
        mut self,
        on_reply: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_reply = Some(Box::new(on_reply));
        self
    }

    /// Attaches a callback to be invoked whenever the example changes.
    #[inline]
    pub fn on_example(
        mut self,
        on_example: impl Fn(&Example) + Send + Sync + 'static,
    ) -> Self {
        self.on_example = Some(Box::new(on_example));
        self
    }

    /// Builds the tutor.
    pub fn build(self) -> Tutor {
        Tutor {
            client: self.client,
            lesson: self.lesson,
            conversation: Conversation::new(self.system_prompt.clone()),
            system_prompt: self.system_prompt,
            fillers: self.fillers,
            next_filler: 0,
            segmenter: self.segmenter,
            use_search: self.use_search,
            example: None,
            on_reply: self.on_reply,
            on_example: self.on_example,
        }
    }
}
