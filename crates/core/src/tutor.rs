//! Question answering on top of a running lesson.

mod builder;

use std::error::Error;
use std::fmt::{self, Display};

use edura_model::{ChatProviderError, ChatRequest};

use crate::assembler::{
    Assembler, AssemblerEvent, Example, SegmenterConfig, StreamError,
};
use crate::chat_client::ChatClient;
use crate::context::frame_question;
use crate::conversation::Conversation;
use crate::lesson::{Lesson, LessonClosedError, LessonState};
pub use builder::TutorBuilder;

/// The persona the model answers with.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Edura, a warm, energetic \
and encouraging AI teacher. Answer the student's question based strictly on \
the lesson context sent with it. Your answer is read aloud: write exactly as \
a teacher would speak, in full sentences, without lists, bold text or \
markdown. Keep the answer under 50 words. Start with \"Good question!\" or a \
variation of it, and end with \"Do you want me to continue the lesson?\". If \
the question is not about the lesson, politely say it is off-topic and ask \
for a relevant question. Never make up information.";

/// Phrases spoken while the model is thinking.
pub const DEFAULT_FILLER_PHRASES: &[&str] = &[
    "That is a great question! Give me a moment to think to provide a good answer.",
    "Hmm, let me think about that for a second and give me a moment to think.",
    "Good point! Here is what I think. Give me a moment to think.",
    "Let's see... Give me a moment to think.",
    "Interesting question. Give me a moment to think.",
    "I'm glad you asked that. Give me a moment to think.",
    "Okay, let me explain. Give me a moment to think.",
];

/// Why a question could not be answered.
///
/// Whatever was assembled before a failure stays in the conversation.
#[derive(Debug)]
pub enum TurnError {
    /// The provider refused the request.
    Provider(Box<dyn ChatProviderError>),
    /// The connection failed while the answer was streaming.
    Transport(Box<dyn ChatProviderError>),
    /// The stream ended with an error payload from the server.
    Upstream(StreamError),
    /// The lesson has shut down.
    LessonClosed(LessonClosedError),
}

impl Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Provider(err) => write!(f, "request refused: {err}"),
            TurnError::Transport(err) => {
                write!(f, "answer stream interrupted: {err}")
            }
            TurnError::Upstream(err) => write!(f, "{err}"),
            TurnError::LessonClosed(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TurnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TurnError::Provider(err) | TurnError::Transport(err) => {
                Some(err.as_ref())
            }
            TurnError::Upstream(err) => Some(err),
            TurnError::LessonClosed(err) => Some(err),
        }
    }
}

impl From<LessonClosedError> for TurnError {
    #[inline]
    fn from(err: LessonClosedError) -> Self {
        TurnError::LessonClosed(err)
    }
}

/// A completed answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    /// The full reply.
    pub reply: String,
    /// The example embedded in the reply.
    pub example: Option<Example>,
    /// Grounding content returned with the reply.
    pub tool_content: Option<String>,
}

type ReplyFn = Box<dyn Fn(&str) + Send + Sync>;
type ExampleFn = Box<dyn Fn(&Example) + Send + Sync>;

/// Answers learner questions during a lesson.
///
/// Asking a question interrupts the lesson, speaks a filler phrase, sends
/// the question with its lesson context to the model and narrates the
/// answer chunk by chunk as it streams in. The lesson then waits in
/// [`LessonState::AnswerComplete`] until it is resumed.
///
/// Questions asked while no lesson is playing are answered and recorded
/// but not narrated.
pub struct Tutor {
    client: ChatClient,
    lesson: Lesson,
    conversation: Conversation,
    system_prompt: String,
    fillers: Vec<String>,
    next_filler: usize,
    segmenter: SegmenterConfig,
    use_search: bool,
    example: Option<Example>,
    on_reply: Option<ReplyFn>,
    on_example: Option<ExampleFn>,
}

impl Tutor {
    /// Returns the conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the example of the latest answer.
    #[inline]
    pub fn example(&self) -> Option<&Example> {
        self.example.as_ref()
    }

    /// Returns the lesson this tutor answers for.
    #[inline]
    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    /// Starts the conversation over and forgets the example.
    pub fn clear(&mut self) {
        self.conversation.clear(self.system_prompt.clone());
        self.example = None;
    }

    /// Answers a learner question.
    pub async fn ask(&mut self, question: &str) -> Result<Answer, TurnError> {
        let snapshot = self.lesson.snapshot().await?;
        debug!(state = %snapshot.state, "asking: {question}");
        if matches!(
            snapshot.state,
            LessonState::Running
                | LessonState::Answering
                | LessonState::AnswerComplete
        ) {
            self.lesson.interrupt()?;
        }
        let filler = self.next_filler();
        self.lesson.start_answering(filler)?;

        self.conversation
            .push_user(frame_question(&snapshot.context, question));
        self.example = None;
        let request = ChatRequest {
            messages: self.conversation.messages().to_vec(),
            use_search: self.use_search,
        };

        let result = self.stream_answer(request).await;
        self.conversation.end_turn();
        self.lesson.answer_stream_finished()?;
        if let Err(err) = &result {
            error!("turn failed: {err}");
        }
        result
    }

    async fn stream_answer(
        &mut self,
        request: ChatRequest,
    ) -> Result<Answer, TurnError> {
        let mut response = self
            .client
            .send_request(request)
            .await
            .map_err(TurnError::Provider)?;

        let mut assembler = Assembler::new(self.segmenter.clone());
        loop {
            let fragment = match response.next_fragment().await {
                Ok(Some(fragment)) => fragment,
                Ok(None) => break,
                Err(err) => return Err(TurnError::Transport(err)),
            };
            trace!("fragment: {fragment:?}");
            let events = assembler.push_fragment(&fragment);
            self.handle_events(&assembler, events)?;
            if assembler.is_done() {
                break;
            }
        }
        let events = assembler.finish();
        self.handle_events(&assembler, events)?;

        if let Some(tool_content) = assembler.tool_content() {
            self.conversation.push_tool(tool_content);
        }
        Ok(Answer {
            reply: assembler.reply().to_owned(),
            example: assembler.example().cloned(),
            tool_content: assembler.tool_content().map(ToOwned::to_owned),
        })
    }

    fn handle_events(
        &mut self,
        assembler: &Assembler,
        events: Vec<AssemblerEvent>,
    ) -> Result<(), TurnError> {
        let mut reply_changed = false;
        let mut failure = None;
        for event in events {
            match event {
                AssemblerEvent::Token(_) => reply_changed = true,
                AssemblerEvent::SpeechChunk(chunk) => {
                    self.lesson.speak_answer(chunk)?;
                }
                AssemblerEvent::ExampleUpdated(example) => {
                    if let Some(on_example) = &self.on_example {
                        on_example(&example);
                    }
                    self.example = Some(example);
                }
                AssemblerEvent::Failed(err) => failure = Some(err),
            }
        }
        if reply_changed {
            self.conversation.upsert_assistant(assembler.reply());
            if let Some(on_reply) = &self.on_reply {
                on_reply(assembler.reply());
            }
        }
        match failure {
            Some(err) => Err(TurnError::Upstream(err)),
            None => Ok(()),
        }
    }

    fn next_filler(&mut self) -> Option<String> {
        if self.fillers.is_empty() {
            return None;
        }
        let filler = self.fillers[self.next_filler % self.fillers.len()].clone();
        self.next_filler = self.next_filler.wrapping_add(1);
        Some(filler)
    }
}
