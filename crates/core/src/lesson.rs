//! The lesson sequencer and the actor that drives it.

mod builder;
mod driver;
mod machine;
#[cfg(test)]
mod tests;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::avatar::AvatarEvent;
use crate::script::{LessonAction, Script, ScriptNode};
pub use builder::LessonBuilder;
use driver::{LessonMessage, Mailbox};
pub use machine::{Effect, LessonMachine, LessonState};

/// Returned when a message is sent to a lesson that has shut down.
pub struct LessonClosedError;

impl fmt::Debug for LessonClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LessonClosedError").finish()
    }
}

impl fmt::Display for LessonClosedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "the lesson has shut down".fmt(f)
    }
}

impl Error for LessonClosedError {}

/// A point-in-time view of a lesson.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LessonSnapshot {
    /// Current state.
    pub state: LessonState,
    /// Position in the timeline.
    pub cursor: usize,
    /// Length of the timeline.
    pub len: usize,
    /// The action under the cursor.
    pub current_action: Option<LessonAction>,
    /// Script nodes around the current action.
    pub context: Vec<ScriptNode>,
}

/// Handle to a running lesson.
///
/// Every method only queues a message; the lesson handles messages one at
/// a time in the order they were sent. The lesson halts narration and video
/// and shuts down once [`Lesson::shutdown`] is called or the last handle is
/// dropped.
#[derive(Clone)]
pub struct Lesson {
    mailbox: Arc<Mailbox>,
}

impl Lesson {
    #[inline]
    fn send(&self, msg: LessonMessage) -> Result<(), LessonClosedError> {
        self.mailbox.send(msg)
    }

    /// Replaces the script. The lesson goes back to [`LessonState::Idle`].
    #[inline]
    pub fn load(&self, script: Script) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::Load(script))
    }

    /// Starts the lesson at the given action index.
    #[inline]
    pub fn start(&self, start_index: usize) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::Start(start_index))
    }

    /// Reports that the avatar finished talking.
    #[inline]
    pub fn speech_ended(&self) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::SpeechEnded)
    }

    /// Reports that the video finished playing. The avatar connection is
    /// restored before anything else is narrated.
    #[inline]
    pub fn video_ended(&self) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::VideoEnded)
    }

    /// Forwards a raw avatar event. Events that end speech count as
    /// [`Lesson::speech_ended`]; the rest are ignored.
    ///
    /// A lesson action only ends once the narrator has accepted its
    /// utterance, so an end reported twice for one utterance advances the
    /// lesson once.
    pub fn avatar_event(&self, event: &Value) -> Result<(), LessonClosedError> {
        if AvatarEvent::from_json(event).ends_speech() {
            self.speech_ended()
        } else {
            Ok(())
        }
    }

    /// Stops the lesson to take a question.
    #[inline]
    pub fn interrupt(&self) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::Interrupt)
    }

    /// Pauses the lesson.
    #[inline]
    pub fn pause(&self) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::Pause)
    }

    /// Resumes after a pause or an answer, replaying the current action.
    #[inline]
    pub fn resume(&self) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::Resume)
    }

    /// Cuts the current action of a running lesson short. Ignored in any
    /// other state.
    #[inline]
    pub fn skip(&self) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::Skip)
    }

    /// Begins an answer, speaking `filler` first if given.
    #[inline]
    pub fn start_answering(
        &self,
        filler: Option<String>,
    ) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::StartAnswering(filler))
    }

    /// Narrates a chunk of the answer.
    #[inline]
    pub fn speak_answer(&self, chunk: String) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::SpeakAnswer(chunk))
    }

    /// Marks the end of the answer stream.
    #[inline]
    pub fn answer_stream_finished(&self) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::AnswerStreamFinished)
    }

    /// Ends the answer immediately.
    #[inline]
    pub fn answer_complete(&self) -> Result<(), LessonClosedError> {
        self.send(LessonMessage::AnswerComplete)
    }

    /// Returns a snapshot of the lesson.
    pub async fn snapshot(&self) -> Result<LessonSnapshot, LessonClosedError> {
        let (tx, rx) = oneshot::channel();
        self.send(LessonMessage::Snapshot(tx))?;
        rx.await.map_err(|_| LessonClosedError)
    }

    /// Shuts the lesson down. Messages already queued are discarded.
    #[inline]
    pub fn shutdown(&self) {
        self.mailbox.kill();
    }
}
