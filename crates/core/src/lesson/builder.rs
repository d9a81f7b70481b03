use std::sync::Arc;

use tracing::Instrument;

use super::driver::{
    LessonDriver, LessonMessage, Mailbox, MailboxParts, run_lesson,
    weak_sender,
};
use super::{Lesson, LessonMachine, LessonState};
use crate::narration::{
    NarrationQueue, NarrationReport, Narrator, VideoNotifier,
};
use crate::script::Script;

/// [`Lesson`] builder.
pub struct LessonBuilder<N, V> {
    narrator: N,
    video: V,
    script: Script,
    on_state_changed: Option<Box<dyn Fn(LessonState) + Send + Sync>>,
    on_completed: Option<Box<dyn Fn() + Send + Sync>>,
}

impl<N: Narrator, V: VideoNotifier> LessonBuilder<N, V> {
    /// Creates a new builder with the collaborators the lesson drives.
    #[inline]
    pub fn new(narrator: N, video: V) -> Self {
        Self {
            narrator,
            video,
            script: Script::default(),
            on_state_changed: None,
            on_completed: None,
        }
    }

    /// Sets the initial script.
    #[inline]
    pub fn with_script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    /// Attaches a callback to be invoked on every state change.
    #[inline]
    pub fn on_state_changed(
        mut self,
        on_state_changed: impl Fn(LessonState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_changed = Some(Box::new(on_state_changed));
        self
    }

    /// Attaches a callback to be invoked when the last action finishes.
    #[inline]
    pub fn on_completed(
        mut self,
        on_completed: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_completed = Some(Box::new(on_completed));
        self
    }

    /// Spawns the lesson on the current tokio runtime.
    pub fn build(self) -> Lesson {
        let Self {
            narrator,
            video,
            script,
            on_state_changed,
            on_completed,
        } = self;

        let MailboxParts {
            mailbox,
            msg_rx,
            kill_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);

        let send_to_lesson = weak_sender(Arc::downgrade(&mailbox));
        let narration = NarrationQueue::spawn(narrator, move |report| {
            send_to_lesson(match report {
                NarrationReport::Accepted(text) => {
                    LessonMessage::SpeechStarted(text)
                }
                NarrationReport::Failed(err) => {
                    LessonMessage::NarrationFailed(err)
                }
            });
        });

        let driver = LessonDriver {
            machine: LessonMachine::new(script.flatten()),
            script,
            narration,
            video: Box::new(video),
            on_state_changed,
            on_completed,
        };
        tokio::spawn(
            run_lesson(driver, msg_rx, kill_rx)
                .instrument(debug_span!("lesson")),
        );
        Lesson { mailbox }
    }
}
