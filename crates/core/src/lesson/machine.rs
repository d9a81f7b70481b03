use std::fmt::{self, Display};

use crate::script::{ActionKind, LessonAction};

/// Lifecycle state of a lesson.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LessonState {
    /// Loaded but not started.
    #[default]
    Idle,
    /// Playing the timeline.
    Running,
    /// Interrupted, waiting for the learner's question.
    WaitingForInput,
    /// Narrating an answer.
    Answering,
    /// The answer is over, the lesson can be resumed.
    AnswerComplete,
    /// Paused by the learner.
    Paused,
    /// Every action has been played.
    Completed,
}

impl Display for LessonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LessonState::Idle => "IDLE",
            LessonState::Running => "RUNNING",
            LessonState::WaitingForInput => "WAITING_FOR_INPUT",
            LessonState::Answering => "ANSWERING",
            LessonState::AnswerComplete => "ANSWER_COMPLETE",
            LessonState::Paused => "PAUSED",
            LessonState::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

/// A side effect requested by the [`LessonMachine`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Narrate the text.
    Speak(String),
    /// Cut off the current narration.
    StopSpeaking,
    /// Start the video at the path.
    PlayVideo(String),
    /// Stop the playing video.
    StopVideo,
    /// Release the avatar connection for a video.
    Disconnect,
    /// Restore the avatar connection after a video.
    Reconnect,
    /// The last action finished.
    Completed,
}

/// The lesson sequencer.
///
/// The machine owns the timeline and the cursor into it. It never talks to
/// a collaborator itself: every event returns the effects the caller has to
/// carry out, in order.
#[derive(Debug, Default)]
pub struct LessonMachine {
    actions: Vec<LessonAction>,
    cursor: usize,
    state: LessonState,
    last_dispatched: Option<usize>,
    // The dispatched utterance has not been accepted by the narrator yet.
    awaiting_speech: bool,
    answer: AnswerProgress,
}

#[derive(Debug, Default)]
struct AnswerProgress {
    outstanding: usize,
    stream_done: bool,
}

impl LessonMachine {
    /// Creates a machine with the given timeline.
    #[inline]
    pub fn new(actions: Vec<LessonAction>) -> Self {
        Self {
            actions,
            ..Default::default()
        }
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> LessonState {
        self.state
    }

    /// Returns the cursor into the timeline.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the timeline.
    #[inline]
    pub fn actions(&self) -> &[LessonAction] {
        &self.actions
    }

    /// Returns the action under the cursor, if any.
    #[inline]
    pub fn current_action(&self) -> Option<&LessonAction> {
        self.actions.get(self.cursor)
    }

    /// Replaces the timeline and goes back to `Idle`.
    pub fn load(&mut self, actions: Vec<LessonAction>) -> Vec<Effect> {
        let effects = match self.state {
            LessonState::Idle | LessonState::Completed => vec![],
            _ => self.halt_current(),
        };
        *self = Self::new(actions);
        effects
    }

    /// Starts the lesson at `start_index`, clamped to the timeline.
    ///
    /// Only an idle lesson can be started.
    pub fn start(&mut self, start_index: usize) -> Vec<Effect> {
        if self.state != LessonState::Idle {
            debug!("ignoring start in {}", self.state);
            return vec![];
        }
        self.cursor = start_index.min(self.actions.len());
        self.state = LessonState::Running;
        self.last_dispatched = None;
        self.execute()
    }

    /// The narrator accepted an utterance.
    ///
    /// An end of speech only counts for a lesson action once its own
    /// utterance was accepted, so a repeated end signal for the previous
    /// utterance cannot skip the action that follows it.
    pub fn speech_started(&mut self, text: &str) -> Vec<Effect> {
        if self.state == LessonState::Running
            && self
                .current_action()
                .is_some_and(|action| {
                    action.kind == ActionKind::Speak && action.payload == text
                })
        {
            self.awaiting_speech = false;
        }
        vec![]
    }

    /// The narrator finished an utterance.
    pub fn speech_ended(&mut self) -> Vec<Effect> {
        match self.state {
            LessonState::Running => {
                if self.current_kind() != Some(ActionKind::Speak) {
                    return vec![];
                }
                if self.awaiting_speech {
                    trace!("ignoring end of speech before the action spoke");
                    return vec![];
                }
                self.advance()
            }
            LessonState::Answering => {
                self.answer.outstanding =
                    self.answer.outstanding.saturating_sub(1);
                self.settle_answer()
            }
            _ => vec![],
        }
    }

    /// The video finished playing.
    pub fn video_ended(&mut self) -> Vec<Effect> {
        if self.state != LessonState::Running
            || self.current_kind() != Some(ActionKind::Video)
        {
            return vec![];
        }
        let mut effects = vec![Effect::Reconnect];
        effects.extend(self.advance());
        effects
    }

    /// The learner wants to ask something.
    pub fn interrupt(&mut self) -> Vec<Effect> {
        match self.state {
            LessonState::Running => {
                self.state = LessonState::WaitingForInput;
                self.halt_current()
            }
            LessonState::Answering | LessonState::AnswerComplete => {
                self.state = LessonState::WaitingForInput;
                self.answer = AnswerProgress::default();
                vec![Effect::StopSpeaking]
            }
            _ => vec![],
        }
    }

    /// Pauses a running lesson. The cursor stays where it is.
    pub fn pause(&mut self) -> Vec<Effect> {
        if self.state != LessonState::Running {
            return vec![];
        }
        self.state = LessonState::Paused;
        self.halt_current()
    }

    /// Resumes a paused lesson, or the lesson after an answer.
    ///
    /// Narration cannot continue mid-utterance, so the action under the
    /// cursor is played again from its beginning.
    pub fn resume(&mut self) -> Vec<Effect> {
        match self.state {
            LessonState::Paused | LessonState::AnswerComplete => {
                self.state = LessonState::Running;
                self.last_dispatched = None;
                self.answer = AnswerProgress::default();
                self.execute()
            }
            _ => vec![],
        }
    }

    /// Cuts the current action of a running lesson short. The state does
    /// not change; the resulting "ended" notification moves the lesson on.
    ///
    /// An utterance the narrator has not accepted yet is dropped by the
    /// stop and will never end, so the lesson moves on right away.
    pub fn skip(&mut self) -> Vec<Effect> {
        if self.state != LessonState::Running {
            trace!("ignoring skip in {}", self.state);
            return vec![];
        }
        let mut effects = vec![Effect::StopSpeaking];
        match self.current_kind() {
            Some(ActionKind::Video) => effects.push(Effect::StopVideo),
            Some(ActionKind::Speak) if self.awaiting_speech => {
                effects.extend(self.advance());
            }
            _ => {}
        }
        effects
    }

    /// The answer to the learner's question begins. `filler` is spoken
    /// right away while the model is thinking.
    pub fn start_answering(&mut self, filler: Option<String>) -> Vec<Effect> {
        if self.state != LessonState::WaitingForInput {
            debug!("ignoring start of answer in {}", self.state);
            return vec![];
        }
        self.state = LessonState::Answering;
        self.answer = AnswerProgress::default();
        match filler {
            Some(filler) => {
                self.answer.outstanding = 1;
                vec![Effect::Speak(filler)]
            }
            None => vec![],
        }
    }

    /// Narrates one chunk of the answer.
    pub fn speak_answer(&mut self, chunk: String) -> Vec<Effect> {
        if self.state != LessonState::Answering {
            trace!("dropping answer chunk in {}", self.state);
            return vec![];
        }
        self.answer.outstanding += 1;
        vec![Effect::Speak(chunk)]
    }

    /// No more answer chunks will come.
    pub fn answer_stream_finished(&mut self) -> Vec<Effect> {
        if self.state != LessonState::Answering {
            return vec![];
        }
        self.answer.stream_done = true;
        self.settle_answer()
    }

    /// Declares the answer over, whatever is still being narrated.
    pub fn answer_complete(&mut self) -> Vec<Effect> {
        if self.state == LessonState::Answering {
            self.state = LessonState::AnswerComplete;
            self.answer = AnswerProgress::default();
        }
        vec![]
    }

    /// The narrator rejected an utterance.
    ///
    /// A lesson action stays current and waits for an external signal or a
    /// skip. An answer utterance counts as done.
    pub fn narration_failed(&mut self) -> Vec<Effect> {
        match self.state {
            LessonState::Running => {
                // Let the end signal of a corrective skip through.
                self.awaiting_speech = false;
                vec![]
            }
            LessonState::Answering => {
                self.answer.outstanding =
                    self.answer.outstanding.saturating_sub(1);
                self.settle_answer()
            }
            _ => vec![],
        }
    }

    /// Halts everything and releases the timeline.
    pub fn teardown(&mut self) -> Vec<Effect> {
        *self = Self::default();
        vec![Effect::StopSpeaking, Effect::StopVideo]
    }

    #[inline]
    fn current_kind(&self) -> Option<ActionKind> {
        self.current_action().map(|action| action.kind)
    }

    fn advance(&mut self) -> Vec<Effect> {
        self.cursor = (self.cursor + 1).min(self.actions.len());
        self.execute()
    }

    fn execute(&mut self) -> Vec<Effect> {
        let Some(action) = self.actions.get(self.cursor) else {
            if self.state == LessonState::Completed {
                return vec![];
            }
            debug!("reached the end of the timeline");
            self.state = LessonState::Completed;
            return vec![Effect::Completed];
        };
        if self.last_dispatched == Some(self.cursor) {
            trace!("action {} already dispatched", action.id);
            return vec![];
        }
        self.last_dispatched = Some(self.cursor);
        self.awaiting_speech = action.kind == ActionKind::Speak;
        debug!("executing action {}", action.id);
        match action.kind {
            ActionKind::Speak => vec![Effect::Speak(action.payload.clone())],
            ActionKind::Video => vec![
                Effect::PlayVideo(action.payload.clone()),
                Effect::Disconnect,
            ],
        }
    }

    fn halt_current(&self) -> Vec<Effect> {
        let mut effects = vec![Effect::StopSpeaking];
        if self.current_kind() == Some(ActionKind::Video) {
            effects.push(Effect::StopVideo);
            effects.push(Effect::Reconnect);
        }
        effects
    }

    fn settle_answer(&mut self) -> Vec<Effect> {
        if self.answer.stream_done && self.answer.outstanding == 0 {
            debug!("answer fully narrated");
            self.state = LessonState::AnswerComplete;
            self.answer = AnswerProgress::default();
        }
        vec![]
    }
}
