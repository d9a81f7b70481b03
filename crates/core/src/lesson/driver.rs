use std::fmt::{self, Debug};
use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};

use super::machine::{Effect, LessonMachine};
use super::{LessonClosedError, LessonSnapshot};
use crate::context::context_slice;
use crate::narration::{NarrationError, NarrationQueue, VideoNotifier};
use crate::script::Script;

pub(crate) type StateChangedFn = Box<dyn Fn(super::LessonState) + Send + Sync>;
pub(crate) type CompletedFn = Box<dyn Fn() + Send + Sync>;

pub(crate) enum LessonMessage {
    Load(Script),
    Start(usize),
    SpeechStarted(String),
    SpeechEnded,
    VideoEnded,
    Interrupt,
    Pause,
    Resume,
    Skip,
    StartAnswering(Option<String>),
    SpeakAnswer(String),
    AnswerStreamFinished,
    AnswerComplete,
    NarrationFailed(NarrationError),
    Snapshot(oneshot::Sender<LessonSnapshot>),
}

impl Debug for LessonMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonMessage::Load(script) => f
                .debug_tuple("Load")
                .field(&script.nodes().len())
                .finish(),
            LessonMessage::Start(idx) => {
                f.debug_tuple("Start").field(idx).finish()
            }
            LessonMessage::SpeechStarted(text) => {
                f.debug_tuple("SpeechStarted").field(text).finish()
            }
            LessonMessage::SpeechEnded => f.write_str("SpeechEnded"),
            LessonMessage::VideoEnded => f.write_str("VideoEnded"),
            LessonMessage::Interrupt => f.write_str("Interrupt"),
            LessonMessage::Pause => f.write_str("Pause"),
            LessonMessage::Resume => f.write_str("Resume"),
            LessonMessage::Skip => f.write_str("Skip"),
            LessonMessage::StartAnswering(filler) => {
                f.debug_tuple("StartAnswering").field(filler).finish()
            }
            LessonMessage::SpeakAnswer(chunk) => {
                f.debug_tuple("SpeakAnswer").field(chunk).finish()
            }
            LessonMessage::AnswerStreamFinished => {
                f.write_str("AnswerStreamFinished")
            }
            LessonMessage::AnswerComplete => f.write_str("AnswerComplete"),
            LessonMessage::NarrationFailed(err) => {
                f.debug_tuple("NarrationFailed").field(err).finish()
            }
            LessonMessage::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}

pub(crate) struct MailboxParts {
    pub mailbox: Mailbox,
    pub msg_rx: mpsc::UnboundedReceiver<LessonMessage>,
    pub kill_rx: watch::Receiver<bool>,
}

pub(crate) struct Mailbox {
    msg_tx: mpsc::UnboundedSender<LessonMessage>,
    kill_tx: watch::Sender<bool>,
}

impl Mailbox {
    #[inline]
    pub fn new() -> MailboxParts {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        MailboxParts {
            mailbox: Mailbox { msg_tx, kill_tx },
            msg_rx,
            kill_rx,
        }
    }

    #[inline]
    pub fn send(&self, msg: LessonMessage) -> Result<(), LessonClosedError> {
        self.msg_tx.send(msg).map_err(|_| LessonClosedError)
    }

    #[inline]
    pub fn kill(&self) {
        self.kill_tx.send(true).ok();
    }
}

/// Sends messages to the lesson without keeping it alive.
pub(crate) fn weak_sender(
    mailbox: Weak<Mailbox>,
) -> impl Fn(LessonMessage) + Send + Sync + 'static {
    move |msg| {
        if let Some(mailbox) = mailbox.upgrade() {
            mailbox.send(msg).ok();
        }
    }
}

pub(crate) struct LessonDriver {
    pub machine: LessonMachine,
    pub script: Script,
    pub narration: NarrationQueue,
    pub video: Box<dyn VideoNotifier>,
    pub on_state_changed: Option<StateChangedFn>,
    pub on_completed: Option<CompletedFn>,
}

impl LessonDriver {
    fn handle(&mut self, msg: LessonMessage) {
        let before = self.machine.state();
        let effects = match msg {
            LessonMessage::Load(script) => {
                let effects = self.machine.load(script.flatten());
                self.script = script;
                effects
            }
            LessonMessage::Start(idx) => self.machine.start(idx),
            LessonMessage::SpeechStarted(text) => {
                self.machine.speech_started(&text)
            }
            LessonMessage::SpeechEnded => self.machine.speech_ended(),
            LessonMessage::VideoEnded => self.machine.video_ended(),
            LessonMessage::Interrupt => self.machine.interrupt(),
            LessonMessage::Pause => self.machine.pause(),
            LessonMessage::Resume => self.machine.resume(),
            LessonMessage::Skip => self.machine.skip(),
            LessonMessage::StartAnswering(filler) => {
                self.machine.start_answering(filler)
            }
            LessonMessage::SpeakAnswer(chunk) => {
                self.machine.speak_answer(chunk)
            }
            LessonMessage::AnswerStreamFinished => {
                self.machine.answer_stream_finished()
            }
            LessonMessage::AnswerComplete => self.machine.answer_complete(),
            LessonMessage::NarrationFailed(err) => {
                warn!("{err}, staying in {}", self.machine.state());
                self.machine.narration_failed()
            }
            LessonMessage::Snapshot(tx) => {
                tx.send(self.snapshot()).ok();
                vec![]
            }
        };
        self.apply(effects);

        let after = self.machine.state();
        if before != after {
            debug!("{before} -> {after}");
            if let Some(on_state_changed) = &self.on_state_changed {
                on_state_changed(after);
            }
        }
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            trace!("applying {effect:?}");
            match effect {
                Effect::Speak(text) => self.narration.speak(text),
                Effect::StopSpeaking => self.narration.stop(),
                Effect::PlayVideo(path) => self.video.play_video(&path),
                Effect::StopVideo => self.video.stop_video(),
                Effect::Disconnect => self.narration.disconnect(),
                Effect::Reconnect => self.narration.reconnect(),
                Effect::Completed => {
                    if let Some(on_completed) = &self.on_completed {
                        on_completed();
                    }
                }
            }
        }
    }

    fn snapshot(&self) -> LessonSnapshot {
        let current_action = self.machine.current_action();
        LessonSnapshot {
            state: self.machine.state(),
            cursor: self.machine.cursor(),
            len: self.machine.actions().len(),
            current_action: current_action.cloned(),
            context: context_slice(self.script.nodes(), current_action)
                .to_vec(),
        }
    }

    fn teardown(&mut self) {
        let effects = self.machine.teardown();
        self.apply(effects);
        self.script = Script::default();
    }
}

pub(crate) async fn run_lesson(
    mut driver: LessonDriver,
    mut msg_rx: mpsc::UnboundedReceiver<LessonMessage>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.changed() => {
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    debug!("last handle has been dropped");
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        let proc_span = trace_span!("proc msg");
        proc_span.in_scope(|| {
            driver.handle(msg);
            trace!("finished");
        });
    }
    driver.teardown();
    debug!("will terminate");
}
