//! Stand-ins for the avatar and the video player that report to a channel.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use edura_core::narration::{NarrationError, Narrator, VideoNotifier};
use edura_core::{Lesson, LessonClosedError};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// What the console collaborators report.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassroomEvent {
    /// An utterance was accepted.
    Speaking(String),
    /// Narration was cut off.
    SpeechStopped,
    /// A raw event from the simulated avatar.
    Avatar(Value),
    /// The avatar connection was released.
    Disconnected,
    /// The avatar connection was restored.
    Reconnected,
    /// A video started playing.
    VideoStarted(String),
    /// The playing video reached its end.
    VideoEnded,
    /// The playing video was stopped.
    VideoStopped,
}

impl ClassroomEvent {
    /// Passes the event on to the lesson if it ends an utterance or a video.
    pub fn notify(&self, lesson: &Lesson) -> Result<(), LessonClosedError> {
        match self {
            ClassroomEvent::Avatar(event) => lesson.avatar_event(event),
            ClassroomEvent::VideoEnded | ClassroomEvent::VideoStopped => {
                lesson.video_ended()
            }
            _ => Ok(()),
        }
    }
}

/// A narrator that "speaks" for a time proportional to the word count.
///
/// Utterances queue up behind each other like they would on a real avatar.
/// When one is over, an `avatar_stop_talking` event is reported; forward it
/// to [`edura_core::Lesson::avatar_event`].
pub struct ConsoleNarrator {
    event_tx: mpsc::UnboundedSender<ClassroomEvent>,
    per_word: Duration,
    speech: Mutex<SpeechTimers>,
}

#[derive(Default)]
struct SpeechTimers {
    busy_until: Option<Instant>,
    pending: Vec<JoinHandle<()>>,
}

impl ConsoleNarrator {
    /// Creates a narrator that speaks each word for `per_word`.
    #[inline]
    pub fn new(
        event_tx: mpsc::UnboundedSender<ClassroomEvent>,
        per_word: Duration,
    ) -> Self {
        Self {
            event_tx,
            per_word,
            speech: Mutex::default(),
        }
    }

    fn report(&self, event: ClassroomEvent) -> Result<(), NarrationError> {
        self.event_tx
            .send(event)
            .map_err(|_| NarrationError::new("the classroom has closed"))
    }
}

#[async_trait]
impl Narrator for ConsoleNarrator {
    async fn speak(&self, text: &str) -> Result<(), NarrationError> {
        self.report(ClassroomEvent::Speaking(text.to_owned()))?;

        let words = text.split_whitespace().count().max(1) as u32;
        let mut speech = self
            .speech
            .lock()
            .map_err(|_| NarrationError::new("speech timers poisoned"))?;
        let now = Instant::now();
        let start = speech.busy_until.filter(|at| *at > now).unwrap_or(now);
        let end = start + self.per_word * words;
        speech.busy_until = Some(end);
        speech.pending.retain(|timer| !timer.is_finished());

        let event_tx = self.event_tx.clone();
        speech.pending.push(tokio::spawn(async move {
            sleep_until(end).await;
            event_tx
                .send(ClassroomEvent::Avatar(stop_talking_event()))
                .ok();
        }));
        Ok(())
    }

    async fn stop_speaking(&self) -> Result<(), NarrationError> {
        let was_speaking = {
            let mut speech = self
                .speech
                .lock()
                .map_err(|_| NarrationError::new("speech timers poisoned"))?;
            for timer in speech.pending.drain(..) {
                timer.abort();
            }
            speech
                .busy_until
                .take()
                .is_some_and(|at| at > Instant::now())
        };
        self.report(ClassroomEvent::SpeechStopped)?;
        // A cut-off utterance still ends, once.
        if was_speaking {
            self.report(ClassroomEvent::Avatar(stop_talking_event()))?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), NarrationError> {
        self.report(ClassroomEvent::Disconnected)
    }

    async fn reconnect(&self) -> Result<(), NarrationError> {
        self.report(ClassroomEvent::Reconnected)
    }
}

#[inline]
fn stop_talking_event() -> Value {
    json!({ "eventName": "avatar_stop_talking" })
}

/// A video player that plays every video for a fixed duration.
///
/// Stopping a playing video reports [`ClassroomEvent::VideoStopped`],
/// which ends the video for the lesson just like reaching its end.
pub struct ConsoleVideo {
    event_tx: mpsc::UnboundedSender<ClassroomEvent>,
    duration: Duration,
    playing: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleVideo {
    /// Creates a player whose videos last `duration`.
    #[inline]
    pub fn new(
        event_tx: mpsc::UnboundedSender<ClassroomEvent>,
        duration: Duration,
    ) -> Self {
        Self {
            event_tx,
            duration,
            playing: Mutex::default(),
        }
    }
}

impl VideoNotifier for ConsoleVideo {
    fn play_video(&self, path: &str) {
        self.event_tx
            .send(ClassroomEvent::VideoStarted(path.to_owned()))
            .ok();
        let event_tx = self.event_tx.clone();
        let duration = self.duration;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            event_tx.send(ClassroomEvent::VideoEnded).ok();
        });
        let Ok(mut playing) = self.playing.lock() else {
            warn!("video timer poisoned");
            return;
        };
        if let Some(previous) = playing.replace(timer) {
            previous.abort();
        }
    }

    fn stop_video(&self) {
        let timer = match self.playing.lock() {
            Ok(mut playing) => playing.take(),
            Err(_) => None,
        };
        // Stopping nothing is not worth reporting.
        if let Some(timer) = timer {
            if !timer.is_finished() {
                timer.abort();
                self.event_tx.send(ClassroomEvent::VideoStopped).ok();
            }
        }
    }
}
