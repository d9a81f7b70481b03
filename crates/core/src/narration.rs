//! Narration and video collaborators, and the worker that drives narration.

use std::error::Error;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Error raised by a [`Narrator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NarrationError {
    message: String,
}

impl NarrationError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for NarrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "narration failed: {}", self.message)
    }
}

impl Error for NarrationError {}

/// The speech side of the avatar.
///
/// A successful `speak` only means the utterance was accepted. The end of
/// the utterance is reported later, out of band, by whoever owns the avatar
/// event stream.
#[async_trait]
pub trait Narrator: Send + Sync + 'static {
    /// Starts narrating `text`.
    async fn speak(&self, text: &str) -> Result<(), NarrationError>;

    /// Cuts off the current utterance.
    async fn stop_speaking(&self) -> Result<(), NarrationError>;

    /// Releases the avatar connection while a video plays.
    async fn disconnect(&self) -> Result<(), NarrationError> {
        Ok(())
    }

    /// Restores the avatar connection after a video.
    async fn reconnect(&self) -> Result<(), NarrationError> {
        Ok(())
    }
}

/// The video surface. Calls are fire-and-forget; the end of playback is
/// reported back to the lesson separately.
pub trait VideoNotifier: Send + Sync + 'static {
    /// Starts playing the video at `path`.
    fn play_video(&self, path: &str);

    /// Stops the playing video, if any.
    fn stop_video(&self) {}
}

impl<F: Fn(&str) + Send + Sync + 'static> VideoNotifier for F {
    #[inline]
    fn play_video(&self, path: &str) {
        self(path)
    }
}

#[derive(Debug)]
enum Command {
    Speak(String),
    Stop,
    Disconnect,
    Reconnect,
}

/// What the worker tells its owner about a speak command.
#[derive(Debug)]
pub(crate) enum NarrationReport {
    /// The narrator accepted the text.
    Accepted(String),
    /// The narrator rejected the text.
    Failed(NarrationError),
}

type ReportFn = Box<dyn Fn(NarrationReport) + Send + Sync>;

/// A sequential queue in front of a [`Narrator`].
///
/// Commands run one at a time in the order they were pushed, except that a
/// stop discards every speak pushed before it that has not started yet.
/// The worker exits once the queue is dropped and the remaining commands
/// are done.
pub(crate) struct NarrationQueue {
    cmd_tx: mpsc::UnboundedSender<(u64, Command)>,
    generation: Arc<AtomicU64>,
}

impl NarrationQueue {
    /// Spawns the worker. `on_report` is called from the worker with the
    /// outcome of every speak that was not discarded.
    pub fn spawn<N: Narrator>(
        narrator: N,
        on_report: impl Fn(NarrationReport) + Send + Sync + 'static,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let generation = Arc::new(AtomicU64::new(0));
        tokio::spawn(
            run_worker(
                narrator,
                cmd_rx,
                Arc::clone(&generation),
                Box::new(on_report),
            )
            .instrument(debug_span!("narration")),
        );
        Self { cmd_tx, generation }
    }

    #[inline]
    pub fn speak(&self, text: String) {
        self.push(Command::Speak(text));
    }

    #[inline]
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.push(Command::Stop);
    }

    #[inline]
    pub fn disconnect(&self) {
        self.push(Command::Disconnect);
    }

    #[inline]
    pub fn reconnect(&self) {
        self.push(Command::Reconnect);
    }

    fn push(&self, cmd: Command) {
        let generation = self.generation.load(Ordering::SeqCst);
        if self.cmd_tx.send((generation, cmd)).is_err() {
            warn!("narration worker is gone, dropping command");
        }
    }
}

async fn run_worker<N: Narrator>(
    narrator: N,
    mut cmd_rx: mpsc::UnboundedReceiver<(u64, Command)>,
    generation: Arc<AtomicU64>,
    on_report: ReportFn,
) {
    debug!("started");
    while let Some((cmd_generation, cmd)) = cmd_rx.recv().await {
        trace!("running {cmd:?}");
        match cmd {
            Command::Speak(text) => {
                if cmd_generation < generation.load(Ordering::SeqCst) {
                    trace!("speak superseded by a later stop");
                    continue;
                }
                match narrator.speak(&text).await {
                    Ok(()) => on_report(NarrationReport::Accepted(text)),
                    Err(err) => {
                        warn!("{err}");
                        on_report(NarrationReport::Failed(err));
                    }
                }
            }
            Command::Stop => {
                if let Err(err) = narrator.stop_speaking().await {
                    warn!("cannot stop speaking: {err}");
                }
            }
            Command::Disconnect => {
                if let Err(err) = narrator.disconnect().await {
                    warn!("cannot disconnect: {err}");
                }
            }
            Command::Reconnect => {
                if let Err(err) = narrator.reconnect().await {
                    warn!("cannot reconnect: {err}");
                }
            }
        }
    }
    debug!("will terminate");
}
