use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use crate::narration::{NarrationError, Narrator, VideoNotifier};
use crate::script::Script;
use crate::{LessonBuilder, LessonState};

/// Records every collaborator call as a line of text.
#[derive(Clone)]
struct Recorder(mpsc::UnboundedSender<String>);

impl Recorder {
    fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    fn record(&self, line: String) {
        self.0.send(line).ok();
    }
}

#[async_trait]
impl Narrator for Recorder {
    async fn speak(&self, text: &str) -> Result<(), NarrationError> {
        self.record(format!("speak {text}"));
        if text == "boom" {
            return Err(NarrationError::new("avatar offline"));
        }
        Ok(())
    }

    async fn stop_speaking(&self) -> Result<(), NarrationError> {
        self.record("stop".to_owned());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), NarrationError> {
        self.record("disconnect".to_owned());
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), NarrationError> {
        self.record("reconnect".to_owned());
        Ok(())
    }
}

impl VideoNotifier for Recorder {
    fn play_video(&self, path: &str) {
        self.record(format!("play {path}"));
    }

    fn stop_video(&self) {
        self.record("stop video".to_owned());
    }
}

async fn expect_calls(rx: &mut mpsc::UnboundedReceiver<String>, calls: &[&str]) {
    for call in calls {
        let got = timeout(Duration::from_millis(500), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, *call);
    }
}

fn sample_script() -> Script {
    Script::from_value(&json!([
        { "id": 1, "type": "speech", "content": "Welcome." },
        { "id": 2, "type": "video", "path": "cats.mp4", "outro": "Nice cats." },
        { "id": 3, "type": "speech", "content": "Goodbye." },
    ]))
}

#[tokio::test]
async fn test_lesson_runs_to_completion() {
    let (recorder, mut calls) = Recorder::new();
    let (done_tx, mut done_rx) = watch::channel(0);
    let lesson = LessonBuilder::new(recorder.clone(), recorder)
        .with_script(sample_script())
        .on_completed(move || {
            done_tx.send_modify(|count| *count += 1);
        })
        .build();

    lesson.start(0).unwrap();
    expect_calls(&mut calls, &["speak Welcome."]).await;
    lesson.speech_ended().unwrap();
    expect_calls(&mut calls, &["play cats.mp4", "disconnect"]).await;
    lesson.video_ended().unwrap();
    expect_calls(&mut calls, &["reconnect", "speak Nice cats."]).await;
    lesson
        .avatar_event(&json!({ "Type": "TalkingStopped" }))
        .unwrap();
    expect_calls(&mut calls, &["speak Goodbye."]).await;
    lesson
        .avatar_event(&json!({ "description": "SwitchToIdle" }))
        .unwrap();
    lesson.speech_ended().unwrap();

    timeout(Duration::from_millis(500), done_rx.wait_for(|count| *count > 0))
        .await
        .unwrap()
        .unwrap();
    let snapshot = lesson.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LessonState::Completed);
    assert_eq!(snapshot.cursor, snapshot.len);
    assert!(snapshot.current_action.is_none());
    assert!(snapshot.context.is_empty());
    assert_eq!(*done_rx.borrow(), 1);
}

#[tokio::test]
async fn test_interrupt_answer_and_resume() {
    let (recorder, mut calls) = Recorder::new();
    let (state_tx, state_rx) = watch::channel(LessonState::Idle);
    let lesson = LessonBuilder::new(recorder.clone(), recorder)
        .with_script(sample_script())
        .on_state_changed(move |state| {
            state_tx.send(state).ok();
        })
        .build();

    lesson.start(0).unwrap();
    expect_calls(&mut calls, &["speak Welcome."]).await;
    lesson.interrupt().unwrap();
    expect_calls(&mut calls, &["stop"]).await;
    // The avatar reports the cut-off utterance as ended.
    lesson.speech_ended().unwrap();

    let snapshot = lesson.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LessonState::WaitingForInput);
    assert_eq!(snapshot.cursor, 0);
    let context_ids: Vec<_> = snapshot.context.iter().map(|n| n.id()).collect();
    assert_eq!(context_ids, vec![1, 2, 3]);

    lesson.start_answering(Some("Let me think.".to_owned())).unwrap();
    lesson.speak_answer("Cats purr.".to_owned()).unwrap();
    lesson.answer_stream_finished().unwrap();
    expect_calls(&mut calls, &["speak Let me think.", "speak Cats purr."])
        .await;
    lesson.speech_ended().unwrap();
    lesson.speech_ended().unwrap();
    assert_eq!(
        lesson.snapshot().await.unwrap().state,
        LessonState::AnswerComplete
    );
    assert_eq!(*state_rx.borrow(), LessonState::AnswerComplete);

    lesson.resume().unwrap();
    expect_calls(&mut calls, &["speak Welcome."]).await;
    assert_eq!(lesson.snapshot().await.unwrap().state, LessonState::Running);
}

#[tokio::test]
async fn test_narration_failure_keeps_lesson_in_place() {
    let (recorder, mut calls) = Recorder::new();
    let lesson = LessonBuilder::new(recorder.clone(), recorder)
        .with_script(Script::from_value(&json!([
            { "id": 1, "type": "speech", "content": "boom" },
            { "id": 2, "type": "speech", "content": "After." },
        ])))
        .build();

    lesson.start(0).unwrap();
    expect_calls(&mut calls, &["speak boom"]).await;
    let snapshot = lesson.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LessonState::Running);
    assert_eq!(snapshot.cursor, 0);

    // A skip stops narration; the resulting end of speech moves on.
    lesson.skip().unwrap();
    expect_calls(&mut calls, &["stop"]).await;
    lesson.speech_ended().unwrap();
    expect_calls(&mut calls, &["speak After."]).await;
}

#[tokio::test]
async fn test_skip_video() {
    let (recorder, mut calls) = Recorder::new();
    let lesson = LessonBuilder::new(recorder.clone(), recorder)
        .with_script(sample_script())
        .build();

    lesson.start(0).unwrap();
    expect_calls(&mut calls, &["speak Welcome."]).await;
    lesson.speech_ended().unwrap();
    expect_calls(&mut calls, &["play cats.mp4", "disconnect"]).await;

    lesson.skip().unwrap();
    expect_calls(&mut calls, &["stop video", "stop"]).await;
    let snapshot = lesson.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LessonState::Running);
    assert_eq!(snapshot.cursor, 1);

    // The stopped player reports the end of the video.
    lesson.video_ended().unwrap();
    expect_calls(&mut calls, &["reconnect", "speak Nice cats."]).await;
    assert_eq!(lesson.snapshot().await.unwrap().cursor, 2);
}

#[tokio::test]
async fn test_repeated_end_signal_is_ignored() {
    let (recorder, mut calls) = Recorder::new();
    let lesson = LessonBuilder::new(recorder.clone(), recorder)
        .with_script(Script::from_value(&json!([
            { "id": 1, "type": "speech", "content": "One." },
            { "id": 2, "type": "speech", "content": "Two." },
            { "id": 3, "type": "speech", "content": "Three." },
        ])))
        .build();

    lesson.start(0).unwrap();
    expect_calls(&mut calls, &["speak One."]).await;
    // Some avatars report both the end of talking and the switch to idle.
    lesson
        .avatar_event(&json!({ "Type": "TalkingStopped" }))
        .unwrap();
    lesson
        .avatar_event(&json!({ "description": "SwitchToIdle" }))
        .unwrap();
    expect_calls(&mut calls, &["speak Two."]).await;
    assert_eq!(lesson.snapshot().await.unwrap().cursor, 1);

    lesson.speech_ended().unwrap();
    expect_calls(&mut calls, &["speak Three."]).await;
    assert_eq!(lesson.snapshot().await.unwrap().cursor, 2);
}

#[tokio::test]
async fn test_reload_resets_to_idle() {
    let (recorder, mut calls) = Recorder::new();
    let lesson = LessonBuilder::new(recorder.clone(), recorder)
        .with_script(sample_script())
        .build();
    lesson.start(0).unwrap();
    expect_calls(&mut calls, &["speak Welcome."]).await;

    lesson
        .load(Script::from_value(&json!({ "not": "a script" })))
        .unwrap();
    expect_calls(&mut calls, &["stop"]).await;
    let snapshot = lesson.snapshot().await.unwrap();
    assert_eq!(snapshot.state, LessonState::Idle);
    assert_eq!(snapshot.len, 0);

    lesson.start(0).unwrap();
    assert_eq!(
        lesson.snapshot().await.unwrap().state,
        LessonState::Completed
    );
}

#[tokio::test]
async fn test_dropping_last_handle_tears_down() {
    let (recorder, mut calls) = Recorder::new();
    let lesson = LessonBuilder::new(recorder.clone(), recorder)
        .with_script(sample_script())
        .build();
    lesson.start(0).unwrap();
    expect_calls(&mut calls, &["speak Welcome."]).await;

    drop(lesson);
    let mut rest = vec![];
    while let Ok(Some(call)) =
        timeout(Duration::from_millis(500), calls.recv()).await
    {
        rest.push(call);
    }
    assert_eq!(rest, vec!["stop video", "stop"]);
}

#[tokio::test]
async fn test_shutdown_closes_lesson() {
    let (recorder, _calls) = Recorder::new();
    let lesson = LessonBuilder::new(recorder.clone(), recorder).build();
    lesson.shutdown();
    let result = timeout(Duration::from_millis(500), async {
        loop {
            if lesson.start(0).is_err() {
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(result.is_ok());
    assert!(lesson.snapshot().await.is_err());
}
