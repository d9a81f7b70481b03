//! A terminal classroom that teaches one topic.
//!
//! Usage: `edura <topic.json>`

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use edura::core::script::Topic;
use edura::core::{
    Answer, Lesson, LessonBuilder, LessonState, TurnError, TutorBuilder,
};
use edura::{ClassroomEvent, ConsoleNarrator, ConsoleVideo};
use edura_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const PER_WORD: Duration = Duration::from_millis(250);
const VIDEO_LENGTH: Duration = Duration::from_secs(5);

enum LessonEvent {
    StateChanged(LessonState),
    Completed,
}

enum Command {
    Ask(String),
    Interrupt,
    Pause,
    Resume,
    Skip,
    Clear,
    Status,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let (word, rest) = line
            .trim()
            .split_once(' ')
            .unwrap_or((line.trim(), ""));
        let rest = rest.trim();
        Some(match word {
            "ask" if !rest.is_empty() => Command::Ask(rest.to_owned()),
            "interrupt" => Command::Interrupt,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "skip" => Command::Skip,
            "clear" => Command::Clear,
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            _ => return None,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(topic_path) = env::args().nth(1) else {
        eprintln!("usage: edura <topic.json>");
        return;
    };
    let topic: Topic = match tokio::fs::read_to_string(&topic_path).await {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(topic) => topic,
            Err(err) => {
                eprintln!("{topic_path} is not a topic: {err}");
                return;
            }
        },
        Err(err) => {
            eprintln!("cannot read {topic_path}: {err}");
            return;
        }
    };

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };
    let mut config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        config = config.with_model(model);
    }
    if let (Ok(endpoint), Ok(deployment)) = (
        env::var("AZURE_OPENAI_ENDPOINT"),
        env::var("AZURE_OPENAI_DEPLOYMENT"),
    ) {
        config = config.with_azure_deployment(endpoint, deployment);
    }
    let search = (
        env::var("AZURE_SEARCH_ENDPOINT"),
        env::var("AZURE_SEARCH_KEY"),
        env::var("AZURE_SEARCH_INDEX"),
    );
    let use_search = if let (Ok(endpoint), Ok(key), Ok(index)) = search {
        config = config.with_search_index(endpoint, key, index);
        true
    } else {
        false
    };
    let config = config.build();
    debug!("provider config: {config:?}");
    let provider = OpenAIProvider::new(config);

    let (classroom_tx, mut classroom_rx) = mpsc::unbounded_channel();
    let (lesson_tx, mut lesson_rx) = mpsc::unbounded_channel();
    let lesson = LessonBuilder::new(
        ConsoleNarrator::new(classroom_tx.clone(), PER_WORD),
        ConsoleVideo::new(classroom_tx, VIDEO_LENGTH),
    )
    .with_script(topic.script)
    .on_state_changed({
        let lesson_tx = lesson_tx.clone();
        move |state| {
            lesson_tx.send(LessonEvent::StateChanged(state)).ok();
        }
    })
    .on_completed(move || {
        lesson_tx.send(LessonEvent::Completed).ok();
    })
    .build();

    let tutor = TutorBuilder::new(provider, lesson.clone())
        .with_search(use_search)
        .on_example(|example| {
            if example.complete {
                debug!("example ready: {}", example.text);
            }
        })
        .build();
    let (question_tx, mut answer_rx) = spawn_tutor(tutor);
    let mut line_rx = spawn_stdin_reader();

    println!(
        "{}📚 {}",
        BAR_CHAR.bright_cyan(),
        topic.title.bright_white().bold()
    );
    println!(
        "commands: ask <question>, interrupt, pause, resume, skip, clear, status, quit"
    );
    if lesson.start(0).is_err() {
        return;
    }

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut progress_bar: Option<ProgressBar> = None;
    let mut thinking = false;

    loop {
        if thinking {
            progress_bar
                .get_or_insert_with(|| {
                    let progress_bar = ProgressBar::new_spinner();
                    progress_bar.set_style(progress_style.clone());
                    progress_bar.set_message("🤔 Thinking...");
                    progress_bar
                })
                .inc(1);
        }

        select! {
            line = line_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(command) = Command::parse(&line) else {
                    println!("{}", "unknown command".bright_red());
                    continue;
                };
                match command {
                    Command::Ask(question) => {
                        thinking = true;
                        question_tx.send(TutorRequest::Ask(question)).ok();
                    }
                    Command::Clear => {
                        question_tx.send(TutorRequest::Clear).ok();
                    }
                    Command::Interrupt => { lesson.interrupt().ok(); }
                    Command::Pause => { lesson.pause().ok(); }
                    Command::Resume => { lesson.resume().ok(); }
                    Command::Skip => { lesson.skip().ok(); }
                    Command::Status => print_status(&lesson).await,
                    Command::Quit => break,
                }
            }
            event = classroom_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                finish_progress(&mut progress_bar);
                handle_classroom_event(&lesson, event);
            }
            event = lesson_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    LessonEvent::StateChanged(state) => {
                        debug!("lesson state: {state}");
                    }
                    LessonEvent::Completed => {
                        finish_progress(&mut progress_bar);
                        println!(
                            "{}🎓 {}",
                            BAR_CHAR.bright_green(),
                            "The lesson is over. Ask anything, or quit.".bright_white()
                        );
                    }
                }
            }
            answer = answer_rx.recv() => {
                let Some(answer) = answer else {
                    break;
                };
                thinking = false;
                finish_progress(&mut progress_bar);
                print_answer(answer);
            }
            _ = sleep(Duration::from_millis(100)) => {}
        }
        std::io::stdout().flush().ok();
    }

    finish_progress(&mut progress_bar);
    lesson.shutdown();
}

enum TutorRequest {
    Ask(String),
    Clear,
}

fn spawn_tutor(
    mut tutor: edura::core::Tutor,
) -> (
    mpsc::UnboundedSender<TutorRequest>,
    mpsc::UnboundedReceiver<Result<Answer, TurnError>>,
) {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let (answer_tx, answer_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(request) = request_rx.recv().await {
            match request {
                TutorRequest::Ask(question) => {
                    let answer = tutor.ask(&question).await;
                    if answer_tx.send(answer).is_err() {
                        break;
                    }
                }
                TutorRequest::Clear => tutor.clear(),
            }
        }
    });
    (request_tx, answer_rx)
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = io::BufReader::new(io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    error!("error reading input: {}", err);
                    break;
                }
            }
        }
    });
    line_rx
}

fn handle_classroom_event(lesson: &Lesson, event: ClassroomEvent) {
    if event.notify(lesson).is_err() {
        debug!("lesson closed, dropping {event:?}");
        return;
    }
    match event {
        ClassroomEvent::Speaking(text) => {
            println!("{}🧑‍🏫 {}", BAR_CHAR.bright_cyan(), text.bright_white());
        }
        ClassroomEvent::Avatar(_) => {}
        ClassroomEvent::VideoStarted(path) => {
            println!("{}🎬 playing {}", BAR_CHAR.bright_magenta(), path.bold());
        }
        ClassroomEvent::VideoEnded => {
            println!("{}🎬 video finished", BAR_CHAR.bright_magenta());
        }
        ClassroomEvent::VideoStopped => {
            println!("{}🎬 video stopped", BAR_CHAR.bright_magenta());
        }
        ClassroomEvent::SpeechStopped
        | ClassroomEvent::Disconnected
        | ClassroomEvent::Reconnected => {
            trace!("classroom event: {event:?}");
        }
    }
}

fn print_answer(answer: Result<Answer, TurnError>) {
    match answer {
        Ok(answer) => {
            if let Some(example) = &answer.example {
                println!(
                    "{}✏️  {}",
                    BAR_CHAR.bright_yellow(),
                    example.text.bright_white()
                );
            }
            println!(
                "{}",
                "Type `resume` to continue the lesson.".dimmed()
            );
        }
        Err(err) => {
            println!("{}❌ {}", BAR_CHAR.bright_red(), err.bright_red());
        }
    }
}

async fn print_status(lesson: &Lesson) {
    let Ok(snapshot) = lesson.snapshot().await else {
        println!("{}", "the lesson has shut down".bright_red());
        return;
    };
    println!(
        "{}state {} · action {}/{}",
        BAR_CHAR.bright_blue(),
        snapshot.state.bold(),
        snapshot.cursor.min(snapshot.len),
        snapshot.len
    );
}

#[inline]
fn finish_progress(progress_bar: &mut Option<ProgressBar>) {
    if let Some(progress_bar) = progress_bar.take() {
        progress_bar.finish_and_clear();
    }
}
