//! The `quizdeck quiz` command: an interactive session on stdin.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use quizdeck_core::engine::SessionEngine;
use quizdeck_core::error::SessionError;
use quizdeck_core::model::{Phase, SessionConfig};
use quizdeck_core::session::Direction;
use quizdeck_core::store::CONFIG_KEY;
use quizdeck_core::timer::TokioTimer;
use quizdeck_core::traits::ExplanationProvider;
use quizdeck_providers::create_explainer;

use crate::context::AppContext;
use crate::display::{print_statistics, score_line};

#[derive(Args, Debug, Default)]
pub struct QuizArgs {
    /// Only ask questions of this subject
    #[arg(long)]
    subject: Option<String>,

    /// Number of questions
    #[arg(long, short = 'n')]
    count: Option<usize>,

    /// Shuffle question order
    #[arg(long)]
    shuffle: bool,

    /// Shuffle the options of each question
    #[arg(long)]
    shuffle_options: bool,

    /// Seconds per question; enables the countdown
    #[arg(long)]
    timer: Option<u32>,

    /// Allow changing an answer
    #[arg(long)]
    allow_change: bool,

    /// Seed for shuffling
    #[arg(long)]
    seed: Option<u64>,

    /// Continue the saved session
    #[arg(long, conflicts_with = "repeat")]
    resume: bool,

    /// Start with the settings of the previous session
    #[arg(long)]
    repeat: bool,

    /// Explainer to use for `explain` (defaults to `default_explainer`)
    #[arg(long)]
    explainer: Option<String>,
}

/// Apply command-line overrides to the configured defaults.
fn session_config(mut config: SessionConfig, args: &QuizArgs) -> SessionConfig {
    if let Some(subject) = &args.subject {
        config.subject = Some(subject.clone());
    }
    if let Some(count) = args.count {
        config.question_count = count;
    }
    config.shuffle_questions |= args.shuffle;
    config.shuffle_options |= args.shuffle_options;
    if let Some(secs) = args.timer {
        config.timer_enabled = true;
        config.time_per_question_secs = secs;
    }
    config.allow_answer_change |= args.allow_change;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Answer(String),
    Skip,
    Next,
    Previous,
    Goto(usize),
    Explain,
    Finish,
    Review,
    ExitReview,
    Score,
    Help,
    Quit,
    Show,
    Unknown(String),
}

/// Option keys of the current question win over command abbreviations.
fn parse_input(line: &str, option_keys: &[&str]) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Show;
    }
    if let Some(key) = option_keys.iter().find(|k| k.eq_ignore_ascii_case(line)) {
        return Input::Answer(key.to_string());
    }

    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default().to_ascii_lowercase();
    match command.as_str() {
        "n" | "next" => Input::Next,
        "p" | "prev" | "previous" => Input::Previous,
        "g" | "goto" => match words.next().and_then(|w| w.parse::<usize>().ok()) {
            Some(n) if n >= 1 => Input::Goto(n - 1),
            _ => Input::Unknown(line.to_string()),
        },
        "s" | "skip" => Input::Skip,
        "e" | "explain" => Input::Explain,
        "f" | "finish" => Input::Finish,
        "r" | "review" => Input::Review,
        "x" | "exit" => Input::ExitReview,
        "score" => Input::Score,
        "h" | "help" | "?" => Input::Help,
        "q" | "quit" => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Explainer {
    provider: Box<dyn ExplanationProvider>,
    timeout: Duration,
}

fn build_explainer(ctx: &AppContext, name: Option<&str>) -> Result<Option<Explainer>> {
    let timeout = Duration::from_secs(ctx.config.explain_timeout_secs.max(1));
    let explicit = name.is_some();

    let created = ctx
        .config
        .explainer(name)
        .and_then(|(name, config)| create_explainer(name, config));
    match created {
        Ok(provider) => Ok(Some(Explainer { provider, timeout })),
        Err(e) if explicit => Err(e),
        Err(e) => {
            tracing::debug!("no explainer available: {e:#}");
            Ok(None)
        }
    }
}

pub async fn execute(config_path: Option<PathBuf>, args: QuizArgs) -> Result<()> {
    let ctx = AppContext::load(config_path)?;
    let explainer = build_explainer(&ctx, args.explainer.as_deref())?;

    let (index, cache) = ctx.open_cache().await?;
    let (timer, mut fired) = TokioTimer::new();
    let mut engine = SessionEngine::new(index, Arc::clone(&cache), Arc::new(timer));

    if args.resume {
        match engine.resume().await {
            Ok(_) => println!("Resuming session {}.", engine.state().session_id),
            Err(SessionError::NoSnapshot) => {
                anyhow::bail!("no saved session to resume; start one with `quizdeck quiz`")
            }
            Err(e) => return Err(e).context("failed to resume session"),
        }
    } else {
        let base = if args.repeat {
            ctx.store
                .load::<SessionConfig>(CONFIG_KEY)?
                .map(|e| e.value)
                .context("no previous session settings to repeat")?
        } else {
            ctx.config.quiz.clone()
        };
        engine
            .start(session_config(base, &args))
            .await
            .context("failed to start session")?;
        println!(
            "Started a {}-question quiz. Type `help` for commands.",
            engine.state().question_ids.len()
        );
    }
    render(&engine);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = fired.recv() => {
                if engine.on_timer_fired(event).await? {
                    println!("\nTime is up.");
                    render(&engine);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                if let Flow::Quit = handle(&mut engine, &line, explainer.as_ref()).await {
                    break;
                }
            }
        }
    }

    cache.flush_writes().await;
    if engine.phase().is_running() {
        println!("Session saved. Continue with `quizdeck quiz --resume`.");
    }
    Ok(())
}

async fn handle(engine: &mut SessionEngine, line: &str, explainer: Option<&Explainer>) -> Flow {
    let keys: Vec<String> = engine
        .current_options()
        .iter()
        .map(|o| o.key.clone())
        .collect();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    // Answer keys only count while answers are accepted
    let keys: &[&str] = if engine.phase().accepts_answers() {
        &keys
    } else {
        &[]
    };

    let result = match parse_input(line, keys) {
        Input::Answer(key) => answer(engine, Some(&key)),
        Input::Skip => answer(engine, None),
        Input::Next => step(engine, Direction::Next).await,
        Input::Previous => step(engine, Direction::Previous).await,
        Input::Goto(i) => step(engine, Direction::Goto(i)).await,
        Input::Explain => {
            explain(engine, explainer).await;
            Ok(())
        }
        Input::Finish => engine.finish().map(|stats| {
            println!();
            print_statistics(&engine.score(), &stats);
            println!("Type `review` to go through your answers, or `quit` to leave.");
        }),
        Input::Review => engine.review().await.map(|()| render(engine)),
        Input::ExitReview => engine.exit_review().map(|()| {
            println!("Left review.");
            println!("{}", score_line(&engine.score()));
        }),
        Input::Score => {
            let (answered, total) = engine.state().progress();
            println!("{} ({answered}/{total} answered)", score_line(&engine.score()));
            Ok(())
        }
        Input::Help => {
            print_help();
            Ok(())
        }
        Input::Quit => return Flow::Quit,
        Input::Show => {
            render(engine);
            Ok(())
        }
        Input::Unknown(text) => {
            println!("Unknown command `{text}`. Type `help` for commands.");
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("{e}");
    }
    Flow::Continue
}

fn answer(engine: &mut SessionEngine, option: Option<&str>) -> Result<(), SessionError> {
    let record = engine.submit_answer(option)?;
    let message = match (record.is_correct, &record.selected_option) {
        (_, None) => "Skipped.".to_string(),
        (Some(true), _) => "Correct.".to_string(),
        (Some(false), _) => format!(
            "Incorrect. The answer is {}.",
            record.correct_option.as_deref().unwrap_or("?")
        ),
        (None, _) => "Recorded (practice question, not scored).".to_string(),
    };
    println!("{message}");

    if let Some(explanation) = engine.current_question().and_then(|q| q.explanation.as_ref()) {
        println!("  {explanation}");
    }
    if engine.state().is_last() {
        println!("That was the last question. Type `finish` for your score.");
    }
    Ok(())
}

async fn step(engine: &mut SessionEngine, direction: Direction) -> Result<(), SessionError> {
    if engine.advance(direction).await? {
        render(engine);
    } else {
        println!("No question there.");
    }
    Ok(())
}

async fn explain(engine: &SessionEngine, explainer: Option<&Explainer>) {
    let Some(explainer) = explainer else {
        println!("No explainer configured. Add an [explainers.<name>] table to quizdeck.toml.");
        return;
    };
    match engine
        .explain_current(explainer.provider.as_ref(), explainer.timeout)
        .await
    {
        Some(e) if e.success => {
            println!("{}", e.content);
            println!("(confidence {:.0}%)", e.confidence * 100.0);
        }
        Some(e) => println!(
            "Explanation unavailable: {}",
            e.error.as_deref().unwrap_or("unknown error")
        ),
        None => println!("No current question."),
    }
}

fn render(engine: &SessionEngine) {
    let Some(question) = engine.current_question() else {
        return;
    };
    let state = engine.state();
    let reviewing = state.phase == Phase::Review;

    println!(
        "\n[{}/{}] {}{}",
        state.current_index + 1,
        state.question_ids.len(),
        question.subject,
        if reviewing { " (review)" } else { "" }
    );
    println!("{}", question.stem);
    for option in engine.current_options() {
        println!("  {}) {}", option.key, option.text);
    }

    match engine.current_answer() {
        Some(record) => {
            let selected = record.selected_option.as_deref().unwrap_or("none");
            let verdict = match record.is_correct {
                Some(true) => "correct",
                Some(false) => "incorrect",
                None => "not scored",
            };
            println!("Your answer: {selected} ({verdict})");
        }
        None if reviewing => println!("Your answer: none"),
        None => {
            if engine.armed_timer().is_some() {
                println!("({}s to answer)", state.config.time_per_question_secs);
            }
        }
    }
    if reviewing {
        if let Some(answer) = &question.answer {
            println!("Correct answer: {answer}");
        }
        if let Some(explanation) = &question.explanation {
            println!("  {explanation}");
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <key>        answer with an option key (A, B, ...)");
    println!("  skip         skip this question");
    println!("  next / prev  move between questions");
    println!("  goto <n>     jump to question n");
    println!("  explain      ask the explainer about this question");
    println!("  score        show the running score");
    println!("  finish       end the session and show statistics");
    println!("  review       walk through a finished session");
    println!("  exit         leave review");
    println!("  quit         save and leave");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_keys_take_priority() {
        let keys = ["A", "B", "C", "D", "E", "F"];
        assert_eq!(parse_input("f", &keys), Input::Answer("F".into()));
        assert_eq!(parse_input(" b ", &keys), Input::Answer("B".into()));
        assert_eq!(parse_input("f", &["A", "B"]), Input::Finish);
        assert_eq!(parse_input("finish", &keys), Input::Finish);
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse_input("", &[]), Input::Show);
        assert_eq!(parse_input("next", &[]), Input::Next);
        assert_eq!(parse_input("P", &[]), Input::Previous);
        assert_eq!(parse_input("goto 3", &[]), Input::Goto(2));
        assert_eq!(parse_input("goto 0", &[]), Input::Unknown("goto 0".into()));
        assert_eq!(parse_input("skip", &[]), Input::Skip);
        assert_eq!(parse_input("quit", &[]), Input::Quit);
        assert_eq!(parse_input("dance", &[]), Input::Unknown("dance".into()));
    }

    #[test]
    fn overrides_apply_to_configured_defaults() {
        let base = SessionConfig {
            subject: Some("carbon".into()),
            question_count: 20,
            ..SessionConfig::default()
        };
        let args = QuizArgs {
            count: Some(5),
            timer: Some(30),
            shuffle: true,
            seed: Some(7),
            ..QuizArgs::default()
        };
        let config = session_config(base, &args);
        assert_eq!(config.subject.as_deref(), Some("carbon"));
        assert_eq!(config.question_count, 5);
        assert!(config.timer_enabled);
        assert_eq!(config.time_per_question_secs, 30);
        assert!(config.shuffle_questions);
        assert!(!config.shuffle_options);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn no_overrides_keep_config() {
        let base = SessionConfig {
            shuffle_options: true,
            ..SessionConfig::default()
        };
        let config = session_config(base.clone(), &QuizArgs::default());
        assert_eq!(config, base);
    }
}
