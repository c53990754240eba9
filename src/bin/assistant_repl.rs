//! Assistant REPL
//!
//! Terminal front end for the study assistant. Every route change drops the
//! chat session and mounts a fresh one over the same store file, the way the
//! dashboard remounts its widget on a new page.
//!
//! # Usage
//!
//! ```bash
//! # Chat (needs COMPLETION_API_KEY for free-text questions)
//! assistant_repl chat --store .assistant/state.json
//!
//! # Walk through a review subject
//! assistant_repl review indian-climate --mute
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use prep_assistant::review::{
    ElevenLabsSpeechClient, MemoryAudioOutput, NarrationDriver, PopupView, ReviewClasses,
};
use prep_assistant::{
    AssistantConfig, ChatSession, DurableState, FileStore, HistoryRouter, Message, MountReason,
    OpenAiCompletionClient, SessionDeps, TurnOutcome,
};

#[derive(Parser)]
#[command(name = "assistant_repl")]
#[command(version = "0.1.0")]
#[command(about = "Terminal front end for the exam-prep study assistant")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Durable store file shared across remounts
    #[arg(long, global = true, env = "ASSISTANT_STORE", default_value = ".assistant/state.json")]
    store: PathBuf,

    /// YAML config file (environment variables still override it)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Skip the pacing delays
    #[arg(long, global = true)]
    fast: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Persist a learning stage preference (upsc, school, college)
        #[arg(long)]
        stage: Option<String>,
    },

    /// Walk through a review subject's slides and quiz
    Review {
        /// Subject id, e.g. indian-climate
        subject: String,

        /// User the mute preference is stored for
        #[arg(long, default_value = "student")]
        user: String,

        /// Mute narration (persisted)
        #[arg(long)]
        mute: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match run(&cli).await {
        Ok(()) => return ExitCode::SUCCESS,
        Err(e) => e,
    };
    eprintln!("{}: {:#}", "error".red().bold(), result);
    ExitCode::FAILURE
}

async fn run(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => AssistantConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AssistantConfig::from_env(),
    };
    if cli.fast {
        config.pacing = prep_assistant::PacingConfig::immediate();
    }

    let store = FileStore::open(&cli.store)
        .with_context(|| format!("opening store {}", cli.store.display()))?;
    let state = DurableState::new(Arc::new(store)).with_default_stage(config.default_stage.clone());

    match &cli.command {
        Commands::Chat { stage } => {
            if let Some(stage) = stage {
                state.set_stage(stage)?;
            }
            cmd_chat(config, state).await
        }
        Commands::Review { subject, user, mute } => {
            cmd_review(config, state, subject, user, *mute).await
        }
    }
}

// =============================================================================
// CHAT
// =============================================================================

async fn cmd_chat(config: AssistantConfig, state: DurableState) -> Result<()> {
    let deps = SessionDeps {
        state,
        completion: Arc::new(OpenAiCompletionClient::new(config.completion.clone())?),
        router: Arc::new(HistoryRouter::student()),
        pacing: config.pacing.clone(),
    };

    let mut session = ChatSession::mount(deps.clone(), MountReason::NewSession)?;
    print_log(&session.messages()?);
    let outcome = session.resume().await?;
    print_outcome(&outcome);

    println!(
        "{}",
        "Type a message. /click N presses button N of the last message, /clear, /quit".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".cyan().bold());
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        let outcome = match line {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear()?;
                println!("{}", "Conversation cleared".dimmed());
                continue;
            }
            _ if line.starts_with("/click") => match click_target(&session, line) {
                Ok((id, action)) => session.click(id, &action).await,
                Err(e) => {
                    println!("{}", e.to_string().yellow());
                    continue;
                }
            },
            _ => session.send(line).await,
        };

        match outcome {
            Ok(TurnOutcome::Navigated { path }) => {
                println!("{} {}", "navigated to".green(), path.bold());
                drop(session);
                session = ChatSession::mount(deps.clone(), MountReason::AfterNavigation)?;
                let outcome = session.resume().await?;
                print_outcome(&outcome);
            }
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => println!("{}", e.chat_text().yellow()),
        }
    }

    session.unmount();
    Ok(())
}

/// Resolve `/click N` against the buttons of the last message
fn click_target(session: &ChatSession, line: &str) -> Result<(uuid::Uuid, String)> {
    let index: usize = line
        .trim_start_matches("/click")
        .trim()
        .parse()
        .map_err(|_| anyhow!("usage: /click N"))?;
    let messages = session.messages()?;
    let last = messages
        .iter()
        .rev()
        .find(|m| !m.buttons.is_empty())
        .ok_or_else(|| anyhow!("no buttons to click"))?;
    let button = index
        .checked_sub(1)
        .and_then(|i| last.buttons.get(i))
        .ok_or_else(|| anyhow!("no button {}", index))?;
    Ok((last.id, button.action.clone()))
}

fn print_message(message: &Message) {
    if message.is_user() {
        println!("{} {}", "you:".blue().bold(), message.text);
        return;
    }
    if message.is_error {
        println!("{} {}", "assistant:".red().bold(), message.text.red());
    } else {
        println!("{} {}", "assistant:".green().bold(), message.text);
    }
    for (i, button) in message.buttons.iter().enumerate() {
        println!("    [{}] {}", i + 1, button.label.cyan());
    }
}

fn print_log(messages: &[Message]) {
    for message in messages {
        print_message(message);
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Ignored => {}
        TurnOutcome::Replied(messages) => print_log(messages),
        TurnOutcome::ModalOpened(modal) => {
            println!(
                "{} {:?} (run `assistant_repl review <subject>`)",
                "opened".green(),
                modal
            );
        }
        TurnOutcome::Navigated { path } => println!("{} {}", "navigated to".green(), path),
        TurnOutcome::Failed(message) => print_message(message),
    }
}

// =============================================================================
// REVIEW
// =============================================================================

async fn cmd_review(
    config: AssistantConfig,
    state: DurableState,
    subject: &str,
    user: &str,
    mute: bool,
) -> Result<()> {
    let speech = Arc::new(ElevenLabsSpeechClient::new(config.speech.clone())?);
    let output = Arc::new(MemoryAudioOutput::new());
    let narration = NarrationDriver::new(speech, output, state, user)?;
    if mute {
        narration.set_muted(true)?;
    }
    let mut review = ReviewClasses::open(Arc::new(narration));

    let (mut view, _) = review.select_subject(subject).await.or_else(|e| {
        // A missing speech key should not block reading the slides
        if matches!(e, prep_assistant::AssistantError::Configuration(_)) {
            eprintln!("{}", e.chat_text().yellow());
            review.narration().stop()?;
            Ok((review.popup().view(), None))
        } else {
            Err(e)
        }
    })?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match view.clone() {
            PopupView::Slide {
                index,
                total,
                slide,
                ..
            } => {
                println!("{} ({}/{})", slide.title.bold(), index + 1, total);
                println!("  {}", slide.body);
                println!("{}", "[n]ext, [p]revious, [q]uit".dimmed());
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let step = match line.trim() {
                    "p" => review.previous_slide().await,
                    "q" => break,
                    _ => review.next_slide().await,
                };
                view = match step {
                    Ok((view, _)) => view,
                    Err(prep_assistant::AssistantError::Configuration(_)) => review.popup().view(),
                    Err(e) => return Err(e.into()),
                };
            }
            PopupView::Question {
                number,
                total,
                prompt,
                options,
                ..
            } => {
                println!("{} {}/{}: {}", "Q".bold(), number, total, prompt);
                for (i, option) in options.iter().enumerate() {
                    println!("    [{}] {}", i + 1, option);
                }
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let Some(choice) = line.trim().parse::<usize>().ok().and_then(|n| n.checked_sub(1))
                else {
                    println!("{}", "enter an option number".yellow());
                    continue;
                };
                match review.answer(choice) {
                    Ok(feedback) => {
                        if feedback.correct {
                            println!("{} {}", "Correct!".green().bold(), feedback.explanation);
                        } else {
                            println!(
                                "{} {} {}",
                                "Not quite:".red().bold(),
                                feedback.answer,
                                feedback.explanation
                            );
                        }
                        view = feedback.next;
                    }
                    Err(e) => println!("{}", e.to_string().yellow()),
                }
            }
            PopupView::Summary { correct, total, .. } => {
                println!("{} {}/{}", "Score:".bold(), correct, total);
                break;
            }
            PopupView::Subjects { .. } | PopupView::Closed => {
                bail!("review ended unexpectedly");
            }
        }
    }

    review.close()?;
    Ok(())
}
