use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

mod config;
mod errors;
mod flow;
mod gateway;
mod models;
mod resolvers;
mod store;

use errors::{FlowError, ResolverError};
use flow::{AnswerSource, CompletionState, FlowCoordinator, SideEffectOutbox};
use gateway::{FlowEvent, FlowEventBroadcaster};
use models::{AssistantConfig, QuestionCategory};
use resolvers::http::{HttpLocationService, HttpWeatherService};
use resolvers::{
    LocationCapability, LoggingWeather, SpeechCapability, SuggestionResolver, UnavailableLocation,
    WeatherCapability,
};
use store::{FileStorage, MemoryStorage, NotesStore, Storage};

/// Terminal "voice": prints what a TTS engine would speak.
struct TerminalSpeech;

#[async_trait]
impl SpeechCapability for TerminalSpeech {
    async fn speak(&self, text: &str) -> Result<(), ResolverError> {
        println!("{}", text);
        Ok(())
    }
}

fn build_storage() -> Arc<dyn Storage> {
    if config::is_ephemeral() {
        log::info!("[MAIN] ephemeral mode, notes will not be persisted");
        Arc::new(MemoryStorage::new())
    } else {
        let path = config::notes_document_path();
        log::info!("[MAIN] persisting notes to {}", path.display());
        Arc::new(FileStorage::new(path))
    }
}

fn build_location(config: &AssistantConfig) -> Arc<dyn LocationCapability> {
    match &config.services.geocode_server_url {
        Some(url) => Arc::new(HttpLocationService::new(url.clone())),
        None => Arc::new(UnavailableLocation),
    }
}

fn build_weather(config: &AssistantConfig) -> Arc<dyn WeatherCapability> {
    match &config.services.weather_server_url {
        Some(url) => Arc::new(HttpWeatherService::new(url.clone())),
        None => Arc::new(LoggingWeather),
    }
}

/// Render flow events through the speech capability.
async fn run_surface(
    mut events: tokio::sync::mpsc::Receiver<FlowEvent>,
    speech: Arc<dyn SpeechCapability>,
) {
    while let Some(event) = events.recv().await {
        let line = match event {
            FlowEvent::QuestionPresented {
                question,
                suggestion,
            } => {
                let mut line = format!("\n{}", question.text);
                if let Some(hint) = &question.hint {
                    line.push_str(&format!("\n  ({})", hint));
                }
                if let Some(suggestion) = suggestion {
                    line.push_str(&format!(
                        "\n  [suggested: {} - press enter to accept]",
                        suggestion
                    ));
                }
                line
            }
            FlowEvent::AnswerSaved { note } => format!("  (saved: {})", note.question_id),
            FlowEvent::AllAnswered { message } => format!("\n{}", message),
            FlowEvent::StoreRecovered => {
                "I had trouble reading my notes, so we're starting fresh.".to_string()
            }
        };
        if let Err(e) = speech.speak(&line).await {
            log::warn!("[MAIN] speech output failed: {}", e);
        }
    }
}

/// Parse "/note [category:] text" into a category and question text.
fn parse_note_command(rest: &str) -> (QuestionCategory, &str) {
    if let Some((prefix, text)) = rest.split_once(':') {
        if let Some(category) = QuestionCategory::from_str(prefix.trim()) {
            return (category, text.trim());
        }
    }
    (QuestionCategory::HouseInfo, rest.trim())
}

async fn handle_line(
    line: &str,
    coordinator: &FlowCoordinator,
    store: &Arc<NotesStore>,
) -> Result<(), FlowError> {
    match line {
        "/startover" => {
            store.clear_all().await?;
            coordinator.load_next_question().await;
            Ok(())
        }
        "/status" => {
            let snapshot = store.load().await;
            let completion = match coordinator.completion_state().await {
                CompletionState::AllAnswered => "all answered",
                CompletionState::InProgress => "in progress",
            };
            println!(
                "  {} ({}), required answered: {:.0}%, commits: {}",
                completion,
                coordinator.current_state().phase.as_str(),
                snapshot.completion_percentage() * 100.0,
                store.commit_seq().await,
            );
            if let Some(question) = coordinator.current_question() {
                println!("  current question: {}", question.text);
            }
            Ok(())
        }
        _ => {
            if let Some(rest) = line.strip_prefix("/note ") {
                let (category, text) = parse_note_command(rest);
                if text.is_empty() {
                    println!("  usage: /note [category:] <question text>");
                    return Ok(());
                }
                coordinator.add_dynamic_question(text, category).await?;
                return Ok(());
            }
            if let Some(rest) = line.strip_prefix("/voice ") {
                return coordinator
                    .submit_answer_from(AnswerSource::Voice, rest)
                    .await;
            }

            // an empty line accepts the current suggestion, if any
            if line.trim().is_empty() {
                if let Some(suggestion) = coordinator.current_state().suggested_answer {
                    return coordinator.submit_answer(&suggestion).await;
                }
            }
            coordinator.submit_answer(line).await
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let assistant_config = AssistantConfig::load(&config::assistant_config_path());
    log::info!("[MAIN] starting {}", assistant_config.assistant_name);

    let store = Arc::new(NotesStore::new(
        build_storage(),
        Duration::from_secs(assistant_config.cache_staleness_secs),
        Duration::from_millis(assistant_config.save_retry_delay_ms),
    ));

    let broadcaster = Arc::new(FlowEventBroadcaster::new());
    let outbox = Arc::new(SideEffectOutbox::new(
        store.clone(),
        build_weather(&assistant_config),
    ));
    let coordinator = FlowCoordinator::new(
        store.clone(),
        SuggestionResolver::new(build_location(&assistant_config)),
        outbox.clone(),
        broadcaster.clone(),
    );

    let (client_id, events) = broadcaster.subscribe();
    log::debug!(
        "[MAIN] surface attached, {} subscriber(s)",
        broadcaster.subscriber_count()
    );
    let speech: Arc<dyn SpeechCapability> = Arc::new(TerminalSpeech);
    let surface = tokio::spawn(run_surface(events, speech));

    println!(
        "{} is listening. Commands: /note, /status, /startover, /quit",
        assistant_config.assistant_name
    );
    coordinator.start().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        log::error!("[MAIN] failed to read input: {}", e);
                        break;
                    }
                };
                if line.trim() == "/quit" {
                    break;
                }
                match handle_line(&line, &coordinator, &store).await {
                    Ok(()) => {}
                    Err(FlowError::EmptyAnswer) => {
                        println!("  I didn't catch that - say it again, or /quit to stop.");
                    }
                    Err(FlowError::SaveInProgress) => {
                        println!("  Still saving the last answer, one moment.");
                    }
                    Err(FlowError::NothingPresented) => {
                        println!("  Nothing to answer right now. Try /note to add one.");
                    }
                    Err(e) if e.is_retryable() => {
                        println!("  I couldn't save that just now - please try again.");
                    }
                    Err(e) => {
                        log::error!("[MAIN] {}", e);
                        println!("  Something went wrong: {}", e);
                    }
                }
            }
        }
    }

    // session end: abandon pending side effects, let in-flight commits finish
    outbox.shutdown();
    outbox.wait_idle().await;
    broadcaster.unsubscribe(&client_id);
    surface.abort();
    log::info!("[MAIN] session ended");
}
