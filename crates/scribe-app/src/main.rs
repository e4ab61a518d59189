//! Scribe application binary - composition root.
//!
//! Ties the Scribe crates together into a terminal client:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the knowledge service client
//! 4. Run one subcommand against the orchestrators

mod cli;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use scribe_audio::{CpalMicrophone, RecordingCapture};
use scribe_chat::{ChatOrchestrator, FeedbackForm, FeedbackOrchestrator};
use scribe_client::{KnowledgeService, KnowledgeServiceClient};
use scribe_core::config::ScribeConfig;
use scribe_core::types::{ContentKind, Message, ProcessingLogEntry, Role};
use scribe_ingest::{load_upload, IngestionOrchestrator};

use cli::{ChatInput, CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> AppResult<ExitCode> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ScribeConfig::load_or_default(&config_file);
    config.backend.base_url = args.resolve_backend_url(&config.backend.base_url);
    let log_level = args.resolve_log_level(&config.general.log_level);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        path = %config_file.display(),
        backend = %config.backend.base_url,
        "Configuration resolved"
    );

    let service = Arc::new(KnowledgeServiceClient::new(&config.backend)?);

    match args.command {
        Command::Health => Ok(run_health(&service).await),
        Command::Ask { query } => {
            run_ask(service, &query.join(" ")).await;
            Ok(ExitCode::SUCCESS)
        }
        Command::Chat => {
            run_chat(service).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Ingest { kind, paths } => {
            run_ingest(service, &config, kind.map(ContentKind::from), paths).await;
            Ok(ExitCode::SUCCESS)
        }
        Command::Scan => {
            let ingestion = IngestionOrchestrator::new(service, &config.ingest);
            print_entry(&ingestion.scan_folder().await);
            Ok(ExitCode::SUCCESS)
        }
        Command::Record {
            seconds,
            name,
            discard,
        } => run_record(service, &config, seconds, name, discard).await,
    }
}

async fn run_health(service: &KnowledgeServiceClient) -> ExitCode {
    if service.health().await {
        println!("Backend at {} is up", service.base_url());
        ExitCode::SUCCESS
    } else {
        println!("Backend at {} is unreachable", service.base_url());
        ExitCode::FAILURE
    }
}

async fn run_ask(service: Arc<KnowledgeServiceClient>, query: &str) {
    let chat = ChatOrchestrator::new(service);
    match chat.send(query).await {
        Ok(reply) => print_reply(&reply),
        Err(e) => eprintln!("error: {}", e),
    }
}

async fn run_chat(service: Arc<KnowledgeServiceClient>) -> AppResult<()> {
    let chat = ChatOrchestrator::new(Arc::clone(&service));
    let feedback = FeedbackOrchestrator::new(service);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Chatting with your knowledge base. :feedback <text>, :log, :quit");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Log => {
                for message in chat.transcript() {
                    print_transcript_line(&message);
                }
            }
            ChatInput::Feedback(correction) => {
                let Some(answer) = chat.last_answer() else {
                    eprintln!("error: there is no answer to correct yet");
                    continue;
                };
                let mut form = match FeedbackForm::open(answer) {
                    Ok(form) => form,
                    Err(e) => {
                        eprintln!("error: {}", e);
                        continue;
                    }
                };
                match form.submit(&feedback, correction).await {
                    Ok(receipt) => println!("Correction {}: {}", receipt.status, receipt.message),
                    Err(_) => eprintln!("error: {}", form.error().unwrap_or("submission failed")),
                }
            }
            ChatInput::Message(text) => match chat.send(text).await {
                Ok(reply) => print_reply(&reply),
                Err(e) => eprintln!("error: {}", e),
            },
        }
    }
    Ok(())
}

async fn run_ingest(
    service: Arc<KnowledgeServiceClient>,
    config: &ScribeConfig,
    kind: Option<ContentKind>,
    paths: Vec<PathBuf>,
) {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        match load_upload(path, kind).await {
            Ok(file) => files.push(file),
            Err(e) => eprintln!("skipped {}: {}", path.display(), e),
        }
    }
    if files.is_empty() {
        eprintln!("nothing to upload");
        return;
    }

    let ingestion = IngestionOrchestrator::new(service, &config.ingest);
    for entry in ingestion.ingest_batch(files).await {
        print_entry(&entry);
    }
}

async fn run_record(
    service: Arc<KnowledgeServiceClient>,
    config: &ScribeConfig,
    seconds: Option<u64>,
    name: Option<String>,
    discard: bool,
) -> AppResult<ExitCode> {
    let capture = RecordingCapture::new(CpalMicrophone::new(config.recording.clone()));
    if let Err(e) = capture.start().await {
        eprintln!("error: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    match seconds {
        Some(secs) => {
            println!("Recording for {} second(s)...", secs);
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
        None => {
            println!("Recording... press Enter to stop");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            lines.next_line().await?;
        }
    }

    let clip = match capture.stop().await {
        Ok(clip) => clip,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    println!(
        "Captured {} byte(s) over {:.1}s",
        clip.len(),
        clip.duration.as_secs_f32()
    );

    if discard {
        capture.discard().await?;
        println!("Recording discarded");
        return Ok(ExitCode::SUCCESS);
    }

    let ingestion = IngestionOrchestrator::new(service, &config.ingest);
    match ingestion.ingest_recording(&capture, name).await {
        Ok(entry) => print_entry(&entry),
        Err(e) => eprintln!("error: {}", e),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_reply(reply: &Message) {
    println!("{}", reply.content);
    if let Some(sources) = reply.sources.as_ref().filter(|s| !s.is_empty()) {
        println!("Sources:");
        for source in sources {
            println!("  - {}", source);
        }
    }
}

fn print_transcript_line(message: &Message) {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "scribe",
    };
    println!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M:%S"),
        speaker,
        message.content
    );
}

fn print_entry(entry: &ProcessingLogEntry) {
    println!(
        "[{}] {} {}: {}",
        entry.status, entry.kind, entry.filename, entry.message
    );
}
