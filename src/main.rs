//! # mockmate
//!
//! `serve` hosts the interview API; `interview` runs a mock interview in the
//! terminal against a running server, revealing each question as it streams.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mockmate_client::{
    FallbackController, HttpTransport, IntervalTicks, TurnError, TurnObserver,
};
use mockmate_core::{
    AnswerTurn, InterviewFeedback, Language, SessionId, StartInterview, TurnRequest,
};
use mockmate_logging::{LoggingConfig, init_logging};
use mockmate_server::{
    MockmateServer, OpenAiCompatConfig, OpenAiCompatGenerator, ScriptedGenerator, ServerConfig,
    ShutdownCoordinator, TextGenerator,
};
use mockmate_settings::MockmateSettings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Mock interview server and streaming terminal client.
#[derive(Parser, Debug)]
#[command(name = "mockmate", about = "Mock interview server and streaming terminal client")]
struct Cli {
    /// Settings file (default `~/.mockmate/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the interview API.
    Serve {
        /// Host to bind.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
        /// Use canned questions even when an API key is configured.
        #[arg(long)]
        scripted: bool,
    },
    /// Run an interview in the terminal.
    Interview {
        /// User id the session belongs to.
        #[arg(long)]
        user: String,
        /// File with the resume summary.
        #[arg(long)]
        resume: PathBuf,
        /// File with the job description.
        #[arg(long)]
        job: PathBuf,
        /// Questions before the final feedback (1-15).
        #[arg(long)]
        questions: Option<u32>,
        /// Interview language: `en` or `zh`.
        #[arg(long, default_value = "en")]
        language: String,
        /// Server base URL (overrides settings).
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => mockmate_settings::load_settings_from_path(path),
        None => mockmate_settings::load_settings(),
    }
    .context("failed to load settings")?;

    init_logging(&LoggingConfig::new(
        settings.logging.level.clone(),
        settings.logging.json,
    ));

    match cli.command {
        Command::Serve {
            host,
            port,
            scripted,
        } => serve(settings, host, port, scripted).await,
        Command::Interview {
            user,
            resume,
            job,
            questions,
            language,
            server,
        } => {
            let mut start = StartInterview::new(user, read_file(&resume)?, read_file(&job)?);
            start.question_count = questions.unwrap_or(settings.interview.default_question_count);
            start.language = parse_language(&language)?;
            interview(settings, start, server).await
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse_language(value: &str) -> Result<Language> {
    match value.to_ascii_lowercase().as_str() {
        "en" => Ok(Language::En),
        "zh" => Ok(Language::Zh),
        other => bail!("unsupported language '{other}', expected 'en' or 'zh'"),
    }
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            token.cancel();
        }
    });
}

fn build_generator(settings: &MockmateSettings, scripted: bool) -> Result<Arc<dyn TextGenerator>> {
    match settings.llm.api_key.as_ref().filter(|_| !scripted) {
        Some(api_key) => {
            let generator = OpenAiCompatGenerator::new(OpenAiCompatConfig {
                base_url: settings.llm.base_url.clone(),
                api_key: api_key.clone(),
                model: settings.llm.model.clone(),
            })
            .context("failed to build generator")?;
            info!(model = %settings.llm.model, "using OpenAI-compatible generator");
            Ok(Arc::new(generator))
        }
        None => {
            info!("using scripted generator");
            Ok(Arc::new(ScriptedGenerator::new()))
        }
    }
}

async fn serve(
    mut settings: MockmateSettings,
    host: Option<String>,
    port: Option<u16>,
    scripted: bool,
) -> Result<()> {
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }

    let metrics = mockmate_server::metrics::install_recorder();
    let generator = build_generator(&settings, scripted)?;
    let config = ServerConfig::from_settings(&settings);
    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    let shutdown = Arc::new(ShutdownCoordinator::new(config.drain_timeout));
    cancel_on_ctrl_c(shutdown.token());

    MockmateServer::new(config, generator)
        .with_metrics(metrics)
        .with_shutdown(shutdown)
        .serve(listener)
        .await
        .context("server failed")
}

/// Prints revealed text to stdout as it appears.
struct TerminalObserver;

impl TurnObserver for TerminalObserver {
    fn on_reveal(&mut self, ch: char) {
        print!("{ch}");
        let _ = std::io::stdout().flush();
    }

    fn on_discard(&mut self, revealed: &str) {
        if !revealed.is_empty() {
            println!();
        }
        println!("(connection interrupted, retrying without streaming)");
    }
}

async fn interview(
    mut settings: MockmateSettings,
    start: StartInterview,
    server: Option<String>,
) -> Result<()> {
    if let Some(server) = server {
        settings.client.base_url = server;
    }
    let transport =
        HttpTransport::from_settings(&settings.client).context("failed to build HTTP client")?;
    let ticks = IntervalTicks::new(Duration::from_millis(settings.client.tick_interval_ms));
    let mut controller = FallbackController::new(transport, ticks);
    let cancel = controller.cancellation();
    cancel_on_ctrl_c(cancel.clone());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut observer = TerminalObserver;
    let mut request = TurnRequest::Start(start);
    let mut question = 0u32;

    loop {
        if matches!(request, TurnRequest::Answer(_)) {
            println!();
        }
        let report = match controller.run_turn(&request, &mut observer).await {
            Ok(report) => report,
            Err(TurnError::Cancelled) => {
                println!("\ninterview cancelled");
                return Ok(());
            }
            Err(e) => return Err(e).context("turn failed"),
        };
        println!();

        if report.outcome.completed {
            print_feedback(report.outcome.feedback.as_ref());
            return Ok(());
        }
        let Some(session_id) = report.outcome.session_id.clone() else {
            bail!("server did not return a session id");
        };
        question += 1;

        print!("\n[{question}] your answer (`:end` to finish early)> ");
        let _ = std::io::stdout().flush();
        let asked = Instant::now();
        let line = tokio::select! {
            () = cancel.cancelled() => {
                println!("\ninterview cancelled");
                return Ok(());
            }
            line = stdin.next_line() => line.context("failed to read answer")?,
        };

        match line.as_deref().map(str::trim) {
            None | Some(":end") => {
                return end_early(controller.transport(), &session_id).await;
            }
            Some(answer) => {
                let mut turn = AnswerTurn::new(session_id, answer);
                if let Some(prompt) = &report.outcome.prompt {
                    turn = turn.for_prompt(prompt.id.clone());
                }
                turn.elapsed_seconds = Some(asked.elapsed().as_secs_f64());
                request = TurnRequest::Answer(turn);
            }
        }
    }
}

async fn end_early(transport: &HttpTransport, session_id: &SessionId) -> Result<()> {
    match transport.end_interview(session_id).await {
        Ok(feedback) => {
            print_feedback(Some(&feedback));
            Ok(())
        }
        Err(e) => {
            warn!(category = e.category(), error = %e, "ending the interview failed");
            Err(e).context("failed to end interview")
        }
    }
}

fn print_feedback(feedback: Option<&InterviewFeedback>) {
    let Some(feedback) = feedback else {
        println!("\nInterview complete.");
        return;
    };
    println!("\n== Final feedback ==");
    println!("Score: {:.0}/100", feedback.overall_score);
    println!("{}", feedback.summary);
    for (title, items) in [
        ("Strengths", &feedback.strengths),
        ("Weaknesses", &feedback.weaknesses),
        ("Suggestions", &feedback.suggestions),
    ] {
        if items.is_empty() {
            continue;
        }
        println!("\n{title}:");
        for item in items {
            println!("  - {item}");
        }
    }
}
