//! NovaCall - scripted outbound-call assistant
//!
//! Runs one simulated call in the terminal: the operator types the
//! caller's side, the assistant answers from the configured talking
//! points and hands off to Manohar when it should.

mod config;
mod engine;
mod render;
mod runtime;
mod session;
mod state_machine;
mod store;

use config::{
    load_call_config, parse_talking_points, AppConfig, CallConfig, CallConfigInput,
    HandoffConditions, DEFAULT_SILENCE_THRESHOLD_SECS,
};
use runtime::{CallUpdate, SessionManager, SessionStore};
use std::io::Write;
use store::InMemorySessionStore;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Logs go to stderr so the transcript on stdout stays readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "novacall=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let app = AppConfig::from_env(std::env::args().skip(1));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let config = if let Some(path) = &app.call_config_path {
        tracing::info!(path = %path.display(), "Loading call configuration");
        load_call_config(path)?
    } else {
        prompt_call_config(&mut lines).await?
    };

    let manager = SessionManager::new(InMemorySessionStore::new(), app.tick_period);
    let handle = manager.create_call(config.clone()).await?;
    let mut updates = handle.subscribe();
    let call_over = CancellationToken::new();

    let printer = {
        let call_over = call_over.clone();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(update) => {
                        if let Some(line) = render::update_line(&update) {
                            println!("{line}");
                        }
                        if let CallUpdate::Status { status, .. } = update {
                            if status.is_final() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Transcript output fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            call_over.cancel();
        })
    };

    print_banner(&config);
    handle.start().await?;

    loop {
        tokio::select! {
            () = call_over.cancelled() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    handle.fail("Operator input closed").await?;
                    call_over.cancelled().await;
                    break;
                };
                match line.trim() {
                    "/end" => handle.end().await?,
                    "/transfer" => handle.transfer().await?,
                    "/quit" => handle.fail("Call abandoned by operator").await?,
                    _ => handle.say(line.as_str()).await?,
                }
            }
        }
    }

    printer.await?;

    let session = manager.store().get_session(&handle.session_id).await?;
    println!("\n{}", render::call_card(&session));

    let history = manager.history().await?;
    if !history.is_empty() {
        println!("Call History");
        for past in &history {
            println!("  {}", render::history_line(past));
        }
    }

    Ok(())
}

fn print_banner(config: &CallConfig) {
    println!("Calling: {}", config.phone_number);
    println!("Purpose: {}", config.purpose);
    println!(
        "Hand-off: caller asks for Manohar, {}s of silence, or 2 unanswerable questions",
        config.silence_threshold_secs()
    );
    println!("Type the caller's replies. Commands: /transfer, /end, /quit\n");
}

async fn prompt<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    question: &str,
) -> Result<String, BoxError> {
    print!("{question}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.unwrap_or_default())
}

/// Collect a call configuration interactively, the way the setup form does
async fn prompt_call_config<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
) -> Result<CallConfig, BoxError> {
    println!("Configure NovaCall");
    let phone_number = prompt(lines, "Phone number: ").await?;
    let purpose = prompt(lines, "Call purpose: ").await?;

    println!("Talking points (one per line, blank line to finish):");
    let mut points = String::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            break;
        }
        points.push_str(&line);
        points.push('\n');
    }

    let script = prompt(lines, "Optional script: ").await?;

    let threshold = prompt(
        lines,
        &format!("Silence threshold in seconds [{DEFAULT_SILENCE_THRESHOLD_SECS}]: "),
    )
    .await?;
    let silence_threshold = if threshold.trim().is_empty() {
        DEFAULT_SILENCE_THRESHOLD_SECS
    } else {
        threshold.trim().parse()?
    };

    let consent = prompt(lines, "Inform caller about recording? [y/N]: ").await?;

    let input = CallConfigInput {
        id: None,
        phone_number,
        purpose,
        talking_points: parse_talking_points(&points),
        script: Some(script),
        handoff_conditions: HandoffConditions {
            silence_threshold,
            ..HandoffConditions::default()
        },
        recording_consent: consent.trim().eq_ignore_ascii_case("y")
            || consent.trim().eq_ignore_ascii_case("yes"),
    };
    Ok(input.into_config()?)
}
