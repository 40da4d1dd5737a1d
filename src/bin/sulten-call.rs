use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sulten_voice::native::{NativeMicrophone, NativeSpeaker};
use sulten_voice::tools::{HttpRecipeLookup, StaticIdentity};
use sulten_voice::{AppContext, Config, SessionBuilder, SessionEvent};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Talk to Sulten from the terminal")]
struct Cli {
    /// User whose recipes the assistant searches. Overrides SULTEN_USER_ID.
    #[arg(long)]
    user_id: Option<String>,
    /// Input and output device name. Defaults to the system devices.
    #[arg(long)]
    device: Option<String>,
    /// Print the available audio devices and exit.
    #[arg(long)]
    list_devices: bool,
}

const HELP: &str = "commands: m = toggle mic, s = start call, e = end call, q = quit";

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    if args.list_devices {
        println!("{}", sulten_voice::utils::device::get_available_inputs()?);
        println!("{}", sulten_voice::utils::device::get_available_outputs()?);
        return Ok(());
    }

    // --- 4. Application Context ---
    let client = reqwest::Client::new();
    let user_id = args.user_id.or_else(|| config.user_id().map(str::to_string));
    if user_id.is_none() {
        tracing::warn!("no user id set, recipe searches will report a missing identity");
    }
    let context = AppContext::new(
        client.clone(),
        Arc::new(HttpRecipeLookup::new(client, config.api_url())),
        Arc::new(StaticIdentity::new(user_id)),
    );

    // --- 5. Session ---
    let session = SessionBuilder::new(config)
        .with_context(context)
        .with_microphone(Arc::new(NativeMicrophone::new(args.device.clone())))
        .with_audio_output(Arc::new(NativeSpeaker::new(args.device)))
        .spawn();

    let mut status = session.status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            println!("[status] {}", current.message);
        }
    });

    let mut transcript = session.transcript();
    tokio::spawn(async move {
        let mut printed = 0;
        while transcript.changed().await.is_ok() {
            let lines = transcript.borrow_and_update().clone();
            // only the last line is ever rewritten
            printed = printed.min(lines.len().saturating_sub(1));
            for line in &lines[printed..] {
                println!("[{}] {}", line.role, line.text);
            }
            printed = lines.len();
        }
    });

    let mut events = session.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::ToolCall { query, .. } => println!("[tool] searching recipes for {:?}", query),
                SessionEvent::ToolAnswered { count, error, .. } => match error {
                    Some(error) => println!("[tool] failed: {}", error),
                    None => println!("[tool] found {} recipes", count),
                },
                SessionEvent::Interrupted => println!("[call] interrupted"),
                _ => {}
            }
        }
    });

    // --- 6. Command Loop ---
    println!("{}", HELP);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "m" => session.toggle_mic()?,
            "s" => session.start()?,
            "e" => session.end()?,
            "q" => break,
            "" => {}
            _ => println!("{}", HELP),
        }
    }

    session.end()?;
    session.flush().await?;
    tracing::info!("bye");
    Ok(())
}
