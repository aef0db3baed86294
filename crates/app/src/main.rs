use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use vocalis_app::config::Settings;
use vocalis_app::runtime::AppHandle;
use vocalis_audio::DeviceManager;

#[derive(Parser, Debug)]
#[command(name = "vocalis", about = "Barge-in voice assistant pipeline")]
struct Cli {
    /// Path to a TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture device name (default input device if omitted)
    #[arg(long)]
    input_device: Option<String>,

    /// Playback device name (default output device if omitted)
    #[arg(long)]
    output_device: Option<String>,

    /// API key for the speech/chat endpoints
    #[arg(long, env = "VOCALIS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// List capture devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn init_logging() -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "vocalis.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    if cli.list_devices {
        let manager = DeviceManager::new();
        for info in manager.enumerate_inputs() {
            let marker = if info.is_default { " (default)" } else { "" };
            println!("{}{}", info.name, marker);
        }
        return Ok(());
    }

    let mut settings =
        Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(key) = cli.api_key {
        settings.api.api_key = key;
    }
    if cli.input_device.is_some() {
        settings.audio.capture_device = cli.input_device;
    }
    if cli.output_device.is_some() {
        settings.audio.playback_device = cli.output_device;
    }

    tracing::info!("starting vocalis");
    let handle = AppHandle::start(settings)
        .await
        .context("failed to start the voice pipeline")?;

    println!("Listening. Speak, or type a message and press Enter.");
    println!("Enter on an empty line interrupts the assistant; 'pause'/'resume' control");
    println!("playback; 'quit' exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl-C");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("stdin closed unexpectedly")? else {
                    break;
                };
                match line.trim() {
                    "quit" | "exit" => break,
                    "pause" => handle.pause_playback(),
                    "resume" => handle.resume_playback(),
                    "" => {
                        if !handle.interrupt_playback() {
                            println!("(nothing playing; still listening)");
                        }
                    }
                    text => {
                        if let Err(e) = handle.send_text(text).await {
                            tracing::warn!("text turn failed: {}", e);
                        }
                    }
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
