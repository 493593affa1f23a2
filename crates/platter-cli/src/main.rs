//! platter-control CLI: take turns driving shared actuators from a console.

mod command;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use platter_protocol::{Channel, WebSocketTransport};
use platter_session::{setup, Config, Session, SessionStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::command::{parse_line, Line, HELP};

#[derive(Parser)]
#[command(
    name = "platter-control",
    about = "Queue for and drive a shared set of motors",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the server and read commands from stdin.
    Run {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<String>,

        /// Server URL, overriding the configured one.
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Print the default configuration.
    DefaultConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, url } => {
            let mut config = setup::load_config(config.as_deref())?;
            if let Some(url) = url {
                config.server.url = url;
            }
            init_tracing(&config);
            run(config).await
        }
        Commands::DefaultConfig => {
            print!("{}", toml::to_string_pretty(&Config::default())?);
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.session.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(url = %config.server.url, "starting platter-control");

    let transport = Arc::new(WebSocketTransport::new(config.server.url.clone()));
    let (channel, events) = Channel::connect(transport, config.channel.to_channel_config());
    let (session, handle, status, mut notices) = Session::new(&config, channel, events);
    let session_task = tokio::spawn(session.run());

    tokio::spawn(print_status(status));
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            println!("! {notice}");
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(Line::Intent(intent)) => handle.send(intent)?,
                    Ok(Line::Quit) => break,
                    Ok(Line::Empty) => {}
                    Err(e) => println!("? {e:#}\n{HELP}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown();
    session_task.await??;
    Ok(())
}

/// Print a line whenever the rendered status changes.
async fn print_status(mut status: watch::Receiver<SessionStatus>) {
    let mut last = String::new();
    loop {
        let line = render(&status.borrow_and_update());
        if line != last {
            println!("{line}");
            last = line;
        }
        if status.changed().await.is_err() {
            break;
        }
    }
}

fn render(status: &SessionStatus) -> String {
    let mut line = format!("[{}] {}", status.link, status.control.headline());
    if let Some(queue_length) = status.queue_length {
        line.push_str(&format!(" | queue: {queue_length}"));
    }
    let timer = status.timer.to_string();
    if !timer.is_empty() {
        line.push_str(&format!(" | {timer}"));
    }
    for (id, command) in &status.actuators {
        line.push_str(&format!(
            " | m{id}: {} {:?}{}",
            command.speed,
            command.direction,
            if command.is_braking() { " BRAKE" } else { "" }
        ));
    }
    line
}
