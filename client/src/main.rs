use std::fs::File;
use std::sync::{Arc, Mutex};
use std::thread;

use chifumi_client::api::HttpMatchApi;
use chifumi_client::config::Config;
use chifumi_client::event_stream::HttpEventTransport;
use chifumi_client::state::SessionState;
use chifumi_client::ui::{self, Command};
use chifumi_client::MatchSession;
use colored::*;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "client.log";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = init_tracing() {
        eprintln!("Could not open {LOG_FILE}: {e}");
    }

    let mut args = std::env::args().skip(1);
    let Some(match_id) = args.next() else {
        eprintln!("Usage: chifumi-client <match-id> [config.json]");
        std::process::exit(2);
    };
    let config_path = args.next().unwrap_or_else(|| "config.json".to_string());

    if let Err(e) = start_app(&match_id, &config_path).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to a file so they do not tear up the terminal view
fn init_tracing() -> std::io::Result<()> {
    let file = File::create(LOG_FILE)?;
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

async fn start_app(match_id: &str, config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_from(config_path)?;
    config.apply_env();
    let credentials = SessionState::from_config(&config)?;
    info!(server_url = %credentials.server_url, user_id = %credentials.user_id, "starting");

    let api = Arc::new(HttpMatchApi::new(credentials.clone()));
    let transport = Arc::new(HttpEventTransport::new(credentials.clone()));
    let mut session = MatchSession::new(&credentials, api, transport, config.retry_delay());
    let mut connection = session.watch_connection();
    let mut input = spawn_input_reader();

    session.activate(match_id).await;
    ui::render(session.store(), session.connection_state(), &credentials.user_id);

    loop {
        tokio::select! {
            update = session.next_update() => {
                let Some(update) = update else { break };
                debug!(?update, "session updated");
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            line = input.recv() => {
                let Some(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }

                match ui::parse_command(&line) {
                    Ok(Command::Play(choice, turn)) => {
                        if let Err(rejection) = session.play(choice, turn) {
                            info!(reason = %rejection, "move not sent");
                        }
                    }
                    Ok(Command::Refresh) => session.refresh(),
                    Ok(Command::Help) => {
                        println!("{}", ui::HELP.dimmed());
                        continue;
                    }
                    Ok(Command::Quit) => break,
                    Err(e) => {
                        println!("{}", e.red());
                        continue;
                    }
                }
            }
        }

        ui::render(session.store(), session.connection_state(), &credentials.user_id);
    }

    session.deactivate().await;
    println!("\n{}", "Goodbye!".cyan());
    Ok(())
}

/// rustyline blocks, so it gets its own thread. Closing the channel means quit.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    thread::spawn(move || {
        let Ok(mut editor) = DefaultEditor::new() else {
            return;
        };

        while let Ok(line) = editor.readline("> ") {
            let _ = editor.add_history_entry(line.as_str());
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    rx
}
