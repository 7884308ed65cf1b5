//! Terminal presentation adapter for a connection manager
//!
//! Prints inbound messages and status changes as they happen and forwards
//! typed lines as sends. Stdin is read on its own task so a pending read is
//! never lost when a message arrives.

use crate::error::Result;
use crate::models::{ConnectionStatus, Direction, Message, Payload};
use crate::services::ConnectionManager;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// A line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    State,
    History,
    Clear,
    Quit,
    Empty,
}

/// Parse a command from user input
pub fn parse_command(input: &str) -> std::result::Result<Command, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Command::Empty);
    }
    if !trimmed.starts_with('/') {
        return Ok(Command::Send(input.to_string()));
    }

    match trimmed {
        "/state" => Ok(Command::State),
        "/history" => Ok(Command::History),
        "/clear" => Ok(Command::Clear),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(format!("unknown command: {}", other)),
    }
}

/// Format a stored message for display
pub fn format_message(message: &Message) -> String {
    let arrow = match message.direction {
        Direction::Inbound => "<-",
        Direction::Outbound => "->",
    };
    format!(
        "[{}] #{} {} {}",
        message.received_at.format("%H:%M:%S"),
        message.seq,
        arrow,
        message.payload
    )
}

/// Format a status line for display
pub fn format_status(status: &ConnectionStatus) -> String {
    format!("* {}", status)
}

/// Read stdin lines on a background task; the channel closes on EOF.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Run the interactive loop until EOF, `/quit`, or the connection ends.
/// The client is closed on every exit path.
pub async fn run_client_loop(client: &dyn ConnectionManager) -> Result<()> {
    let mut input = spawn_stdin_reader();
    let mut messages = client.on_message();
    let mut status = client.watch_status();

    let outcome = loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else {
                    break Ok(());
                };
                match parse_command(&line) {
                    Ok(Command::Send(text)) => {
                        if let Err(e) = client.send(Payload::Text(text)) {
                            println!("! {}", e);
                        }
                    }
                    Ok(Command::State) => println!("{}", format_status(&client.status())),
                    Ok(Command::History) => {
                        for message in client.snapshot() {
                            println!("{}", format_message(&message));
                        }
                    }
                    Ok(Command::Clear) => client.reset_messages(),
                    Ok(Command::Quit) => break Ok(()),
                    Ok(Command::Empty) => {}
                    Err(e) => println!("! {}", e),
                }
            }
            item = messages.next() => match item {
                Some(Ok(message)) => println!("{}", format_message(&message)),
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = status.borrow_and_update().clone();
                println!("{}", format_status(&current));
            }
        }
    };

    client.close();
    outcome
}
