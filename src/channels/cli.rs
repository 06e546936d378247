//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Choices are printed numbered (`#1 Male`); typing `#1` presses that button.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;
use crate::onboarding::model::Selection;

const CLI_USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Default)]
pub struct CliChannel {
    /// Choices from the most recent reply, for `#N` input.
    last_choices: Arc<Mutex<Vec<Selection>>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Map a line of input to a message, resolving `#N` against `choices`.
/// An out-of-range `#N` is sent on as plain text.
fn line_to_message(line: &str, choices: &[Selection]) -> IncomingMessage {
    let picked = line
        .strip_prefix('#')
        .and_then(|n| n.trim().parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| choices.get(i).copied());
    match picked {
        Some(selection) => IncomingMessage::selection("cli", CLI_USER, selection),
        None => IncomingMessage::new("cli", CLI_USER, line),
    }
}

fn render(response: &OutgoingResponse) -> String {
    let mut out = response.content.clone();
    for (i, choice) in response.choices.iter().enumerate() {
        out.push_str(&format!("\n  #{} {}", i + 1, choice.label));
    }
    out
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let last_choices = Arc::clone(&self.last_choices);

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = {
                            let choices = last_choices.lock().unwrap_or_else(PoisonError::into_inner);
                            line_to_message(line, &choices)
                        };
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        *self.last_choices.lock().unwrap_or_else(PoisonError::into_inner) =
            response.choices.iter().map(|c| c.selection).collect();
        println!("\n{}\n", render(&response));
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
