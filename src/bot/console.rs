use crate::bot::{ChatTransport, IncomingMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub const CONSOLE_CHANNEL: &str = "console";

/// Reads one message per stdin line and prints replies to stdout.
pub struct ConsoleTransport {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn poll(&mut self) -> Result<Option<Vec<IncomingMessage>>> {
        let line = self
            .lines
            .next_line()
            .await
            .context("Failed to read from stdin")?;

        Ok(line.map(|content| {
            vec![IncomingMessage {
                channel_id: CONSOLE_CHANNEL.to_string(),
                author_id: "console-user".to_string(),
                content,
                from_self: false,
            }]
        }))
    }

    async fn send(&self, _channel_id: &str, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }

    fn needs_pacing(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
