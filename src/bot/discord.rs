use crate::bot::{ChatTransport, IncomingMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord's per-message character limit
const MAX_MESSAGE_CHARS: usize = 2000;
const PAGE_LIMIT: &str = "50";

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    channel_id: String,
    author: DiscordUser,
    #[serde(default)]
    content: String,
}

fn snowflake(id: &str) -> u64 {
    id.parse().unwrap_or(0)
}

/// Oldest first, tagged with whether the bot wrote them
fn into_incoming(mut messages: Vec<DiscordMessage>, bot_user_id: &str) -> Vec<IncomingMessage> {
    messages.sort_by_key(|m| snowflake(&m.id));
    messages
        .into_iter()
        .map(|m| IncomingMessage {
            from_self: m.author.id == bot_user_id,
            channel_id: m.channel_id,
            author_id: m.author.id,
            content: m.content,
        })
        .collect()
}

fn truncate_message(text: &str) -> String {
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// Discord bot over the REST API, polling a fixed set of channels.
/// Only messages posted after startup are seen.
pub struct DiscordTransport {
    client: Client,
    api_base: String,
    token: String,
    bot_user_id: String,
    /// Newest message id seen per channel
    cursors: HashMap<String, Option<String>>,
}

impl DiscordTransport {
    /// Validate the token and seed a cursor for every channel
    pub async fn connect(token: String, channel_ids: Vec<String>) -> Result<Self> {
        Self::connect_to(DISCORD_API_BASE, token, channel_ids).await
    }

    pub async fn connect_to(
        api_base: impl Into<String>,
        token: String,
        channel_ids: Vec<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("DiscordBot (listing-scout, ", env!("CARGO_PKG_VERSION"), ")"))
            .build()
            .context("Failed to create HTTP client")?;

        let mut transport = Self {
            client,
            api_base: api_base.into(),
            token,
            bot_user_id: String::new(),
            cursors: HashMap::new(),
        };

        let me: DiscordUser = transport
            .authorized(transport.client.get(format!("{}/users/@me", transport.api_base)))
            .send()
            .await
            .context("Failed to reach Discord")?
            .error_for_status()
            .context("Discord rejected the bot token")?
            .json()
            .await
            .context("Failed to read bot user")?;
        info!("Logged in as {} ({})", me.username, me.id);
        transport.bot_user_id = me.id;

        for channel_id in channel_ids {
            let latest = transport.fetch_messages(&channel_id, None, "1").await?;
            let cursor = latest.into_iter().map(|m| m.id).max_by_key(|id| snowflake(id));
            debug!("Channel {} starts after {:?}", channel_id, cursor);
            transport.cursors.insert(channel_id, cursor);
        }

        Ok(transport)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bot {}", self.token))
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        after: Option<&str>,
        limit: &str,
    ) -> Result<Vec<DiscordMessage>> {
        let mut query = vec![("limit", limit)];
        if let Some(after) = after {
            query.push(("after", after));
        }

        let response = self
            .authorized(
                self.client
                    .get(format!("{}/channels/{}/messages", self.api_base, channel_id))
                    .query(&query),
            )
            .send()
            .await
            .with_context(|| format!("Failed to poll channel {channel_id}"))?;

        if !response.status().is_success() {
            warn!("Discord returned status {} for channel {}", response.status(), channel_id);
            anyhow::bail!("Failed to poll channel {}: {}", channel_id, response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse Discord messages")
    }
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    async fn poll(&mut self) -> Result<Option<Vec<IncomingMessage>>> {
        let mut incoming = Vec::new();
        let channels: Vec<(String, Option<String>)> = self
            .cursors
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let total = channels.len();
        let mut failed = Vec::new();

        for (channel_id, cursor) in channels {
            // A failing channel keeps its cursor and is retried next poll
            let messages = match self
                .fetch_messages(&channel_id, cursor.as_deref(), PAGE_LIMIT)
                .await
            {
                Ok(messages) => messages,
                Err(e) => {
                    warn!("Skipping channel {} this poll: {:#}", channel_id, e);
                    failed.push(channel_id);
                    continue;
                }
            };
            if messages.is_empty() {
                continue;
            }
            let newest = messages.iter().map(|m| m.id.clone()).max_by_key(|id| snowflake(id));
            self.cursors.insert(channel_id, newest);
            incoming.extend(into_incoming(messages, &self.bot_user_id));
        }

        if total > 0 && failed.len() == total {
            anyhow::bail!("Failed to poll every channel: {}", failed.join(", "));
        }

        Ok(Some(incoming))
    }

    async fn send(&self, channel_id: &str, text: &str) -> Result<()> {
        self.authorized(
            self.client
                .post(format!("{}/channels/{}/messages", self.api_base, channel_id))
                .json(&json!({ "content": truncate_message(text) })),
        )
        .send()
        .await
        .with_context(|| format!("Failed to post to channel {channel_id}"))?
        .error_for_status()
        .with_context(|| format!("Discord refused message for channel {channel_id}"))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
