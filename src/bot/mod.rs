//! Chat surface: spot listing links in messages, run the pipeline for each,
//! and answer with plain send-text actions.

pub mod console;
pub mod discord;
pub mod transport;

pub use console::ConsoleTransport;
pub use discord::DiscordTransport;
pub use transport::ChatTransport;

use crate::models::EnrichmentResult;
use crate::pipeline::{ListingPipeline, PipelineOutcome};
use anyhow::{Context, Result};
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A message as seen by the handler, independent of the chat platform
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
    /// Sent by the bot account itself
    pub from_self: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundAction {
    SendText { channel_id: String, text: String },
}

/// Regex matching listing links on `host`
pub fn link_pattern(host: &str) -> Result<Regex> {
    Regex::new(&format!(r"https?://(?:www\.)?{}[^\s]*", regex::escape(host)))
        .context("Failed to build link pattern")
}

pub fn find_links<'a>(pattern: &Regex, text: &'a str) -> Vec<&'a str> {
    pattern.find_iter(text).map(|m| m.as_str()).collect()
}

/// Whole numbers keep one decimal place ("2.0"), everything else prints as stored
fn format_miles(miles: Option<f64>) -> String {
    miles.map_or_else(|| "?".to_string(), |m| format!("{m:?}"))
}

fn hospital_summary(enrichment: &EnrichmentResult) -> String {
    match &enrichment.failure_reason {
        Some(reason) => format!("Nearest hospital: lookup unavailable ({reason})"),
        None => format!(
            "Nearest hospital: {} ({} miles)",
            enrichment.facility_name.as_deref().unwrap_or("Unknown"),
            format_miles(enrichment.distance_miles)
        ),
    }
}

/// Summary line posted after a link has been processed
pub fn summary_message(outcome: &PipelineOutcome) -> String {
    let verb = if outcome.sink_ok { "saved" } else { "processed" };
    let record = &outcome.record;
    format!(
        "Property {verb}: {} | Price: {} | Size: {} | {}",
        record.name,
        record.price,
        record.size,
        hospital_summary(&outcome.enrichment)
    )
}

/// One listing link found in a message, answered in the message's channel
#[derive(Debug, Clone, PartialEq)]
pub struct LinkJob {
    pub channel_id: String,
    pub link: String,
}

impl LinkJob {
    fn reply(&self, text: String) -> OutboundAction {
        OutboundAction::SendText {
            channel_id: self.channel_id.clone(),
            text,
        }
    }

    /// Sent before the link is processed
    pub fn confirmation(&self) -> OutboundAction {
        self.reply(format!("Listing link detected: {}", self.link))
    }
}

pub struct MessageHandler {
    pipeline: ListingPipeline,
    link_pattern: Regex,
}

impl MessageHandler {
    pub fn new(pipeline: ListingPipeline, link_pattern: Regex) -> Self {
        Self {
            pipeline,
            link_pattern,
        }
    }

    /// Links to process for a message, in message order. Own messages yield none.
    pub fn jobs(&self, message: &IncomingMessage) -> Vec<LinkJob> {
        if message.from_self {
            return Vec::new();
        }

        let jobs: Vec<LinkJob> = find_links(&self.link_pattern, &message.content)
            .into_iter()
            .map(|link| LinkJob {
                channel_id: message.channel_id.clone(),
                link: link.to_string(),
            })
            .collect();
        if !jobs.is_empty() {
            debug!("Found {} listing link(s) from {}", jobs.len(), message.author_id);
        }
        jobs
    }

    /// Run the pipeline for one link and build its summary
    pub async fn complete(&self, job: &LinkJob) -> OutboundAction {
        let outcome = self.pipeline.process(&job.link).await;
        job.reply(summary_message(&outcome))
    }

    /// Every action for a message, `[confirmation, summary]` per link
    pub async fn handle(&self, message: &IncomingMessage) -> Vec<OutboundAction> {
        let jobs = self.jobs(message);
        let mut actions = Vec::with_capacity(jobs.len() * 2);
        for job in &jobs {
            actions.push(job.confirmation());
            actions.push(self.complete(job).await);
        }
        actions
    }
}

async fn deliver<T: ChatTransport>(transport: &T, action: OutboundAction) {
    let OutboundAction::SendText { channel_id, text } = action;
    if let Err(e) = transport.send(&channel_id, &text).await {
        warn!("Sending to {} failed: {:#}", channel_id, e);
    }
}

/// Pump messages from the transport through the handler until the transport closes.
/// A link's confirmation goes out before its pipeline run starts.
pub async fn run<T: ChatTransport>(
    transport: &mut T,
    handler: &MessageHandler,
    poll_interval: Duration,
) -> Result<()> {
    info!("Listening for listing links via {}", transport.name());

    loop {
        let messages = match transport.poll().await {
            Ok(Some(messages)) => messages,
            Ok(None) => {
                info!("{} transport closed", transport.name());
                return Ok(());
            }
            Err(e) => {
                warn!("Polling {} failed: {:#}", transport.name(), e);
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        for message in &messages {
            for job in handler.jobs(message) {
                deliver(&*transport, job.confirmation()).await;
                let summary = handler.complete(&job).await;
                deliver(&*transport, summary).await;
            }
        }

        if messages.is_empty() && transport.needs_pacing() {
            tokio::time::sleep(poll_interval).await;
        }
    }
}
