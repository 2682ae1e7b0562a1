//! Notification sinks for posts that matched the keyword filter.

use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::SinkKind;
use crate::post::Hit;

/// Trait for destinations of matched posts.
#[async_trait]
pub trait HitSink: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Deliver one hit.
    async fn send(&self, hit: &Hit) -> Result<()>;
}

/// Writes one line per hit to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[async_trait]
impl HitSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, hit: &Hit) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{hit}").context("Failed to write hit to stdout")?;
        Ok(())
    }
}

/// Emits a structured tracing event per hit.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl HitSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, hit: &Hit) -> Result<()> {
        info!(
            post_id = hit.id,
            created_at = %hit.created_at.to_rfc3339(),
            updated_at = %hit.updated_at.to_rfc3339(),
            username = %hit.username,
            title = %hit.title,
            "Post matched keywords"
        );
        Ok(())
    }
}

/// Build the sink selected in configuration.
#[must_use]
pub fn sink_for(kind: SinkKind) -> Box<dyn HitSink> {
    match kind {
        SinkKind::Console => Box::new(ConsoleSink),
        SinkKind::Log => Box::new(LogSink),
    }
}
