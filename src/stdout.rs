//! A catalog connection that prints mutations instead of applying them.
//!
//! Each mutation becomes one line of JSON on the wrapped writer, so the
//! binary's output can be piped into whatever ingests entities downstream.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use async_trait::async_trait;

use crate::connection::{EntityProviderConnection, EntityProviderMutation};

pub struct JsonLinesConnection<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesConnection<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JsonLinesConnection<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

#[async_trait]
impl<W: Write + Send> EntityProviderConnection for JsonLinesConnection<W> {
    async fn apply_mutation(&self, mutation: EntityProviderMutation) -> anyhow::Result<()> {
        let line = serde_json::to_string(&mutation).context("failed to serialize mutation")?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("mutation writer lock poisoned"))?;
        writeln!(writer, "{line}").context("failed to write mutation")?;
        writer.flush().context("failed to flush mutation")?;
        Ok(())
    }
}
