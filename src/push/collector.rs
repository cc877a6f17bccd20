//! Push collector backends

use crate::error::{IibPushError, Result};
use crate::logging::Logger;
use crate::push::PushItem;
use async_trait::async_trait;
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Receives push item updates
#[async_trait]
pub trait PushCollector: Send + Sync {
    async fn update_push_items(&self, items: &[PushItem]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CollectorKind {
    /// Log push items only
    #[default]
    Dummy,
    /// Append push items as JSON lines under a local directory
    Local,
}

impl CollectorKind {
    pub fn create(&self, dir: &Path, logger: &Logger) -> Arc<dyn PushCollector> {
        match self {
            CollectorKind::Dummy => Arc::new(DummyCollector::new(logger.clone())),
            CollectorKind::Local => Arc::new(LocalCollector::new_session(dir)),
        }
    }
}

pub struct DummyCollector {
    logger: Logger,
}

impl DummyCollector {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl PushCollector for DummyCollector {
    async fn update_push_items(&self, items: &[PushItem]) -> Result<()> {
        for item in items {
            self.logger.debug(&format!(
                "push item {} -> {:?} ({})",
                item.filename,
                item.state,
                item.src.as_deref().unwrap_or("-")
            ));
        }
        Ok(())
    }
}

/// Writes each update to `<session>/pushitems.jsonl`, one item per line.
pub struct LocalCollector {
    session_dir: PathBuf,
}

impl LocalCollector {
    /// Collector writing into `dir` itself
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: dir.into(),
        }
    }

    /// Collector writing into a fresh per-run subdirectory of `dir`
    pub fn new_session(dir: &Path) -> Self {
        Self::new(dir.join(uuid::Uuid::new_v4().to_string()))
    }

    pub fn items_path(&self) -> PathBuf {
        self.session_dir.join("pushitems.jsonl")
    }
}

#[async_trait]
impl PushCollector for LocalCollector {
    async fn update_push_items(&self, items: &[PushItem]) -> Result<()> {
        let collector_error = |e: std::io::Error| {
            IibPushError::Collector(format!(
                "Cannot write push items to {}: {}",
                self.session_dir.display(),
                e
            ))
        };

        tokio::fs::create_dir_all(&self.session_dir)
            .await
            .map_err(collector_error)?;

        let mut buffer = Vec::new();
        for item in items {
            serde_json::to_writer(&mut buffer, item)?;
            buffer.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.items_path())
            .await
            .map_err(collector_error)?;
        file.write_all(&buffer).await.map_err(collector_error)?;
        file.flush().await.map_err(collector_error)?;
        Ok(())
    }
}
