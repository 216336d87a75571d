//! Event sources for the worker loop.
//!
//! [`LineSource`] reads newline-delimited JSON events from any async reader
//! (a file or stdin). [`ChannelSource`] receives events from an in-process
//! tokio channel.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use vigil_core::{SecurityEvent, VigilError};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed event on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: VigilError,
    },
}

impl SourceError {
    /// Malformed input is skipped; anything else ends the source.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Malformed { .. })
    }
}

/// A stream of inbound events, consumed one at a time.
#[async_trait]
pub trait EventSource: Send {
    /// Next event, `None` once the source is exhausted.
    ///
    /// Must be cancel safe: the worker races it against shutdown.
    async fn next_event(&mut self) -> Option<Result<SecurityEvent, SourceError>>;

    fn name(&self) -> &str;
}

/// Newline-delimited JSON events from an async reader. Blank lines are ignored.
pub struct LineSource<R> {
    lines: Lines<R>,
    name: String,
    line_no: usize,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            name: name.into(),
            line_no: 0,
        }
    }
}

impl LineSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl LineSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for LineSource<R> {
    async fn next_event(&mut self) -> Option<Result<SecurityEvent, SourceError>> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Some(SecurityEvent::from_json(trimmed).map_err(|source| SourceError::Malformed {
                line: self.line_no,
                source,
            }));
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Events pushed through an in-process channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<SecurityEvent>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<SecurityEvent>) -> Self {
        Self { rx }
    }

    /// Create a bounded channel and its source.
    pub fn channel(capacity: usize) -> (mpsc::Sender<SecurityEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_event(&mut self) -> Option<Result<SecurityEvent, SourceError>> {
        self.rx.recv().await.map(Ok)
    }

    fn name(&self) -> &str {
        "channel"
    }
}
