use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;

use super::joints::PoseFrame;

/// A lazy, non-restartable stream of estimator frames.
///
/// `Ok(None)` means the source has ended and will not produce more frames.
/// An `Err` covers a single unreadable frame; callers may keep reading.
#[async_trait]
pub trait PoseSource: Send {
    async fn next_frame(&mut self) -> Result<Option<PoseFrame>>;
}

/// Frames pushed by an estimator running on another task or thread.
pub struct ChannelPoseSource {
    receiver: mpsc::Receiver<PoseFrame>,
}

impl ChannelPoseSource {
    pub fn new(receiver: mpsc::Receiver<PoseFrame>) -> Self {
        Self { receiver }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<PoseFrame>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self::new(receiver))
    }
}

#[async_trait]
impl PoseSource for ChannelPoseSource {
    async fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        Ok(self.receiver.recv().await)
    }
}

/// One JSON-encoded `PoseFrame` per line, e.g. piped from an estimator process.
pub struct JsonLinesPoseSource<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R> JsonLinesPoseSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

#[async_trait]
impl<R> PoseSource for JsonLinesPoseSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .context("failed to read pose frame")?
            else {
                return Ok(None);
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let frame = serde_json::from_str(trimmed)
                .with_context(|| format!("invalid pose frame on line {}", self.line_number))?;
            return Ok(Some(frame));
        }
    }
}
