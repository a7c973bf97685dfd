// src/exec/stream.rs

//! Merge a child's stdout and stderr into one line sequence.
//!
//! One Tokio task reads each pipe line by line and pushes into a shared
//! unbounded channel. The single consumer pulls [`MuxEvent`]s with a bounded
//! wait so it can interleave cancellation checks and heartbeats. Per-stream
//! order is preserved; across streams lines appear in arrival order, and
//! [`OutputLine::sequence`] records that order.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::types::StreamSource;

/// How long [`StreamMultiplexer::finish`] waits for a reader before aborting it.
const READER_GRACE: Duration = Duration::from_secs(2);

/// One line of renderer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub source: StreamSource,
    pub text: String,
    /// Arrival order within this multiplexer, starting at 0.
    pub sequence: u64,
}

/// Result of one bounded wait on the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxEvent {
    Line(OutputLine),
    /// Nothing arrived within the wait.
    Idle,
    /// Both streams reached end-of-stream.
    Finished,
}

/// What a reader task saw before its stream closed.
#[derive(Debug)]
pub struct ReaderSummary {
    pub source: StreamSource,
    pub lines: u64,
    pub error: Option<io::Error>,
}

#[derive(Debug)]
pub struct StreamMultiplexer {
    rx: mpsc::UnboundedReceiver<(StreamSource, String)>,
    readers: Vec<JoinHandle<ReaderSummary>>,
    next_sequence: u64,
    finished: bool,
}

impl StreamMultiplexer {
    /// Spawn a reader per stream. Missing pipes count as already closed.
    pub fn attach<O, E>(stdout: Option<O>, stderr: Option<E>) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);

        if let Some(stdout) = stdout {
            readers.push(tokio::spawn(read_lines(StreamSource::Stdout, stdout, tx.clone())));
        }
        if let Some(stderr) = stderr {
            readers.push(tokio::spawn(read_lines(StreamSource::Stderr, stderr, tx.clone())));
        }
        // Only the readers hold senders now; the channel closes when both end.
        drop(tx);

        Self {
            rx,
            readers,
            next_sequence: 0,
            finished: false,
        }
    }

    /// Wait up to `wait` for the next event.
    ///
    /// `Finished` is produced once, after both readers have ended; calls after
    /// that keep returning `Finished` without waiting.
    pub async fn next_event(&mut self, wait: Duration) -> MuxEvent {
        if self.finished {
            return MuxEvent::Finished;
        }

        match timeout(wait, self.rx.recv()).await {
            Ok(Some((source, text))) => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                MuxEvent::Line(OutputLine {
                    source,
                    text,
                    sequence,
                })
            }
            Ok(None) => {
                self.finished = true;
                debug!(lines = self.next_sequence, "both output streams closed");
                MuxEvent::Finished
            }
            Err(_) => MuxEvent::Idle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Join the reader tasks.
    ///
    /// Readers that do not end within a short grace period (for example
    /// because a grandchild still holds the pipe) are aborted.
    pub async fn finish(mut self) -> Vec<ReaderSummary> {
        let mut summaries = Vec::with_capacity(self.readers.len());
        for handle in self.readers.drain(..) {
            let abort = handle.abort_handle();
            match timeout(READER_GRACE, handle).await {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(e)) => warn!(error = %e, "output reader task failed"),
                Err(_) => {
                    warn!("output reader did not finish in time; aborting");
                    abort.abort();
                }
            }
        }
        summaries
    }
}

impl Drop for StreamMultiplexer {
    fn drop(&mut self) {
        for handle in &self.readers {
            handle.abort();
        }
    }
}

async fn read_lines<R>(
    source: StreamSource,
    stream: R,
    tx: mpsc::UnboundedSender<(StreamSource, String)>,
) -> ReaderSummary
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut lines = 0u64;

    let error = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break None,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf).trim_end().to_string();
                lines += 1;
                // The consumer may be gone; keep draining so the child never
                // blocks on a full pipe.
                let _ = tx.send((source, text));
            }
            Err(e) => {
                warn!(stream = %source, error = %e, "reading renderer output failed");
                break Some(e);
            }
        }
    };

    debug!(stream = %source, lines, "output reader ended");
    ReaderSummary {
        source,
        lines,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(mut mux: StreamMultiplexer) -> Vec<OutputLine> {
        let mut lines = Vec::new();
        loop {
            match mux.next_event(Duration::from_millis(500)).await {
                MuxEvent::Line(line) => lines.push(line),
                MuxEvent::Idle => {}
                MuxEvent::Finished => break,
            }
        }
        // Fused: no further lines after completion.
        assert_eq!(mux.next_event(Duration::from_millis(10)).await, MuxEvent::Finished);
        lines
    }

    #[tokio::test]
    async fn merges_both_streams_preserving_per_stream_order() {
        let out: &[u8] = b"one\ntwo\r\nthree";
        let err: &[u8] = b"e1\ne2\n";
        let mux = StreamMultiplexer::attach(Some(out), Some(err));
        let lines = collect(mux).await;

        let stdout: Vec<_> = lines
            .iter()
            .filter(|l| l.source == StreamSource::Stdout)
            .map(|l| l.text.as_str())
            .collect();
        let stderr: Vec<_> = lines
            .iter()
            .filter(|l| l.source == StreamSource::Stderr)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(stdout, ["one", "two", "three"]);
        assert_eq!(stderr, ["e1", "e2"]);

        let seqs: Vec<_> = lines.iter().map(|l| l.sequence).collect();
        assert_eq!(seqs, (0..5).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let out: &[u8] = b"ok \xff\xfe bytes\n";
        let mux = StreamMultiplexer::attach(Some(out), None::<&[u8]>);
        let lines = collect(mux).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.starts_with("ok "));
        assert!(lines[0].text.ends_with(" bytes"));
    }

    #[tokio::test]
    async fn finished_only_after_both_streams_close() {
        let (mut held_open, reader_side) = tokio::io::duplex(64);
        let out: &[u8] = b"done\n";
        let mut mux = StreamMultiplexer::attach(Some(out), Some(reader_side));

        assert!(matches!(
            mux.next_event(Duration::from_millis(500)).await,
            MuxEvent::Line(_)
        ));
        assert_eq!(mux.next_event(Duration::from_millis(50)).await, MuxEvent::Idle);
        assert!(!mux.is_finished());

        use tokio::io::AsyncWriteExt;
        held_open.write_all(b"late\n").await.unwrap();
        drop(held_open);

        match mux.next_event(Duration::from_millis(500)).await {
            MuxEvent::Line(line) => {
                assert_eq!(line.text, "late");
                assert_eq!(line.source, StreamSource::Stderr);
            }
            other => panic!("expected late line, got {other:?}"),
        }
        assert_eq!(mux.next_event(Duration::from_millis(500)).await, MuxEvent::Finished);
        assert!(mux.is_finished());

        let summaries = mux.finish().await;
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.lines == 1 && s.error.is_none()));
    }
}
