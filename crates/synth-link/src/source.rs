use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use synth_core::{Envelope, SubscriptionError};
use tokio::sync::mpsc;

use crate::envelope::unwrap_envelope;
use crate::process::FeedProcess;

type Item = Result<Vec<u8>, SubscriptionError>;

// ─── FeedSource ───────────────────────────────────────────────────────────

/// A feed subscription backed by a helper process.
///
/// A background task owns the [`FeedProcess`], unwraps each line according to
/// the stream's [`Envelope`], and forwards the bytes over a small channel.
/// The stream ends on EOF; a failed spawn, a read error, or a non-zero exit is
/// yielded as one final [`SubscriptionError`]. Dropping `FeedSource` stops the
/// task and kills the process.
///
/// Frames whose envelope cannot be unwrapped are forwarded untouched so the
/// stream worker's decode policy decides what happens to them.
pub struct FeedSource {
    rx: mpsc::Receiver<Item>,
}

impl FeedSource {
    pub fn spawn(program: String, args: Vec<String>, envelope: Envelope) -> Self {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut process = match FeedProcess::spawn(&program, &args) {
                Ok(p) => p,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };

            loop {
                let line = tokio::select! {
                    _ = tx.closed() => break,
                    line = process.next_line() => line,
                };
                match line {
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        process.kill().await;
                        return;
                    }
                    Ok(None) => {
                        if let Some(exit_err) = process.wait_exit_error().await {
                            let _ = tx.send(Err(exit_err.into())).await;
                        }
                        return;
                    }
                    Ok(Some(line)) => {
                        let bytes = match unwrap_envelope(envelope, line.as_bytes()) {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                tracing::debug!(
                                    program = %program,
                                    error = %e,
                                    "forwarding frame with unreadable envelope"
                                );
                                line.into_bytes()
                            }
                        };
                        if tx.send(Ok(bytes)).await.is_err() {
                            break; // Receiver dropped
                        }
                    }
                }
            }

            process.kill().await;
        });

        FeedSource { rx }
    }
}

impl Stream for FeedSource {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
