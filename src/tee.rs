//! Streams a body to the client while collecting a copy for storage.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::{Result, anyhow};
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use rama::error::BoxError;
use rama::http::{Body, body::util::BodyExt};
use tokio::sync::mpsc;

use crate::tasks::BackgroundTasks;

const CHANNEL_DEPTH: usize = 16;

struct ChunkStream {
    rx: mpsc::Receiver<Result<Bytes, BoxError>>,
}

impl Stream for ChunkStream {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Returns a body that replays `body` to the client. A tracked background
/// task pumps the upstream body and, once it has been read completely, hands
/// the full bytes to `on_complete`. The pump keeps reading after the client
/// goes away so the copy is still written; an upstream error skips it.
pub fn tee<F, Fut>(body: Body, tasks: &BackgroundTasks, label: &'static str, on_complete: F) -> Body
where
    F: FnOnce(Bytes) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
    tasks.spawn(label, async move {
        let mut body = body;
        let mut copy = BytesMut::new();
        let mut client_gone = false;
        while let Some(frame) = body.frame().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    let message = err.to_string();
                    if !client_gone {
                        let _ = tx.send(Err(err)).await;
                    }
                    return Err(anyhow!("upstream body failed: {message}"));
                }
            };
            let Ok(chunk) = frame.into_data() else {
                continue;
            };
            copy.extend_from_slice(&chunk);
            if !client_gone && tx.send(Ok(chunk)).await.is_err() {
                client_gone = true;
            }
        }
        drop(tx);
        on_complete(copy.freeze()).await
    });
    Body::from_stream(ChunkStream { rx })
}

/// Reads the whole body into memory.
pub async fn buffer(body: Body) -> Result<Bytes> {
    Ok(body
        .collect()
        .await
        .map_err(|e| anyhow!("reading body: {e}"))?
        .to_bytes())
}
