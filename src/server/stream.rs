//! `GET /websocket`: jobs in, results out, over one long-lived connection.
//!
//! Each connection gets its own pipeline run and three tasks:
//!   1. the connection manager reads frames and forwards binary payloads;
//!      a Close frame or read error cancels `closed` and ends the input;
//!   2. the reader decodes payloads as batches and feeds the job queue;
//!   3. the writer sends each result as a binary JSON message until the
//!      connection is closed or the result sentinel arrives.
//!
//! End of input only comes from the connection closing, so the Close frame
//! the client sees is the handshake reply to its own Close; the writer never
//! writes past that point.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::auth::Authorized;
use super::svr::AppState;
use crate::pipeline::{Aggregator, Batch, JobFeed, Pipeline, Signal};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

pub async fn handle_websocket(
    _auth: Authorized,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    let pipeline = state.pipeline().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, pipeline))
}

async fn handle_socket(socket: WebSocket, pipeline: Pipeline) {
    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    tracing::info!(conn_id, "websocket connected");

    let (sink, stream) = socket.split();
    let (feed, aggregator) = pipeline.start();
    let (payload_tx, payload_rx) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();

    let manager = tokio::spawn(manage_connection(stream, payload_tx, closed.clone(), conn_id));
    let reader = tokio::spawn(read_batches(payload_rx, feed, conn_id));
    let writer = tokio::spawn(write_results(sink, aggregator, closed, conn_id));

    let (manager, reader, writer) = tokio::join!(manager, reader, writer);
    for (task, result) in [("manager", manager), ("reader", reader)] {
        if let Err(err) = result {
            tracing::error!(conn_id, task, error = %err, "websocket task failed");
        }
    }
    match writer {
        Ok(sent) => tracing::info!(conn_id, sent, "websocket disconnected"),
        Err(err) => tracing::error!(conn_id, task = "writer", error = %err, "websocket task failed"),
    }
}

async fn manage_connection(
    mut stream: SplitStream<WebSocket>,
    payloads: mpsc::UnboundedSender<Signal<Bytes>>,
    closed: CancellationToken,
    conn_id: u64,
) {
    // Keep polling after a Close frame so the close reply gets flushed; the
    // stream ends right after.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Binary(payload)) => {
                if !closed.is_cancelled() && payloads.send(Signal::Item(payload)).is_err() {
                    tracing::debug!(conn_id, "reader gone, dropping message");
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id, "connection closed remotely");
                closed.cancel();
            }
            Ok(Message::Text(_)) => {
                tracing::warn!(conn_id, "bad message, not a binary message");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(conn_id, error = %err, "failed to read message from connection");
                break;
            }
        }
    }

    closed.cancel();
    if payloads.send(Signal::Done).is_err() {
        tracing::debug!(conn_id, "reader already finished");
    }
}

async fn read_batches(
    mut payloads: mpsc::UnboundedReceiver<Signal<Bytes>>,
    mut feed: JobFeed,
    conn_id: u64,
) {
    while let Some(Signal::Item(payload)) = payloads.recv().await {
        let batch = match Batch::decode(&payload) {
            Ok(batch) => batch,
            Err(err) => {
                tracing::warn!(conn_id, error = %err, "error reading msg from websocket");
                continue;
            }
        };

        let jobs = batch.len();
        if feed.extend(batch) < jobs {
            tracing::error!(conn_id, "dispatcher stopped while connection is open");
            break;
        }
        tracing::debug!(conn_id, jobs, "queued batch");
    }

    tracing::info!(conn_id, jobs = feed.pushed(), "finished reading from websocket");
    feed.finish();
}

async fn write_results(
    mut sink: SplitSink<WebSocket, Message>,
    mut aggregator: Aggregator,
    closed: CancellationToken,
    conn_id: u64,
) -> usize {
    let mut sent = 0;

    loop {
        let pinned = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            pinned = aggregator.next() => match pinned {
                Some(pinned) => pinned,
                None => break,
            },
        };

        let message = match serde_json::to_vec(&pinned) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(conn_id, job = %pinned.name, error = %err, "failed to serialize result");
                continue;
            }
        };

        tracing::debug!(conn_id, job = %pinned.name, "sending result to client");
        if let Err(err) = sink.send(Message::Binary(message.into())).await {
            tracing::debug!(conn_id, error = %err, "failed to write msg to connection");
            break;
        }
        sent += 1;
    }

    tracing::debug!(conn_id, sent, dropped = aggregator.received().saturating_sub(sent), "finished writing to websocket");
    sent
}
