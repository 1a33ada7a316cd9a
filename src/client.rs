//! Producer side of the streaming transport.

use std::path::Path;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::ClientError;
use crate::pipeline::{Batch, Pinned};

pub async fn read_jobs(path: &Path) -> Result<Batch, ClientError> {
    let content = tokio::fs::read(path).await?;
    Ok(Batch::decode(&content)?)
}

/// Send every job of `batch` as its own message and hand each reply to
/// `on_reply` as it arrives, then close the connection normally. Returns the
/// number of replies received.
///
/// A job that fails on the server never gets a reply, so without `timeout`
/// this waits forever in that case. Replies received before a timeout or an
/// early close have already been handed out.
pub async fn pin_files<F>(
    addr: &str,
    token: &str,
    batch: Batch,
    timeout: Option<Duration>,
    mut on_reply: F,
) -> Result<usize, ClientError>
where
    F: FnMut(Pinned),
{
    let mut request = addr.into_client_request()?;
    request.headers_mut().insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token))?,
    );

    let (mut ws, _) = connect_async(request).await?;
    tracing::info!(addr, jobs = batch.len(), "connected");

    let expected = batch.len();
    for job in batch {
        // One message per job so the server starts them in parallel.
        let message = Batch::from(vec![job]).encode();
        ws.send(Message::Binary(message.into())).await?;
    }

    let received = receive_replies(&mut ws, expected, timeout, &mut on_reply).await;

    match received {
        Ok(received) => {
            ws.close(Some(normal_close())).await?;
            Ok(received)
        }
        Err(err @ ClientError::Timeout { .. }) => {
            if let Err(close_err) = ws.close(Some(normal_close())).await {
                tracing::debug!(error = %close_err, "failed to close after timeout");
            }
            Err(err)
        }
        Err(err) => Err(err),
    }
}

async fn receive_replies<F>(
    ws: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
    expected: usize,
    timeout: Option<Duration>,
    on_reply: &mut F,
) -> Result<usize, ClientError>
where
    F: FnMut(Pinned),
{
    let mut pbar = tqdm::pbar(Some(expected));
    let mut received = 0;
    while received < expected {
        let next = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, ws.next())
                .await
                .map_err(|_| ClientError::Timeout { received, expected })?,
            None => ws.next().await,
        };

        match next.transpose()? {
            Some(Message::Binary(payload)) => {
                on_reply(serde_json::from_slice::<Pinned>(&payload)?);
                received += 1;
                if let Err(err) = pbar.update(1) {
                    tracing::debug!(error = %err, "failed to draw progress");
                }
            }
            Some(Message::Ping(_) | Message::Pong(_)) => continue,
            Some(Message::Close(_)) | None => {
                return Err(ClientError::Closed { received, expected });
            }
            Some(_) => return Err(ClientError::UnexpectedMessage),
        }
    }

    Ok(received)
}

fn normal_close() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    }
}
