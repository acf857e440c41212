//! Keep-alive loop shared by the snapshot WebSockets.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval};

#[derive(Debug, Clone)]
pub struct WsKeepAlive {
    pub ping_interval: Duration,
    /// Close the socket when no pong arrived for this long.
    pub pong_timeout: Duration,
}

impl Default for WsKeepAlive {
    fn default() -> Self {
        Self::for_snapshot_streams()
    }
}

impl WsKeepAlive {
    /// Board and inbox streams sit idle between writes for long stretches.
    pub fn for_snapshot_streams() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(90),
        }
    }
}

/// Forward `data_stream` to the socket until either side ends.
///
/// Pings the client on an interval and answers client pings. Text and binary
/// frames from the client are ignored.
pub async fn run_ws_stream<S, E>(
    socket: WebSocket,
    mut data_stream: S,
    keep_alive: WsKeepAlive,
) -> anyhow::Result<()>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display + Send + Sync + 'static,
{
    let (mut sender, mut receiver) = socket.split();

    let mut ping_interval = interval(keep_alive.ping_interval);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            item = data_stream.next() => {
                match item {
                    Some(Ok(msg)) => {
                        if sender.send(msg).await.is_err() {
                            tracing::debug!("client disconnected during send");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("stream error: {}", e);
                        break;
                    }
                    None => {
                        tracing::debug!("snapshot stream ended");
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => last_pong = Instant::now(),
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("client closed the socket");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(?e, "websocket receive error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            _ = ping_interval.tick() => {
                if last_pong.elapsed() > keep_alive.pong_timeout {
                    tracing::warn!(
                        elapsed_secs = last_pong.elapsed().as_secs(),
                        "WebSocket pong timeout, closing connection"
                    );
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_streams_time_out_after_missed_pings() {
        let ka = WsKeepAlive::default();
        assert_eq!(ka.ping_interval, Duration::from_secs(30));
        assert!(ka.pong_timeout > ka.ping_interval * 2);
    }
}
