use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::ports::{FeedError, PendingTxFeed, PendingTxStream, RawTransaction};

const PING_INTERVAL: Duration = Duration::from_secs(25);
const FEED_BUFFER: usize = 4096;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// `eth_subscribe("newPendingTransactions", true)` over a node WebSocket.
///
/// Each call to `subscribe` opens a fresh connection. A background task owns
/// the socket, answers pings and forwards full transaction objects until the
/// socket drops or the returned stream is dropped.
#[derive(Debug, Clone)]
pub struct WsPendingTxFeed {
    ws_url: String,
}

impl WsPendingTxFeed {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }
}

#[async_trait]
impl PendingTxFeed for WsPendingTxFeed {
    async fn subscribe(&self) -> Result<PendingTxStream, FeedError> {
        tracing::info!(url = %self.ws_url, "Connecting to Polygon WSS...");

        let (ws_stream, _response) = connect_async(&self.ws_url)
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        let (mut write, read) = ws_stream.split();

        let subscribe_msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newPendingTransactions", true]
        });
        write
            .send(Message::Text(subscribe_msg.to_string().into()))
            .await
            .map_err(|e| FeedError::Subscribe(e.to_string()))?;

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        tokio::spawn(pump(write, read, tx));

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }
}

/// Drive one connection until it closes or the consumer goes away.
async fn pump(
    mut write: SplitSink<WsStream, Message>,
    mut read: SplitStream<WsStream>,
    tx: mpsc::Sender<Result<RawTransaction, FeedError>>,
) {
    let mut ping_timer = interval(PING_INTERVAL);
    ping_timer.tick().await;

    loop {
        tokio::select! {
            msg = read.next() => {
                let forwarded = match msg {
                    Some(Ok(Message::Text(text))) => match parse_rpc_message(text.as_str()) {
                        RpcMessage::Transaction(raw) => tx.send(Ok(*raw)).await.is_ok(),
                        RpcMessage::Rejected(reason) => {
                            let _ = tx.send(Err(FeedError::Subscribe(reason))).await;
                            false
                        }
                        RpcMessage::Confirmed(id) => {
                            tracing::debug!(subscription = %id, "Pending tx subscription confirmed");
                            true
                        }
                        RpcMessage::Other => true,
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            tracing::warn!(error = %e, "Failed to send pong");
                            false
                        } else {
                            true
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        let _ = tx.send(Err(FeedError::Stream("server sent close frame".into()))).await;
                        false
                    }
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        let _ = tx.send(Err(FeedError::Stream(e.to_string()))).await;
                        false
                    }
                    None => false,
                };
                if !forwarded {
                    break;
                }
            }
            _ = ping_timer.tick() => {
                if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                    tracing::warn!(error = %e, "Failed to send ping");
                    break;
                }
            }
            _ = tx.closed() => break,
        }
    }

    let _ = write.close().await;
}

#[derive(Debug)]
enum RpcMessage {
    Transaction(Box<RawTransaction>),
    Confirmed(String),
    Rejected(String),
    Other,
}

/// Classify one JSON-RPC frame:
/// - `{"id":1,"result":"0x…"}` subscription ack
/// - `{"id":1,"error":{…}}` subscription rejected
/// - `{"method":"eth_subscription","params":{"result":{…tx…}}}` notification
fn parse_rpc_message(text: &str) -> RpcMessage {
    let msg: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return RpcMessage::Other,
    };

    if msg.get("id").is_some() {
        if let Some(err) = msg.get("error") {
            return RpcMessage::Rejected(err.to_string());
        }
        if let Some(result) = msg.get("result") {
            return RpcMessage::Confirmed(result.as_str().unwrap_or_default().to_string());
        }
    }

    let Some(result) = msg.get("params").and_then(|p| p.get("result")) else {
        return RpcMessage::Other;
    };

    // Nodes without full-transaction support send bare hashes.
    if result.is_string() {
        tracing::trace!(hash = %result, "Hash-only pending tx notification ignored");
        return RpcMessage::Other;
    }

    match serde_json::from_value::<RawTransaction>(result.clone()) {
        Ok(raw) => RpcMessage::Transaction(Box::new(raw)),
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable pending tx notification");
            RpcMessage::Other
        }
    }
}
