use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use log::{debug, trace};
use warp::ws::{Message, WebSocket};

use crate::live_feed::LiveFeed;

/// Serves one observer connection until either side goes away.
///
/// Events from the feed are forwarded as text frames. Anything the client sends
/// is read and ignored, which also lets us notice the close frame.
pub async fn serve_observer(socket: WebSocket, live_feed: Arc<LiveFeed>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (observer_id, mut events) = live_feed.subscribe();

    let forward_events = async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = ws_tx.send(Message::text(event)).await {
                debug!("observer {} write failed: {}", observer_id, e);
                break;
            }
        }
    };

    let drain_client = async move {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(frame) if frame.is_close() => break,
                Ok(_) => trace!("observer {} sent a frame, ignoring", observer_id),
                Err(e) => {
                    debug!("observer {} read failed: {}", observer_id, e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = forward_events => {},
        _ = drain_client => {},
    }

    live_feed.unsubscribe(observer_id);
}
