//! WebSocket topic handlers.
//!
//! Each connection runs its own task driving the sans-IO session machines
//! from `argus-fanout`. Client disconnects are a normal exit path; only a
//! lagging send buffer or missed liveness pings close a session from the
//! server side.

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use argus_fanout::{
    MarketDataSession, NotificationSession, OutboundFrame, PriceSession, Topic,
};
use argus_market::{MarketData, Timeframe};
use argus_telemetry::metrics::WS_SESSIONS;

use crate::state::AppState;

/// Inbound liveness bookkeeping shared by the simpler topics.
struct Liveness {
    outstanding: u32,
    max_missed: u32,
}

impl Liveness {
    fn new(max_missed: u32) -> Self {
        Self {
            outstanding: 0,
            max_missed,
        }
    }

    fn seen(&mut self) {
        self.outstanding = 0;
    }

    /// Returns `false` when the session should be closed.
    fn tick(&mut self) -> bool {
        if self.outstanding >= self.max_missed {
            return false;
        }
        self.outstanding += 1;
        true
    }
}

fn text_message(frame: &OutboundFrame) -> Message {
    Message::Text(frame.to_json().into())
}

// ---------------------------------------------------------------------------
// /ws/notifications
// ---------------------------------------------------------------------------

pub async fn ws_notifications(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| notifications_loop(socket, state))
}

async fn notifications_loop(socket: WebSocket, state: AppState) {
    let gauge = WS_SESSIONS.with_label_values(&[Topic::Notifications.as_str()]);
    gauge.inc();

    let mut events = state.store.subscribe();
    let mut session = NotificationSession::new(&state.config.fanout);
    let session_id = session.session_id().to_string();
    info!(session = %session_id, "Notification session connected");

    let (mut sink, mut stream) = socket.split();
    let mut ping = tokio::time::interval(state.config.fanout.ping_interval);
    ping.tick().await; // first tick is immediate

    'session: loop {
        // Flush whatever the machine produced in the previous step.
        for frame in session.drain() {
            if sink.send(text_message(&frame)).await.is_err() {
                debug!(session = %session_id, "Client gone during send");
                break 'session;
            }
        }

        let now = Instant::now();
        let queue_sleep = session.next_wakeup(now);

        let step = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => session.on_event(event, Instant::now()),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(session = %session_id, skipped = n, "Session lagged on event bus");
                    Ok(())
                }
                Err(broadcast::error::RecvError::Closed) => break 'session,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => session.on_client_text(&text, Instant::now()),
                Some(Ok(Message::Close(_))) | None => {
                    debug!(session = %session_id, "Client disconnected");
                    break 'session;
                }
                Some(Ok(_)) => Ok(()), // transport ping/pong/binary
                Some(Err(e)) => {
                    debug!(session = %session_id, error = %e, "WebSocket receive error");
                    break 'session;
                }
            },
            () = sleep_until_opt(queue_sleep) => session.on_tick(Instant::now()),
            _ = ping.tick() => {
                if session.liveness_tick() {
                    Ok(())
                } else {
                    info!(session = %session_id, "Liveness pings missed, closing session");
                    break 'session;
                }
            }
        };

        if step.is_err() {
            // Send buffer overflowed with a critical frame pending.
            warn!(session = %session_id, "Session lagging, closing");
            let _ = sink.send(text_message(&OutboundFrame::Lagging)).await;
            let _ = sink.send(Message::Close(None)).await;
            break 'session;
        }
    }

    gauge.dec();
    info!(session = %session_id, "Notification session closed");
}

/// Sleep until `at`, or forever when there is nothing scheduled.
async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// /ws/prices
// ---------------------------------------------------------------------------

pub async fn ws_prices(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| prices_loop(socket, state))
}

async fn prices_loop(socket: WebSocket, state: AppState) {
    let gauge = WS_SESSIONS.with_label_values(&[Topic::Prices.as_str()]);
    gauge.inc();

    let session_id = Uuid::new_v4().to_string();
    let mut ticks = state.price_bus.subscribe();
    let mut session = PriceSession::new();
    let mut liveness = Liveness::new(state.config.fanout.max_missed_pings);

    let (mut sink, mut stream) = socket.split();
    let connected = OutboundFrame::Connected {
        session_id: session_id.clone(),
        topic: Topic::Prices,
    };
    if sink.send(text_message(&connected)).await.is_err() {
        gauge.dec();
        return;
    }

    let mut ping = tokio::time::interval(state.config.fanout.ping_interval);
    ping.tick().await;

    'session: loop {
        tokio::select! {
            tick = ticks.recv() => match tick {
                Ok(tick) => {
                    if let Some(frame) = session.on_tick(&tick) {
                        if sink.send(text_message(&frame)).await.is_err() {
                            break 'session;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(session = %session_id, skipped = n, "Price session lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break 'session,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    liveness.seen();
                    let reply = handle_subscription_text(&text, |symbols| session.subscribe(symbols));
                    if let Some(frame) = reply {
                        if sink.send(text_message(&frame)).await.is_err() {
                            break 'session;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break 'session,
                Some(Ok(_)) => liveness.seen(),
                Some(Err(e)) => {
                    debug!(session = %session_id, error = %e, "WebSocket receive error");
                    break 'session;
                }
            },
            _ = ping.tick() => {
                if !liveness.tick() {
                    info!(session = %session_id, "Liveness pings missed, closing price session");
                    break 'session;
                }
                if sink.send(text_message(&OutboundFrame::Ping)).await.is_err() {
                    break 'session;
                }
            }
        }
    }

    gauge.dec();
    debug!(session = %session_id, "Price session closed");
}

/// Shared text handling for the subscription topics: `ping` gets a pong,
/// `subscribe:*` / JSON subscribe frames update the set, anything else
/// earns a non-fatal error frame.
fn handle_subscription_text(
    text: &str,
    mut subscribe: impl FnMut(Vec<String>) -> OutboundFrame,
) -> Option<OutboundFrame> {
    use argus_fanout::ClientFrame;
    match ClientFrame::parse(text) {
        Ok(None) => Some(OutboundFrame::Pong),
        Ok(Some(ClientFrame::Subscribe { symbols })) => Some(subscribe(symbols)),
        Ok(Some(_)) => Some(OutboundFrame::Error {
            error_code: "invalid_input".to_string(),
            message: "unsupported frame for this topic".to_string(),
        }),
        Err(e) => Some(OutboundFrame::Error {
            error_code: "invalid_input".to_string(),
            message: e.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// /ws/market-data
// ---------------------------------------------------------------------------

pub async fn ws_market_data(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| market_data_loop(socket, state))
}

async fn market_data_loop(socket: WebSocket, state: AppState) {
    let gauge = WS_SESSIONS.with_label_values(&[Topic::MarketData.as_str()]);
    gauge.inc();

    let session_id = Uuid::new_v4().to_string();
    let mut ticks = state.price_bus.subscribe();
    let mut session = MarketDataSession::new();
    let mut liveness = Liveness::new(state.config.fanout.max_missed_pings);

    let (mut sink, mut stream) = socket.split();
    let connected = OutboundFrame::Connected {
        session_id: session_id.clone(),
        topic: Topic::MarketData,
    };
    if sink.send(text_message(&connected)).await.is_err() {
        gauge.dec();
        return;
    }

    let mut ping = tokio::time::interval(state.config.fanout.ping_interval);
    ping.tick().await;
    let mut ohlcv = tokio::time::interval(state.config.ohlcv_push_interval);
    ohlcv.tick().await;

    'session: loop {
        tokio::select! {
            tick = ticks.recv() => match tick {
                Ok(tick) => {
                    if let Some(frame) = session.on_tick(&tick) {
                        if sink.send(text_message(&frame)).await.is_err() {
                            break 'session;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(session = %session_id, skipped = n, "Market-data session lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break 'session,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    liveness.seen();
                    if let Some(frame) = handle_market_data_text(&text, &mut session) {
                        if sink.send(text_message(&frame)).await.is_err() {
                            break 'session;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break 'session,
                Some(Ok(_)) => liveness.seen(),
                Some(Err(e)) => {
                    debug!(session = %session_id, error = %e, "WebSocket receive error");
                    break 'session;
                }
            },
            _ = ohlcv.tick() => {
                for frame in ohlcv_updates(&state, &session).await {
                    if sink.send(text_message(&frame)).await.is_err() {
                        break 'session;
                    }
                }
            }
            _ = ping.tick() => {
                if !liveness.tick() {
                    info!(session = %session_id, "Liveness pings missed, closing market-data session");
                    break 'session;
                }
                if sink.send(text_message(&OutboundFrame::Ping)).await.is_err() {
                    break 'session;
                }
            }
        }
    }

    gauge.dec();
    debug!(session = %session_id, "Market-data session closed");
}

fn handle_market_data_text(text: &str, session: &mut MarketDataSession) -> Option<OutboundFrame> {
    use argus_fanout::ClientFrame;
    match ClientFrame::parse(text) {
        Ok(None) => Some(OutboundFrame::Pong),
        Ok(Some(ClientFrame::Subscribe { symbols })) => Some(session.subscribe(symbols)),
        Ok(Some(ClientFrame::Unsubscribe { symbols })) => Some(session.unsubscribe(symbols)),
        Ok(Some(_)) => Some(OutboundFrame::Error {
            error_code: "invalid_input".to_string(),
            message: "unsupported frame for this topic".to_string(),
        }),
        Err(e) => Some(OutboundFrame::Error {
            error_code: "invalid_input".to_string(),
            message: e.to_string(),
        }),
    }
}

/// Rolling candle tails for every subscribed symbol. Fetch failures are
/// logged and skipped; the session stays healthy.
async fn ohlcv_updates(state: &AppState, session: &MarketDataSession) -> Vec<OutboundFrame> {
    let mut frames = Vec::new();
    for symbol in session.subscribed_symbols() {
        match state
            .market
            .ohlcv(&symbol, Timeframe::H1, state.config.ohlcv_tail)
            .await
        {
            Ok(candles) => frames.push(OutboundFrame::OhlcvUpdate {
                symbol,
                timeframe: Timeframe::H1.to_string(),
                candles: candles
                    .into_iter()
                    .map(|c| argus_fanout::types::CandleFrame {
                        timestamp_ms: c.timestamp_ms,
                        open: c.open,
                        high: c.high,
                        low: c.low,
                        close: c.close,
                        volume: c.volume,
                    })
                    .collect(),
            }),
            Err(e) => {
                warn!(%symbol, error = %e, "OHLCV fetch for market-data push failed");
            }
        }
    }
    frames
}
