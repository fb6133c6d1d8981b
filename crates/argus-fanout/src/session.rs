//! Notification-topic session: presentation queue + liveness + buffered
//! sends.
//!
//! The gateway's WebSocket task feeds this machine store events, client
//! frames and timer ticks, and flushes `drain()` to the socket after each
//! step. Closing decisions (lagging, missed pings) surface as errors or a
//! `false` liveness result; the gateway owns the actual socket close.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;

use argus_core::MutationEvent;
use argus_telemetry::metrics::{PRESENTATION_DELAY_SECONDS, SESSIONS_LAGGING_TOTAL};

use crate::error::{FanoutError, Result};
use crate::queue::{PresentationQueue, QueueConfig};
use crate::types::{ClientFrame, OutboundFrame, Topic};

/// Fan-out configuration shared by all topics.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Liveness ping cadence.
    pub ping_interval: std::time::Duration,
    /// Consecutive unanswered pings before the session is closed.
    pub max_missed_pings: u32,
    /// Per-session outbound buffer (frames).
    pub send_buffer: usize,
    pub queue: QueueConfig,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            ping_interval: std::time::Duration::from_secs(30),
            max_missed_pings: 2,
            send_buffer: 256,
            queue: QueueConfig::default(),
        }
    }
}

/// Bounded outbound frame buffer.
///
/// When full, the oldest non-critical frame is dropped first. A critical
/// frame that cannot be buffered closes the session (`SessionLagging`);
/// it is never dropped silently.
pub struct SendBuffer {
    frames: VecDeque<OutboundFrame>,
    cap: usize,
}

impl SendBuffer {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(cap.min(64)),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, frame: OutboundFrame) -> Result<()> {
        if self.frames.len() >= self.cap {
            if let Some(index) = self.frames.iter().position(|f| !f.is_critical()) {
                let dropped = self.frames.remove(index);
                debug!(?dropped, "Send buffer full, dropped oldest non-critical frame");
            } else if frame.is_critical() {
                SESSIONS_LAGGING_TOTAL.inc();
                return Err(FanoutError::SessionLagging);
            } else {
                // Buffer full of criticals; the incoming non-critical is
                // the one that gives way.
                debug!("Send buffer full of critical frames, dropped incoming frame");
                return Ok(());
            }
        }
        self.frames.push_back(frame);
        Ok(())
    }

    /// Take everything currently buffered.
    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        self.frames.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Per-connection state for the notifications topic.
pub struct NotificationSession {
    session_id: String,
    queue: PresentationQueue,
    buffer: SendBuffer,
    pings_outstanding: u32,
    max_missed_pings: u32,
}

impl NotificationSession {
    /// Create a session; the `connected` control frame is queued
    /// immediately.
    #[must_use]
    pub fn new(config: &FanoutConfig) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let mut buffer = SendBuffer::new(config.send_buffer);
        // Buffer is empty here; the push cannot fail.
        let _ = buffer.push(OutboundFrame::Connected {
            session_id: session_id.clone(),
            topic: Topic::Notifications,
        });
        Self {
            session_id,
            queue: PresentationQueue::new(config.queue.clone()),
            buffer,
            pings_outstanding: 0,
            max_missed_pings: config.max_missed_pings,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Feed a store mutation event. `Created` notifications go through
    /// the presentation queue; other mutations are forwarded directly so
    /// the client can reconcile.
    pub fn on_event(&mut self, event: MutationEvent, now: Instant) -> Result<()> {
        match event {
            MutationEvent::Created { notification } => {
                self.queue.enqueue(*notification);
                self.advance(now)
            }
            other => self.buffer.push(OutboundFrame::Mutation { event: other }),
        }
    }

    /// Feed a raw client text frame. `ping` earns a `pong`; `ack` and
    /// `sync` drive the presentation queue. Malformed frames get an error
    /// frame back and the connection stays open.
    pub fn on_client_text(&mut self, raw: &str, now: Instant) -> Result<()> {
        self.pings_outstanding = 0;
        match ClientFrame::parse(raw) {
            Ok(None) => self.buffer.push(OutboundFrame::Pong)?,
            Ok(Some(ClientFrame::Ack { id, phase })) => {
                match phase.as_str() {
                    "voice_done" => self.queue.ack_voice_done(&id, now),
                    "dismissed" => self.queue.ack_dismissed(&id, now),
                    other => {
                        self.buffer.push(OutboundFrame::Error {
                            error_code: "invalid_input".to_string(),
                            message: format!("unknown ack phase {other}"),
                        })?;
                    }
                }
                self.advance(now)?;
            }
            Ok(Some(ClientFrame::Sync { dismissed_ids })) => {
                self.queue.seed_surfaced(dismissed_ids);
            }
            Ok(Some(_)) => {
                self.buffer.push(OutboundFrame::Error {
                    error_code: "invalid_input".to_string(),
                    message: "subscriptions are not supported on this topic".to_string(),
                })?;
            }
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "Bad client frame");
                self.buffer.push(OutboundFrame::Error {
                    error_code: "invalid_input".to_string(),
                    message: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    /// Timer tick: advance the presentation queue.
    pub fn on_tick(&mut self, now: Instant) -> Result<()> {
        self.advance(now)
    }

    /// Liveness timer fired. Returns `false` when the session missed too
    /// many consecutive pings and must be closed.
    pub fn liveness_tick(&mut self) -> bool {
        if self.pings_outstanding >= self.max_missed_pings {
            return false;
        }
        self.pings_outstanding += 1;
        let _ = self.buffer.push(OutboundFrame::Ping);
        true
    }

    /// Earliest instant the queue needs another tick.
    #[must_use]
    pub fn next_wakeup(&self, now: Instant) -> Option<Instant> {
        self.queue.next_wakeup(now)
    }

    /// Frames ready for the socket.
    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        self.buffer.drain()
    }

    fn advance(&mut self, now: Instant) -> Result<()> {
        while let Some(notification) = self.queue.poll(now) {
            let delay = (chrono::Utc::now() - notification.created_at)
                .to_std()
                .unwrap_or_default();
            PRESENTATION_DELAY_SECONDS
                .with_label_values(&[&notification.priority.to_string()])
                .observe(delay.as_secs_f64());
            self.buffer.push(OutboundFrame::Notification {
                notification: Box::new(notification),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{Notification, NotificationType, Priority, Source};
    use chrono::Utc;
    use std::collections::HashMap;

    fn notification(id: &str, priority: Priority) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationType::NewsEvent,
            priority,
            source: Source::News,
            title: "t".to_string(),
            message: "m".to_string(),
            summarized_message: Some("short summary".to_string()),
            symbol: None,
            confidence_score: None,
            urgency_score: None,
            promise_score: None,
            metadata: HashMap::new(),
            actions: Vec::new(),
            created_at: Utc::now(),
            read: false,
            responded: false,
            response_action: None,
            dedup_key: format!("news:{id}"),
        }
    }

    fn created(id: &str, priority: Priority) -> MutationEvent {
        MutationEvent::Created {
            notification: Box::new(notification(id, priority)),
        }
    }

    #[test]
    fn test_connected_frame_first() {
        let mut session = NotificationSession::new(&FanoutConfig::default());
        let frames = session.drain();
        assert!(matches!(frames[0], OutboundFrame::Connected { .. }));
    }

    #[test]
    fn test_created_event_presents_through_queue() {
        let mut session = NotificationSession::new(&FanoutConfig::default());
        session.drain();
        let now = Instant::now();

        session.on_event(created("n1", Priority::Medium), now).unwrap();
        let frames = session.drain();
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], OutboundFrame::Notification { .. }));
    }

    #[test]
    fn test_mutation_events_bypass_queue() {
        let mut session = NotificationSession::new(&FanoutConfig::default());
        session.drain();
        let now = Instant::now();

        session
            .on_event(MutationEvent::Read { id: "n1".to_string() }, now)
            .unwrap();
        let frames = session.drain();
        assert!(matches!(frames[0], OutboundFrame::Mutation { .. }));
    }

    #[test]
    fn test_ping_gets_pong_and_resets_liveness() {
        let mut session = NotificationSession::new(&FanoutConfig::default());
        session.drain();
        let now = Instant::now();

        assert!(session.liveness_tick());
        assert!(session.liveness_tick()); // second ping still tolerated
        session.on_client_text("ping", now).unwrap();

        let frames = session.drain();
        assert!(frames.iter().any(|f| matches!(f, OutboundFrame::Pong)));
        // Answered: liveness restarts.
        assert!(session.liveness_tick());
    }

    #[test]
    fn test_two_missed_pings_close() {
        let mut session = NotificationSession::new(&FanoutConfig::default());
        assert!(session.liveness_tick());
        assert!(session.liveness_tick());
        assert!(!session.liveness_tick());
    }

    #[test]
    fn test_bad_frame_keeps_connection() {
        let mut session = NotificationSession::new(&FanoutConfig::default());
        session.drain();
        session.on_client_text("{broken", Instant::now()).unwrap();
        let frames = session.drain();
        assert!(matches!(frames[0], OutboundFrame::Error { .. }));
    }

    #[test]
    fn test_buffer_drops_noncritical_first() {
        let mut buffer = SendBuffer::new(2);
        buffer.push(OutboundFrame::Pong).unwrap();
        buffer
            .push(OutboundFrame::Notification {
                notification: Box::new(notification("c", Priority::Critical)),
            })
            .unwrap();

        // Full: pushing drops the pong, keeps the critical.
        buffer.push(OutboundFrame::Pong).unwrap();
        let frames = buffer.drain();
        assert_eq!(frames.len(), 2);
        assert!(frames
            .iter()
            .any(|f| matches!(f, OutboundFrame::Notification { .. })));
    }

    #[test]
    fn test_unbufferable_critical_is_lagging() {
        let mut buffer = SendBuffer::new(1);
        buffer
            .push(OutboundFrame::Notification {
                notification: Box::new(notification("c1", Priority::Critical)),
            })
            .unwrap();
        let result = buffer.push(OutboundFrame::Notification {
            notification: Box::new(notification("c2", Priority::Critical)),
        });
        assert!(matches!(result, Err(FanoutError::SessionLagging)));
    }

    #[test]
    fn test_sync_suppresses_replay() {
        let mut session = NotificationSession::new(&FanoutConfig::default());
        session.drain();
        let now = Instant::now();

        session
            .on_client_text("{\"type\":\"sync\",\"dismissed_ids\":[\"n1\"]}", now)
            .unwrap();
        session.on_event(created("n1", Priority::Medium), now).unwrap();
        assert!(session.drain().is_empty());
    }
}
