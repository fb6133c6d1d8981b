//! Per-session presentation queue.
//!
//! Delivery rules:
//! 1. Priority order, FIFO within a priority by `created_at`.
//! 2. After a message is fully presented (voice finished and toast gone),
//!    an incoming message of equal or lower priority waits out its own
//!    cooldown (critical 0s, high 3s, medium 5s, low 8s, info 10s). A
//!    higher-priority message starts without waiting.
//! 3. A critical arriving during a non-critical presentation starts as
//!    soon as the current voice finishes; it never interrupts
//!    mid-utterance, and it does not wait for the toast auto-dismiss.
//! 4. Dequeue only when no voice is playing and the cooldown elapsed.
//! 5. Toasts auto-dismiss after a fixed visual duration, or earlier on
//!    user action; when voice outlasts the toast the slot is held until
//!    voice completes.
//! 6. Surfaced ids are remembered so reconnect replay is suppressed.
//!
//! The machine is driven with explicit `Instant`s so tests control time.
//! Phases follow Idle -> Dequeued -> Speaking -> Visible -> Cooldown ->
//! Idle; Dequeued is instantaneous and Cooldown is implicit in the
//! last-presentation record (its length depends on the next message).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use argus_core::{Notification, Priority};

/// Per-priority cooldown table, overridable from configuration.
#[derive(Debug, Clone)]
pub struct Cooldowns {
    pub critical: Duration,
    pub high: Duration,
    pub medium: Duration,
    pub low: Duration,
    pub info: Duration,
}

impl Default for Cooldowns {
    fn default() -> Self {
        Self {
            critical: Priority::Critical.cooldown(),
            high: Priority::High.cooldown(),
            medium: Priority::Medium.cooldown(),
            low: Priority::Low.cooldown(),
            info: Priority::Info.cooldown(),
        }
    }
}

impl Cooldowns {
    #[must_use]
    pub fn get(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
            Priority::Info => self.info,
        }
    }
}

/// Queue tuning.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Toast auto-dismiss duration.
    pub visual_duration: Duration,
    /// Voice estimate per summary word, for clients that never ack.
    pub secs_per_word: f64,
    /// Bounds on the voice estimate.
    pub min_voice: Duration,
    pub max_voice: Duration,
    pub cooldowns: Cooldowns,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visual_duration: Duration::from_secs(5),
            secs_per_word: 0.4,
            min_voice: Duration::from_secs(1),
            max_voice: Duration::from_secs(20),
            cooldowns: Cooldowns::default(),
        }
    }
}

/// Observable phase of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,
    /// Voice playing, toast visible.
    Speaking,
    /// Voice done, toast still visible.
    Visible,
}

/// The active presentation.
#[derive(Debug, Clone)]
struct Active {
    id: String,
    priority: Priority,
    started: Instant,
    /// When the voice is expected (or known) to finish.
    voice_until: Instant,
    /// When the toast auto-dismisses (never before the voice ends).
    visible_until: Instant,
    voice_done: bool,
}

/// Per-session presentation queue.
pub struct PresentationQueue {
    config: QueueConfig,
    /// Pending notifications, highest priority first, FIFO within equal
    /// priority (stable insertion by `created_at`).
    pending: Vec<Notification>,
    active: Option<Active>,
    /// Priority and completion time of the last full presentation.
    last_presented: Option<(Priority, Instant)>,
    /// Ids ever surfaced on this session (client dedup).
    surfaced: HashSet<String>,
}

impl PresentationQueue {
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            active: None,
            last_presented: None,
            surfaced: HashSet::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> QueuePhase {
        match &self.active {
            None => QueuePhase::Idle,
            Some(a) if a.voice_done => QueuePhase::Visible,
            Some(_) => QueuePhase::Speaking,
        }
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Seed the surfaced set from a client `sync` frame so reconnect
    /// replay does not resurrect dismissed toasts.
    pub fn seed_surfaced(&mut self, ids: impl IntoIterator<Item = String>) {
        self.surfaced.extend(ids);
        // Anything already queued that the client dismissed is dropped.
        let surfaced = &self.surfaced;
        self.pending.retain(|n| !surfaced.contains(&n.id));
    }

    /// Enqueue a notification. Duplicates (already surfaced or already
    /// queued) are suppressed and `false` is returned.
    pub fn enqueue(&mut self, notification: Notification) -> bool {
        if self.surfaced.contains(&notification.id)
            || self.pending.iter().any(|n| n.id == notification.id)
            || self
                .active
                .as_ref()
                .is_some_and(|a| a.id == notification.id)
        {
            trace!(id = %notification.id, "Duplicate suppressed at client queue");
            return false;
        }

        // Insert before the first entry that ranks strictly lower;
        // equal-priority entries keep arrival order (FIFO by created_at,
        // which is monotonic in arrival).
        let position = self
            .pending
            .iter()
            .position(|n| {
                n.priority < notification.priority
                    || (n.priority == notification.priority
                        && n.created_at > notification.created_at)
            })
            .unwrap_or(self.pending.len());
        self.pending.insert(position, notification);
        true
    }

    /// Voice length estimate from the spoken text.
    fn voice_estimate(&self, notification: &Notification) -> Duration {
        let text = notification
            .summarized_message
            .as_deref()
            .unwrap_or(&notification.title);
        let words = text.split_whitespace().count().max(1);
        let estimate = Duration::from_secs_f64(words as f64 * self.config.secs_per_word);
        estimate.clamp(self.config.min_voice, self.config.max_voice)
    }

    /// Client reported the voice finished for `id`.
    pub fn ack_voice_done(&mut self, id: &str, now: Instant) {
        let visual = self.config.visual_duration;
        if let Some(active) = &mut self.active {
            if active.id == id && !active.voice_done {
                active.voice_done = true;
                active.voice_until = now;
                // The toast still honors its visual duration from start,
                // but never ends before the (real) voice did.
                active.visible_until = (active.started + visual).max(now);
            }
        }
    }

    /// User acted on the toast; the slot frees immediately.
    pub fn ack_dismissed(&mut self, id: &str, now: Instant) {
        if let Some(active) = self.active.take() {
            if active.id != id {
                self.active = Some(active);
                return;
            }
            self.last_presented = Some((active.priority, now));
            debug!(%id, "Presentation dismissed by user");
        }
    }

    /// May a message of `priority` start now?
    fn cooldown_allows(&self, priority: Priority, now: Instant) -> bool {
        match self.last_presented {
            None => true,
            // A strictly higher priority bypasses the previous message's
            // cooldown window entirely.
            Some((prev, _)) if priority > prev => true,
            Some((_, finished_at)) => now >= finished_at + self.config.cooldowns.get(priority),
        }
    }

    /// Advance timers and start the next presentation when allowed.
    ///
    /// Returns the notification to present when a dequeue happens.
    pub fn poll(&mut self, now: Instant) -> Option<Notification> {
        // Advance the active presentation through voice/visible expiry.
        if let Some(mut active) = self.active.take() {
            if !active.voice_done && now >= active.voice_until {
                active.voice_done = true;
            }

            let preempt_ready = active.voice_done
                && active.priority < Priority::Critical
                && self
                    .pending
                    .first()
                    .is_some_and(|n| n.priority == Priority::Critical);

            if preempt_ready {
                // Critical preemption: the toast is cut at voice end.
                self.last_presented = Some((active.priority, now));
                debug!(id = %active.id, "Presentation cut short for critical arrival");
            } else if active.voice_done && now >= active.visible_until {
                self.last_presented = Some((active.priority, now.max(active.visible_until)));
            } else {
                // Voice or toast still holding the slot.
                self.active = Some(active);
                return None;
            }
        }

        // Idle: try to start the head of the queue. Entries are priority
        // ordered and cooldowns grow as priority drops, so if the head
        // cannot start nothing behind it can either.
        let head_priority = self.pending.first()?.priority;
        if !self.cooldown_allows(head_priority, now) {
            return None;
        }

        let notification = self.pending.remove(0);
        let voice = self.voice_estimate(&notification);
        let visible = self.config.visual_duration.max(voice);
        self.surfaced.insert(notification.id.clone());
        self.active = Some(Active {
            id: notification.id.clone(),
            priority: notification.priority,
            started: now,
            voice_until: now + voice,
            visible_until: now + visible,
            voice_done: false,
        });
        debug!(id = %notification.id, priority = %notification.priority, "Presentation started");
        Some(notification)
    }

    /// Next instant at which `poll` could change state, for the session
    /// timer. `None` when idle with an empty queue.
    #[must_use]
    pub fn next_wakeup(&self, now: Instant) -> Option<Instant> {
        if let Some(active) = &self.active {
            if !active.voice_done {
                return Some(active.voice_until);
            }
            // Visible: a queued critical preempts immediately.
            if self
                .pending
                .first()
                .is_some_and(|n| n.priority == Priority::Critical)
                && active.priority < Priority::Critical
            {
                return Some(now);
            }
            return Some(active.visible_until);
        }
        let head = self.pending.first()?;
        let at = match self.last_presented {
            None => now,
            Some((prev, _)) if head.priority > prev => now,
            Some((_, finished_at)) => finished_at + self.config.cooldowns.get(head.priority),
        };
        Some(at.max(now))
    }
}
