//! Delivery fan-out: topics, session state machines and the per-session
//! presentation queue.
//!
//! The state in this crate is sans-IO: session structs consume store
//! mutation events, price ticks and client frames, and produce outbound
//! frames. The WebSocket tasks in the gateway own the sockets and drive
//! these machines, which keeps the delivery rules (priority order,
//! cooldowns, preemption, liveness, backpressure) unit-testable without a
//! network.

pub mod error;
pub mod market;
pub mod queue;
pub mod session;
pub mod types;

pub use error::{FanoutError, Result};
pub use market::{MarketDataSession, PriceSession};
pub use queue::{Cooldowns, PresentationQueue, QueueConfig, QueuePhase};
pub use session::{FanoutConfig, NotificationSession, SendBuffer};
pub use types::{ClientFrame, OutboundFrame, Topic};
