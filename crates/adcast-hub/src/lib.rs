//! Real-time ad broadcast hub.
//!
//! ```text
//!   Ticker ──submit(ad)──┐
//!                        ▼
//!   SessionHandler ──register/unregister──► Coordinator (owns ClientRegistry)
//!        ▲                                       │
//!        └──────── mailbox (bounded mpsc) ◄──────┘ try_send, drop on full
//! ```
//!
//! The coordinator is the only task that touches the registry. Every other
//! party talks to it through [`HubHandle`], so registration, deregistration
//! and fan-out are applied one at a time in arrival order without locks.
//! Each session owns the receiving half of its mailbox; the registry owns the
//! only sender, so removing an entry is what closes the mailbox.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod hub;
pub mod registry;
pub mod session;
pub mod ticker;

pub use catalog::{AdCatalog, StaticCatalog};
pub use coordinator::{HubHandle, HubStats, Subscription};
pub use error::{HubError, SinkError};
pub use hub::{AdHub, HubConfig};
pub use registry::{ClientRegistry, FanOutReport};
pub use session::{AdSink, CloseReason, SessionHandler, SessionOutcome, SessionState};
pub use ticker::Ticker;
