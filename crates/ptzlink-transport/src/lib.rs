//! Control channel to the camera.
//!
//! One [`SessionManager`] owns one [`ViscaLink`]. Callers submit encoded
//! messages into a small [`CommandQueue`]; a single worker drains it, so two
//! messages never share the socket at the same time.
//!
//! ```text
//! submit ──► CommandQueue (coalesces per lane) ──► worker ──► ViscaLink::send
//!   ▲                                                              │
//!   └──────────────── Ticket ◄── Dispatch ◄────────────────────────┘
//! ```

pub mod link;
pub mod mock;
pub mod queue;
pub mod session;

pub use link::{Delivery, UdpViscaLink, ViscaLink};
pub use mock::{LinkBehavior, RecordingLink};
pub use queue::{CommandQueue, Dispatch, Lane, Ticket};
pub use session::{LinkHealth, PingReport, SessionManager};
