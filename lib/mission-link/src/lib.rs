//! MissionLink: a reliable, ordered, application-layer transport over UDP connecting
//! Mother Ship to its rover fleet. Stop-and-wait delivery, adaptive RTT-based timeouts,
//! a bounded per-peer reorder buffer, and a four-way teardown.

pub mod callbacks;
pub mod error;
pub mod limits;
pub mod link;
pub mod reorder;
pub mod rtt;
pub mod socket;
pub mod validator;
pub mod wire;

pub use callbacks::{MissionCallbacks, NoopCallbacks};
pub use error::{MlError, MlResult};
pub use limits::Limits;
pub use link::{MissionLink, Payload, ReceivedBody, ReceivedMessage, INITIAL_SEQ};
pub use validator::Mission;
pub use wire::Op;
