//! Real-time layer: connection registry, event types, and broadcast routing
//!
//! HTTP handlers never talk to sockets directly. They call the
//! [`BroadcastRouter`], which resolves audiences against the
//! [`ConnectionRegistry`] and queues [`ServerEvent`]s onto each
//! connection's outbound channel. The WebSocket tasks in `server::websocket`
//! drain those channels.

pub mod events;
pub mod registry;
pub mod router;

pub use events::{now_iso, ClientMessage, ServerEvent};
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use router::BroadcastRouter;
