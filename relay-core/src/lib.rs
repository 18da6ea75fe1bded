//! Message routing and request/response correlation between a host and the
//! web app it embeds in a webview.
//!
//! The embedded app posts [`protocol::InboundMessage`]s. The [`router::Router`]
//! looks the command up in a [`registry::HandlerRegistry`], invokes the
//! matching [`host::HostActions`] capability and, for requests carrying a
//! `requestId`, posts exactly one [`protocol::OutboundMessage`] with the same
//! id. [`client::RelayClient`] is the matching content-side half.

pub mod client;
pub mod correlation;
pub mod host;
pub mod protocol;
pub mod registry;
pub mod router;

pub use client::RelayClient;
pub use host::{HostActions, InputBoxOptions, MessageSeverity};
pub use protocol::{InboundMessage, OutboundMessage, ReplyBody};
pub use registry::{ArgShape, HandlerRegistry, HandlerSpec, RegistryError};
pub use router::{Dispatch, Router};
