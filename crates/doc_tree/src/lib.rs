//! Publication tree model
//!
//! This crate provides the document tree of a structured multimedia
//! publication: nodes carrying XML and channel/media properties, a mutation
//! API that keeps an incremental flattened-text cache exact, navigation
//! queries and an HTML5-style outline builder.

mod config;
mod direction;
mod error;
mod event;
mod media;
mod mutation;
mod navigation;
mod node;
mod node_id;
mod outline;
mod presentation;
mod property;
mod snapshot;
mod text_cache;

pub use config::*;
pub use direction::*;
pub use error::*;
pub use event::*;
pub use media::*;
pub use navigation::*;
pub use node::*;
pub use node_id::*;
pub use outline::*;
pub use presentation::*;
pub use property::*;
pub use snapshot::*;
pub use text_cache::*;
