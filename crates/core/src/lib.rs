//! # Nami Core
//!
//! Domain types, traits, and error definitions for the Nami attention router.
//! It defines the domain model that all other crates implement against and
//! depends on no other Nami crate.
//!
//! ## Design Philosophy
//!
//! Every collaborator outside the routing core (language model, chat client,
//! TTS engine, dashboard) is a trait here. Implementations live in their
//! respective crates, and tests swap in recording stubs.

pub mod error;
pub mod event;
pub mod input;
pub mod message;
pub mod provider;
pub mod reply;
pub mod sink;
pub mod source;

// Re-export key types at crate root for ergonomics
pub use error::{Error, IngestError, ProviderError, Result, SinkError};
pub use event::{DomainEvent, DropReason, EventBus};
pub use input::{EventMetadata, InputEvent, MediaKind, SourceInfo};
pub use message::{Conversation, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use reply::{ContextSource, ReplyGenerator};
pub use sink::{ChatSink, NullUi, Speaker, UiSink};
pub use source::{ContextCategory, ConversationState, SourceKind};
