//! The attention router: decides which inputs earn a reply.
//!
//! Every observation flows through the same stages:
//!
//! 1. **Context**: the aggregator records it in its rolling buffer
//! 2. **Score**: source weight, recency, stated relevance and urgency,
//!    continuity with recent inputs, minus a post-reply cooldown
//! 3. **Admit**: actionable sources compete in the admission queue against
//!    the threshold of the current conversation state
//! 4. **Dispatch**: admitted events are deduplicated, formatted and passed
//!    through the rate-limited funnel to the reply generator
//! 5. **Fan out**: replies go to the UI, chat and speech side channels

pub mod admission;
pub mod console;
pub mod context;
pub mod dedup;
pub mod fanout;
pub mod format;
pub mod funnel;
pub mod intake;
pub mod router;
pub mod scoring;
pub mod stats;

pub use admission::{AdmissionHandler, AdmissionQueue, Offer};
pub use console::OperatorCommand;
pub use context::ContextAggregator;
pub use dedup::RecentResponseLog;
pub use fanout::Fanout;
pub use format::{chat_reply, format_prompt};
pub use funnel::{DispatchFunnel, FunnelItem, OnResponse, ResponseHandler};
pub use intake::{Intake, IntakeAction};
pub use router::{LineOutcome, Router, RouterBuilder, RouterStatus};
pub use scoring::{ScoreBreakdown, Scorer};
pub use stats::{Counter, RouterStats, StatsSnapshot};
