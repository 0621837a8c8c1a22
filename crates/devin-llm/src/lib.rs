//! LLM client contract for Devin.
//!
//! The conversation engine talks to every model backend through the
//! [`LlmClient`] trait: stream a reply as text, and keep or drop a local
//! message buffer. Custom HTTP agents configured declaratively are one such
//! backend.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  LlmClient trait                             │
//! │  - stream(request) -> ResponseStream         │
//! │  - append_local_message() / clear_messages() │
//! └──────────────────────────────────────────────┘
//!                    │
//!        ┌───────────┴───────────┐
//!        ▼                       ▼
//! ┌───────────────────┐   ┌────────────┐
//! │ CustomAgentClient │   │ MockClient │
//! │ (JSON / SSE)      │   │ (testing)  │
//! └───────────────────┘   └────────────┘
//! ```

pub mod client;
pub mod custom;
pub mod error;
pub mod stream;
pub mod types;

pub use client::{LlmClient, SharedClient, StreamRequest, with_retry};
#[cfg(any(test, feature = "testing"))]
pub use client::{MockClient, MockReply};
pub use custom::{
    AgentAuth, AuthType, CustomAgentClient, CustomAgentConfig, ResponseAction, ResponsePath,
};
pub use error::{LlmError, RateLimitInfo, Result};
pub use stream::{CancelHandle, ResponseStream, TextStream};
pub use types::{Message, Role, TokenInfo, Usage};
