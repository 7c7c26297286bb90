//! Databricks Genie conversation client
//!
//! - **Client** (`client`) - `ConversationApi` trait and the reqwest-backed `GenieClient`
//! - **Poll** (`poll`) - bounded, non-blocking status polling
//! - **Workflow** (`workflow`) - start, poll and fetch for a single question
//! - **Format** (`format`) - rendering of query results as a fenced pipe table
//!
//! ```text
//! start-conversation → messages/{id} (poll) → query-result/{attachment} → format_query_answer
//! ```

pub mod client;
pub mod error;
pub mod format;
pub mod model;
pub mod poll;
pub mod workflow;

pub use client::{ConversationApi, GenieClient};
pub use error::GenieError;
pub use format::{format_answer, format_payload, format_query_answer, FormatError};
pub use model::{AnswerContent, ConversationHandle, GenieMessage, MessageStatus, QueryAnswer};
pub use poll::{poll_until_terminal, PollPolicy};
pub use workflow::ConversationWorkflow;
