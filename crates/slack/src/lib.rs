//! Slack slash-command integration
//!
//! This crate provides the Slack side of genie-relay:
//! - **Signatures** (`signature`) - `v0` HMAC-SHA256 request verification with replay window
//! - **Slash Commands** (`commands`) - form decoding into a validated `QuestionRequest`
//! - **Messages** (`messages`) - `in_channel` / `ephemeral` response bodies
//! - **Response URL** (`response_url`) - deferred answer delivery
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Add a slash command (e.g. `/genie`) pointing at `https://<host>/slack/command`
//! 3. Copy the app's signing secret into `GENIE_RELAY_SLACK_SIGNING_SECRET`
//!
//! # Flow
//!
//! ```text
//! POST /slack/command → SignatureVerifier → parse_slash_command → ack (200)
//!                                                   ↓
//!                                  background task → ResponseSink::deliver
//! ```

pub mod commands;
pub mod messages;
pub mod response_url;
pub mod signature;

pub use commands::{parse_slash_command, CommandParseError, QuestionRequest, SlashCommandPayload};
pub use messages::{ResponseType, SlackResponse};
pub use response_url::{DeliveryError, ResponseSink, ResponseUrlClient};
pub use signature::{compute_signature, SignatureVerifier, VerificationError};
