//! Messaging transports.
//!
//! A transport delivers one text message to one chat group or one user.
//! Any non-success is a single delivery failure; retries are the
//! transport's own business.

mod onebot;

pub use onebot::{OneBotConfig, OneBotTransport};

use async_trait::async_trait;

use crate::Result;
use crate::domain::{RecipientChannel, RecipientKey};

/// Trait for chat transports.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Get the transport type name.
    fn transport_type(&self) -> &'static str;

    async fn send_to_group(&self, group_id: &str, text: &str) -> Result<()>;

    async fn send_to_user(&self, user_id: &str, text: &str) -> Result<()>;

    /// Route by recipient channel.
    async fn send(&self, recipient: &RecipientKey, text: &str) -> Result<()> {
        match recipient.channel {
            RecipientChannel::Group => self.send_to_group(&recipient.id, text).await,
            RecipientChannel::Direct => self.send_to_user(&recipient.id, text).await,
        }
    }
}
