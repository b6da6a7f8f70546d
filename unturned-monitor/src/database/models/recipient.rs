//! Recipient database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::database::time::{datetime_to_ms, ms_to_datetime};
use crate::domain::{Recipient, RecipientChannel};
use crate::{Error, Result};

/// One row of `recipient`. Primary key is `(id, channel)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RecipientDbModel {
    pub id: String,
    /// `group` or `direct`
    pub channel: String,
    pub wants_online: bool,
    pub wants_offline: bool,
    pub wants_capacity_warnings: bool,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Recipient> for RecipientDbModel {
    fn from(recipient: &Recipient) -> Self {
        Self {
            id: recipient.id.clone(),
            channel: recipient.channel.to_string(),
            wants_online: recipient.wants_online,
            wants_offline: recipient.wants_offline,
            wants_capacity_warnings: recipient.wants_capacity_warnings,
            enabled: recipient.enabled,
            created_at: datetime_to_ms(recipient.created_at),
            updated_at: datetime_to_ms(recipient.updated_at),
        }
    }
}

impl TryFrom<RecipientDbModel> for Recipient {
    type Error = Error;

    fn try_from(row: RecipientDbModel) -> Result<Self> {
        let channel = RecipientChannel::from_str(&row.channel).map_err(|_| {
            Error::Database(format!(
                "recipient {} has unknown channel '{}'",
                row.id, row.channel
            ))
        })?;

        Ok(Recipient {
            id: row.id,
            channel,
            wants_online: row.wants_online,
            wants_offline: row.wants_offline,
            wants_capacity_warnings: row.wants_capacity_warnings,
            enabled: row.enabled,
            created_at: ms_to_datetime(row.created_at),
            updated_at: ms_to_datetime(row.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_stored_as_snake_case() {
        let row = RecipientDbModel::from(&Recipient::direct("42"));
        assert_eq!(row.channel, "direct");
        assert!(row.wants_capacity_warnings);
    }

    #[test]
    fn test_unknown_channel_rejected() {
        let mut row = RecipientDbModel::from(&Recipient::group("1"));
        row.channel = "email".to_string();
        assert!(matches!(Recipient::try_from(row), Err(Error::Database(_))));
    }
}
