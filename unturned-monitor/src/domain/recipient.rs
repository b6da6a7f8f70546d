//! Notification recipients and their preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TransitionKind;

/// How a recipient is reached.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecipientChannel {
    /// A chat group.
    Group,
    /// A private message to one user (superusers).
    Direct,
}

/// Identity of a recipient. Ordered by id first so notification order
/// follows recipient ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipientKey {
    pub id: String,
    pub channel: RecipientChannel,
}

impl RecipientKey {
    pub fn new(id: impl Into<String>, channel: RecipientChannel) -> Self {
        Self {
            id: id.into(),
            channel,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::new(id, RecipientChannel::Group)
    }

    pub fn direct(id: impl Into<String>) -> Self {
        Self::new(id, RecipientChannel::Direct)
    }
}

impl std::fmt::Display for RecipientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel, self.id)
    }
}

/// Which preference flag an admin command toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceKind {
    #[strum(to_string = "online", serialize = "notify_online")]
    Online,
    #[strum(to_string = "offline", serialize = "notify_offline")]
    Offline,
    #[strum(to_string = "capacity", serialize = "performance")]
    Capacity,
}

/// A notification target with independent preference flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub channel: RecipientChannel,
    pub wants_online: bool,
    pub wants_offline: bool,
    pub wants_capacity_warnings: bool,
    /// Soft-disable flag. Recipients are never deleted.
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipient {
    /// Default registration for a key: groups get connectivity notices,
    /// direct recipients get everything.
    pub fn with_defaults(key: RecipientKey) -> Self {
        let now = Utc::now();
        let wants_capacity_warnings = key.channel == RecipientChannel::Direct;
        Self {
            id: key.id,
            channel: key.channel,
            wants_online: true,
            wants_offline: true,
            wants_capacity_warnings,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::with_defaults(RecipientKey::group(id))
    }

    pub fn direct(id: impl Into<String>) -> Self {
        Self::with_defaults(RecipientKey::direct(id))
    }

    pub fn key(&self) -> RecipientKey {
        RecipientKey::new(self.id.clone(), self.channel)
    }

    /// Whether the preference flags ask for this kind of transition.
    pub fn wants(&self, kind: TransitionKind) -> bool {
        match kind {
            TransitionKind::None => false,
            TransitionKind::CameOnline => self.wants_online,
            TransitionKind::WentOffline => self.wants_offline,
            TransitionKind::CapacityWarning | TransitionKind::CapacityNormal => {
                self.wants_capacity_warnings
            }
        }
    }

    /// Enabled and wants the kind.
    pub fn is_eligible_for(&self, kind: TransitionKind) -> bool {
        self.enabled && self.wants(kind)
    }

    /// Set one preference flag and bump `updated_at`.
    pub fn set_preference(&mut self, kind: PreferenceKind, enabled: bool) {
        match kind {
            PreferenceKind::Online => self.wants_online = enabled,
            PreferenceKind::Offline => self.wants_offline = enabled,
            PreferenceKind::Capacity => self.wants_capacity_warnings = enabled,
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults_by_channel() {
        let group = Recipient::group("100");
        assert!(group.wants_online && group.wants_offline);
        assert!(!group.wants_capacity_warnings);

        let user = Recipient::direct("200");
        assert!(user.wants_capacity_warnings);
    }

    #[test]
    fn test_capacity_kinds_share_flag() {
        let mut r = Recipient::group("1");
        assert!(!r.wants(TransitionKind::CapacityWarning));
        r.set_preference(PreferenceKind::Capacity, true);
        assert!(r.wants(TransitionKind::CapacityWarning));
        assert!(r.wants(TransitionKind::CapacityNormal));
        assert!(!r.wants(TransitionKind::None));
    }

    #[test]
    fn test_disabled_never_eligible() {
        let mut r = Recipient::direct("1");
        r.enabled = false;
        assert!(r.wants(TransitionKind::CameOnline));
        assert!(!r.is_eligible_for(TransitionKind::CameOnline));
    }

    #[test]
    fn test_preference_kind_aliases() {
        assert_eq!(PreferenceKind::from_str("ONLINE").unwrap(), PreferenceKind::Online);
        assert_eq!(
            PreferenceKind::from_str("performance").unwrap(),
            PreferenceKind::Capacity
        );
        assert!(PreferenceKind::from_str("weather").is_err());
    }

    #[test]
    fn test_key_ordering_by_id_first() {
        let mut keys = vec![
            RecipientKey::direct("2"),
            RecipientKey::group("3"),
            RecipientKey::group("1"),
        ];
        keys.sort();
        let ids: Vec<&str> = keys.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }
}
