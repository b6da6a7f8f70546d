//! Transitions between consecutive snapshots.

use serde::{Deserialize, Serialize};

use super::Snapshot;

/// Classification of the change between two snapshots.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    None,
    CameOnline,
    WentOffline,
    CapacityWarning,
    CapacityNormal,
}

impl TransitionKind {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Online/offline change.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::CameOnline | Self::WentOffline)
    }

    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::CapacityWarning | Self::CapacityNormal)
    }
}

/// A detected (or absent) transition together with the snapshots compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub kind: TransitionKind,
    pub previous: Option<Snapshot>,
    pub current: Snapshot,
}

impl TransitionEvent {
    pub fn new(kind: TransitionKind, previous: Option<Snapshot>, current: Snapshot) -> Self {
        Self {
            kind,
            previous,
            current,
        }
    }

    /// Same snapshots, different classification.
    pub fn with_kind(mut self, kind: TransitionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_none(&self) -> bool {
        self.kind.is_none()
    }
}
