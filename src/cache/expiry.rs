//! Expiry policies for cache entries.
//!
//! A policy answers three questions: how long a freshly created entry lives,
//! and whether an access or an update resets that lifetime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How cache entries expire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Entries never expire
    #[default]
    Eternal,
    /// Entries expire a fixed duration after creation
    Created(Duration),
    /// Entries expire a fixed duration after creation or last access
    Accessed(Duration),
    /// Entries expire a fixed duration after creation or last update
    Modified(Duration),
    /// Entries expire a fixed duration after creation, last access or last update
    Touched(Duration),
}

/// Serializable name of an expiry policy, used by configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryKind {
    Eternal,
    Created,
    Accessed,
    Modified,
    Touched,
}

impl ExpiryPolicy {
    pub fn created(ttl: Duration) -> Self {
        Self::Created(ttl)
    }

    pub fn accessed(ttl: Duration) -> Self {
        Self::Accessed(ttl)
    }

    pub fn modified(ttl: Duration) -> Self {
        Self::Modified(ttl)
    }

    pub fn touched(ttl: Duration) -> Self {
        Self::Touched(ttl)
    }

    /// Build a policy from its configuration name and TTL
    pub fn from_kind(kind: ExpiryKind, ttl: Duration) -> Self {
        match kind {
            ExpiryKind::Eternal => Self::Eternal,
            ExpiryKind::Created => Self::Created(ttl),
            ExpiryKind::Accessed => Self::Accessed(ttl),
            ExpiryKind::Modified => Self::Modified(ttl),
            ExpiryKind::Touched => Self::Touched(ttl),
        }
    }

    pub fn kind(&self) -> ExpiryKind {
        match self {
            Self::Eternal => ExpiryKind::Eternal,
            Self::Created(_) => ExpiryKind::Created,
            Self::Accessed(_) => ExpiryKind::Accessed,
            Self::Modified(_) => ExpiryKind::Modified,
            Self::Touched(_) => ExpiryKind::Touched,
        }
    }

    /// The TTL carried by the policy, `None` for eternal entries
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Eternal => None,
            Self::Created(ttl) | Self::Accessed(ttl) | Self::Modified(ttl) | Self::Touched(ttl) => {
                Some(*ttl)
            }
        }
    }

    /// Lifetime of a newly created entry; `None` means it never expires
    pub fn expiry_for_creation(&self) -> Option<Duration> {
        self.ttl()
    }

    /// New lifetime after an access; `None` leaves the current expiry unchanged
    pub fn expiry_for_access(&self) -> Option<Option<Duration>> {
        match self {
            Self::Accessed(ttl) | Self::Touched(ttl) => Some(Some(*ttl)),
            _ => None,
        }
    }

    /// New lifetime after an update; `None` leaves the current expiry unchanged
    pub fn expiry_for_update(&self) -> Option<Option<Duration>> {
        match self {
            Self::Modified(ttl) | Self::Touched(ttl) => Some(Some(*ttl)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_policy_only_applies_on_creation() {
        let policy = ExpiryPolicy::created(Duration::from_millis(50));
        assert_eq!(policy.expiry_for_creation(), Some(Duration::from_millis(50)));
        assert_eq!(policy.expiry_for_access(), None);
        assert_eq!(policy.expiry_for_update(), None);
    }

    #[test]
    fn test_touched_policy_resets_on_access_and_update() {
        let ttl = Duration::from_secs(1);
        let policy = ExpiryPolicy::touched(ttl);
        assert_eq!(policy.expiry_for_access(), Some(Some(ttl)));
        assert_eq!(policy.expiry_for_update(), Some(Some(ttl)));
    }

    #[test]
    fn test_eternal_policy_never_expires() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy, ExpiryPolicy::Eternal);
        assert_eq!(policy.expiry_for_creation(), None);
        assert_eq!(policy.ttl(), None);
    }

    #[test]
    fn test_kind_round_trip() {
        let ttl = Duration::from_millis(10);
        for kind in [
            ExpiryKind::Eternal,
            ExpiryKind::Created,
            ExpiryKind::Accessed,
            ExpiryKind::Modified,
            ExpiryKind::Touched,
        ] {
            assert_eq!(ExpiryPolicy::from_kind(kind, ttl).kind(), kind);
        }
    }
}
