//! Referral events: invitations that may or may not be accepted.

use crate::graph::{Channel, Metadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use viral_env::{Timestamp, UserId};

/// An invitation sent by a referrer.
///
/// Created in the "sent, not accepted" state. [`ReferralEvent::accept`] moves
/// it to "accepted" at most once; an accepted event never reverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralEvent {
    pub id: Uuid,
    pub referrer_id: UserId,

    /// Set when the invitation is accepted
    referred_user_id: Option<UserId>,

    /// Sent time
    pub timestamp: Timestamp,

    accepted: bool,
    accepted_at: Option<Timestamp>,
    pub channel: Channel,

    #[serde(default)]
    pub metadata: Metadata,
}

impl ReferralEvent {
    /// Creates a sent, not yet accepted invitation.
    pub fn sent(id: Uuid, referrer_id: UserId, timestamp: Timestamp, channel: Channel) -> Self {
        Self {
            id,
            referrer_id,
            referred_user_id: None,
            timestamp,
            accepted: false,
            accepted_at: None,
            channel,
            metadata: Metadata::new(),
        }
    }

    /// Marks the invitation accepted by `user`.
    ///
    /// Returns false (and changes nothing) if the event was already accepted.
    pub fn accept(&mut self, user: UserId, at: Timestamp) -> bool {
        if self.accepted {
            return false;
        }
        self.accepted = true;
        self.referred_user_id = Some(user);
        self.accepted_at = Some(at);
        true
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn referred_user_id(&self) -> Option<&UserId> {
        self.referred_user_id.as_ref()
    }

    pub fn accepted_at(&self) -> Option<Timestamp> {
        self.accepted_at
    }

    /// Join time of the referred user: acceptance time, else sent time.
    pub fn join_time(&self) -> Timestamp {
        self.accepted_at.unwrap_or(self.timestamp)
    }
}
