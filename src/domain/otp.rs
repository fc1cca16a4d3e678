//! One-time password challenges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const OTP_LENGTH: usize = 6;
pub const DEFAULT_OTP_WINDOW_MINUTES: i64 = 10;

/// A persisted challenge. Only the keyed hash of the code is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: Uuid,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub abandoned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a challenge, evaluated at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeState {
    Issued,
    Consumed,
    Expired,
    Abandoned,
}

impl OtpChallenge {
    pub fn state_at(&self, now: DateTime<Utc>) -> ChallengeState {
        if self.consumed_at.is_some() {
            ChallengeState::Consumed
        } else if self.abandoned_at.is_some() {
            ChallengeState::Abandoned
        } else if now >= self.expires_at {
            ChallengeState::Expired
        } else {
            ChallengeState::Issued
        }
    }

    /// Unconsumed, not abandoned and not yet expired.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == ChallengeState::Issued
    }
}

/// Result of checking a submitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyOutcome {
    Ok,
    Expired,
    Mismatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn challenge(issued: DateTime<Utc>) -> OtpChallenge {
        OtpChallenge {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            code_hash: "hash".to_string(),
            expires_at: issued + Duration::minutes(DEFAULT_OTP_WINDOW_MINUTES),
            consumed_at: None,
            abandoned_at: None,
            created_at: issued,
        }
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let issued = Utc::now();
        let c = challenge(issued);
        assert_eq!(c.state_at(issued + Duration::minutes(9)), ChallengeState::Issued);
        assert_eq!(c.state_at(issued + Duration::minutes(10)), ChallengeState::Expired);
    }

    #[test]
    fn test_consumed_wins_over_expiry() {
        let issued = Utc::now();
        let mut c = challenge(issued);
        c.consumed_at = Some(issued);
        assert_eq!(c.state_at(issued + Duration::hours(1)), ChallengeState::Consumed);
        assert!(!c.is_live_at(issued));
    }
}
