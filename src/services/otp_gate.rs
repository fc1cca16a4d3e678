//! OTP Gate: issues and checks one-time codes bound to a pending transaction.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::otp::{DEFAULT_OTP_WINDOW_MINUTES, OTP_LENGTH};
use crate::domain::{ChallengeState, OtpChallenge, VerifyOutcome};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::OtpRepository;

type HmacSha256 = Hmac<Sha256>;

fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("{:0width$}", code, width = OTP_LENGTH)
}

#[derive(Clone)]
pub struct OtpGate {
    repo: Arc<dyn OtpRepository>,
    secret: Vec<u8>,
    window: Duration,
}

impl OtpGate {
    pub fn new(repo: Arc<dyn OtpRepository>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            repo,
            secret: secret.into(),
            window: Duration::minutes(DEFAULT_OTP_WINDOW_MINUTES),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    fn mac(&self, transaction_id: Uuid, code: &str) -> LedgerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| LedgerError::PersistenceFailure(format!("otp key: {}", e)))?;
        mac.update(format!("{}:{}", transaction_id, code).as_bytes());
        Ok(mac)
    }

    fn hash(&self, transaction_id: Uuid, code: &str) -> LedgerResult<String> {
        Ok(hex::encode(self.mac(transaction_id, code)?.finalize().into_bytes()))
    }

    fn matches(&self, challenge: &OtpChallenge, code: &str) -> LedgerResult<bool> {
        let expected = match hex::decode(&challenge.code_hash) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };
        Ok(self
            .mac(challenge.transaction_id, code)?
            .verify_slice(&expected)
            .is_ok())
    }

    pub async fn issue(&self, user_id: Uuid, transaction_id: Uuid) -> LedgerResult<String> {
        self.issue_at(user_id, transaction_id, Utc::now()).await
    }

    /// Returns the plain code; only its keyed hash is stored.
    pub async fn issue_at(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        now: DateTime<Utc>,
    ) -> LedgerResult<String> {
        let code = generate_code();
        let challenge = OtpChallenge {
            id: Uuid::new_v4(),
            user_id,
            transaction_id,
            code_hash: self.hash(transaction_id, &code)?,
            expires_at: now + self.window,
            consumed_at: None,
            abandoned_at: None,
            created_at: now,
        };

        self.repo.insert_challenge(&challenge, now).await?;
        tracing::info!(
            transaction_id = %transaction_id,
            expires_at = %challenge.expires_at,
            "verification code issued"
        );
        Ok(code)
    }

    pub async fn verify(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        code: &str,
    ) -> LedgerResult<VerifyOutcome> {
        self.verify_at(user_id, transaction_id, code, Utc::now()).await
    }

    /// Expiry wins over code correctness. A wrong code leaves the challenge
    /// live for another attempt.
    pub async fn verify_at(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<VerifyOutcome> {
        let challenge = match self.repo.latest_challenge(transaction_id).await? {
            Some(c) if c.user_id == user_id => c,
            _ => return Ok(VerifyOutcome::Mismatch),
        };

        match challenge.state_at(now) {
            ChallengeState::Consumed | ChallengeState::Abandoned => {
                return Ok(VerifyOutcome::Mismatch)
            }
            ChallengeState::Expired => return Ok(VerifyOutcome::Expired),
            ChallengeState::Issued => {}
        }

        if !self.matches(&challenge, code)? {
            tracing::info!(transaction_id = %transaction_id, "verification code mismatch");
            return Ok(VerifyOutcome::Mismatch);
        }

        // Another verifier may have consumed it between the read and here.
        if self.repo.consume_challenge(challenge.id, now).await? {
            Ok(VerifyOutcome::Ok)
        } else {
            Ok(VerifyOutcome::Mismatch)
        }
    }

    /// Abandon any unconsumed challenge of a transaction that failed.
    pub async fn abandon(&self, transaction_id: Uuid) -> LedgerResult<u64> {
        Ok(self
            .repo
            .abandon_challenges(transaction_id, Utc::now())
            .await?)
    }
}
