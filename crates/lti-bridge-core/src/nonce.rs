//! Anti-replay tokens for the mapping endpoint.
//!
//! A nonce is the first [`NONCE_BYTES`] of
//! `HMAC-SHA256(secret, "<tick>|<action>|<account>")`, hex encoded. The tick
//! advances every half lifetime; a nonce verifies during its own tick and the
//! one after it.

use crate::model::AccountId;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Truncated tag length in bytes.
pub const NONCE_BYTES: usize = 10;

/// Default nonce lifetime (one day).
pub const DEFAULT_NONCE_LIFETIME_SECS: i64 = 86_400;

/// Purpose a nonce is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceAction {
    MapLink,
    UnmapLink,
}

impl NonceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MapLink => "mapping-lti-link",
            Self::UnmapLink => "unmapping-lti-link",
        }
    }
}

/// Which tick a nonce verified in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceAge {
    Current,
    Previous,
}

#[derive(Clone)]
pub struct NonceIssuer {
    key: Vec<u8>,
    lifetime_secs: i64,
}

impl fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceIssuer")
            .field("key", &"[REDACTED]")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish()
    }
}

impl NonceIssuer {
    pub fn new(key: impl Into<Vec<u8>>, lifetime_secs: i64) -> Self {
        Self {
            key: key.into(),
            lifetime_secs: lifetime_secs.max(2),
        }
    }

    /// Issuer with a process-local random key; nonces die with the process.
    pub fn random(lifetime_secs: i64) -> Self {
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::new(key, lifetime_secs)
    }

    fn tick(&self, now: DateTime<Utc>) -> i64 {
        let half = self.lifetime_secs / 2;
        // ceil(now / half)
        (now.timestamp() + half - 1).div_euclid(half)
    }

    fn mac(&self, tick: i64, action: NonceAction, account: Option<AccountId>) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        let account = account.map_or(0, |a| a.0);
        mac.update(format!("{tick}|{}|{account}", action.as_str()).as_bytes());
        mac
    }

    pub fn create_at(
        &self,
        action: NonceAction,
        account: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> String {
        let tag = self.mac(self.tick(now), action, account).finalize();
        hex::encode(&tag.into_bytes()[..NONCE_BYTES])
    }

    pub fn create(&self, action: NonceAction, account: Option<AccountId>) -> String {
        self.create_at(action, account, Utc::now())
    }

    pub fn verify_at(
        &self,
        nonce: &str,
        action: NonceAction,
        account: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> Option<NonceAge> {
        let tag = hex::decode(nonce.trim()).ok()?;
        if tag.len() != NONCE_BYTES {
            return None;
        }
        let tick = self.tick(now);
        if self
            .mac(tick, action, account)
            .verify_truncated_left(&tag)
            .is_ok()
        {
            return Some(NonceAge::Current);
        }
        if self
            .mac(tick - 1, action, account)
            .verify_truncated_left(&tag)
            .is_ok()
        {
            return Some(NonceAge::Previous);
        }
        None
    }

    pub fn verify(
        &self,
        nonce: &str,
        action: NonceAction,
        account: Option<AccountId>,
    ) -> Option<NonceAge> {
        self.verify_at(nonce, action, account, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn issuer() -> NonceIssuer {
        NonceIssuer::new(b"test-secret".to_vec(), 86_400)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_nonce_verifies_for_same_action_and_account() {
        let n = issuer().create_at(NonceAction::MapLink, Some(AccountId(7)), t0());
        assert_eq!(n.len(), NONCE_BYTES * 2);
        assert_eq!(
            issuer().verify_at(&n, NonceAction::MapLink, Some(AccountId(7)), t0()),
            Some(NonceAge::Current)
        );
    }

    #[test]
    fn test_nonce_is_bound_to_action() {
        let n = issuer().create_at(NonceAction::MapLink, Some(AccountId(7)), t0());
        assert_eq!(
            issuer().verify_at(&n, NonceAction::UnmapLink, Some(AccountId(7)), t0()),
            None
        );
    }

    #[test]
    fn test_nonce_is_bound_to_account() {
        let n = issuer().create_at(NonceAction::MapLink, Some(AccountId(7)), t0());
        assert_eq!(
            issuer().verify_at(&n, NonceAction::MapLink, Some(AccountId(8)), t0()),
            None
        );
        assert_eq!(
            issuer().verify_at(&n, NonceAction::MapLink, None, t0()),
            None
        );
    }

    #[test]
    fn test_nonce_ages_then_expires() {
        let i = issuer();
        let n = i.create_at(NonceAction::UnmapLink, Some(AccountId(1)), t0());
        assert_eq!(
            i.verify_at(
                &n,
                NonceAction::UnmapLink,
                Some(AccountId(1)),
                t0() + Duration::hours(12)
            ),
            Some(NonceAge::Previous)
        );
        assert_eq!(
            i.verify_at(
                &n,
                NonceAction::UnmapLink,
                Some(AccountId(1)),
                t0() + Duration::hours(25)
            ),
            None
        );
    }

    #[test]
    fn test_garbage_nonce_rejected() {
        let i = issuer();
        assert_eq!(
            i.verify_at("zz", NonceAction::MapLink, None, t0()),
            None
        );
        assert_eq!(
            i.verify_at("abcd", NonceAction::MapLink, None, t0()),
            None
        );
        assert_eq!(i.verify_at("", NonceAction::MapLink, None, t0()), None);
    }

    #[test]
    fn test_different_secret_rejects() {
        let n = issuer().create_at(NonceAction::MapLink, None, t0());
        let other = NonceIssuer::new(b"other".to_vec(), 86_400);
        assert_eq!(other.verify_at(&n, NonceAction::MapLink, None, t0()), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let s = format!("{:?}", issuer());
        assert!(!s.contains("test-secret"));
        assert!(s.contains("REDACTED"));
    }
}
