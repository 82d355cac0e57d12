//! Bearer token with proactive renewal rule

use chrono::{DateTime, Duration, Utc};

/// Seconds before actual expiry at which a token is considered due for refresh.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// Short-lived credential obtained via client-credentials grant.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    /// Opaque token value sent as `Authorization: Bearer <value>`
    pub value: String,
    /// When the token was received
    pub issued_at: DateTime<Utc>,
    /// Lifetime in seconds as reported by the auth server
    pub expires_in: i64,
}

impl BearerToken {
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, expires_in: i64) -> Self {
        Self {
            value: value.into(),
            issued_at,
            expires_in,
        }
    }

    /// Instant from which the token must be renewed before use.
    ///
    /// `None` when `expires_in` puts it outside the representable range.
    pub fn refresh_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .checked_sub(REFRESH_MARGIN_SECS)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
    }

    /// `now >= issued_at + expires_in - 300`; an unrepresentable lifetime is always due.
    pub fn refresh_due(&self, now: DateTime<Utc>) -> bool {
        self.refresh_at().map_or(true, |at| now >= at)
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"***")
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 18, 9, 0, 0).unwrap()
    }

    #[test]
    fn given_fresh_token_when_checked_then_not_due() {
        let token = BearerToken::new("abc", issued(), 3600);
        assert!(!token.refresh_due(issued()));
    }

    #[test]
    fn given_exact_margin_when_checked_then_due() {
        let token = BearerToken::new("abc", issued(), 3600);
        assert!(token.refresh_due(issued() + Duration::seconds(3300)));
        assert!(!token.refresh_due(issued() + Duration::seconds(3299)));
    }

    #[test]
    fn given_lifetime_shorter_than_margin_when_checked_then_always_due() {
        let token = BearerToken::new("abc", issued(), 120);
        assert!(token.refresh_due(issued()));
    }

    #[test]
    fn given_out_of_range_lifetime_when_checked_then_due_without_panic() {
        for expires_in in [i64::MAX, i64::MIN, 9_000_000_000_000_000] {
            let token = BearerToken::new("abc", issued(), expires_in);
            assert_eq!(token.refresh_at(), None);
            assert!(token.refresh_due(issued()));
        }
    }

    #[test]
    fn debug_output_masks_value() {
        let token = BearerToken::new("super-secret", issued(), 3600);
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("super-secret"));
    }
}
