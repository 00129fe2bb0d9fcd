//! Reading well-known claims from a validated [`Principal`].

use common::claims::{Principal, CLAIM_EMAIL, CLAIM_USER_ID};
use common::types::UserId;

/// The caller's user identifier.
///
/// The most recently added `userid` claim wins, so an identifier added by
/// admin elevation shadows the one carried in the token. If that claim is not
/// a UUID the result is `None`; earlier claims are not consulted.
pub fn resolve_user_id(principal: &Principal) -> Option<UserId> {
    let claim = principal.last(CLAIM_USER_ID)?;

    match claim.value.parse::<UserId>() {
        Ok(user_id) => Some(user_id),
        Err(_) => {
            tracing::debug!(target: "api.auth.claims", "userid claim is not a valid UUID");
            None
        }
    }
}

/// The caller's email address, if the token carried one.
pub fn resolve_email(principal: &Principal) -> Option<&str> {
    principal.last(CLAIM_EMAIL).map(|c| c.value.as_str())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::claims::Claim;

    const FIRST: &str = "45a57255-29c6-43d8-b17a-4e65698bd182";
    const SECOND: &str = "f1343f32-6161-409e-af74-fbc8ca8958cc";

    #[test]
    fn test_single_user_id() {
        let principal = Principal::from_claims(vec![Claim::text("userid", FIRST)]);
        assert_eq!(resolve_user_id(&principal).unwrap().to_string(), FIRST);
    }

    #[test]
    fn test_last_user_id_wins() {
        let principal = Principal::from_claims(vec![Claim::text("userid", FIRST)])
            .with_claims([Claim::text("userid", SECOND)]);

        assert_eq!(resolve_user_id(&principal).unwrap().to_string(), SECOND);
    }

    #[test]
    fn test_unparsable_last_claim_does_not_fall_back() {
        let principal = Principal::from_claims(vec![
            Claim::text("userid", FIRST),
            Claim::text("userid", "not-a-uuid"),
        ]);

        assert!(resolve_user_id(&principal).is_none());
    }

    #[test]
    fn test_missing_user_id() {
        let principal = Principal::from_claims(vec![Claim::text("email", "a@marquee.test")]);
        assert!(resolve_user_id(&principal).is_none());
    }

    #[test]
    fn test_resolve_email() {
        let principal = Principal::from_claims(vec![Claim::text("email", "a@marquee.test")]);
        assert_eq!(resolve_email(&principal), Some("a@marquee.test"));
        assert_eq!(resolve_email(&Principal::default()), None);
    }
}
