//! Property-based tests for token construction and verification.
//!
//! Property 1: Signed Round-Trip Preserves Claims
//! Property 2: Omitted Details Never Appear As Nulls
//! Property 3: Probing Never Panics And Rejects Non-Tokens
//! Property 4: Blank Identities Are Rejected

use inst_access::config::{with_config, Config};
use inst_access::token::claims::names;
use inst_access::{Token, TokenError};
use proptest::prelude::*;

const SIGNING_PRIVATE: &str = include_str!("fixtures/signing_private.pem");
const SIGNING_PUBLIC: &str = include_str!("fixtures/signing_public.pem");

/// Generate uuid-like identifiers.
fn arb_uuid() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}"
}

/// Generate optional domain names.
fn arb_domain() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z]{1,12}\\.instructure\\.com")
}

/// Generate optional shard ids.
fn arb_shard() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(1i64..100_000)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property 1: Signed Round-Trip Preserves Claims
    ///
    /// For any identity and details, signing then verifying yields a token
    /// with identical claims.
    #[test]
    fn prop_signed_round_trip(
        user in arb_uuid(),
        account in arb_uuid(),
        domain in arb_domain(),
        shard in arb_shard(),
        service in any::<Option<bool>>(),
    ) {
        let mut builder = Token::for_user(user.clone(), account.clone());
        if let Some(domain) = &domain {
            builder = builder.canvas_domain(domain.clone());
        }
        if let Some(shard) = shard {
            builder = builder.canvas_shard_id(shard);
        }
        if let Some(service) = service {
            builder = builder.instructure_service(service);
        }
        let token = builder.build().unwrap();

        let jws = with_config(Config::options().with_signing_key(SIGNING_PRIVATE), || {
            token.to_unencrypted_token_string()
        })
        .unwrap()
        .unwrap();
        let decoded = with_config(Config::options().with_signing_key(SIGNING_PUBLIC), || {
            Token::from_token_string(&jws)
        })
        .unwrap()
        .unwrap();

        prop_assert_eq!(&decoded, &token);
        prop_assert_eq!(decoded.user_uuid(), Some(user.as_str()));
        prop_assert_eq!(decoded.account_uuid(), Some(account.as_str()));
        prop_assert_eq!(decoded.canvas_domain(), domain.as_deref());
        prop_assert_eq!(decoded.canvas_shard_id(), shard);
        prop_assert_eq!(decoded.is_instructure_service(), service == Some(true));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 2: Omitted Details Never Appear As Nulls
    #[test]
    fn prop_no_null_claims(
        domain in arb_domain(),
        real_user in prop::option::of(arb_uuid()),
        real_shard in arb_shard(),
        global_id in prop::option::of(any::<u64>()),
    ) {
        let mut builder = Token::for_user("user-uuid", "acct-uuid");
        if let Some(domain) = domain.clone() {
            builder = builder.canvas_domain(domain);
        }
        if let Some(real_user) = real_user.clone() {
            builder = builder.real_user_uuid(real_user);
        }
        if let Some(real_shard) = real_shard {
            builder = builder.real_user_shard_id(real_shard);
        }
        if let Some(global_id) = global_id {
            builder = builder.user_global_id(global_id);
        }
        let token = builder.build().unwrap();
        let claims = token.claims();

        prop_assert!(claims.as_map().values().all(|v| !v.is_null()));
        prop_assert_eq!(claims.contains(names::CANVAS_DOMAIN), domain.is_some());
        prop_assert_eq!(claims.contains(names::MASQ_SUB), real_user.is_some());
        prop_assert_eq!(claims.contains(names::MASQ_SHARD), real_shard.is_some());
        prop_assert_eq!(
            claims.get_str(names::DEBUG_USER_GLOBAL_ID).map(str::to_string),
            global_id.map(|id| id.to_string())
        );
    }

    /// Property 3: Probing Never Panics And Rejects Non-Tokens
    #[test]
    fn prop_is_token_rejects_arbitrary_text(input in "\\PC*") {
        prop_assume!(input.matches('.').count() != 2);
        prop_assert!(!Token::is_token(&input));
    }

    /// Property 4: Blank Identities Are Rejected
    #[test]
    fn prop_blank_identity_rejected(blank in "[ \\t\\n]{0,8}", other in arb_uuid()) {
        let no_user = Token::for_user(blank.clone(), other.clone()).build();
        let no_account = Token::for_user(other, blank).build();

        prop_assert!(matches!(no_user, Err(TokenError::InvalidArgument(_))));
        prop_assert!(matches!(no_account, Err(TokenError::InvalidArgument(_))));
    }
}
