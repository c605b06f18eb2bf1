//! Property test strategies for Warden types

use proptest::prelude::*;
use std::collections::BTreeSet;
use warden_core::types::{CapabilityPayload, PublicKeyBytes, Scope};

pub use proptest;

/// Any scope
pub fn arb_scope() -> impl Strategy<Value = Scope> {
    prop_oneof![Just(Scope::Read), Just(Scope::Write), Just(Scope::Compute)]
}

/// Method names drawn from a small alphabet
pub fn arb_method() -> impl Strategy<Value = String> {
    proptest::collection::vec(proptest::char::range('a', 'z'), 1..12)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Non-empty method sets
pub fn arb_methods() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::collection::btree_set(arb_method(), 1..6)
}

/// Structurally valid capability payloads for `wallet_pub_key`
pub fn arb_capability_payload(
    wallet_pub_key: PublicKeyBytes,
) -> impl Strategy<Value = CapabilityPayload> {
    (
        arb_methods(),
        arb_scope(),
        any::<bool>(),
        0u64..1_000,
        0u64..(1 << 40),
        1u64..(1 << 32),
        0u64..(1 << 48),
    )
        .prop_map(
            move |(methods, scope, encrypted, epoch, issued_at, ttl, nonce_base)| {
                CapabilityPayload {
                    circle: "circle-prop".into(),
                    methods,
                    scope,
                    encrypted,
                    app_origin: "https://prop.example".into(),
                    branch_id: "main".into(),
                    epoch,
                    issued_at,
                    expires_at: issued_at + ttl,
                    nonce_base,
                    wallet_pub_key,
                }
            },
        )
}
