//! Deterministic policy names.
//!
//! A block is never recorded anywhere but in the cluster, so the name of each
//! policy must be recomputable from the request alone: unblocking derives the
//! same names and deletes them.
//!
//! The digest covers the selector string exactly as supplied. Selectors that
//! are equivalent but spelled differently (`app=a,env=b` and `env=b,app=a`)
//! produce different names; an unblock must repeat the selector used to block.

use sha2::{Digest, Sha256};

const PREFIX: &str = "block-from-";

/// Names the policy that blocks traffic from the workloads selected by
/// `selector` in `namespace`.
pub fn policy_name(namespace: &str, selector: &str) -> String {
    format!("{PREFIX}{namespace}-{}", digest(selector))
}

fn digest(selector: &str) -> String {
    hex::encode(Sha256::digest(selector.as_bytes()))
}
