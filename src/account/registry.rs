//! Authorization gateway boundary
//!
//! The registry is an external capability the engine consumes, never
//! implements: how it decides allow/deny is its own business. It is consulted
//! exactly once per execution item, in item order, before that item's
//! outbound call, with the account's own identity as authorizing context.

use thiserror::Error;

use super::types::{Address, Selector};

/// Denial returned by the registry, carried through verbatim
#[derive(Error, Debug, Clone, PartialEq)]
#[error("authorization denied for target {target} (selector 0x{}): {reason}", hex::encode(.selector))]
pub struct AuthorizationFailure {
    pub target: Address,
    pub selector: Selector,
    pub reason: String,
}

/// External authorization capability, injected once at initialization.
///
/// `authorize` may have side effects in the registry (rate-limit bookkeeping
/// and the like), so implementations needing mutation keep it behind interior
/// mutability; the engine never caches or batches these calls.
pub trait AuthorizationRegistry {
    fn authorize(
        &self,
        account: Address,
        target: Address,
        selector: Selector,
        params: &[u8],
    ) -> Result<(), AuthorizationFailure>;

    /// Read-only query variant; no bookkeeping side effects
    fn is_allowed(&self, caller: Address, target: Address, selector: Selector) -> bool;
}
