//! Owner-driven upgrade path
//!
//! The swap logic lives in the account instance itself and is only honored
//! when the invocation arrived through the account's canonical entry point;
//! a direct call against a bare implementation instance is rejected before
//! the owner check even runs. The pointer being swapped lives in the reserved
//! implementation slot, not among the ordinary state fields.

use tracing::info;

use super::engine::{AccountError, SmartAccount};
use super::types::Address;

/// Provenance of an upgrade invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOrigin {
    /// Arrived through the account's canonical entry point
    EntryPoint,
    /// Direct invocation against a bare implementation instance
    Direct,
}

impl SmartAccount {
    /// Swap the stored implementation reference. Owner-gated and
    /// entry-point-only; this is the account-side path, independent of the
    /// factory's admin-gated one.
    pub fn upgrade(
        &mut self,
        origin: CallOrigin,
        caller: Address,
        new_implementation: Address,
    ) -> Result<(), AccountError> {
        if origin == CallOrigin::Direct {
            return Err(AccountError::DirectUpgradeCall);
        }
        self.require_owner(caller)?;

        let previous = self.implementation();
        self.set_implementation(new_implementation);
        info!(
            account = %self.address(),
            from = %previous,
            to = %new_implementation,
            "implementation upgraded by owner"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::registry::{AuthorizationFailure, AuthorizationRegistry};
    use crate::account::roles::AccessError;
    use crate::account::types::Selector;
    use std::sync::Arc;

    struct AllowAll;

    impl AuthorizationRegistry for AllowAll {
        fn authorize(
            &self,
            _account: Address,
            _target: Address,
            _selector: Selector,
            _params: &[u8],
        ) -> Result<(), AuthorizationFailure> {
            Ok(())
        }

        fn is_allowed(&self, _caller: Address, _target: Address, _selector: Selector) -> bool {
            true
        }
    }

    fn initialized_account() -> (SmartAccount, Address) {
        let owner = Address::derive(b"owner");
        let mut account = SmartAccount::new(Address::derive(b"impl-v1"));
        account
            .initialize(
                Address::derive(b"account-1"),
                owner,
                Address::derive(b"registry"),
                Arc::new(AllowAll),
                "acc-1",
            )
            .unwrap();
        (account, owner)
    }

    #[test]
    fn test_owner_upgrade_through_entry_point() {
        let (mut account, owner) = initialized_account();
        let new_impl = Address::derive(b"impl-v2");

        account
            .upgrade(CallOrigin::EntryPoint, owner, new_impl)
            .unwrap();
        assert_eq!(account.implementation(), new_impl);
    }

    #[test]
    fn test_direct_invocation_is_rejected_before_owner_check() {
        let (mut account, owner) = initialized_account();
        let err = account
            .upgrade(CallOrigin::Direct, owner, Address::derive(b"impl-v2"))
            .unwrap_err();
        assert_eq!(err, AccountError::DirectUpgradeCall);
        assert_eq!(account.implementation(), Address::derive(b"impl-v1"));
    }

    #[test]
    fn test_non_owner_cannot_upgrade() {
        let (mut account, _) = initialized_account();
        let outsider = Address::derive(b"outsider");
        let err = account
            .upgrade(CallOrigin::EntryPoint, outsider, Address::derive(b"impl-v2"))
            .unwrap_err();
        assert_eq!(
            err,
            AccountError::Access(AccessError::NotOwner { caller: outsider })
        );
        assert_eq!(account.implementation(), Address::derive(b"impl-v1"));
    }
}
