//! Deterministic placement factory
//!
//! Places account instances at addresses computed purely from the factory
//! identity, the implementation identity, and the full salt, so the same
//! inputs reproduce the same address in any environment. The salt's prefix
//! region must name the deploying caller unless it is entirely zero (the
//! shared carve-out). Deployed accounts are administered through a
//! factory-local admin mapping; that mapping is the sole authority for the
//! factory-side `change_admin`/`upgrade` path and is independent of each
//! account's own owner, which keeps its own upgrade path. Both authorities
//! exist at once.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::account::engine::{AccountError, SmartAccount};
use crate::account::registry::AuthorizationRegistry;
use crate::account::types::{Address, Salt};
use crate::encoding::CanonicalSerialize;

/// Domain string separating placement preimages from every other hash input
pub const PLACEMENT_DOMAIN: &str = "sextant.factory.placement.v1";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FactoryError {
    #[error("salt prefix does not name the caller {caller}")]
    SaltDoesNotStartWithCaller { caller: Address },
    #[error("deployment failed: an account already occupies {address}")]
    DeploymentFailed { address: Address },
    #[error("no account deployed at {0}")]
    UnknownAccount(Address),
    #[error("caller {caller} is not the factory admin of {account}")]
    NotFactoryAdmin { caller: Address, account: Address },
    #[error(transparent)]
    Account(#[from] AccountError),
}

/// Factory holding the deployed instances and their admin records
#[derive(Serialize, Deserialize, Clone)]
pub struct AccountFactory {
    factory_id: Address,
    accounts: HashMap<Address, SmartAccount>,
    admins: HashMap<Address, Address>,
}

impl AccountFactory {
    pub fn new(factory_id: Address) -> Self {
        AccountFactory {
            factory_id,
            accounts: HashMap::new(),
            admins: HashMap::new(),
        }
    }

    pub fn factory_id(&self) -> Address {
        self.factory_id
    }

    /// Placement address for `(implementation, salt)`. Pure: reads nothing
    /// but constants, so prediction and deployment can run in different
    /// environments and still agree.
    pub fn predict_deterministic_address(&self, implementation: Address, salt: Salt) -> Address {
        let mut preimage = Vec::new();
        preimage.extend_from_slice(PLACEMENT_DOMAIN.as_bytes());
        preimage.extend_from_slice(&self.factory_id.to_bytes());
        preimage.extend_from_slice(&implementation.to_bytes());
        preimage.extend_from_slice(&salt.to_bytes());
        Address::derive(&preimage)
    }

    /// Deploy and initialize an account at its predicted address.
    ///
    /// The caller becomes the account's factory admin. Deploying twice at
    /// the same full salt fails and leaves the original instance untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn deploy_deterministic(
        &mut self,
        caller: Address,
        implementation: Address,
        salt: Salt,
        owner: Address,
        registry: Address,
        gateway: Arc<dyn AuthorizationRegistry>,
        account_id: &str,
    ) -> Result<Address, FactoryError> {
        if !salt.has_shared_prefix() && !salt.starts_with(caller) {
            return Err(FactoryError::SaltDoesNotStartWithCaller { caller });
        }

        let address = self.predict_deterministic_address(implementation, salt);
        if self.accounts.contains_key(&address) {
            return Err(FactoryError::DeploymentFailed { address });
        }

        let mut account = SmartAccount::new(implementation);
        account.initialize(address, owner, registry, gateway, account_id)?;

        self.accounts.insert(address, account);
        self.admins.insert(address, caller);
        info!(
            factory = %self.factory_id,
            account = %address,
            admin = %caller,
            id = account_id,
            "account deployed"
        );
        Ok(address)
    }

    /// Reassign the factory-side admin of a deployed account
    pub fn change_admin(
        &mut self,
        caller: Address,
        account: Address,
        new_admin: Address,
    ) -> Result<(), FactoryError> {
        self.require_admin(caller, account)?;
        self.admins.insert(account, new_admin);
        info!(account = %account, admin = %new_admin, "factory admin changed");
        Ok(())
    }

    /// Factory-side implementation swap, gated by the admin mapping only.
    /// The account's owner keeps its own, separate upgrade path.
    pub fn upgrade(
        &mut self,
        caller: Address,
        account: Address,
        new_implementation: Address,
    ) -> Result<(), FactoryError> {
        self.require_admin(caller, account)?;
        let instance = self
            .accounts
            .get_mut(&account)
            .ok_or(FactoryError::UnknownAccount(account))?;
        instance.set_implementation(new_implementation);
        info!(account = %account, to = %new_implementation, "implementation upgraded by factory admin");
        Ok(())
    }

    // --- Lookups ---

    pub fn admin_of(&self, account: Address) -> Option<Address> {
        self.admins.get(&account).copied()
    }

    pub fn account(&self, address: Address) -> Option<&SmartAccount> {
        self.accounts.get(&address)
    }

    pub fn account_mut(&mut self, address: Address) -> Option<&mut SmartAccount> {
        self.accounts.get_mut(&address)
    }

    pub fn deployed_accounts(&self) -> Vec<Address> {
        self.accounts.keys().copied().collect()
    }

    fn require_admin(&self, caller: Address, account: Address) -> Result<(), FactoryError> {
        let admin = self
            .admins
            .get(&account)
            .ok_or(FactoryError::UnknownAccount(account))?;
        if *admin != caller {
            return Err(FactoryError::NotFactoryAdmin { caller, account });
        }
        Ok(())
    }

    // --- Snapshots ---
    // Gateway capabilities do not survive serialization; re-attach them on
    // each loaded account before executing.

    /// Load from file or create new
    pub fn load(path: &str, factory_id: Address) -> Self {
        if let Ok(data) = fs::read_to_string(path) {
            serde_json::from_str(&data).unwrap_or_else(|_| Self::new(factory_id))
        } else {
            Self::new(factory_id)
        }
    }

    /// Save to file
    pub fn save(&self, path: &str) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::batch::encode_batch;
    use crate::account::mode::Mode;
    use crate::account::registry::AuthorizationFailure;
    use crate::account::roles::{Role, RoleSet};
    use crate::account::types::{ExecutionItem, Selector};
    use crate::account::upgrade::CallOrigin;
    use crate::account::{DispatchError, Dispatcher, ExecuteError};
    use crate::error::SextantError;
    use std::collections::HashSet;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    struct DenyList {
        denied: HashSet<Address>,
    }

    impl DenyList {
        fn allow_all() -> Self {
            DenyList {
                denied: HashSet::new(),
            }
        }

        fn denying(targets: &[Address]) -> Self {
            DenyList {
                denied: targets.iter().copied().collect(),
            }
        }
    }

    impl AuthorizationRegistry for DenyList {
        fn authorize(
            &self,
            _account: Address,
            target: Address,
            selector: Selector,
            _params: &[u8],
        ) -> Result<(), AuthorizationFailure> {
            if self.denied.contains(&target) {
                return Err(AuthorizationFailure {
                    target,
                    selector,
                    reason: "denied by policy".to_string(),
                });
            }
            Ok(())
        }

        fn is_allowed(&self, _caller: Address, target: Address, _selector: Selector) -> bool {
            !self.denied.contains(&target)
        }
    }

    struct CountingDispatcher {
        calls: Vec<Address>,
    }

    impl Dispatcher for CountingDispatcher {
        fn dispatch(
            &mut self,
            _from: Address,
            target: Address,
            _value: u128,
            _payload: &[u8],
        ) -> Result<Vec<u8>, DispatchError> {
            self.calls.push(target);
            Ok(Vec::new())
        }
    }

    fn factory() -> AccountFactory {
        AccountFactory::new(Address::derive(b"factory-main"))
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let factory = factory();
        let implementation = Address::derive(b"impl-v1");
        let salt = Salt::anonymous(rand::random::<[u8; 12]>());

        let a = factory.predict_deterministic_address(implementation, salt);
        let b = factory.predict_deterministic_address(implementation, salt);
        assert_eq!(a, b);

        // Any input change moves the address
        let other_salt = Salt::anonymous([0xFF; 12]);
        assert_ne!(a, factory.predict_deterministic_address(implementation, other_salt));
        assert_ne!(
            a,
            factory.predict_deterministic_address(Address::derive(b"impl-v2"), salt)
        );
    }

    #[test]
    fn test_deploy_lands_on_predicted_address() {
        let mut factory = factory();
        let deployer = addr(1);
        let implementation = Address::derive(b"impl-v1");
        let salt = Salt::prefixed(deployer, [1; 12]);
        let predicted = factory.predict_deterministic_address(implementation, salt);

        let address = factory
            .deploy_deterministic(
                deployer,
                implementation,
                salt,
                addr(2),
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-1",
            )
            .unwrap();

        assert_eq!(address, predicted);
        let account = factory.account(address).unwrap();
        assert!(account.is_initialized());
        assert_eq!(account.owner(), addr(2));
        assert_eq!(account.account_id(), "acc-1");
        assert_eq!(account.registry(), Address::derive(b"registry"));
        // The deployer holds the factory-side admin record
        assert_eq!(factory.admin_of(address), Some(deployer));
    }

    #[test]
    fn test_salt_must_name_the_caller() {
        let mut factory = factory();
        let deployer = addr(1);
        let foreign_salt = Salt::prefixed(addr(9), [1; 12]);

        let err = factory
            .deploy_deterministic(
                deployer,
                Address::derive(b"impl-v1"),
                foreign_salt,
                addr(2),
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-1",
            )
            .unwrap_err();
        assert_eq!(err, FactoryError::SaltDoesNotStartWithCaller { caller: deployer });

        // The all-zero prefix is the shared carve-out: any caller may use it
        factory
            .deploy_deterministic(
                deployer,
                Address::derive(b"impl-v1"),
                Salt::anonymous([1; 12]),
                addr(2),
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-1",
            )
            .unwrap();
    }

    #[test]
    fn test_redeploy_at_same_salt_fails() {
        let mut factory = factory();
        let deployer = addr(1);
        let implementation = Address::derive(b"impl-v1");
        let salt = Salt::prefixed(deployer, [1; 12]);

        let first = factory
            .deploy_deterministic(
                deployer,
                implementation,
                salt,
                addr(2),
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-1",
            )
            .unwrap();

        let err = factory
            .deploy_deterministic(
                deployer,
                implementation,
                salt,
                addr(3),
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-other",
            )
            .unwrap_err();
        assert_eq!(err, FactoryError::DeploymentFailed { address: first });
        // Original instance untouched
        assert_eq!(factory.account(first).unwrap().owner(), addr(2));
        assert_eq!(factory.account(first).unwrap().account_id(), "acc-1");

        let second = factory
            .deploy_deterministic(
                deployer,
                implementation,
                Salt::prefixed(deployer, [2; 12]),
                addr(3),
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-2",
            )
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_admin_mapping_gates_factory_administration() {
        let mut factory = factory();
        let deployer = addr(1);
        let account = factory
            .deploy_deterministic(
                deployer,
                Address::derive(b"impl-v1"),
                Salt::prefixed(deployer, [1; 12]),
                addr(2),
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-1",
            )
            .unwrap();

        // The account's owner is not the factory admin
        let owner = addr(2);
        let err = factory
            .upgrade(owner, account, Address::derive(b"impl-v2"))
            .unwrap_err();
        assert_eq!(err, FactoryError::NotFactoryAdmin { caller: owner, account });

        factory
            .change_admin(deployer, account, addr(5))
            .unwrap();
        assert_eq!(factory.admin_of(account), Some(addr(5)));

        // Old admin lost the authority, new admin has it
        assert!(factory
            .upgrade(deployer, account, Address::derive(b"impl-v2"))
            .is_err());
        factory
            .upgrade(addr(5), account, Address::derive(b"impl-v2"))
            .unwrap();
        assert_eq!(
            factory.account(account).unwrap().implementation(),
            Address::derive(b"impl-v2")
        );
    }

    #[test]
    fn test_both_upgrade_authorities_stay_independent() {
        let mut factory = factory();
        let deployer = addr(1);
        let owner = addr(2);
        let account = factory
            .deploy_deterministic(
                deployer,
                Address::derive(b"impl-v1"),
                Salt::prefixed(deployer, [1; 12]),
                owner,
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-1",
            )
            .unwrap();

        // Factory-side path, gated by the admin record
        factory
            .upgrade(deployer, account, Address::derive(b"impl-v2"))
            .unwrap();

        // Owner-side path still works on the same instance afterwards
        factory
            .account_mut(account)
            .unwrap()
            .upgrade(CallOrigin::EntryPoint, owner, Address::derive(b"impl-v3"))
            .unwrap();
        assert_eq!(
            factory.account(account).unwrap().implementation(),
            Address::derive(b"impl-v3")
        );
    }

    #[test]
    fn test_snapshot_roundtrip_reattaches_gateway() {
        let path = std::env::temp_dir().join("sextant_factory_snapshot_test.json");
        let path = path.to_str().unwrap();

        let mut factory = factory();
        let deployer = addr(1);
        let account = factory
            .deploy_deterministic(
                deployer,
                Address::derive(b"impl-v1"),
                Salt::prefixed(deployer, [1; 12]),
                addr(2),
                Address::derive(b"registry"),
                Arc::new(DenyList::allow_all()),
                "acc-1",
            )
            .unwrap();
        factory.save(path).unwrap();

        let mut loaded = AccountFactory::load(path, Address::derive(b"factory-main"));
        assert_eq!(loaded.deployed_accounts(), vec![account]);
        let instance = loaded.account_mut(account).unwrap();
        assert!(instance.is_initialized());
        assert_eq!(instance.account_id(), "acc-1");

        // Capabilities do not survive serialization; re-attach exactly once
        instance
            .attach_gateway(Arc::new(DenyList::allow_all()))
            .unwrap();
        let err = instance
            .attach_gateway(Arc::new(DenyList::allow_all()))
            .unwrap_err();
        assert_eq!(err, AccountError::GatewayAlreadyAttached);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_denied_batch_leaves_deployed_account_untouched() {
        // Owner initializes via the factory, grants Executor, and the
        // executor submits a 3-item batch whose second item the registry
        // denies: the whole call fails and the nonce stays at zero under
        // both policies.
        let denied = addr(11);
        let mut factory = factory();
        let deployer = addr(1);
        let owner = addr(2);
        let executor = addr(3);

        let address = factory
            .deploy_deterministic(
                deployer,
                Address::derive(b"impl-v1"),
                Salt::prefixed(deployer, [1; 12]),
                owner,
                Address::derive(b"registry"),
                Arc::new(DenyList::denying(&[denied])),
                "acc-1",
            )
            .unwrap();

        let account = factory.account_mut(address).unwrap();
        account
            .grant_roles(owner, executor, RoleSet::single(Role::Executor))
            .unwrap();

        let items: Vec<ExecutionItem> = [addr(10), denied, addr(12)]
            .iter()
            .map(|target| ExecutionItem {
                target: *target,
                value: 1,
                payload: vec![1, 2, 3, 4],
            })
            .collect();
        let payload = encode_batch(&items);

        for mode in [Mode::batch_default(), Mode::batch_try()] {
            let mut dispatcher = CountingDispatcher { calls: Vec::new() };
            let err: SextantError = account
                .execute(executor, mode.encode(), &payload, &mut dispatcher)
                .unwrap_err()
                .into();
            assert!(matches!(
                err,
                SextantError::Execute(ExecuteError::Authorization(_))
            ));
            assert_eq!(account.nonce(), 0);
            assert_eq!(dispatcher.calls, vec![addr(10)]);
        }
    }
}
