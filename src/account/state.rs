//! Versioned account state, accessed only through accessor methods
//!
//! The implementation pointer does not live among the ordinary fields: it
//! sits in its own reserved slot whose key is derived from a fixed domain
//! string, so later versions of this struct can add fields without ever
//! aliasing the pointer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use super::roles::RoleSet;
use super::types::Address;

/// Layout version of [`AccountState`]
pub const STATE_VERSION: u16 = 1;

/// Domain string the implementation slot key is derived from. Changing this
/// string changes the slot key and breaks layout compatibility.
pub const IMPLEMENTATION_SLOT_DOMAIN: &str = "sextant.account.implementation.v1";

/// Reserved, collision-resistant slot holding the implementation pointer
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImplementationSlot {
    slot_key: String,
    implementation: Address,
}

impl ImplementationSlot {
    pub fn new(implementation: Address) -> Self {
        ImplementationSlot {
            slot_key: Self::derive_key(),
            implementation,
        }
    }

    /// Slot key: SHA-256 of the domain string, hex encoded
    pub fn derive_key() -> String {
        hex::encode(Sha256::digest(IMPLEMENTATION_SLOT_DOMAIN.as_bytes()))
    }

    pub fn slot_key(&self) -> &str {
        &self.slot_key
    }

    pub fn get(&self) -> Address {
        self.implementation
    }

    pub(crate) fn set(&mut self, implementation: Address) {
        self.implementation = implementation;
    }
}

/// Ordinary account fields: owner, identifiers, nonce, role map
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountState {
    version: u16,
    initialized: bool,
    address: Address,
    owner: Address,
    account_id: String,
    registry: Address,
    nonce: u64,
    roles: HashMap<Address, RoleSet>,
}

impl AccountState {
    pub fn new() -> Self {
        AccountState {
            version: STATE_VERSION,
            initialized: false,
            address: Address::zero(),
            owner: Address::zero(),
            account_id: String::new(),
            registry: Address::zero(),
            nonce: 0,
            roles: HashMap::new(),
        }
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// One-time binding of identity fields; the caller enforces one-time
    pub(crate) fn bind(
        &mut self,
        address: Address,
        owner: Address,
        registry: Address,
        account_id: &str,
    ) {
        self.address = address;
        self.owner = owner;
        self.registry = registry;
        self.account_id = account_id.to_string();
        self.initialized = true;
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Address) {
        self.owner = owner;
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn registry(&self) -> Address {
        self.registry
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Increment and return the new nonce
    pub(crate) fn increment_nonce(&mut self) -> u64 {
        self.nonce += 1;
        self.nonce
    }

    /// Roll the nonce back to a snapshot taken before an aborted batch
    pub(crate) fn restore_nonce(&mut self, snapshot: u64) {
        self.nonce = snapshot;
    }

    /// Capability set held by an address; absent entries hold nothing
    pub fn roles_of(&self, address: Address) -> RoleSet {
        self.roles.get(&address).copied().unwrap_or(RoleSet::EMPTY)
    }

    pub(crate) fn grant_to(&mut self, address: Address, roles: RoleSet) {
        self.roles.entry(address).or_insert(RoleSet::EMPTY).grant(roles);
    }

    pub(crate) fn revoke_from(&mut self, address: Address, roles: RoleSet) {
        if let Some(set) = self.roles.get_mut(&address) {
            set.revoke(roles);
            if set.is_empty() {
                self.roles.remove(&address);
            }
        }
    }
}

impl Default for AccountState {
    fn default() -> Self {
        Self::new()
    }
}
