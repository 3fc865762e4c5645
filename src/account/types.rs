//! Identifier and payload types for the account engine

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width of an account identifier in bytes
pub const ADDRESS_WIDTH: usize = 20;
/// Width of a deployment salt in bytes
pub const SALT_WIDTH: usize = 32;
/// Width of a call selector in bytes
pub const SELECTOR_WIDTH: usize = 4;

/// Call selector taken from the head of an item payload
pub type Selector = [u8; SELECTOR_WIDTH];

/// Selector reported for plain value transfers (payload shorter than the selector)
pub const ZERO_SELECTOR: Selector = [0u8; SELECTOR_WIDTH];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexParseError {
    #[error("expected {expected} hex-encoded bytes, got {got}")]
    BadLength { expected: usize, got: usize },
    #[error("invalid hex: {0}")]
    BadHex(#[from] hex::FromHexError),
}

/// Identifier of an account or counterparty.
///
/// Derived addresses are the first 20 bytes of a SHA-256 digest, so placement
/// stays collision resistant while identifiers remain short enough to prefix
/// into a salt.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_WIDTH]);

impl Address {
    pub fn new(bytes: [u8; ADDRESS_WIDTH]) -> Self {
        Address(bytes)
    }

    pub fn zero() -> Self {
        Address([0u8; ADDRESS_WIDTH])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_WIDTH]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_WIDTH] {
        &self.0
    }

    /// Derive an address from an arbitrary preimage (truncated SHA-256)
    pub fn derive(preimage: &[u8]) -> Self {
        let digest = Sha256::digest(preimage);
        let mut bytes = [0u8; ADDRESS_WIDTH];
        bytes.copy_from_slice(&digest[..ADDRESS_WIDTH]);
        Address(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        if bytes.len() != ADDRESS_WIDTH {
            return Err(HexParseError::BadLength {
                expected: ADDRESS_WIDTH,
                got: bytes.len(),
            });
        }
        let mut out = [0u8; ADDRESS_WIDTH];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddressVisitor;

        impl<'de> Visitor<'de> for AddressVisitor {
            type Value = Address;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a hex-encoded address")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Address, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(AddressVisitor)
    }
}

/// Deployment salt.
///
/// The first [`ADDRESS_WIDTH`] bytes are the caller-prefix region: they must
/// equal the deployer's address, or be entirely zero for the shared prefix
/// any caller may use. The remaining 12 bytes are a free suffix.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; SALT_WIDTH]);

impl Salt {
    pub fn new(bytes: [u8; SALT_WIDTH]) -> Self {
        Salt(bytes)
    }

    /// Salt whose prefix region names the deploying caller
    pub fn prefixed(caller: Address, suffix: [u8; SALT_WIDTH - ADDRESS_WIDTH]) -> Self {
        let mut bytes = [0u8; SALT_WIDTH];
        bytes[..ADDRESS_WIDTH].copy_from_slice(caller.as_bytes());
        bytes[ADDRESS_WIDTH..].copy_from_slice(&suffix);
        Salt(bytes)
    }

    /// Salt with the all-zero shared prefix
    pub fn anonymous(suffix: [u8; SALT_WIDTH - ADDRESS_WIDTH]) -> Self {
        Salt::prefixed(Address::zero(), suffix)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_WIDTH] {
        &self.0
    }

    fn prefix(&self) -> Address {
        let mut bytes = [0u8; ADDRESS_WIDTH];
        bytes.copy_from_slice(&self.0[..ADDRESS_WIDTH]);
        Address::new(bytes)
    }

    /// True if the prefix region equals `caller`
    pub fn starts_with(&self, caller: Address) -> bool {
        self.prefix() == caller
    }

    /// True if the prefix region is the shared all-zero carve-out
    pub fn has_shared_prefix(&self) -> bool {
        self.prefix().is_zero()
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self)
    }
}

impl FromStr for Salt {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        if bytes.len() != SALT_WIDTH {
            return Err(HexParseError::BadLength {
                expected: SALT_WIDTH,
                got: bytes.len(),
            });
        }
        let mut out = [0u8; SALT_WIDTH];
        out.copy_from_slice(&bytes);
        Ok(Salt(out))
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SaltVisitor;

        impl<'de> Visitor<'de> for SaltVisitor {
            type Value = Salt;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a hex-encoded salt")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Salt, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(SaltVisitor)
    }
}

/// One outbound call descriptor within a batch
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExecutionItem {
    pub target: Address,
    pub value: u128,
    pub payload: Vec<u8>,
}

impl ExecutionItem {
    /// Selector/params view of the payload.
    ///
    /// Payloads shorter than the selector width are plain value transfers:
    /// they authorize under the zero selector with the full payload as params.
    pub fn selector_and_params(&self) -> (Selector, &[u8]) {
        if self.payload.len() < SELECTOR_WIDTH {
            return (ZERO_SELECTOR, self.payload.as_slice());
        }
        let mut selector = ZERO_SELECTOR;
        selector.copy_from_slice(&self.payload[..SELECTOR_WIDTH]);
        (selector, &self.payload[SELECTOR_WIDTH..])
    }
}

/// Ordered notification emitted while a batch commits
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ExecutionEvent {
    ItemExecuted {
        nonce: u64,
        caller: Address,
        target: Address,
        payload: Vec<u8>,
        value: u128,
        result: Vec<u8>,
    },
    ItemFailed {
        index: u32,
        reason: String,
    },
}

/// Outcome of one item, populated win or lose
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemOutcome {
    pub success: bool,
    pub return_data: Vec<u8>,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(return_data: Vec<u8>) -> Self {
        ItemOutcome {
            success: true,
            return_data,
            error: None,
        }
    }

    pub fn failed(reason: String) -> Self {
        ItemOutcome {
            success: false,
            return_data: Vec::new(),
            error: Some(reason),
        }
    }
}

/// Result of a committed invocation: per-item outcomes plus the ordered
/// notifications. Failed invocations surface neither.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ExecutionReceipt {
    pub outcomes: Vec<ItemOutcome>,
    pub events: Vec<ExecutionEvent>,
}

impl ExecutionReceipt {
    /// Per-item return payloads, in item order
    pub fn return_data(&self) -> Vec<Vec<u8>> {
        self.outcomes.iter().map(|o| o.return_data.clone()).collect()
    }
}
