//! Outbound call seam
//!
//! The engine performs every outbound call through this trait so the host
//! wiring (in-process targets, test doubles, a real transport) stays out of
//! the execution loop.

use thiserror::Error;

use super::types::Address;

/// Failure of a single outbound call
#[derive(Error, Debug, Clone, PartialEq)]
#[error("outbound call to {target} failed: {reason}")]
pub struct DispatchError {
    pub target: Address,
    pub reason: String,
}

/// Performs outbound calls on behalf of an account, forwarding the full
/// value and payload of each execution item.
pub trait Dispatcher {
    fn dispatch(
        &mut self,
        from: Address,
        target: Address,
        value: u128,
        payload: &[u8],
    ) -> Result<Vec<u8>, DispatchError>;
}
