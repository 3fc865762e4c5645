//! Execution engine: mode dispatch and the two batch failure policies
//!
//! Abort-all (`Batch`/`Default`) treats the whole invocation as one unit of
//! work: any authorization denial or outbound-call failure restores the nonce
//! snapshot, surfaces no notifications, and fails the call. Continue-on-failure
//! (`Batch`/`Try`) isolates outbound-call failures per item and keeps going;
//! authorization denials still abort the whole invocation under this policy
//! (the propagating behavior — the per-item alternative is a product decision
//! recorded in DESIGN.md, not taken silently). The nonce is incremented before
//! each item's outbound call, once per processed item.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::batch::{decode_batch, DecodingError};
use super::dispatch::{DispatchError, Dispatcher};
use super::mode::{CallType, ExecType, Mode, ModeCode};
use super::registry::{AuthorizationFailure, AuthorizationRegistry};
use super::roles::{AccessError, Role, RoleSet};
use super::state::{AccountState, ImplementationSlot};
use super::types::{Address, ExecutionEvent, ExecutionReceipt, ItemOutcome, Selector};

/// Lifecycle and administration failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccountError {
    #[error("account is already initialized")]
    Reinitialization,
    #[error("account is not initialized")]
    NotInitialized,
    #[error("authorization gateway is already attached")]
    GatewayAlreadyAttached,
    #[error("upgrade must arrive through the account entry point")]
    DirectUpgradeCall,
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Failures of a single `execute` invocation. Every variant aborts the whole
/// invocation with no partial commit, except that under the
/// continue-on-failure policy per-item outbound failures are reported in the
/// receipt instead of surfacing here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecuteError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("unsupported call type 0x{0:02x}")]
    UnsupportedCallType(u8),
    #[error("unsupported exec type 0x{0:02x}")]
    UnsupportedExecType(u8),
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationFailure),
    #[error("item {index}: {source}")]
    CallFailed { index: u32, source: DispatchError },
}

/// A programmable account: owner, role map, nonce, registry binding, and the
/// batch-execution engine behind `execute`.
///
/// Created uninitialized, bound exactly once via [`SmartAccount::initialize`].
/// The authorization gateway travels outside serialized snapshots (same shape
/// as a detachable storage handle) and is re-attached after a load.
#[derive(Serialize, Deserialize, Clone)]
pub struct SmartAccount {
    state: AccountState,
    implementation: ImplementationSlot,

    #[serde(skip)]
    gateway: Option<Arc<dyn AuthorizationRegistry>>,
}

impl SmartAccount {
    /// Fresh, uninitialized account instance for the given implementation
    pub fn new(implementation: Address) -> Self {
        SmartAccount {
            state: AccountState::new(),
            implementation: ImplementationSlot::new(implementation),
            gateway: None,
        }
    }

    /// One-time binding of owner, registry and account id
    pub fn initialize(
        &mut self,
        address: Address,
        owner: Address,
        registry: Address,
        gateway: Arc<dyn AuthorizationRegistry>,
        account_id: &str,
    ) -> Result<(), AccountError> {
        if self.state.is_initialized() {
            return Err(AccountError::Reinitialization);
        }
        self.state.bind(address, owner, registry, account_id);
        self.gateway = Some(gateway);
        info!(account = %address, owner = %owner, id = account_id, "account initialized");
        Ok(())
    }

    /// Re-attach the gateway capability after loading a serialized snapshot.
    /// The registry identifier itself is bound at initialization and never
    /// changes.
    pub fn attach_gateway(
        &mut self,
        gateway: Arc<dyn AuthorizationRegistry>,
    ) -> Result<(), AccountError> {
        if self.gateway.is_some() {
            return Err(AccountError::GatewayAlreadyAttached);
        }
        self.gateway = Some(gateway);
        Ok(())
    }

    // --- Read-only accessors ---

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    pub fn address(&self) -> Address {
        self.state.address()
    }

    pub fn owner(&self) -> Address {
        self.state.owner()
    }

    pub fn account_id(&self) -> &str {
        self.state.account_id()
    }

    pub fn registry(&self) -> Address {
        self.state.registry()
    }

    pub fn nonce(&self) -> u64 {
        self.state.nonce()
    }

    pub fn implementation(&self) -> Address {
        self.implementation.get()
    }

    pub fn roles_of(&self, address: Address) -> RoleSet {
        self.state.roles_of(address)
    }

    /// Read-only registry query, no bookkeeping side effects
    pub fn is_allowed(
        &self,
        caller: Address,
        target: Address,
        selector: Selector,
    ) -> Result<bool, AccountError> {
        Ok(self.gateway()?.is_allowed(caller, target, selector))
    }

    // --- Role and ownership administration (owner-gated) ---

    pub fn grant_roles(
        &mut self,
        caller: Address,
        grantee: Address,
        roles: RoleSet,
    ) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.state.grant_to(grantee, roles);
        info!(account = %self.state.address(), grantee = %grantee, ?roles, "roles granted");
        Ok(())
    }

    pub fn revoke_roles(
        &mut self,
        caller: Address,
        holder: Address,
        roles: RoleSet,
    ) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.state.revoke_from(holder, roles);
        info!(account = %self.state.address(), holder = %holder, ?roles, "roles revoked");
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), AccountError> {
        self.require_owner(caller)?;
        self.state.set_owner(new_owner);
        info!(account = %self.state.address(), new_owner = %new_owner, "ownership transferred");
        Ok(())
    }

    // --- Execution ---

    /// Execute a batch under the policy the mode selects.
    ///
    /// Requires the caller to hold the Executor role; the owner holds no
    /// roles it has not been granted explicitly.
    pub fn execute(
        &mut self,
        caller: Address,
        mode: ModeCode,
        payload: &[u8],
        dispatcher: &mut dyn Dispatcher,
    ) -> Result<ExecutionReceipt, ExecuteError> {
        if !self.state.is_initialized() {
            return Err(AccountError::NotInitialized.into());
        }
        if !self.state.roles_of(caller).has(Role::Executor) {
            return Err(AccessError::MissingRole {
                caller,
                role: Role::Executor,
            }
            .into());
        }

        let mode = Mode::decode(&mode);
        match (mode.call_type, mode.exec_type) {
            (CallType::Batch, ExecType::Default) => self.run_abort_all(caller, payload, dispatcher),
            (CallType::Batch, ExecType::Try) => {
                self.run_continue_on_failure(caller, payload, dispatcher)
            }
            (CallType::Batch, other) => Err(ExecuteError::UnsupportedExecType(other.to_byte())),
            (other, _) => Err(ExecuteError::UnsupportedCallType(other.to_byte())),
        }
    }

    /// Abort-all loop: all-or-nothing over the whole batch
    fn run_abort_all(
        &mut self,
        caller: Address,
        payload: &[u8],
        dispatcher: &mut dyn Dispatcher,
    ) -> Result<ExecutionReceipt, ExecuteError> {
        let items = decode_batch(payload)?;
        let gateway = self.gateway()?.clone();
        let snapshot = self.state.nonce();
        let mut outcomes = Vec::with_capacity(items.len());
        let mut events = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let nonce = self.state.increment_nonce();
            let (selector, params) = item.selector_and_params();

            if let Err(denial) =
                gateway.authorize(self.state.address(), item.target, selector, params)
            {
                self.state.restore_nonce(snapshot);
                warn!(account = %self.state.address(), index, "batch aborted: {}", denial);
                return Err(denial.into());
            }

            match dispatcher.dispatch(self.state.address(), item.target, item.value, &item.payload)
            {
                Ok(result) => {
                    events.push(ExecutionEvent::ItemExecuted {
                        nonce,
                        caller,
                        target: item.target,
                        payload: item.payload.clone(),
                        value: item.value,
                        result: result.clone(),
                    });
                    outcomes.push(ItemOutcome::succeeded(result));
                }
                Err(failure) => {
                    self.state.restore_nonce(snapshot);
                    warn!(account = %self.state.address(), index, "batch aborted: {}", failure);
                    return Err(ExecuteError::CallFailed {
                        index: index as u32,
                        source: failure,
                    });
                }
            }
        }

        debug!(account = %self.state.address(), items = items.len(), "batch committed");
        Ok(ExecutionReceipt { outcomes, events })
    }

    /// Continue-on-failure loop: outbound failures are caught per item and
    /// reported; the failing item's nonce increment stands.
    fn run_continue_on_failure(
        &mut self,
        caller: Address,
        payload: &[u8],
        dispatcher: &mut dyn Dispatcher,
    ) -> Result<ExecutionReceipt, ExecuteError> {
        let items = decode_batch(payload)?;
        let gateway = self.gateway()?.clone();
        let snapshot = self.state.nonce();
        let mut outcomes = Vec::with_capacity(items.len());
        let mut events = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let nonce = self.state.increment_nonce();
            let (selector, params) = item.selector_and_params();

            // Denials are not isolated: they abort the whole invocation
            if let Err(denial) =
                gateway.authorize(self.state.address(), item.target, selector, params)
            {
                self.state.restore_nonce(snapshot);
                warn!(account = %self.state.address(), index, "batch aborted: {}", denial);
                return Err(denial.into());
            }

            match dispatcher.dispatch(self.state.address(), item.target, item.value, &item.payload)
            {
                Ok(result) => {
                    events.push(ExecutionEvent::ItemExecuted {
                        nonce,
                        caller,
                        target: item.target,
                        payload: item.payload.clone(),
                        value: item.value,
                        result: result.clone(),
                    });
                    outcomes.push(ItemOutcome::succeeded(result));
                }
                Err(failure) => {
                    debug!(account = %self.state.address(), index, "item failed: {}", failure);
                    events.push(ExecutionEvent::ItemFailed {
                        index: index as u32,
                        reason: failure.to_string(),
                    });
                    outcomes.push(ItemOutcome::failed(failure.to_string()));
                }
            }
        }

        debug!(account = %self.state.address(), items = items.len(), "batch committed");
        Ok(ExecutionReceipt { outcomes, events })
    }

    fn gateway(&self) -> Result<&Arc<dyn AuthorizationRegistry>, AccountError> {
        self.gateway.as_ref().ok_or(AccountError::NotInitialized)
    }

    pub(crate) fn require_owner(&self, caller: Address) -> Result<(), AccountError> {
        if !self.state.is_initialized() {
            return Err(AccountError::NotInitialized);
        }
        if caller != self.state.owner() {
            return Err(AccessError::NotOwner { caller }.into());
        }
        Ok(())
    }

    pub(crate) fn set_implementation(&mut self, implementation: Address) {
        self.implementation.set(implementation);
    }
}
