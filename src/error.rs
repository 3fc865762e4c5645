use thiserror::Error;

use crate::account::engine::{AccountError, ExecuteError};
use crate::factory::FactoryError;

/// Crate-level error for callers driving the factory and accounts together.
#[derive(Error, Debug)]
pub enum SextantError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
}
