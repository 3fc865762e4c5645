pub mod account; // authorization-gated execution engine
pub mod encoding;
pub mod error;
pub mod factory; // deterministic placement + factory-side administration
