//! # Linkdeck Core
//!
//! Core types, traits, and errors shared by the Linkdeck crates.
//!
//! The ledger that owns profiles is reached only through narrow traits so
//! the same reconciliation logic runs against a real chain client or the
//! in-memory ledger used by tests and demos.
//!
//! ## Key Traits
//!
//! - [`LedgerClient`]: read access to remote objects
//! - [`TransactionSigner`]: the external signing/execution service
//! - [`LinkProbe`]: reachability probe used before a link enters the library
//!
//! ## Key Types
//!
//! - [`Profile`]: authoritative profile record with its [`LinkMap`]
//! - [`Transaction`]: opaque mutation consumed by the signer
//! - [`Notifier`]: toast bus for user-visible outcomes
//! - [`InMemoryLedger`]: ledger implementing the contract rules in memory

pub mod error;
pub mod mock_ledger;
pub mod notify;
pub mod profile;
pub mod traits;
pub mod transaction;
pub mod validation;

pub use error::*;
pub use mock_ledger::*;
pub use notify::*;
pub use profile::*;
pub use traits::*;
pub use transaction::*;
pub use validation::*;
