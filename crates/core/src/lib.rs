//! Core fund control logic for fundctl.
//!
//! This crate holds the domain types, pure rules, state machines and
//! services of federal budget execution, with no database or web
//! dependencies. Persistence goes through the [`store::FundControlStore`]
//! port.
//!
//! # Modules
//!
//! - `fiscal` - Fiscal years, appropriations and fund availability
//! - `obligation` - Obligations and expenditures
//! - `budget` - Budget version chains and variance reporting
//! - `workflow` - Multi-level approval
//! - `store` - Storage port and in-memory store
//! - `audit`, `identity`, `notify` - External collaborators

pub mod audit;
pub mod budget;
pub mod collaborators;
pub mod error;
pub mod fiscal;
pub mod identity;
pub mod notify;
pub mod obligation;
pub mod service;
pub mod store;
pub mod workflow;

pub use collaborators::Collaborators;
pub use service::FundControl;
pub use store::{FundControlStore, MemoryStore, StoreError};
