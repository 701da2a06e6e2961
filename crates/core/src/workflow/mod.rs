//! Multi-level budget approval.
//!
//! # Modules
//!
//! - `types` - Templates, requests and their status
//! - `engine` - Pure approval state machine
//! - `service` - Persistence, budget effects, audit and notification
//! - `error` - Workflow-specific error types

pub mod engine;
pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use engine::ApprovalEngine;
pub use error::WorkflowError;
pub use service::ApprovalWorkflowEngine;
pub use types::{
    ApprovalAction, ApprovalDecision, ApprovalRecord, ApprovalRequest, ApprovalStatus,
    ApprovalStep, ApprovalWorkflow, ApprovalWorkflowBuilder,
};
