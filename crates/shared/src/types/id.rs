//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing an `ObligationId` where an
//! `AppropriationId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user (submitter, approver, or admin).");
typed_id!(OrganizationId, "Unique identifier for an organization.");
typed_id!(FiscalYearId, "Unique identifier for a fiscal year.");
typed_id!(AppropriationId, "Unique identifier for an appropriation.");
typed_id!(BudgetId, "Unique identifier for a budget.");
typed_id!(
    BudgetLineItemId,
    "Unique identifier for a budget line item, stable across versions."
);
typed_id!(ObligationId, "Unique identifier for an obligation.");
typed_id!(ExpenditureId, "Unique identifier for an expenditure.");
typed_id!(ApprovalWorkflowId, "Unique identifier for an approval workflow template.");
typed_id!(ApprovalRequestId, "Unique identifier for an approval request.");
typed_id!(AuditRecordId, "Unique identifier for an audit record.");
