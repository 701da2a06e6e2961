//! External collaborators used by the services.

use fundctl_shared::types::UserId;
use std::sync::Arc;

use crate::audit::{AuditRecord, AuditSink, TracingAuditSink};
use crate::identity::{Role, RoleProvider, StaticRoleProvider};
use crate::notify::{ApprovalNotification, NotificationDispatcher, TracingNotifier};
use crate::store::StoreError;

/// Role provider, audit sink and notification dispatcher shared by the
/// services.
#[derive(Clone)]
pub struct Collaborators {
    roles: Arc<dyn RoleProvider>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            roles: Arc::new(StaticRoleProvider::default()),
            audit: Arc::new(TracingAuditSink),
            notifier: Arc::new(TracingNotifier),
        }
    }
}

impl Collaborators {
    /// Replaces the role provider.
    #[must_use]
    pub fn with_roles(mut self, roles: Arc<dyn RoleProvider>) -> Self {
        self.roles = roles;
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the notification dispatcher.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Roles held by `user`.
    pub(crate) async fn roles(&self, user: UserId) -> Result<Vec<Role>, StoreError> {
        self.roles.roles(user).await
    }

    /// Writes an audit record. Failures are logged and swallowed.
    pub(crate) async fn audit(&self, record: AuditRecord) {
        if let Err(e) = self.audit.record(&record).await {
            tracing::warn!(
                error = %e,
                action = %record.action,
                entity_id = %record.entity_id,
                "audit sink rejected record"
            );
        }
    }

    /// Dispatches a notification.
    pub(crate) fn notify(&self, notification: ApprovalNotification) {
        self.notifier.dispatch(notification);
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
