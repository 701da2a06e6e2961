//! Best-effort approval notifications.

use fundctl_shared::types::{ApprovalRequestId, BudgetId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// What happened to an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Request is waiting on a new level.
    Advanced {
        /// Level now pending.
        level: u8,
    },
    /// Request fully approved.
    Approved,
    /// Request rejected.
    Rejected,
    /// Request returned to the submitter.
    Returned,
    /// Pending level handed to another approver.
    Delegated {
        /// New approver.
        to: UserId,
    },
}

/// Notification about an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalNotification {
    /// Request concerned.
    pub request_id: ApprovalRequestId,
    /// Budget under approval.
    pub budget_id: BudgetId,
    /// Who submitted the request.
    pub submitted_by: UserId,
    /// What happened.
    pub kind: NotificationKind,
    /// Approver comments, if any.
    pub comments: Option<String>,
}

/// Delivers notifications. Must not block.
pub trait NotificationDispatcher: Send + Sync {
    /// Hands a notification off for delivery.
    fn dispatch(&self, notification: ApprovalNotification);
}

/// Logs notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationDispatcher for TracingNotifier {
    fn dispatch(&self, notification: ApprovalNotification) {
        tracing::info!(
            request_id = %notification.request_id,
            budget_id = %notification.budget_id,
            kind = ?notification.kind,
            "approval notification"
        );
    }
}

/// Forwards notifications to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<ApprovalNotification>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ApprovalNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationDispatcher for ChannelNotifier {
    fn dispatch(&self, notification: ApprovalNotification) {
        if self.sender.send(notification).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_delivers() {
        let (notifier, mut receiver) = ChannelNotifier::new();
        let notification = ApprovalNotification {
            request_id: ApprovalRequestId::new(),
            budget_id: BudgetId::new(),
            submitted_by: UserId::new(),
            kind: NotificationKind::Advanced { level: 2 },
            comments: None,
        };

        notifier.dispatch(notification.clone());
        assert_eq!(receiver.try_recv().unwrap(), notification);
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, receiver) = ChannelNotifier::new();
        drop(receiver);
        notifier.dispatch(ApprovalNotification {
            request_id: ApprovalRequestId::new(),
            budget_id: BudgetId::new(),
            submitted_by: UserId::new(),
            kind: NotificationKind::Rejected,
            comments: Some("over ceiling".into()),
        });
    }
}
