//! Notification fan-out for match request transitions
//!
//! Called by the match request repository inside the same transaction as the
//! state change. A single write yields at most one notification.

use crate::models::{
    match_request::{MatchRequest, MatchStatus, Transition},
    notification::{NewNotification, NotificationKind},
};

/// Build the notification owed for `transition`, if any.
///
/// `sender_name` and `recipient_name` are the display names of the request's
/// two users.
pub fn notification_for(
    request: &MatchRequest,
    transition: Transition,
    sender_name: &str,
    recipient_name: &str,
) -> Option<NewNotification> {
    let (user_id, title) = match transition {
        Transition::Created => (
            request.recipient_id,
            format!("{} wants to match with you", sender_name),
        ),
        Transition::Transitioned {
            from: MatchStatus::Pending,
            to: MatchStatus::Accepted,
        } => (
            request.sender_id,
            format!("{} accepted your match request", recipient_name),
        ),
        Transition::Transitioned {
            from: MatchStatus::Pending,
            to: MatchStatus::Rejected,
        } => (
            request.sender_id,
            format!("{} rejected your match request", recipient_name),
        ),
        Transition::Transitioned { .. } | Transition::NoOp => return None,
    };

    Some(NewNotification {
        user_id,
        request_id: request.id,
        kind: NotificationKind::MatchRequest,
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::match_request::Decision;
    use chrono::Utc;
    use uuid::Uuid;

    fn request() -> MatchRequest {
        MatchRequest {
            id: 11,
            sender_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            status: MatchStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_creation_notifies_recipient() {
        let request = request();
        let notification =
            notification_for(&request, Transition::Created, "Ana Rojas", "Luis Soto").unwrap();

        assert_eq!(notification.user_id, request.recipient_id);
        assert_eq!(notification.request_id, 11);
        assert_eq!(notification.kind, NotificationKind::MatchRequest);
        assert_eq!(notification.title, "Ana Rojas wants to match with you");
    }

    #[test]
    fn test_decisions_notify_sender() {
        let mut accepted = request();
        let transition = accepted
            .decide(accepted.recipient_id, Decision::Accept)
            .unwrap();
        let notification = notification_for(&accepted, transition, "Ana", "Luis").unwrap();
        assert_eq!(notification.user_id, accepted.sender_id);
        assert_eq!(notification.title, "Luis accepted your match request");

        let mut rejected = request();
        let transition = rejected
            .decide(rejected.recipient_id, Decision::Reject)
            .unwrap();
        let notification = notification_for(&rejected, transition, "Ana", "Luis").unwrap();
        assert_eq!(notification.user_id, rejected.sender_id);
        assert_eq!(notification.title, "Luis rejected your match request");
    }

    #[test]
    fn test_repeated_decisions_fire_once() {
        let mut request = request();
        let recipient = request.recipient_id;

        let fired: Vec<_> = [Decision::Accept, Decision::Accept, Decision::Reject]
            .into_iter()
            .filter_map(|decision| {
                let transition = request.decide(recipient, decision).unwrap();
                notification_for(&request, transition, "Ana", "Luis")
            })
            .collect();

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].title, "Luis accepted your match request");
    }

    #[test]
    fn test_noop_is_silent() {
        assert_eq!(
            notification_for(&request(), Transition::NoOp, "Ana", "Luis"),
            None
        );
    }
}
