//! Match request model and its state machine
//!
//! A request starts `pending` and is resolved exactly once by its recipient,
//! either `accepted` or `rejected`. Every state change is reported as an
//! explicit [`Transition`] so callers never need to diff snapshots to decide
//! whether a notification is due.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status of a match request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Accepted,
    Rejected,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchStatus::Pending)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "accepted" => Ok(MatchStatus::Accepted),
            "rejected" => Ok(MatchStatus::Rejected),
            other => Err(format!("unknown match status: {}", other)),
        }
    }
}

/// Recipient's answer to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    fn target(&self) -> MatchStatus {
        match self {
            Decision::Accept => MatchStatus::Accepted,
            Decision::Reject => MatchStatus::Rejected,
        }
    }
}

/// Outcome of a write against a match request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new pending request was stored
    Created,
    /// The request left `from` for `to`
    Transitioned { from: MatchStatus, to: MatchStatus },
    /// Nothing changed; the request was already resolved
    NoOp,
}

/// Rule violations of the match request lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("You cannot send a match request to yourself")]
    SelfRequest,
    #[error("You are already matched with this user")]
    AlreadyMatched,
    #[error("You already have a pending request to this user")]
    DuplicatePending,
    #[error("This user already sent you a pending request; answer that one instead")]
    IncomingPending,
    #[error("Only the recipient can answer a match request")]
    NotRecipient,
}

/// Facts about a pair of users gathered before creating a request
#[derive(Debug, Clone, Copy, Default)]
pub struct PairState {
    pub already_matched: bool,
    pub pending_outgoing: bool,
    pub pending_incoming: bool,
}

/// Check whether `sender` may open a new request to `recipient`
pub fn check_new_request(sender: Uuid, recipient: Uuid, pair: PairState) -> Result<(), MatchError> {
    if sender == recipient {
        return Err(MatchError::SelfRequest);
    }
    if pair.already_matched {
        return Err(MatchError::AlreadyMatched);
    }
    if pair.pending_outgoing {
        return Err(MatchError::DuplicatePending);
    }
    if pair.pending_incoming {
        return Err(MatchError::IncomingPending);
    }
    Ok(())
}

/// Match request entity
#[derive(Debug, Clone, Serialize)]
pub struct MatchRequest {
    pub id: i64,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRequest {
    /// Apply the recipient's decision.
    ///
    /// Only the recipient may decide; a resolved request yields `NoOp`.
    pub fn decide(&mut self, actor: Uuid, decision: Decision) -> Result<Transition, MatchError> {
        if actor != self.recipient_id {
            return Err(MatchError::NotRecipient);
        }
        if self.status.is_terminal() {
            return Ok(Transition::NoOp);
        }

        let from = self.status;
        self.status = decision.target();
        Ok(Transition::Transitioned {
            from,
            to: self.status,
        })
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }
}

/// Raw database row; `status` is stored as text
#[derive(Debug, Clone, FromRow)]
pub struct MatchRequestRow {
    pub id: i64,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MatchRequestRow> for MatchRequest {
    type Error = String;

    fn try_from(row: MatchRequestRow) -> Result<Self, Self::Error> {
        Ok(MatchRequest {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Request for sending a match request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMatchRequest {
    pub recipient_id: Uuid,
}

/// Which side of the request the caller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestRole {
    Sent,
    Received,
}

/// Query parameters for listing the caller's requests
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchRequestQuery {
    pub role: Option<RequestRole>,
    pub status: Option<MatchStatus>,
}

/// Response for accept/reject
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResponse {
    pub request: MatchRequest,
    /// False when the request had already been resolved
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(sender: Uuid, recipient: Uuid) -> MatchRequest {
        MatchRequest {
            id: 1,
            sender_id: sender,
            recipient_id: recipient,
            status: MatchStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_request_rules() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(check_new_request(a, b, PairState::default()), Ok(()));
        assert_eq!(
            check_new_request(a, a, PairState::default()),
            Err(MatchError::SelfRequest)
        );
        assert_eq!(
            check_new_request(
                a,
                b,
                PairState {
                    already_matched: true,
                    ..Default::default()
                }
            ),
            Err(MatchError::AlreadyMatched)
        );
        assert_eq!(
            check_new_request(
                a,
                b,
                PairState {
                    pending_outgoing: true,
                    ..Default::default()
                }
            ),
            Err(MatchError::DuplicatePending)
        );
        assert_eq!(
            check_new_request(
                a,
                b,
                PairState {
                    pending_incoming: true,
                    ..Default::default()
                }
            ),
            Err(MatchError::IncomingPending)
        );
    }

    #[test]
    fn test_accept_transitions_once() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let mut request = pending(sender, recipient);

        assert_eq!(
            request.decide(recipient, Decision::Accept),
            Ok(Transition::Transitioned {
                from: MatchStatus::Pending,
                to: MatchStatus::Accepted,
            })
        );
        assert_eq!(request.status, MatchStatus::Accepted);

        // Resolved requests are immutable; later answers are no-ops
        assert_eq!(
            request.decide(recipient, Decision::Reject),
            Ok(Transition::NoOp)
        );
        assert_eq!(
            request.decide(recipient, Decision::Accept),
            Ok(Transition::NoOp)
        );
        assert_eq!(request.status, MatchStatus::Accepted);
    }

    #[test]
    fn test_reject_transition() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let mut request = pending(sender, recipient);

        assert_eq!(
            request.decide(recipient, Decision::Reject),
            Ok(Transition::Transitioned {
                from: MatchStatus::Pending,
                to: MatchStatus::Rejected,
            })
        );
        assert_eq!(request.status, MatchStatus::Rejected);
    }

    #[test]
    fn test_only_recipient_can_decide() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let mut request = pending(sender, recipient);

        assert_eq!(
            request.decide(sender, Decision::Accept),
            Err(MatchError::NotRecipient)
        );
        assert_eq!(
            request.decide(Uuid::new_v4(), Decision::Reject),
            Err(MatchError::NotRecipient)
        );
        assert_eq!(request.status, MatchStatus::Pending);
    }

    #[test]
    fn test_permission_is_checked_before_terminal_state() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let mut request = pending(sender, recipient);
        request.status = MatchStatus::Rejected;

        assert_eq!(
            request.decide(sender, Decision::Accept),
            Err(MatchError::NotRecipient)
        );
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in [
            MatchStatus::Pending,
            MatchStatus::Accepted,
            MatchStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<MatchStatus>(), Ok(status));
        }
        assert!("maybe".parse::<MatchStatus>().is_err());
    }
}
