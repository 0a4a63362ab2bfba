//! Conversation and message models, plus the access rules for chatting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Conversation with its participant ids
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
    pub id: i64,
    pub participants: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// Participants other than `user_id`
    pub fn others(&self, user_id: Uuid) -> Vec<Uuid> {
        self.participants
            .iter()
            .copied()
            .filter(|id| *id != user_id)
            .collect()
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: Uuid,
    pub content: String,
    pub read: bool,
    pub sent_at: DateTime<Utc>,
}

/// Participant ids as a JSON array or a comma-separated string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParticipantIds {
    List(Vec<Uuid>),
    Csv(String),
}

impl Default for ParticipantIds {
    fn default() -> Self {
        ParticipantIds::List(Vec::new())
    }
}

impl ParticipantIds {
    /// Parse into a de-duplicated id list, preserving first-seen order
    pub fn into_ids(self) -> Result<Vec<Uuid>, String> {
        let ids = match self {
            ParticipantIds::List(ids) => ids,
            ParticipantIds::Csv(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Uuid::parse_str(s).map_err(|_| format!("Invalid participant id: {}", s)))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let mut seen = HashSet::new();
        Ok(ids.into_iter().filter(|id| seen.insert(*id)).collect())
    }
}

/// Request for creating a conversation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub participants: ParticipantIds,
}

/// Request for sending a message
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
}

/// Query parameters for message listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesQuery {
    /// ISO-8601 timestamp; only messages sent strictly after it are returned
    pub since: Option<String>,
}

/// Query parameters for the message stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamQuery {
    /// Id of the last message the client already holds
    pub last_id: Option<i64>,
}

/// Why a user may not chat in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatAccessError {
    #[error("You are not a participant of this conversation")]
    NotParticipant,
    #[error("You can only chat with users you are matched with")]
    NotMatched,
}

/// Reading requires membership only
pub fn check_read_access(conversation: &Conversation, user_id: Uuid) -> Result<(), ChatAccessError> {
    if conversation.has_participant(user_id) {
        Ok(())
    } else {
        Err(ChatAccessError::NotParticipant)
    }
}

/// Writing and streaming require membership and a match with every other participant
pub fn check_write_access(
    conversation: &Conversation,
    user_id: Uuid,
    matched: &HashSet<Uuid>,
) -> Result<(), ChatAccessError> {
    check_read_access(conversation, user_id)?;

    if conversation
        .others(user_id)
        .iter()
        .all(|other| matched.contains(other))
    {
        Ok(())
    } else {
        Err(ChatAccessError::NotMatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(participants: Vec<Uuid>) -> Conversation {
        Conversation {
            id: 7,
            participants,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_participant_ids_from_array_and_csv() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let from_list = ParticipantIds::List(vec![a, b, a]).into_ids().unwrap();
        assert_eq!(from_list, vec![a, b]);

        let from_csv = ParticipantIds::Csv(format!("{}, {},", a, b))
            .into_ids()
            .unwrap();
        assert_eq!(from_csv, vec![a, b]);

        assert!(ParticipantIds::Csv("nope".to_string()).into_ids().is_err());
    }

    #[test]
    fn test_participants_deserialize_both_shapes() {
        let a = Uuid::new_v4();

        let list: CreateConversationRequest =
            serde_json::from_value(serde_json::json!({ "participants": [a] })).unwrap();
        assert_eq!(list.participants.into_ids().unwrap(), vec![a]);

        let csv: CreateConversationRequest =
            serde_json::from_value(serde_json::json!({ "participants": a.to_string() })).unwrap();
        assert_eq!(csv.participants.into_ids().unwrap(), vec![a]);

        let missing: CreateConversationRequest =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(missing.participants.into_ids().unwrap().is_empty());
    }

    #[test]
    fn test_non_participant_is_rejected() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let chat = conversation(vec![other]);
        let matched = HashSet::from([other]);

        assert_eq!(
            check_read_access(&chat, me),
            Err(ChatAccessError::NotParticipant)
        );
        assert_eq!(
            check_write_access(&chat, me, &matched),
            Err(ChatAccessError::NotParticipant)
        );
    }

    #[test]
    fn test_write_requires_match_with_every_other_participant() {
        let me = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let chat = conversation(vec![me, friend, stranger]);

        assert_eq!(check_read_access(&chat, me), Ok(()));
        assert_eq!(
            check_write_access(&chat, me, &HashSet::from([friend])),
            Err(ChatAccessError::NotMatched)
        );
        assert_eq!(
            check_write_access(&chat, me, &HashSet::from([friend, stranger])),
            Ok(())
        );
    }

    #[test]
    fn test_access_errors_do_not_leak_participants() {
        let message = ChatAccessError::NotMatched.to_string();
        assert!(!message.contains('-'));
    }
}
