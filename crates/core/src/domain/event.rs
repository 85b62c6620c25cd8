// Queue Events
//
// Every committed mutation of a department queue is described by a sequence
// of events. The same events feed live subscribers and the persistence outbox.

use serde::{Deserialize, Serialize};

use crate::domain::department::DepartmentId;
use crate::domain::token::{Token, TokenFields, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A new token entered the queue
    Issued { token: Token },

    /// Status, position or estimate of a token changed
    Updated {
        token_id: TokenId,
        department_id: DepartmentId,
        fields: TokenFields,
    },

    /// A token was deleted or evicted after retention
    Removed {
        token_id: TokenId,
        department_id: DepartmentId,
    },
}

impl QueueEvent {
    pub fn updated(token: &Token) -> Self {
        QueueEvent::Updated {
            token_id: token.id.clone(),
            department_id: token.department_id.clone(),
            fields: token.fields(),
        }
    }

    pub fn department_id(&self) -> &str {
        match self {
            QueueEvent::Issued { token } => &token.department_id,
            QueueEvent::Updated { department_id, .. } => department_id,
            QueueEvent::Removed { department_id, .. } => department_id,
        }
    }

    pub fn token_id(&self) -> &str {
        match self {
            QueueEvent::Issued { token } => &token.id,
            QueueEvent::Updated { token_id, .. } => token_id,
            QueueEvent::Removed { token_id, .. } => token_id,
        }
    }
}
