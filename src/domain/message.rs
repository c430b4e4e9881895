//! Private (direct) messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::id::{PrivateMessageId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub id: PrivateMessageId,
    pub sender: UserId,
    pub receiver: UserId,
    pub content: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewPrivateMessage {
    pub sender: UserId,
    pub receiver: UserId,
    pub content: String,
}
