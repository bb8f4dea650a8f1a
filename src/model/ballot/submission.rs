use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    store::{user_key, Storage, StoreError, WriteBatch, USER_VOTES, VOTE_TIMESTAMP},
    user::UserId,
};

use super::selection::Selection;

/// A ballot as cast. Created once at confirmation and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotSubmission {
    pub selections: Selection,
    pub submitted_at: DateTime<Utc>,
}

impl BallotSubmission {
    pub fn new(selections: Selection, submitted_at: DateTime<Utc>) -> Self {
        Self {
            selections,
            submitted_at,
        }
    }

    /// Submission time as an ISO-8601 string with millisecond precision.
    pub fn timestamp(&self) -> String {
        self.submitted_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Write the selections and timestamp under the voter's keys, both or
    /// neither.
    pub async fn persist(&self, storage: &Storage, voter: UserId) -> Result<(), StoreError> {
        let batch = WriteBatch::default()
            .save(&user_key(voter, USER_VOTES), &self.selections)?
            .save(&user_key(voter, VOTE_TIMESTAMP), &self.timestamp())?;
        storage.commit(batch).await
    }

    /// Read back a voter's persisted submission, if both halves are present.
    pub fn load(storage: &Storage, voter: UserId) -> Option<Self> {
        let selections = storage.load(&user_key(voter, USER_VOTES))?;
        let timestamp: String = storage.load(&user_key(voter, VOTE_TIMESTAMP))?;
        let submitted_at = DateTime::parse_from_rfc3339(&timestamp)
            .ok()?
            .with_timezone(&Utc);
        Some(Self::new(selections, submitted_at))
    }
}
