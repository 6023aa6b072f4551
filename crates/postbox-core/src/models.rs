//! Core domain models and strongly-typed identifiers.
//!
//! Defines queue messages, the newtype message ID wrapper, and the
//! synthetic principal attached to authenticated scheduler requests.
//! Includes database serialization traits for the Postgres queue
//! backend.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed queue message identifier.
///
/// Wraps a UUID to prevent mixing with other ID types. The ID follows a
/// message from enqueue through deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for MessageId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for MessageId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for MessageId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// A message fetched from the queue.
///
/// The payload is an opaque UTF-8 string; no schema is enforced here.
/// Delivery metadata (`dequeue_count`, `visible_at`) is owned by the
/// queue backend. A message is removed from the queue only by explicit
/// deletion after its effect has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Unique message identifier.
    pub id: MessageId,
    /// Opaque message payload.
    pub payload: String,
    /// Number of times this message has been fetched.
    pub dequeue_count: i32,
    /// Instant at which the message becomes visible to fetchers again.
    pub visible_at: DateTime<Utc>,
    /// When the message was appended to the queue.
    pub enqueued_at: DateTime<Utc>,
}

/// Role claim carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Trusted external scheduler invoking privileged endpoints.
    Scheduler,
}

impl Role {
    /// String form of the role claim.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduler => "scheduler",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic identity attached to a request after shared-secret
/// authentication succeeds.
///
/// Constructed fresh per request, carried in the request's extensions
/// for the remainder of the pipeline, and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Name identifier claim.
    pub name: String,
    /// Role claim checked by the authorization gate.
    pub role: Role,
    /// Issuer claim identifying how the identity was established.
    pub issuer: String,
}

impl Principal {
    /// Creates the trusted scheduler identity.
    pub fn scheduler() -> Self {
        Self {
            name: "scheduler".to_string(),
            role: Role::Scheduler,
            issuer: "application".to_string(),
        }
    }

    /// Returns true if this principal carries the given role.
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}
