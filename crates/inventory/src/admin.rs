use chrono::{DateTime, Utc};
use serde::Serialize;

use depot_core::AdminId;

/// Stored administrator credentials.
///
/// The hash is opaque here; verifying it belongs to the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admin {
    pub id: AdminId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
