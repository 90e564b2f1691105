use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Actor, Engine, require_admin};
use crate::error::Result;
use crate::store::Tx;
use crate::types::{AuditEvent, AuditLog};

pub const DEFAULT_AUDIT_PAGE: u32 = 50;
const MAX_AUDIT_PAGE: u32 = 200;

/// Appends one audit row for `event` inside the caller's transaction.
pub(crate) fn record(tx: &dyn Tx, actor_id: &str, event: &AuditEvent, at: DateTime<Utc>) -> Result<()> {
    let entry = AuditLog {
        id: Uuid::new_v4().to_string(),
        seq: 0,
        actor_user_id: actor_id.to_string(),
        action: event.action().to_string(),
        entity: event.entity().to_string(),
        entity_id: event.entity_id(),
        payload: event.payload()?,
        at,
    };
    tx.append_audit(&entry)?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditLog>,
    /// Pass as `before` to fetch the next older page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

impl Engine {
    /// Lists audit entries newest first, strictly older than `before` when given.
    pub fn list_audit(&self, actor: &Actor, before: Option<i64>, limit: Option<u32>) -> Result<AuditPage> {
        let limit = limit.unwrap_or(DEFAULT_AUDIT_PAGE).clamp(1, MAX_AUDIT_PAGE);

        self.read(|tx| {
            require_admin(tx, actor)?;

            let mut entries = tx.list_audit(before, limit + 1)?;
            let has_more = entries.len() > limit as usize;
            entries.truncate(limit as usize);
            let next_cursor = if has_more {
                entries.last().map(|e| e.seq)
            } else {
                None
            };

            Ok(AuditPage {
                entries,
                next_cursor,
                has_more,
            })
        })
    }
}
