use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::schema::SCHEMA;
use super::{Store, Tx};
use crate::error::{Error, Result};
use crate::types::*;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        // Other processes holding the write lock are waited on, not failed.
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn()
    }

    fn open_tx(&self, begin: &str) -> Result<Box<dyn Tx + '_>> {
        let conn = self.conn();
        conn.execute_batch(begin)?;
        Ok(Box::new(SqliteTx { conn, open: true }))
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn begin(&self) -> Result<Box<dyn Tx + '_>> {
        // IMMEDIATE takes the write lock before the first read.
        self.open_tx("BEGIN IMMEDIATE")
    }

    fn read(&self) -> Result<Box<dyn Tx + '_>> {
        self.open_tx("BEGIN DEFERRED")
    }
}

/// A transaction on the store's connection. Rolls back on drop unless committed.
pub struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    open: bool,
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Failed to roll back transaction: {e}");
            }
        }
    }
}

fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(|| {
        tracing::error!("Invalid timestamp in database: {ms}");
        Utc::now()
    })
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = Error>,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw.parse().map(Some).map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

const USER_COLUMNS: &str = "id, name, email, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: from_millis(row.get(3)?),
    })
}

const PROFILE_COLUMNS: &str = "user_id, role, experience_level, weekly_quota, status, joined_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        user_id: row.get(0)?,
        role: parse_column(row, 1)?,
        experience_level: parse_optional_column(row, 2)?,
        weekly_quota: row.get(3)?,
        status: parse_column(row, 4)?,
        joined_at: from_millis(row.get(5)?),
    })
}

const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at";

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: from_millis(row.get(4)?),
        expires_at: row.get::<_, Option<i64>>(5)?.map(from_millis),
        last_used_at: row.get::<_, Option<i64>>(6)?.map(from_millis),
    })
}

fn policy_from_row(row: &Row<'_>) -> rusqlite::Result<Policy> {
    Ok(Policy {
        key: row.get(0)?,
        value: row.get(1)?,
        updated_at: from_millis(row.get(2)?),
    })
}

const SLOT_COLUMNS: &str = "id, starts_at_utc, ends_at_utc, tz, capacity_total, capacity_exp, \
     capacity_inexp, status, created_by, created_at, updated_at";

fn slot_from_row(row: &Row<'_>) -> rusqlite::Result<Slot> {
    Ok(Slot {
        id: row.get(0)?,
        starts_at_utc: from_millis(row.get(1)?),
        ends_at_utc: from_millis(row.get(2)?),
        tz: row.get(3)?,
        capacity_total: row.get(4)?,
        capacity_exp: row.get(5)?,
        capacity_inexp: row.get(6)?,
        status: parse_column(row, 7)?,
        created_by: row.get(8)?,
        created_at: from_millis(row.get(9)?),
        updated_at: from_millis(row.get(10)?),
    })
}

const BOOKING_COLUMNS: &str =
    "id, lifter_id, slot_id, level, status, created_at, canceled_at, cancel_reason";

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    Ok(Booking {
        id: row.get(0)?,
        lifter_id: row.get(1)?,
        slot_id: row.get(2)?,
        level: parse_column(row, 3)?,
        status: parse_column(row, 4)?,
        created_at: from_millis(row.get(5)?),
        canceled_at: row.get::<_, Option<i64>>(6)?.map(from_millis),
        cancel_reason: row.get(7)?,
    })
}

const QUOTA_COLUMNS: &str = "id, lifter_id, week_start_utc, week_end_utc, quota, used";

fn quota_window_from_row(row: &Row<'_>) -> rusqlite::Result<QuotaWindow> {
    Ok(QuotaWindow {
        id: row.get(0)?,
        lifter_id: row.get(1)?,
        week_start_utc: from_millis(row.get(2)?),
        week_end_utc: from_millis(row.get(3)?),
        quota: row.get(4)?,
        used: row.get(5)?,
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditLog> {
    let payload = row.get::<_, Option<String>>(6)?.map(|raw| {
        serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
    });
    Ok(AuditLog {
        id: row.get(0)?,
        seq: row.get(1)?,
        actor_user_id: row.get(2)?,
        action: row.get(3)?,
        entity: row.get(4)?,
        entity_id: row.get(5)?,
        payload,
        at: from_millis(row.get(7)?),
    })
}

impl Tx for SqliteTx<'_> {
    fn commit(mut self: Box<Self>) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.name, user.email, to_millis(&user.created_at)],
        )?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_user_contact(&self, id: &str, name: &str, email: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3",
            params![name, email, id],
        )?;

        if rows == 0 {
            return Err(Error::not_found("User not found"));
        }
        Ok(())
    }

    // Profile operations

    fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        self.conn.execute(
            "INSERT INTO user_profiles (user_id, role, experience_level, weekly_quota, status, joined_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.user_id,
                profile.role.as_str(),
                profile.experience_level.map(ExperienceLevel::as_str),
                profile.weekly_quota,
                profile.status.as_str(),
                to_millis(&profile.joined_at),
            ],
        )?;
        Ok(())
    }

    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = ?1"),
                params![user_id],
                profile_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_profile_status(&self, user_id: &str, status: AccountStatus) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE user_profiles SET status = ?1 WHERE user_id = ?2",
            params![status.as_str(), user_id],
        )?;

        if rows == 0 {
            return Err(Error::not_found("User profile not found"));
        }
        Ok(())
    }

    fn list_profiles_by_role(&self, role: Role) -> Result<Vec<UserProfile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE role = ?1 ORDER BY joined_at, user_id"
        ))?;

        let rows = stmt.query_map(params![role.as_str()], profile_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn.execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                to_millis(&token.created_at),
                token.expires_at.as_ref().map(to_millis),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
                params![lookup],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_token_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![to_millis(&at), id],
        )?;
        Ok(())
    }

    // Policy operations

    fn get_policy(&self, key: &str) -> Result<Option<Policy>> {
        self.conn
            .query_row(
                "SELECT key, value, updated_at FROM policies WHERE key = ?1",
                params![key],
                policy_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_policies(&self) -> Result<Vec<Policy>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, updated_at FROM policies ORDER BY key")?;

        let rows = stmt.query_map([], policy_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn upsert_policy(&self, policy: &Policy) -> Result<()> {
        self.conn.execute(
            "INSERT INTO policies (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![policy.key, policy.value, to_millis(&policy.updated_at)],
        )?;
        Ok(())
    }

    fn insert_policy_if_absent(&self, policy: &Policy) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT INTO policies (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO NOTHING",
            params![policy.key, policy.value, to_millis(&policy.updated_at)],
        )?;
        Ok(rows > 0)
    }

    // Slot operations

    fn create_slot(&self, slot: &Slot) -> Result<()> {
        self.conn.execute(
            "INSERT INTO slots (id, starts_at_utc, ends_at_utc, tz, capacity_total, capacity_exp,
                                capacity_inexp, status, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                slot.id,
                to_millis(&slot.starts_at_utc),
                to_millis(&slot.ends_at_utc),
                slot.tz,
                slot.capacity_total,
                slot.capacity_exp,
                slot.capacity_inexp,
                slot.status.as_str(),
                slot.created_by,
                to_millis(&slot.created_at),
                to_millis(&slot.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_slot(&self, id: &str) -> Result<Option<Slot>> {
        self.conn
            .query_row(
                &format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id = ?1"),
                params![id],
                slot_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_slot(&self, slot: &Slot) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE slots SET capacity_total = ?1, capacity_exp = ?2, capacity_inexp = ?3,
                              status = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                slot.capacity_total,
                slot.capacity_exp,
                slot.capacity_inexp,
                slot.status.as_str(),
                to_millis(&slot.updated_at),
                slot.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("Slot not found"));
        }
        Ok(())
    }

    fn delete_slot(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM slots WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_slots_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots
             WHERE starts_at_utc >= ?1 AND starts_at_utc < ?2
             ORDER BY starts_at_utc, id"
        ))?;

        let rows = stmt.query_map(params![to_millis(&from), to_millis(&to)], slot_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Booking operations

    fn create_booking(&self, booking: &Booking) -> Result<()> {
        self.conn.execute(
            "INSERT INTO bookings (id, lifter_id, slot_id, level, status, created_at, canceled_at, cancel_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                booking.id,
                booking.lifter_id,
                booking.slot_id,
                booking.level.as_str(),
                booking.status.as_str(),
                to_millis(&booking.created_at),
                booking.canceled_at.as_ref().map(to_millis),
                booking.cancel_reason,
            ],
        )?;
        Ok(())
    }

    fn get_booking(&self, id: &str) -> Result<Option<Booking>> {
        self.conn
            .query_row(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
                params![id],
                booking_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_booking(&self, booking: &Booking) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE bookings SET status = ?1, canceled_at = ?2, cancel_reason = ?3 WHERE id = ?4",
            params![
                booking.status.as_str(),
                booking.canceled_at.as_ref().map(to_millis),
                booking.cancel_reason,
                booking.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("Booking not found"));
        }
        Ok(())
    }

    fn list_slot_bookings(&self, slot_id: &str, status: BookingStatus) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE slot_id = ?1 AND status = ?2
             ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![slot_id, status.as_str()], booking_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_lifter_bookings(
        &self,
        lifter_id: &str,
        status: Option<BookingStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE lifter_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id
             LIMIT ?3"
        ))?;

        // A negative LIMIT means no limit in SQLite.
        let limit = limit.map_or(-1, i64::from);
        let rows = stmt.query_map(
            params![lifter_id, status.map(BookingStatus::as_str), limit],
            booking_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_bookings_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE created_at >= ?1 AND created_at < ?2
             ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![to_millis(&from), to_millis(&to)], booking_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Quota window operations

    fn create_quota_window(&self, window: &QuotaWindow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO quota_windows (id, lifter_id, week_start_utc, week_end_utc, quota, used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                window.id,
                window.lifter_id,
                to_millis(&window.week_start_utc),
                to_millis(&window.week_end_utc),
                window.quota,
                window.used,
            ],
        )?;
        Ok(())
    }

    fn get_quota_window(
        &self,
        lifter_id: &str,
        week_start_utc: DateTime<Utc>,
    ) -> Result<Option<QuotaWindow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {QUOTA_COLUMNS} FROM quota_windows
                     WHERE lifter_id = ?1 AND week_start_utc = ?2"
                ),
                params![lifter_id, to_millis(&week_start_utc)],
                quota_window_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn increment_quota_used(&self, id: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE quota_windows SET used = used + 1 WHERE id = ?1",
            params![id],
        )?;

        if rows == 0 {
            return Err(Error::not_found("Quota window not found"));
        }
        Ok(())
    }

    fn decrement_quota_used(&self, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE quota_windows SET used = used - 1 WHERE id = ?1 AND used > 0",
            params![id],
        )?;
        Ok(rows > 0)
    }

    // Audit operations

    fn append_audit(&self, entry: &AuditLog) -> Result<i64> {
        let payload = entry
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let seq = self.conn.query_row(
            "INSERT INTO audit_logs (id, seq, actor_user_id, action, entity, entity_id, payload, at)
             VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM audit_logs), ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING seq",
            params![
                entry.id,
                entry.actor_user_id,
                entry.action,
                entry.entity,
                entry.entity_id,
                payload,
                to_millis(&entry.at),
            ],
            |row| row.get(0),
        )?;
        Ok(seq)
    }

    fn list_audit(&self, before_seq: Option<i64>, limit: u32) -> Result<Vec<AuditLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, seq, actor_user_id, action, entity, entity_id, payload, at
             FROM audit_logs
             WHERE (?1 IS NULL OR seq < ?1)
             ORDER BY seq DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![before_seq, limit], audit_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    fn sample_slot(id: &str, start: DateTime<Utc>) -> Slot {
        Slot {
            id: id.to_string(),
            starts_at_utc: start,
            ends_at_utc: start + ChronoDuration::hours(1),
            tz: "UTC".to_string(),
            capacity_total: 5,
            capacity_exp: 3,
            capacity_inexp: 2,
            status: SlotStatus::Open,
            created_by: "admin-1".to_string(),
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "tokens",
            "user_profiles",
            "policies",
            "slots",
            "bookings",
            "quota_windows",
            "audit_logs",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_uncommitted_transaction_rolls_back() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();

        {
            let tx = store.begin().unwrap();
            tx.create_slot(&sample_slot("slot-1", start)).unwrap();
        }

        let tx = store.read().unwrap();
        assert!(tx.get_slot("slot-1").unwrap().is_none());
    }

    #[test]
    fn test_slot_round_trip_and_range_query() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();

        let tx = store.begin().unwrap();
        tx.create_slot(&sample_slot("slot-1", start)).unwrap();
        tx.create_slot(&sample_slot("slot-2", start + ChronoDuration::hours(1)))
            .unwrap();
        tx.create_slot(&sample_slot("slot-3", start + ChronoDuration::days(1)))
            .unwrap();
        tx.commit().unwrap();

        let tx = store.read().unwrap();
        let fetched = tx.get_slot("slot-1").unwrap().unwrap();
        assert_eq!(fetched.starts_at_utc, start);
        assert_eq!(fetched.status, SlotStatus::Open);

        let day = tx
            .list_slots_starting_between(start, start + ChronoDuration::hours(24))
            .unwrap();
        let ids: Vec<_> = day.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["slot-1", "slot-2"]);
    }

    #[test]
    fn test_schema_rejects_sub_capacities_over_total() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();

        let mut slot = sample_slot("slot-1", start);
        slot.capacity_exp = 4;

        let tx = store.begin().unwrap();
        assert!(matches!(tx.create_slot(&slot), Err(Error::Database(_))));
    }

    #[test]
    fn test_decrement_never_goes_negative() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let week = Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap();

        let tx = store.begin().unwrap();
        tx.create_quota_window(&QuotaWindow {
            id: "qw-1".to_string(),
            lifter_id: "lifter-1".to_string(),
            week_start_utc: week,
            week_end_utc: week + ChronoDuration::days(7) - ChronoDuration::milliseconds(1),
            quota: 3,
            used: 0,
        })
        .unwrap();

        tx.increment_quota_used("qw-1").unwrap();
        assert!(tx.decrement_quota_used("qw-1").unwrap());
        assert!(!tx.decrement_quota_used("qw-1").unwrap());
        assert!(!tx.decrement_quota_used("qw-1").unwrap());

        let window = tx.get_quota_window("lifter-1", week).unwrap().unwrap();
        assert_eq!(window.used, 0);
    }

    #[test]
    fn test_policy_insert_if_absent_keeps_existing_value() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let now = Utc::now();

        let tx = store.begin().unwrap();
        let policy = Policy {
            key: "maxFutureBookings".to_string(),
            value: "5".to_string(),
            updated_at: now,
        };
        assert!(tx.insert_policy_if_absent(&policy).unwrap());

        let replacement = Policy {
            value: "10".to_string(),
            ..policy
        };
        assert!(!tx.insert_policy_if_absent(&replacement).unwrap());
        assert_eq!(
            tx.get_policy("maxFutureBookings").unwrap().unwrap().value,
            "5"
        );
    }

    #[test]
    fn test_audit_log_is_append_only() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let tx = store.begin().unwrap();
        let entry = AuditLog {
            id: "audit-1".to_string(),
            seq: 0,
            actor_user_id: "admin-1".to_string(),
            action: "policy_updated".to_string(),
            entity: "policies".to_string(),
            entity_id: "maxFutureBookings".to_string(),
            payload: Some(serde_json::json!({ "value": "5" })),
            at: Utc::now(),
        };
        assert_eq!(tx.append_audit(&entry).unwrap(), 1);
        let second = AuditLog {
            id: "audit-2".to_string(),
            ..entry
        };
        assert_eq!(tx.append_audit(&second).unwrap(), 2);
        tx.commit().unwrap();

        assert!(store.conn().execute("DELETE FROM audit_logs", []).is_err());
        assert!(
            store
                .conn()
                .execute("UPDATE audit_logs SET action = 'x'", [])
                .is_err()
        );

        let tx = store.read().unwrap();
        let entries = tx.list_audit(None, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "audit-2");
        assert_eq!(entries[1].payload, Some(serde_json::json!({ "value": "5" })));

        let older = tx.list_audit(Some(2), 10).unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].id, "audit-1");
    }
}
