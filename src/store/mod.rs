mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// All access goes through a [`Tx`]. A write transaction holds the database
/// write lock from its first statement until commit or drop, so concurrent
/// read-validate-write sequences serialize.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Opens a write transaction. Dropping it without commit rolls back.
    fn begin(&self) -> Result<Box<dyn Tx + '_>>;

    /// Opens a read transaction.
    fn read(&self) -> Result<Box<dyn Tx + '_>>;
}

/// Operations available inside a transaction.
pub trait Tx {
    fn commit(self: Box<Self>) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn update_user_contact(&self, id: &str, name: &str, email: &str) -> Result<()>;

    // Profile operations
    fn create_profile(&self, profile: &UserProfile) -> Result<()>;
    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;
    fn update_profile_status(&self, user_id: &str, status: AccountStatus) -> Result<()>;
    fn list_profiles_by_role(&self, role: Role) -> Result<Vec<UserProfile>>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn update_token_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    // Policy operations
    fn get_policy(&self, key: &str) -> Result<Option<Policy>>;
    fn list_policies(&self) -> Result<Vec<Policy>>;
    fn upsert_policy(&self, policy: &Policy) -> Result<()>;
    /// Inserts the policy only if its key is absent. Returns true if inserted.
    fn insert_policy_if_absent(&self, policy: &Policy) -> Result<bool>;

    // Slot operations
    fn create_slot(&self, slot: &Slot) -> Result<()>;
    fn get_slot(&self, id: &str) -> Result<Option<Slot>>;
    fn update_slot(&self, slot: &Slot) -> Result<()>;
    fn delete_slot(&self, id: &str) -> Result<bool>;
    /// Slots with `from <= starts_at_utc < to`, ordered by start.
    fn list_slots_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>>;

    // Booking operations
    fn create_booking(&self, booking: &Booking) -> Result<()>;
    fn get_booking(&self, id: &str) -> Result<Option<Booking>>;
    fn update_booking(&self, booking: &Booking) -> Result<()>;
    fn list_slot_bookings(&self, slot_id: &str, status: BookingStatus) -> Result<Vec<Booking>>;
    fn list_lifter_bookings(
        &self,
        lifter_id: &str,
        status: Option<BookingStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<Booking>>;
    /// Bookings with `from <= created_at < to`.
    fn list_bookings_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;

    // Quota window operations
    fn create_quota_window(&self, window: &QuotaWindow) -> Result<()>;
    fn get_quota_window(
        &self,
        lifter_id: &str,
        week_start_utc: DateTime<Utc>,
    ) -> Result<Option<QuotaWindow>>;
    fn increment_quota_used(&self, id: &str) -> Result<()>;
    /// Decrements `used` unless it is already zero. Returns true if it changed.
    fn decrement_quota_used(&self, id: &str) -> Result<bool>;

    // Audit operations
    fn append_audit(&self, entry: &AuditLog) -> Result<i64>;
    /// Newest first; `before_seq` excludes entries at or after that sequence number.
    fn list_audit(&self, before_seq: Option<i64>, limit: u32) -> Result<Vec<AuditLog>>;
}
