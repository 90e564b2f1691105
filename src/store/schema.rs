pub const SCHEMA: &str = r#"
-- Identities; the auth layer owns these
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Tokens are auth credentials for users
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- first 8 chars of ID for fast lookup
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,                -- NULL = never
    last_used_at INTEGER
);

CREATE TABLE IF NOT EXISTS user_profiles (
    user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK (role IN ('admin', 'lifter')),
    experience_level TEXT CHECK (experience_level IN ('experienced', 'inexperienced')),
    weekly_quota INTEGER NOT NULL DEFAULT 0 CHECK (weekly_quota >= 0),
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'frozen')),
    joined_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS policies (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS slots (
    id TEXT PRIMARY KEY,
    starts_at_utc INTEGER NOT NULL,
    ends_at_utc INTEGER NOT NULL,
    tz TEXT NOT NULL,
    capacity_total INTEGER NOT NULL CHECK (capacity_total >= 0),
    capacity_exp INTEGER NOT NULL CHECK (capacity_exp >= 0),
    capacity_inexp INTEGER NOT NULL CHECK (capacity_inexp >= 0),
    status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed', 'canceled')),
    created_by TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    CHECK (starts_at_utc < ends_at_utc),
    CHECK (capacity_exp + capacity_inexp <= capacity_total)
);

-- Bookings outlive their slot, so slot_id has no foreign key
CREATE TABLE IF NOT EXISTS bookings (
    id TEXT PRIMARY KEY,
    lifter_id TEXT NOT NULL,
    slot_id TEXT NOT NULL,
    level TEXT NOT NULL CHECK (level IN ('experienced', 'inexperienced')),
    status TEXT NOT NULL DEFAULT 'booked',
    created_at INTEGER NOT NULL,
    canceled_at INTEGER,
    cancel_reason TEXT
);

CREATE TABLE IF NOT EXISTS quota_windows (
    id TEXT PRIMARY KEY,
    lifter_id TEXT NOT NULL,
    week_start_utc INTEGER NOT NULL,
    week_end_utc INTEGER NOT NULL,
    quota INTEGER NOT NULL CHECK (quota >= 0),
    used INTEGER NOT NULL DEFAULT 0 CHECK (used >= 0),

    UNIQUE(lifter_id, week_start_utc)
);

-- Append-only
CREATE TABLE IF NOT EXISTS audit_logs (
    id TEXT PRIMARY KEY,
    seq INTEGER NOT NULL UNIQUE,
    actor_user_id TEXT NOT NULL,
    action TEXT NOT NULL,
    entity TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    payload TEXT,
    at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_profiles_role ON user_profiles(role);
CREATE INDEX IF NOT EXISTS idx_profiles_status ON user_profiles(status);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_slots_starts_at ON slots(starts_at_utc);
CREATE INDEX IF NOT EXISTS idx_slots_status ON slots(status);
CREATE INDEX IF NOT EXISTS idx_slots_time_range ON slots(starts_at_utc, ends_at_utc);
CREATE INDEX IF NOT EXISTS idx_bookings_slot_status ON bookings(slot_id, status);
CREATE INDEX IF NOT EXISTS idx_bookings_lifter_created ON bookings(lifter_id, created_at);
CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);
CREATE INDEX IF NOT EXISTS idx_audit_at ON audit_logs(at);
CREATE INDEX IF NOT EXISTS idx_audit_actor ON audit_logs(actor_user_id);

CREATE TRIGGER IF NOT EXISTS audit_logs_no_update
BEFORE UPDATE ON audit_logs
BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_logs_no_delete
BEFORE DELETE ON audit_logs
BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END;
"#;
