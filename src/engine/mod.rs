//! The booking and quota consistency engine.
//!
//! Every mutating operation runs its read-validate-write sequence inside a
//! single store transaction, so a failed check leaves no partial state and
//! concurrent callers serialize on the store's write lock. Operations take
//! an [`Actor`] carrying the verified user id; role checks happen here, not
//! in the HTTP layer.

mod audit;
mod autofill;
mod booking;
mod policy;
mod profiles;
mod quota;
mod reports;
mod slots;

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use mockable::Clock;

use crate::auth::TokenGenerator;
use crate::config::PolicySet;
use crate::error::{Error, Result};
use crate::store::{Store, Tx};
use crate::types::{Role, UserProfile};

pub use audit::AuditPage;
pub use autofill::{PlannedSlot, WorkingRange, local_wall_clock_to_instant, parse_working_hours, plan_day_slots};
pub use profiles::{CurrentUser, IssuedUser, UserSummary};
pub use quota::{QuotaSummary, UnbookedLifter, week_end, week_start};
pub use reports::{DashboardStats, MonthlyReport};
pub use slots::{AutofillOutcome, BookedLifter, NewSlot, SlotAvailability};

/// A verified caller identity, produced by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

pub struct Engine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock + Send + Sync>,
    tokens: TokenGenerator,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            store,
            clock,
            tokens: TokenGenerator::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Current time at the store's millisecond precision.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc().trunc_subsecs(3)
    }

    /// Runs `op` in a write transaction, committing only if it succeeds.
    fn write<T>(&self, op: impl FnOnce(&dyn Tx) -> Result<T>) -> Result<T> {
        let tx = self.store.begin()?;
        let value = op(&*tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn read<T>(&self, op: impl FnOnce(&dyn Tx) -> Result<T>) -> Result<T> {
        let tx = self.store.read()?;
        op(&*tx)
    }
}

fn load_policies(tx: &dyn Tx) -> Result<PolicySet> {
    Ok(PolicySet::from_policies(tx.list_policies()?))
}

fn require_role(tx: &dyn Tx, actor: &Actor, role: Role) -> Result<UserProfile> {
    match tx.get_profile(&actor.user_id)? {
        Some(profile) if profile.role == role => Ok(profile),
        _ => Err(Error::authorization("Not authorized")),
    }
}

fn require_admin(tx: &dyn Tx, actor: &Actor) -> Result<UserProfile> {
    require_role(tx, actor, Role::Admin)
}

fn require_lifter(tx: &dyn Tx, actor: &Actor) -> Result<UserProfile> {
    require_role(tx, actor, Role::Lifter)
}
