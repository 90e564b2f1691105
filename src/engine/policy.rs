use super::audit::record;
use super::{Actor, Engine, require_admin};
use crate::config::PolicyKey;
use crate::error::{Error, Result};
use crate::types::{AuditEvent, Policy};

impl Engine {
    /// Any caller may read a single policy.
    pub fn get_policy(&self, key: &str) -> Result<Option<Policy>> {
        self.read(|tx| tx.get_policy(key))
    }

    pub fn get_all_policies(&self, actor: &Actor) -> Result<Vec<Policy>> {
        self.read(|tx| {
            require_admin(tx, actor)?;
            tx.list_policies()
        })
    }

    /// Stores `value` under `key`. Unknown keys are accepted and simply never read.
    pub fn upsert_policy(&self, actor: &Actor, key: &str, value: &str) -> Result<Policy> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation("Policy key cannot be empty"));
        }
        if PolicyKey::parse(key).is_none() {
            tracing::warn!(key, "Storing unrecognized policy key");
        }

        let now = self.now();
        let policy = self.write(|tx| {
            require_admin(tx, actor)?;

            let policy = Policy {
                key: key.to_string(),
                value: value.to_string(),
                updated_at: now,
            };
            tx.upsert_policy(&policy)?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::PolicyUpdated {
                    key: policy.key.clone(),
                    value: policy.value.clone(),
                },
                now,
            )?;
            Ok(policy)
        })?;

        tracing::info!(key = %policy.key, value = %policy.value, "Policy updated");
        Ok(policy)
    }

    /// Inserts the default value of every known key that is missing.
    /// Returns how many keys were inserted.
    pub fn seed_default_policies(&self) -> Result<usize> {
        let now = self.now();
        let inserted = self.write(|tx| {
            let mut inserted = 0;
            for key in PolicyKey::ALL {
                let policy = Policy {
                    key: key.as_str().to_string(),
                    value: key.default_value().to_string(),
                    updated_at: now,
                };
                if tx.insert_policy_if_absent(&policy)? {
                    inserted += 1;
                }
            }
            Ok(inserted)
        })?;

        if inserted > 0 {
            tracing::info!(inserted, "Seeded default policies");
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Fixture;
    use super::*;
    use crate::types::ExperienceLevel;

    #[test]
    fn test_seed_defaults_is_idempotent() {
        let fx = Fixture::new();
        let before = fx.engine.get_all_policies(&fx.admin).unwrap();
        assert_eq!(before.len(), PolicyKey::ALL.len());

        assert_eq!(fx.engine.seed_default_policies().unwrap(), 0);
        let after = fx.engine.get_all_policies(&fx.admin).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_seed_keeps_admin_overrides() {
        let fx = Fixture::new();
        fx.engine
            .upsert_policy(&fx.admin, "cancellationCutoffHours", "6")
            .unwrap();

        fx.engine.seed_default_policies().unwrap();

        let policy = fx.engine.get_policy("cancellationCutoffHours").unwrap().unwrap();
        assert_eq!(policy.value, "6");
    }

    #[test]
    fn test_upsert_is_admin_only_and_audited() {
        let fx = Fixture::new();
        let lifter = fx.add_lifter("Lena", ExperienceLevel::Inexperienced, 3);

        let denied = fx.engine.upsert_policy(&lifter, "maxFutureBookings", "1");
        assert!(matches!(denied, Err(Error::Authorization(_))));
        assert!(fx.engine.get_all_policies(&lifter).is_err());

        fx.engine
            .upsert_policy(&fx.admin, "maxFutureBookings", "1")
            .unwrap();
        assert_eq!(fx.audit_actions(), vec!["policy_updated"]);
    }

    #[test]
    fn test_get_missing_policy_is_none() {
        let fx = Fixture::new();
        assert!(fx.engine.get_policy("noSuchKey").unwrap().is_none());
    }
}
