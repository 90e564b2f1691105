use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::audit::record;
use super::{Actor, Engine, load_policies, require_admin};
use crate::error::{Error, Result};
use crate::store::Tx;
use crate::types::{
    AccountStatus, AuditEvent, ExperienceLevel, Role, Token, User, UserProfile,
};

const MAX_TOKEN_RETRIES: u32 = 3;

/// A user joined with their profile, as shown to admins.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    pub weekly_quota: u32,
    pub status: AccountStatus,
    pub joined_at: DateTime<Utc>,
}

pub(crate) fn summarize(user: Option<User>, profile: UserProfile) -> UserSummary {
    let (name, email) = match user {
        Some(user) => (user.name, user.email),
        None => ("Unknown User".to_string(), String::new()),
    };
    UserSummary {
        id: profile.user_id,
        name,
        email,
        role: profile.role,
        experience_level: profile.experience_level,
        weekly_quota: profile.weekly_quota,
        status: profile.status,
        joined_at: profile.joined_at,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub user: User,
    /// Absent until the user completes profile setup.
    pub profile: Option<UserProfile>,
}

/// A newly created identity and its raw API token, shown exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedUser {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    pub token: String,
}

fn validate_contact(name: &str, email: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("Name cannot be empty"));
    }
    if !email.contains('@') {
        return Err(Error::validation("Invalid email address"));
    }
    Ok(())
}

impl Engine {
    pub fn current_user(&self, actor: &Actor) -> Result<CurrentUser> {
        self.read(|tx| {
            let user = tx
                .get_user(&actor.user_id)?
                .ok_or_else(|| Error::not_found("User not found"))?;
            let profile = tx.get_profile(&actor.user_id)?;
            Ok(CurrentUser { user, profile })
        })
    }

    /// Creates the caller's lifter profile. If a profile already exists it is
    /// returned unchanged.
    pub fn setup_profile(
        &self,
        actor: &Actor,
        name: &str,
        email: &str,
        experience_level: Option<ExperienceLevel>,
    ) -> Result<UserProfile> {
        validate_contact(name, email)?;
        let now = self.now();

        self.write(|tx| {
            if let Some(existing) = tx.get_profile(&actor.user_id)? {
                return Ok(existing);
            }

            tx.update_user_contact(&actor.user_id, name.trim(), email.trim())?;

            let policies = load_policies(tx)?;
            let profile = UserProfile {
                user_id: actor.user_id.clone(),
                role: Role::Lifter,
                experience_level,
                weekly_quota: experience_level.map_or(0, |level| policies.default_weekly_quota(level)),
                status: AccountStatus::Active,
                joined_at: now,
            };
            tx.create_profile(&profile)?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::UserProfileCreated {
                    user_id: profile.user_id.clone(),
                    role: profile.role,
                    experience_level: profile.experience_level,
                },
                now,
            )?;

            tracing::info!(user_id = %profile.user_id, quota = profile.weekly_quota, "Profile created");
            Ok(profile)
        })
    }

    pub fn update_user_status(&self, actor: &Actor, user_id: &str, status: AccountStatus) -> Result<()> {
        let now = self.now();

        self.write(|tx| {
            require_admin(tx, actor)?;

            if tx.get_profile(user_id)?.is_none() {
                return Err(Error::not_found("User profile not found"));
            }
            tx.update_profile_status(user_id, status)?;

            record(
                tx,
                &actor.user_id,
                &AuditEvent::UserStatusUpdated {
                    user_id: user_id.to_string(),
                    status,
                },
                now,
            )
        })?;

        tracing::info!(user_id, %status, "User status updated");
        Ok(())
    }

    pub fn list_lifters(&self, actor: &Actor) -> Result<Vec<UserSummary>> {
        self.read(|tx| {
            require_admin(tx, actor)?;

            tx.list_profiles_by_role(Role::Lifter)?
                .into_iter()
                .map(|profile| -> Result<UserSummary> {
                    Ok(summarize(tx.get_user(&profile.user_id)?, profile))
                })
                .collect()
        })
    }

    /// Creates an identity with an API token. An admin role gets its profile
    /// immediately; lifters complete their own profile through setup.
    pub fn create_user(
        &self,
        actor: &Actor,
        name: &str,
        email: &str,
        role: Option<Role>,
    ) -> Result<IssuedUser> {
        validate_contact(name, email)?;

        let issued = self.write(|tx| {
            require_admin(tx, actor)?;
            self.issue_user(tx, &actor.user_id, name, email, role.unwrap_or(Role::Lifter))
        })?;

        tracing::info!(user_id = %issued.user.id, "User created");
        Ok(issued)
    }

    /// Creates the first admin on an empty deployment. Fails once any admin exists.
    pub fn bootstrap_admin(&self, name: &str, email: &str) -> Result<IssuedUser> {
        validate_contact(name, email)?;
        self.seed_default_policies()?;

        let issued = self.write(|tx| {
            if !tx.list_profiles_by_role(Role::Admin)?.is_empty() {
                return Err(Error::conflict("An admin already exists"));
            }
            let id = Uuid::new_v4().to_string();
            self.issue_user_with_id(tx, &id, &id, name, email, Role::Admin)
        })?;

        tracing::info!(user_id = %issued.user.id, "Bootstrap admin created");
        Ok(issued)
    }

    fn issue_user(
        &self,
        tx: &dyn Tx,
        actor_id: &str,
        name: &str,
        email: &str,
        role: Role,
    ) -> Result<IssuedUser> {
        let id = Uuid::new_v4().to_string();
        self.issue_user_with_id(tx, &id, actor_id, name, email, role)
    }

    fn issue_user_with_id(
        &self,
        tx: &dyn Tx,
        id: &str,
        actor_id: &str,
        name: &str,
        email: &str,
        role: Role,
    ) -> Result<IssuedUser> {
        let now = self.now();
        let user = User {
            id: id.to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            created_at: now,
        };
        tx.create_user(&user)?;

        let profile = if role == Role::Admin {
            let profile = UserProfile {
                user_id: user.id.clone(),
                role,
                experience_level: None,
                weekly_quota: 0,
                status: AccountStatus::Active,
                joined_at: now,
            };
            tx.create_profile(&profile)?;
            record(
                tx,
                actor_id,
                &AuditEvent::UserProfileCreated {
                    user_id: user.id.clone(),
                    role,
                    experience_level: None,
                },
                now,
            )?;
            Some(profile)
        } else {
            None
        };

        let token = self.issue_token(tx, &user.id)?;
        Ok(IssuedUser {
            user,
            profile,
            token,
        })
    }

    /// Stores a fresh token for the user and returns its raw value.
    fn issue_token(&self, tx: &dyn Tx, user_id: &str) -> Result<String> {
        for _ in 0..MAX_TOKEN_RETRIES {
            let issued = self.tokens.issue()?;
            let token = Token {
                id: Uuid::new_v4().to_string(),
                token_hash: issued.hash,
                token_lookup: issued.lookup,
                user_id: user_id.to_string(),
                created_at: self.now(),
                expires_at: None,
                last_used_at: None,
            };

            match tx.create_token(&token) {
                Ok(()) => return Ok(issued.raw),
                Err(Error::TokenLookupCollision) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::TokenLookupCollision)
    }
}
