use chrono::Utc;
use uuid::Uuid;

use super::locks::RecordLocks;
use super::store::{Filter, Versioned};
use super::{AppState, AGENTS};
use crate::auth::model::{default_permissions, Agent, PERMISSION_AGENT_ADMIN};
use crate::error::ServiceError;

const REGISTRATION_LOCK: &str = "registration";

impl AppState {
    pub async fn find_agent(&self, id: &str) -> Result<Option<Agent>, ServiceError> {
        Ok(self
            .agents
            .find_one::<Agent>(&Filter::by_id(id))
            .await?
            .map(|v| v.record))
    }

    pub async fn find_agent_by_email(&self, email: &str) -> Result<Option<Agent>, ServiceError> {
        Ok(self
            .agents
            .find_one::<Agent>(&Filter::new().eq("email", email))
            .await?
            .map(|v| v.record))
    }

    /// Store a new agent. The very first agent also receives `agent:admin`.
    ///
    /// Registrations share one lock so the email check, the empty-collection
    /// check and the insert happen as a unit.
    pub async fn create_agent(
        &self,
        email: &str,
        full_name: &str,
        password_hash: String,
    ) -> Result<Agent, ServiceError> {
        let email = email.trim();
        let _guard = self
            .locks
            .lock(RecordLocks::record_key(AGENTS, REGISTRATION_LOCK))
            .await;

        if self.find_agent_by_email(email).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "An agent with email '{}' already exists",
                email
            )));
        }

        let mut permissions = default_permissions();
        if self.agents.find::<Agent>(&Filter::new()).await?.is_empty() {
            log::info!("First agent {} registered, granting {}", email, PERMISSION_AGENT_ADMIN);
            permissions.push(PERMISSION_AGENT_ADMIN.to_string());
        }

        let agent = Agent {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            full_name: full_name.trim().to_string(),
            password_hash,
            is_active: true,
            permissions,
            created_at: Utc::now(),
            last_login: None,
        };
        self.agents.insert(&agent.id, &agent).await?;
        log::info!("Agent {} registered", agent.id);
        Ok(agent)
    }

    /// Serialized read-modify-write of one agent.
    async fn modify_agent<F>(&self, id: &str, change: F) -> Result<Agent, ServiceError>
    where
        F: FnOnce(&mut Agent),
    {
        let _guard = self.locks.lock(RecordLocks::record_key(AGENTS, id)).await;

        let Versioned {
            version,
            record: mut agent,
        } = self
            .agents
            .find_one::<Agent>(&Filter::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Agent '{}' not found", id)))?;

        change(&mut agent);
        self.agents
            .delete_then_reinsert(id, version, &agent)
            .await?;
        Ok(agent)
    }

    pub async fn record_login(&self, id: &str) -> Result<Agent, ServiceError> {
        self.modify_agent(id, |agent| agent.last_login = Some(Utc::now()))
            .await
    }

    pub async fn set_agent_active(&self, id: &str, is_active: bool) -> Result<Agent, ServiceError> {
        let agent = self
            .modify_agent(id, |agent| agent.is_active = is_active)
            .await?;
        log::info!(
            "Agent {} {}",
            id,
            if is_active { "activated" } else { "deactivated" }
        );
        Ok(agent)
    }
}
