use chrono::Utc;
use uuid::Uuid;

use super::locks::RecordLocks;
use super::store::{Filter, Versioned};
use super::{AppState, LEADS};
use crate::error::ServiceError;
use crate::lead::model::{Lead, LeadListQuery, LeadStatusUpdate, LeadSubmission};

impl AppState {
    /// Store a new lead. Emails are unique across leads.
    pub async fn submit_lead(&self, submission: LeadSubmission) -> Result<Lead, ServiceError> {
        submission.validate().map_err(ServiceError::Validation)?;

        let lead = Lead::from_submission(Uuid::new_v4().to_string(), submission, Utc::now());
        let _guard = self
            .locks
            .lock(RecordLocks::record_key("leads:email", &lead.email))
            .await;

        let existing = self
            .leads
            .find_one::<Lead>(&Filter::new().eq("email", lead.email.as_str()))
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A lead with email '{}' already exists",
                lead.email
            )));
        }

        self.leads.insert(&lead.id, &lead).await?;
        self.metrics.record_submission("lead");
        log::info!("Lead {} created", lead.id);
        Ok(lead)
    }

    pub async fn list_leads(&self, query: &LeadListQuery) -> Result<Vec<Lead>, ServiceError> {
        let mut filter = Filter::new();
        if let Some(status) = query.status {
            filter = filter.eq("status", status.as_str());
        }
        Ok(self
            .leads
            .find::<Lead>(&filter)
            .await?
            .into_iter()
            .map(|v| v.record)
            .collect())
    }

    async fn load_lead(&self, id: &str) -> Result<Versioned<Lead>, ServiceError> {
        self.leads
            .find_one::<Lead>(&Filter::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Lead '{}' not found", id)))
    }

    pub async fn get_lead(&self, id: &str) -> Result<Lead, ServiceError> {
        Ok(self.load_lead(id).await?.record)
    }

    pub async fn update_lead_status(
        &self,
        id: &str,
        update: LeadStatusUpdate,
    ) -> Result<Lead, ServiceError> {
        let _guard = self.locks.lock(RecordLocks::record_key(LEADS, id)).await;

        let Versioned {
            version,
            record: mut lead,
        } = self.load_lead(id).await?;
        lead.apply_status(update, Utc::now())
            .map_err(ServiceError::InvalidTransition)?;
        self.leads.delete_then_reinsert(id, version, &lead).await?;

        log::info!("Lead {} is now {}", id, lead.status);
        Ok(lead)
    }

    pub async fn delete_lead(&self, id: &str) -> Result<(), ServiceError> {
        let _guard = self.locks.lock(RecordLocks::record_key(LEADS, id)).await;

        let deleted = self.leads.delete(&Filter::by_id(id)).await?;
        if deleted == 0 {
            return Err(ServiceError::NotFound(format!("Lead '{}' not found", id)));
        }
        log::info!("Lead {} deleted", id);
        Ok(())
    }
}
