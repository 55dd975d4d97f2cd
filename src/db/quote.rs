use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use super::files::{remove_dir, remove_files};
use super::locks::RecordLocks;
use super::store::{Filter, Versioned};
use super::{AppState, QUOTES};
use crate::auth::middleware::AgentIdentity;
use crate::documents::DocumentOutcome;
use crate::error::ServiceError;
use crate::quote::model::{Quote, QuoteListQuery, QuoteStatus, QuoteSubmission, QuoteType};
use crate::quote::validation::validate_submission;

impl AppState {
    /// Validate, store as pending, render the requested documents and attach
    /// the outcomes to the stored quote.
    pub async fn submit_quote(
        &self,
        agent: &AgentIdentity,
        submission: QuoteSubmission,
    ) -> Result<Quote, ServiceError> {
        validate_submission(&submission).map_err(ServiceError::Validation)?;

        let quote = Quote::from_submission(
            Uuid::new_v4().to_string(),
            &agent.id,
            &agent.email,
            submission,
            Utc::now(),
        );
        self.quotes.insert(&quote.id, &quote).await?;
        self.metrics.record_submission("quote");
        log::info!(
            "Quote {} submitted by agent {} for {:?}",
            quote.id,
            agent.id,
            quote.quote_types
        );

        let documents = self.generate_documents(&quote).await?;
        self.attach_documents(&quote.id, documents).await
    }

    /// Run the renderer on the blocking pool and count the outcomes.
    pub async fn generate_documents(
        &self,
        quote: &Quote,
    ) -> Result<BTreeMap<QuoteType, DocumentOutcome>, ServiceError> {
        let renderer = self.renderer.clone();
        let snapshot = quote.clone();
        let outcomes = tokio::task::spawn_blocking(move || {
            renderer.render(&snapshot, &snapshot.quote_types)
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("document rendering panicked: {}", e)))?;

        for (quote_type, outcome) in &outcomes {
            self.metrics.record_document(*quote_type, outcome);
        }
        Ok(outcomes)
    }

    /// Merge render outcomes into the stored quote.
    pub async fn attach_documents(
        &self,
        id: &str,
        documents: BTreeMap<QuoteType, DocumentOutcome>,
    ) -> Result<Quote, ServiceError> {
        self.modify_quote(id, |quote| {
            quote.generated_documents.extend(documents);
            quote.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    pub async fn list_quotes(
        &self,
        agent: &AgentIdentity,
        query: &QuoteListQuery,
    ) -> Result<Vec<Quote>, ServiceError> {
        let mut filter = Filter::new().eq("agent_id", agent.id.as_str());
        if let Some(status) = query.status {
            filter = filter.eq("status", status.as_str());
        }

        let quotes = self
            .quotes
            .find::<Quote>(&filter)
            .await?
            .into_iter()
            .map(|v| v.record)
            .filter(|q| {
                query
                    .quote_type
                    .map_or(true, |t| q.quote_types.contains(&t))
            })
            .collect();
        Ok(quotes)
    }

    pub(super) async fn load_quote(&self, id: &str) -> Result<Versioned<Quote>, ServiceError> {
        self.quotes
            .find_one::<Quote>(&Filter::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote '{}' not found", id)))
    }

    pub(super) fn ensure_owner(agent: &AgentIdentity, quote: &Quote) -> Result<(), ServiceError> {
        if quote.agent_id == agent.id {
            Ok(())
        } else {
            log::warn!("Agent {} denied access to quote {}", agent.id, quote.id);
            Err(ServiceError::Forbidden(
                "Quote belongs to another agent".to_string(),
            ))
        }
    }

    pub async fn get_quote(&self, agent: &AgentIdentity, id: &str) -> Result<Quote, ServiceError> {
        let quote = self.load_quote(id).await?.record;
        Self::ensure_owner(agent, &quote)?;
        Ok(quote)
    }

    /// Serialized read-modify-write of one quote.
    pub(super) async fn modify_quote<F>(&self, id: &str, change: F) -> Result<Quote, ServiceError>
    where
        F: FnOnce(&mut Quote) -> Result<(), ServiceError>,
    {
        let _guard = self.locks.lock(RecordLocks::record_key(QUOTES, id)).await;

        let Versioned {
            version,
            record: mut quote,
        } = self.load_quote(id).await?;
        change(&mut quote)?;
        self.quotes.delete_then_reinsert(id, version, &quote).await?;
        Ok(quote)
    }

    pub async fn update_quote_status(
        &self,
        agent: &AgentIdentity,
        id: &str,
        status: QuoteStatus,
    ) -> Result<Quote, ServiceError> {
        let quote = self
            .modify_quote(id, |quote| {
                Self::ensure_owner(agent, quote)?;
                quote
                    .apply_status(status, Utc::now())
                    .map_err(ServiceError::InvalidTransition)
            })
            .await?;
        log::info!("Quote {} is now {}", id, quote.status);
        Ok(quote)
    }

    /// Render the quote's documents again from the current templates.
    pub async fn regenerate_documents(
        &self,
        agent: &AgentIdentity,
        id: &str,
    ) -> Result<BTreeMap<QuoteType, DocumentOutcome>, ServiceError> {
        let quote = self.get_quote(agent, id).await?;
        let documents = self.generate_documents(&quote).await?;
        let updated = self.attach_documents(id, documents.clone()).await?;

        let current: Vec<String> = updated.stored_files().into_iter().map(|f| f.path).collect();
        let superseded: Vec<String> = quote
            .stored_files()
            .into_iter()
            .map(|f| f.path)
            .filter(|path| !current.contains(path))
            .collect();
        remove_files(&superseded).await;
        Ok(documents)
    }

    pub async fn delete_quote(&self, agent: &AgentIdentity, id: &str) -> Result<(), ServiceError> {
        let _guard = self.locks.lock(RecordLocks::record_key(QUOTES, id)).await;

        let quote = self.load_quote(id).await?.record;
        Self::ensure_owner(agent, &quote)?;
        self.quotes.delete(&Filter::by_id(id)).await?;

        let paths: Vec<String> = quote.stored_files().into_iter().map(|f| f.path).collect();
        remove_files(&paths).await;
        remove_dir(&self.upload_dir(id)).await;
        log::info!(
            "Quote {} deleted by agent {} with {} file(s)",
            id,
            agent.id,
            paths.len()
        );
        Ok(())
    }
}
