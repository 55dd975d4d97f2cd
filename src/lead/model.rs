use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::quote::model::QuoteType;
use crate::validation::{validate_email, validate_required, ValidationError, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Converted | LeadStatus::Lost)
    }

    fn rank(&self) -> u8 {
        match self {
            LeadStatus::New => 0,
            LeadStatus::Contacted => 1,
            LeadStatus::Qualified => 2,
            LeadStatus::Converted => 3,
            LeadStatus::Lost => 4,
        }
    }

    pub fn can_transition_to(&self, next: LeadStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match next {
            LeadStatus::Lost => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Lead {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub interested_in: Vec<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_contact: Option<DateTime<Utc>>,
}

impl Lead {
    pub fn from_submission(id: String, submission: LeadSubmission, now: DateTime<Utc>) -> Self {
        Self {
            id,
            first_name: submission.first_name,
            last_name: submission.last_name,
            email: submission.email.trim().to_string(),
            phone: submission.phone,
            address: submission.address,
            city: submission.city,
            state: submission.state,
            zip_code: submission.zip_code,
            interested_in: submission.interested_in,
            status: LeadStatus::New,
            notes: submission.notes,
            created_at: now,
            updated_at: now,
            last_contact: None,
        }
    }

    /// Move to `update.status`, replacing notes when given.
    /// `last_contact` is stamped for every status other than `new`.
    pub fn apply_status(
        &mut self,
        update: LeadStatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        if !self.status.can_transition_to(update.status) {
            return Err(format!(
                "Lead cannot move from '{}' to '{}'",
                self.status, update.status
            ));
        }

        self.status = update.status;
        if update.notes.is_some() {
            self.notes = update.notes;
        }
        if update.status != LeadStatus::New {
            self.last_contact = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Public lead intake payload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeadSubmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub interested_in: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LeadSubmission {
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = ValidationErrors::new();
        validate_required(&self.first_name, "first_name", "First name", &mut errors);
        validate_required(&self.last_name, "last_name", "Last name", &mut errors);
        validate_email(&self.email, "email", &mut errors);
        validate_required(&self.phone, "phone", "Phone", &mut errors);
        validate_required(&self.address, "address", "Address", &mut errors);
        validate_required(&self.city, "city", "City", &mut errors);
        validate_required(&self.state, "state", "State", &mut errors);
        validate_required(&self.zip_code, "zip_code", "Zip code", &mut errors);
        if self.interested_in.iter().all(|s| s.trim().is_empty()) {
            errors.add(
                ValidationError::new("interested_in", "At least one coverage type is required")
                    .with_suggestion("e.g. [\"AUTO\", \"HOME\"]"),
            );
        }
        for entry in self.interested_in.iter().filter(|s| !s.trim().is_empty()) {
            if let Err(e) = entry.trim().parse::<QuoteType>() {
                errors.add(
                    ValidationError::new("interested_in", e)
                        .with_suggestion("Use AUTO, HOME or SPECIALTY"),
                );
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeadStatusUpdate {
    pub status: LeadStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct LeadListQuery {
    pub status: Option<LeadStatus>,
}
