use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::documents::DocumentOutcome;

/// Coverage line a quote can be requested for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteType {
    Auto,
    Home,
    Specialty,
}

impl QuoteType {
    pub const ALL: [QuoteType; 3] = [QuoteType::Auto, QuoteType::Home, QuoteType::Specialty];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteType::Auto => "AUTO",
            QuoteType::Home => "HOME",
            QuoteType::Specialty => "SPECIALTY",
        }
    }

    /// Lower-case form used for template names and output directories.
    pub fn slug(&self) -> &'static str {
        match self {
            QuoteType::Auto => "auto",
            QuoteType::Home => "home",
            QuoteType::Specialty => "specialty",
        }
    }

    pub fn template_file(&self) -> String {
        format!("{}_quote_template.docx", self.slug())
    }
}

impl fmt::Display for QuoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AUTO" => Ok(QuoteType::Auto),
            "HOME" => Ok(QuoteType::Home),
            "SPECIALTY" => Ok(QuoteType::Specialty),
            other => Err(format!("unknown quote type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    InProgress,
    Completed,
    Canceled,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::InProgress => "in_progress",
            QuoteStatus::Completed => "completed",
            QuoteStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Completed | QuoteStatus::Canceled)
    }

    fn rank(&self) -> u8 {
        match self {
            QuoteStatus::Pending => 0,
            QuoteStatus::InProgress => 1,
            QuoteStatus::Completed => 2,
            QuoteStatus::Canceled => 3,
        }
    }

    /// Forward moves along pending → in_progress → completed, cancellation
    /// from any open state, and re-applying the current status.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match next {
            QuoteStatus::Canceled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
}

impl PersonalInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Current-policy details shown on the auto quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AutoData {
    #[serde(default)]
    pub current_carrier: Option<String>,
    #[serde(default)]
    pub years_with_carrier: Option<f64>,
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub current_limits: Option<String>,
    #[serde(default)]
    pub quoting_limits: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Vehicle {
    pub year: String,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub miles_driven: Option<String>,
    #[serde(default)]
    pub primary_driver: Option<String>,
    #[serde(default)]
    pub comp_deductible: Option<String>,
    #[serde(default)]
    pub coll_deductible: Option<String>,
    #[serde(default)]
    pub finance_info: Option<String>,
    #[serde(default)]
    pub gap_insurance: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct HomeDetails {
    pub year_built: String,
    pub square_footage: String,
    pub construction_type: String,
    pub roof_type: String,
    #[serde(default)]
    pub number_of_stories: Option<String>,
    #[serde(default)]
    pub garage_type: Option<String>,
    #[serde(default)]
    pub basement_type: Option<String>,
    #[serde(default)]
    pub security_system: Option<bool>,
    #[serde(default)]
    pub swimming_pool: Option<bool>,
    #[serde(default)]
    pub fire_protection: Option<bool>,
    #[serde(default)]
    pub market_value: Option<String>,
    #[serde(default)]
    pub coverage_amount: Option<String>,
}

/// Boat, motorcycle, ATV and the like.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SpecialtyItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub year: String,
    pub make: String,
    pub model: String,
    pub market_value: String,
    pub storage_location: String,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub horsepower: Option<String>,
    #[serde(default)]
    pub top_speed: Option<String>,
    #[serde(default)]
    pub comp_deductible: Option<String>,
    #[serde(default)]
    pub coll_deductible: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdditionalInsured {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub relationship: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Stored quote request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub id: String,
    pub agent_id: String,
    pub agent_email: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub address: String,
    pub quote_types: Vec<QuoteType>,
    pub status: QuoteStatus,
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub auto_data: Option<AutoData>,
    #[serde(default)]
    pub vehicles: Option<Vec<Vehicle>>,
    #[serde(default)]
    pub home_details: Option<HomeDetails>,
    #[serde(default)]
    pub specialty_items: Option<Vec<SpecialtyItem>>,
    #[serde(default)]
    pub additional_insureds: Vec<AdditionalInsured>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub effective_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub generated_documents: BTreeMap<QuoteType, DocumentOutcome>,
    #[serde(default)]
    pub attachments: Vec<QuoteAttachment>,
}

/// A file an agent uploaded against a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuoteAttachment {
    pub filename: String,
    pub path: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Docx,
    Pdf,
    Attachment,
}

/// A file on disk that belongs to a quote.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub filename: String,
    pub path: String,
    pub kind: FileKind,
    pub quote_type: Option<QuoteType>,
}

impl StoredFile {
    fn new(path: &str, kind: FileKind, quote_type: Option<QuoteType>) -> Self {
        let filename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        Self {
            filename,
            path: path.to_string(),
            kind,
            quote_type,
        }
    }
}

/// Listing entry for `GET /api/quotes/{id}/files`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteFile {
    pub filename: String,
    pub kind: FileKind,
    pub quote_type: Option<QuoteType>,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteFilesResponse {
    pub quote_id: String,
    pub files: Vec<QuoteFile>,
}

impl Quote {
    /// Build a new pending quote owned by `agent_id`.
    ///
    /// Requested types are de-duplicated in order of first appearance and
    /// detail data for types that were not requested is dropped.
    pub fn from_submission(
        id: String,
        agent_id: &str,
        agent_email: &str,
        submission: QuoteSubmission,
        now: DateTime<Utc>,
    ) -> Self {
        let mut quote_types: Vec<QuoteType> = Vec::with_capacity(submission.quote_types.len());
        for quote_type in submission.quote_types {
            if !quote_types.contains(&quote_type) {
                quote_types.push(quote_type);
            }
        }

        let wants = |t: QuoteType| quote_types.contains(&t);
        let (auto_data, vehicles) = if wants(QuoteType::Auto) {
            (submission.auto_data, submission.vehicles)
        } else {
            (None, None)
        };
        let home_details = submission.home_details.filter(|_| wants(QuoteType::Home));
        let specialty_items = submission
            .specialty_items
            .filter(|_| wants(QuoteType::Specialty));

        let info = submission.personal_info;
        Self {
            id,
            agent_id: agent_id.to_string(),
            agent_email: agent_email.to_string(),
            client_name: info.full_name(),
            client_email: info.email.clone(),
            client_phone: info.phone.clone(),
            address: info.address.clone(),
            quote_types,
            status: QuoteStatus::Pending,
            personal_info: info,
            auto_data,
            vehicles,
            home_details,
            specialty_items,
            additional_insureds: submission.additional_insureds,
            notes: submission.notes,
            effective_date: submission.effective_date,
            created_at: now,
            updated_at: now,
            generated_documents: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }

    /// Rendered documents first, in quote type order, then attachments.
    pub fn stored_files(&self) -> Vec<StoredFile> {
        let mut files = Vec::new();
        for (quote_type, outcome) in &self.generated_documents {
            if let Some(docx) = outcome.docx_path() {
                files.push(StoredFile::new(docx, FileKind::Docx, Some(*quote_type)));
            }
            if let Some(pdf) = outcome.pdf_path() {
                files.push(StoredFile::new(pdf, FileKind::Pdf, Some(*quote_type)));
            }
        }
        for attachment in &self.attachments {
            files.push(StoredFile::new(&attachment.path, FileKind::Attachment, None));
        }
        files
    }

    pub fn find_file(&self, filename: &str) -> Option<StoredFile> {
        self.stored_files()
            .into_iter()
            .find(|file| file.filename == filename)
    }

    /// Forget `file`, returning the paths that should leave the disk with it.
    /// A DOCX takes its type's whole outcome (and PDF) along.
    pub fn forget_file(&mut self, file: &StoredFile) -> Vec<String> {
        match (file.kind, file.quote_type) {
            (FileKind::Docx, Some(quote_type)) => self
                .generated_documents
                .remove(&quote_type)
                .map(|outcome| {
                    outcome
                        .docx_path()
                        .into_iter()
                        .chain(outcome.pdf_path())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            (FileKind::Pdf, Some(quote_type)) => {
                if let Some(DocumentOutcome::Rendered { pdf_path, .. }) =
                    self.generated_documents.get_mut(&quote_type)
                {
                    pdf_path.take().into_iter().collect()
                } else {
                    Vec::new()
                }
            }
            _ => {
                let before = self.attachments.len();
                self.attachments.retain(|a| a.path != file.path);
                if self.attachments.len() < before {
                    vec![file.path.clone()]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn apply_status(&mut self, status: QuoteStatus, now: DateTime<Utc>) -> Result<(), String> {
        if !self.status.can_transition_to(status) {
            return Err(format!(
                "Quote cannot move from '{}' to '{}'",
                self.status, status
            ));
        }
        if self.status != status {
            self.status = status;
            self.updated_at = now;
        }
        Ok(())
    }
}

/// Payload of `POST /api/quotes/submit`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteSubmission {
    pub quote_types: Vec<QuoteType>,
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub auto_data: Option<AutoData>,
    #[serde(default)]
    pub vehicles: Option<Vec<Vehicle>>,
    #[serde(default)]
    pub home_details: Option<HomeDetails>,
    #[serde(default)]
    pub specialty_items: Option<Vec<SpecialtyItem>>,
    #[serde(default)]
    pub additional_insureds: Vec<AdditionalInsured>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub effective_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuoteStatusUpdate {
    pub status: QuoteStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct QuoteListQuery {
    pub status: Option<QuoteStatus>,
    pub quote_type: Option<QuoteType>,
}

/// Result of rendering (or re-rendering) a quote's documents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentsResponse {
    pub quote_id: String,
    pub documents: BTreeMap<QuoteType, DocumentOutcome>,
}
