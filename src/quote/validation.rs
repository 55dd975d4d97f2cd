use crate::validation::{validate_email, validate_required, ValidationError, ValidationErrors};

use super::model::{QuoteSubmission, QuoteType};

/// Check a submission before anything is stored.
pub fn validate_submission(submission: &QuoteSubmission) -> Result<(), String> {
    let mut errors = ValidationErrors::new();

    if submission.quote_types.is_empty() {
        errors.add(
            ValidationError::new("quote_types", "At least one quote type is required")
                .with_suggestion("Use any of AUTO, HOME, SPECIALTY"),
        );
    }

    let info = &submission.personal_info;
    validate_required(&info.first_name, "personal_info.first_name", "First name", &mut errors);
    validate_required(&info.last_name, "personal_info.last_name", "Last name", &mut errors);
    validate_email(&info.email, "personal_info.email", &mut errors);
    validate_required(&info.phone, "personal_info.phone", "Phone", &mut errors);
    validate_required(&info.address, "personal_info.address", "Address", &mut errors);

    let mut seen: Vec<QuoteType> = Vec::new();
    for quote_type in &submission.quote_types {
        if seen.contains(quote_type) {
            continue;
        }
        seen.push(*quote_type);
        match quote_type {
            QuoteType::Auto => {
                let vehicles = submission.vehicles.as_deref().unwrap_or_default();
                if vehicles.is_empty() {
                    errors.add(ValidationError::missing_details("vehicles", "AUTO"));
                }
                for (i, vehicle) in vehicles.iter().enumerate() {
                    validate_required(&vehicle.year, &format!("vehicles[{i}].year"), "Year", &mut errors);
                    validate_required(&vehicle.make, &format!("vehicles[{i}].make"), "Make", &mut errors);
                    validate_required(&vehicle.model, &format!("vehicles[{i}].model"), "Model", &mut errors);
                }
            }
            QuoteType::Home => {
                if submission.home_details.is_none() {
                    errors.add(ValidationError::missing_details("home_details", "HOME"));
                }
            }
            QuoteType::Specialty => {
                let items = submission.specialty_items.as_deref().unwrap_or_default();
                if items.is_empty() {
                    errors.add(ValidationError::missing_details("specialty_items", "SPECIALTY"));
                }
                for (i, item) in items.iter().enumerate() {
                    validate_required(&item.item_type, &format!("specialty_items[{i}].type"), "Type", &mut errors);
                }
            }
        }
    }

    errors.into_result()
}
