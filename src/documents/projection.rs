//! Flattening of a [`Quote`] into the placeholder map of one template type.
//!
//! Every key a template type declares is always present in the result; a
//! field the quote does not carry maps to `None` and is sentinel-filled by
//! substitution.

use crate::quote::model::{Quote, QuoteType, SpecialtyItem};

use super::substitution::PlaceholderMap;

/// Specialty items beyond this many are not rendered.
pub const MAX_SPECIALTY_ITEMS: usize = 8;

pub const COMMON_KEYS: [&str; 6] = [
    "client_name",
    "client_email",
    "client_phone",
    "address",
    "created_at",
    "effective_date",
];

pub const AUTO_KEYS: [&str; 5] = [
    "current_carrier",
    "years_with_carrier",
    "expiration_date",
    "current_limits",
    "quoting_limits",
];

pub const HOME_KEYS: [&str; 9] = [
    "year_built",
    "square_footage",
    "construction_type",
    "roof_type",
    "number_of_stories",
    "garage_type",
    "basement_type",
    "security_system",
    "swimming_pool",
];

/// Per-item suffixes, emitted as `item{N}_{field}`.
pub const SPECIALTY_ITEM_FIELDS: [&str; 11] = [
    "type",
    "year",
    "make",
    "model",
    "vin",
    "horsepower",
    "top_speed",
    "market_value",
    "storage_location",
    "comp_deductible",
    "coll_deductible",
];

pub fn specialty_key(slot: usize, field: &str) -> String {
    format!("item{}_{}", slot, field)
}

/// Every key `project` emits for `quote_type`.
pub fn declared_keys(quote_type: QuoteType) -> Vec<String> {
    let mut keys: Vec<String> = COMMON_KEYS.iter().map(|k| k.to_string()).collect();
    match quote_type {
        QuoteType::Auto => keys.extend(AUTO_KEYS.iter().map(|k| k.to_string())),
        QuoteType::Home => keys.extend(HOME_KEYS.iter().map(|k| k.to_string())),
        QuoteType::Specialty => {
            for slot in 1..=MAX_SPECIALTY_ITEMS {
                keys.extend(SPECIALTY_ITEM_FIELDS.iter().map(|f| specialty_key(slot, f)));
            }
        }
    }
    keys
}

pub fn project(quote_type: QuoteType, quote: &Quote) -> PlaceholderMap {
    let mut map = PlaceholderMap::new();
    project_common(quote, &mut map);
    match quote_type {
        QuoteType::Auto => project_auto(quote, &mut map),
        QuoteType::Home => project_home(quote, &mut map),
        QuoteType::Specialty => project_specialty(quote, &mut map),
    }
    map
}

fn put(map: &mut PlaceholderMap, key: &str, value: Option<String>) {
    map.insert(key.to_string(), value);
}

fn yes_no(flag: Option<bool>) -> Option<String> {
    Some(if flag.unwrap_or(false) { "Yes" } else { "No" }.to_string())
}

fn project_common(quote: &Quote, map: &mut PlaceholderMap) {
    put(map, "client_name", Some(quote.client_name.clone()));
    put(map, "client_email", Some(quote.client_email.clone()));
    put(map, "client_phone", Some(quote.client_phone.clone()));
    put(map, "address", Some(quote.address.clone()));
    put(
        map,
        "created_at",
        Some(quote.created_at.format("%Y-%m-%d").to_string()),
    );
    put(map, "effective_date", quote.effective_date.clone());
}

fn project_auto(quote: &Quote, map: &mut PlaceholderMap) {
    let data = quote.auto_data.as_ref();
    put(
        map,
        "current_carrier",
        data.and_then(|d| d.current_carrier.clone()),
    );
    put(
        map,
        "years_with_carrier",
        data.and_then(|d| d.years_with_carrier).map(|y| y.to_string()),
    );
    put(
        map,
        "expiration_date",
        data.and_then(|d| d.expiration_date.clone()),
    );
    put(map, "current_limits", data.and_then(|d| d.current_limits.clone()));
    put(map, "quoting_limits", data.and_then(|d| d.quoting_limits.clone()));
}

fn project_home(quote: &Quote, map: &mut PlaceholderMap) {
    let Some(home) = quote.home_details.as_ref() else {
        for key in HOME_KEYS {
            put(map, key, None);
        }
        return;
    };

    put(map, "year_built", Some(home.year_built.clone()));
    put(map, "square_footage", Some(home.square_footage.clone()));
    put(map, "construction_type", Some(home.construction_type.clone()));
    put(map, "roof_type", Some(home.roof_type.clone()));
    put(map, "number_of_stories", home.number_of_stories.clone());
    put(map, "garage_type", home.garage_type.clone());
    put(map, "basement_type", home.basement_type.clone());
    put(map, "security_system", yes_no(home.security_system));
    put(map, "swimming_pool", yes_no(home.swimming_pool));
}

fn item_field(item: &SpecialtyItem, field: &str) -> Option<String> {
    match field {
        "type" => Some(item.item_type.clone()),
        "year" => Some(item.year.clone()),
        "make" => Some(item.make.clone()),
        "model" => Some(item.model.clone()),
        "vin" => item.vin.clone(),
        "horsepower" => item.horsepower.clone(),
        "top_speed" => item.top_speed.clone(),
        "market_value" => Some(item.market_value.clone()),
        "storage_location" => Some(item.storage_location.clone()),
        "comp_deductible" => item.comp_deductible.clone(),
        "coll_deductible" => item.coll_deductible.clone(),
        _ => None,
    }
}

fn project_specialty(quote: &Quote, map: &mut PlaceholderMap) {
    let items = quote.specialty_items.as_deref().unwrap_or_default();
    if items.len() > MAX_SPECIALTY_ITEMS {
        log::debug!(
            "Quote {} has {} specialty items, rendering the first {}",
            quote.id,
            items.len(),
            MAX_SPECIALTY_ITEMS
        );
    }

    for slot in 1..=MAX_SPECIALTY_ITEMS {
        let item = items.get(slot - 1);
        for field in SPECIALTY_ITEM_FIELDS {
            map.insert(
                specialty_key(slot, field),
                item.and_then(|item| item_field(item, field)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::model::{AutoData, HomeDetails, PersonalInfo, QuoteSubmission};
    use chrono::{TimeZone, Utc};

    fn quote(types: Vec<QuoteType>) -> Quote {
        let submission = QuoteSubmission {
            quote_types: types,
            personal_info: PersonalInfo {
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                email: "jane@example.com".into(),
                phone: "555-0100".into(),
                address: "1 Main St".into(),
                ..Default::default()
            },
            auto_data: None,
            vehicles: None,
            home_details: None,
            specialty_items: None,
            additional_insureds: Vec::new(),
            notes: None,
            effective_date: None,
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 10, 30, 0).unwrap();
        Quote::from_submission("q1".into(), "a1", "agent@example.com", submission, now)
    }

    #[test]
    fn test_common_keys() {
        let map = project(QuoteType::Auto, &quote(vec![QuoteType::Auto]));
        assert_eq!(map["client_name"].as_deref(), Some("Jane Doe"));
        assert_eq!(map["created_at"].as_deref(), Some("2024-03-09"));
        assert_eq!(map["effective_date"], None);
    }

    #[test]
    fn test_projection_is_total_over_declared_keys() {
        let q = quote(vec![QuoteType::Auto, QuoteType::Home, QuoteType::Specialty]);
        for quote_type in QuoteType::ALL {
            let map = project(quote_type, &q);
            let keys: Vec<String> = map.keys().cloned().collect();
            let mut declared = declared_keys(quote_type);
            declared.sort();
            assert_eq!(keys, declared, "{quote_type}");
        }
    }

    #[test]
    fn test_auto_years_render_as_decimal() {
        let mut q = quote(vec![QuoteType::Auto]);
        q.auto_data = Some(AutoData {
            current_carrier: Some("Acme Mutual".into()),
            years_with_carrier: Some(3.0),
            ..Default::default()
        });
        let map = project(QuoteType::Auto, &q);
        assert_eq!(map["years_with_carrier"].as_deref(), Some("3"));
        assert_eq!(map["current_carrier"].as_deref(), Some("Acme Mutual"));
        assert_eq!(map["quoting_limits"], None);

        q.auto_data.as_mut().unwrap().years_with_carrier = Some(2.5);
        let map = project(QuoteType::Auto, &q);
        assert_eq!(map["years_with_carrier"].as_deref(), Some("2.5"));
    }

    #[test]
    fn test_home_booleans() {
        let mut q = quote(vec![QuoteType::Home]);
        assert_eq!(project(QuoteType::Home, &q)["security_system"], None);

        q.home_details = Some(HomeDetails {
            year_built: "1995".into(),
            security_system: Some(true),
            ..Default::default()
        });
        let map = project(QuoteType::Home, &q);
        assert_eq!(map["security_system"].as_deref(), Some("Yes"));
        assert_eq!(map["swimming_pool"].as_deref(), Some("No"));
        assert_eq!(map["year_built"].as_deref(), Some("1995"));
    }

    #[test]
    fn test_specialty_caps_at_eight_items() {
        let mut q = quote(vec![QuoteType::Specialty]);
        q.specialty_items = Some(
            (1..=10)
                .map(|i| SpecialtyItem {
                    item_type: format!("boat {i}"),
                    ..Default::default()
                })
                .collect(),
        );

        let map = project(QuoteType::Specialty, &q);
        assert_eq!(map["item1_type"].as_deref(), Some("boat 1"));
        assert_eq!(map["item8_type"].as_deref(), Some("boat 8"));
        assert!(map.keys().all(|k| !k.starts_with("item9_") && !k.starts_with("item10_")));
    }

    #[test]
    fn test_specialty_empty_slots_are_none() {
        let mut q = quote(vec![QuoteType::Specialty]);
        q.specialty_items = Some(vec![SpecialtyItem {
            item_type: "jet ski".into(),
            ..Default::default()
        }]);
        let map = project(QuoteType::Specialty, &q);
        assert_eq!(map["item1_type"].as_deref(), Some("jet ski"));
        assert_eq!(map["item1_vin"], None);
        assert_eq!(map["item2_type"], None);
    }
}
