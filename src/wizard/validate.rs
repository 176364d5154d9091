use super::draft::{DraftPost, Field};
use super::Step;
use crate::model::PostFields;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const TITLE_REQUIRED: &str = "Título é obrigatório";
pub const DESCRIPTION_REQUIRED: &str = "Descrição é obrigatória";
pub const LOCATION_REQUIRED: &str = "Localização é obrigatória";
pub const CONTACT_REQUIRED: &str = "Pelo menos uma forma de contato é obrigatória";
pub const PRICE_INVALID: &str = "Preço inválido";
pub const DATE_INVALID: &str = "Data inválida";

/// Sparse field -> message map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<Field, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    /// Drop the error of one field. Returns whether there was one.
    pub fn clear(&mut self, field: Field) -> bool {
        self.0.remove(&field).is_some()
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Rules of a single step. Steps never look at each other's fields.
pub fn validate_step(step: Step, draft: &DraftPost) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    match step {
        Step::BasicInfo => {
            if draft.is_blank(Field::Title) {
                errors.insert(Field::Title, TITLE_REQUIRED);
            }
            if draft.is_blank(Field::Description) {
                errors.insert(Field::Description, DESCRIPTION_REQUIRED);
            }
        }
        Step::LocationPrice => {
            if draft.is_blank(Field::Location) {
                errors.insert(Field::Location, LOCATION_REQUIRED);
            }
        }
        Step::Images | Step::Review => {}
        Step::ContactPreferences => {
            let any_contact = [Field::ContactWhatsapp, Field::ContactEmail, Field::ContactTelegram]
                .into_iter()
                .any(|f| !draft.is_blank(f));
            if !any_contact {
                // One shared key for the whole contact group.
                errors.insert(Field::ContactWhatsapp, CONTACT_REQUIRED);
            }
        }
    }
    errors
}

/// Every step's rules plus the submit-time parsing of price and date.
pub fn validate_all(draft: &DraftPost) -> ValidationErrors {
    match build_fields(draft) {
        Ok(_) => ValidationErrors::new(),
        Err(errors) => errors,
    }
}

/// Parse a price input. Blank means "no price"; a comma is accepted as the
/// decimal separator.
pub fn parse_price(raw: &str) -> Result<Option<f64>, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.replace(',', ".").parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(Some(value)),
        _ => Err(PRICE_INVALID),
    }
}

/// Parse a `YYYY-MM-DD` date input. Blank means "no date".
pub fn parse_available_date(raw: &str) -> Result<Option<NaiveDate>, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| DATE_INVALID)
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Turn a draft into record fields, or report every problem at once.
pub fn build_fields(draft: &DraftPost) -> Result<PostFields, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for step in Step::ALL {
        errors.merge(validate_step(step, draft));
    }

    let price = parse_price(&draft.price).unwrap_or_else(|msg| {
        errors.insert(Field::Price, msg);
        None
    });
    let available_date = parse_available_date(&draft.available_date).unwrap_or_else(|msg| {
        errors.insert(Field::AvailableDate, msg);
        None
    });

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(PostFields {
        post_type: draft.post_type,
        title: draft.title.trim().to_string(),
        description: draft.description.trim().to_string(),
        location: draft.location.trim().to_string(),
        price,
        available_date,
        contact_whatsapp: optional(&draft.contact_whatsapp),
        contact_email: optional(&draft.contact_email),
        contact_telegram: optional(&draft.contact_telegram),
        gender_preference: draft.gender_preference,
        extra_info: optional(&draft.extra_info),
    })
}
