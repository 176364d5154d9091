use super::images::PendingImages;
use crate::model::{GenderPreference, PersistedPost, PostType};
use serde::Serialize;
use std::fmt;

/// Free-text inputs of the post form. Enum choices (post type, gender
/// preference) are set through typed setters instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Description,
    Location,
    Price,
    AvailableDate,
    ContactWhatsapp,
    ContactEmail,
    ContactTelegram,
    ExtraInfo,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Title,
        Field::Description,
        Field::Location,
        Field::Price,
        Field::AvailableDate,
        Field::ContactWhatsapp,
        Field::ContactEmail,
        Field::ContactTelegram,
        Field::ExtraInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Location => "location",
            Field::Price => "price",
            Field::AvailableDate => "available_date",
            Field::ContactWhatsapp => "contact_whatsapp",
            Field::ContactEmail => "contact_email",
            Field::ContactTelegram => "contact_telegram",
            Field::ExtraInfo => "extra_info",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory post being edited. Text inputs are kept exactly as typed;
/// parsing happens at submit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DraftPost {
    pub post_type: PostType,
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: String,
    pub available_date: String,
    pub contact_whatsapp: String,
    pub contact_email: String,
    pub contact_telegram: String,
    pub gender_preference: Option<GenderPreference>,
    pub extra_info: String,
    #[serde(skip)]
    pub images: PendingImages,
}

impl DraftPost {
    pub fn with_max_images(max_images: usize) -> Self {
        Self {
            images: PendingImages::with_max(max_images),
            ..Default::default()
        }
    }

    /// Pre-fill a draft from a stored post, rendering numbers and dates back
    /// into their text form.
    pub fn from_post(post: &PersistedPost) -> Self {
        let f = &post.fields;
        Self {
            post_type: f.post_type,
            title: f.title.clone(),
            description: f.description.clone(),
            location: f.location.clone(),
            price: f.price.map(|p| p.to_string()).unwrap_or_default(),
            available_date: f
                .available_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            contact_whatsapp: f.contact_whatsapp.clone().unwrap_or_default(),
            contact_email: f.contact_email.clone().unwrap_or_default(),
            contact_telegram: f.contact_telegram.clone().unwrap_or_default(),
            gender_preference: f.gender_preference,
            extra_info: f.extra_info.clone().unwrap_or_default(),
            images: PendingImages::default(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Location => &self.location,
            Field::Price => &self.price,
            Field::AvailableDate => &self.available_date,
            Field::ContactWhatsapp => &self.contact_whatsapp,
            Field::ContactEmail => &self.contact_email,
            Field::ContactTelegram => &self.contact_telegram,
            Field::ExtraInfo => &self.extra_info,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Location => &mut self.location,
            Field::Price => &mut self.price,
            Field::AvailableDate => &mut self.available_date,
            Field::ContactWhatsapp => &mut self.contact_whatsapp,
            Field::ContactEmail => &mut self.contact_email,
            Field::ContactTelegram => &mut self.contact_telegram,
            Field::ExtraInfo => &mut self.extra_info,
        };
        *slot = value;
    }

    pub fn is_blank(&self, field: Field) -> bool {
        self.get(field).trim().is_empty()
    }
}
