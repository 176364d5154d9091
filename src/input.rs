//! YAML draft files consumed by the CLI `create` and `edit` commands.
//!
//! Every key is optional; `create` starts from an empty draft and `edit`
//! only touches the keys present in the file.

use crate::edit::EditForm;
use crate::model::{GenderPreference, PostType};
use crate::wizard::{Field, PendingImage, Wizard};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Text inputs may be written as YAML numbers (`price: 1500`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Float(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DraftInput {
    pub post_type: Option<PostType>,
    pub title: Option<Scalar>,
    pub description: Option<Scalar>,
    pub location: Option<Scalar>,
    pub price: Option<Scalar>,
    pub available_date: Option<Scalar>,
    pub contact_whatsapp: Option<Scalar>,
    pub contact_email: Option<Scalar>,
    pub contact_telegram: Option<Scalar>,
    pub gender_preference: Option<GenderPreference>,
    pub extra_info: Option<Scalar>,
    #[serde(default)]
    pub images: Vec<PathBuf>,
}

impl DraftInput {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("invalid draft file")
    }

    /// Read a draft file; relative image paths are resolved against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut input = Self::from_yaml(&raw)?;
        if let Some(base) = path.parent() {
            for image in input.images.iter_mut() {
                if image.is_relative() {
                    *image = base.join(&*image);
                }
            }
        }
        Ok(input)
    }

    /// Text fields present in the file, in form order.
    pub fn entries(&self) -> Vec<(Field, String)> {
        let slots = [
            (Field::Title, &self.title),
            (Field::Description, &self.description),
            (Field::Location, &self.location),
            (Field::Price, &self.price),
            (Field::AvailableDate, &self.available_date),
            (Field::ContactWhatsapp, &self.contact_whatsapp),
            (Field::ContactEmail, &self.contact_email),
            (Field::ContactTelegram, &self.contact_telegram),
            (Field::ExtraInfo, &self.extra_info),
        ];
        slots
            .into_iter()
            .filter_map(|(field, value)| value.as_ref().map(|v| (field, v.to_string())))
            .collect()
    }

    pub fn apply_to_wizard(&self, wizard: &mut Wizard) {
        if let Some(post_type) = self.post_type {
            wizard.set_post_type(post_type);
        }
        if self.gender_preference.is_some() {
            wizard.set_gender_preference(self.gender_preference);
        }
        for (field, value) in self.entries() {
            wizard.update_field(field, value);
        }
    }

    pub fn apply_to_form(&self, form: &mut EditForm) {
        if let Some(post_type) = self.post_type {
            form.set_post_type(post_type);
        }
        if self.gender_preference.is_some() {
            form.set_gender_preference(self.gender_preference);
        }
        for (field, value) in self.entries() {
            form.update_field(field, value);
        }
    }

    /// Read the listed image files.
    pub async fn read_images(&self) -> Result<Vec<PendingImage>> {
        let mut images = Vec::with_capacity(self.images.len());
        for path in &self.images {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read image {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            images.push(PendingImage::from_file_name(name, bytes));
        }
        Ok(images)
    }
}
