use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    #[default]
    TenhoVaga,
    ProcuroVaga,
    ProcuroColega,
    DicaGeral,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::TenhoVaga => "tenho_vaga",
            PostType::ProcuroVaga => "procuro_vaga",
            PostType::ProcuroColega => "procuro_colega",
            PostType::DicaGeral => "dica_geral",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tenho_vaga" => Some(PostType::TenhoVaga),
            "procuro_vaga" => Some(PostType::ProcuroVaga),
            "procuro_colega" => Some(PostType::ProcuroColega),
            "dica_geral" => Some(PostType::DicaGeral),
            _ => None,
        }
    }

    /// Label shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            PostType::TenhoVaga => "Tenho vaga",
            PostType::ProcuroVaga => "Procuro vaga",
            PostType::ProcuroColega => "Procuro colega",
            PostType::DicaGeral => "Dica geral",
        }
    }
}

impl FromStr for PostType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostType::parse(s.trim()).ok_or_else(|| UnknownVariant {
            kind: "post type",
            value: s.to_string(),
        })
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GenderPreference {
    Qualquer,
    Masculino,
    Feminino,
    NaoBinario,
}

impl GenderPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderPreference::Qualquer => "qualquer",
            GenderPreference::Masculino => "masculino",
            GenderPreference::Feminino => "feminino",
            GenderPreference::NaoBinario => "nao_binario",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "qualquer" => Some(GenderPreference::Qualquer),
            "masculino" => Some(GenderPreference::Masculino),
            "feminino" => Some(GenderPreference::Feminino),
            "nao_binario" => Some(GenderPreference::NaoBinario),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GenderPreference::Qualquer => "Qualquer",
            GenderPreference::Masculino => "Masculino",
            GenderPreference::Feminino => "Feminino",
            GenderPreference::NaoBinario => "Não binário",
        }
    }
}

impl FromStr for GenderPreference {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GenderPreference::parse(s.trim()).ok_or_else(|| UnknownVariant {
            kind: "gender preference",
            value: s.to_string(),
        })
    }
}

impl fmt::Display for GenderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record fields shared by inserts and updates. Blank optionals are `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostFields {
    pub post_type: PostType,
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: Option<f64>,
    pub available_date: Option<NaiveDate>,
    pub contact_whatsapp: Option<String>,
    pub contact_email: Option<String>,
    pub contact_telegram: Option<String>,
    pub gender_preference: Option<GenderPreference>,
    pub extra_info: Option<String>,
}

impl PostFields {
    pub fn has_contact_info(&self) -> bool {
        self.contact_whatsapp.is_some()
            || self.contact_email.is_some()
            || self.contact_telegram.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedPost {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub fields: PostFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PersistedPost {
    /// A post without an expiry never shows up as active.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at > now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPostImage {
    pub post_id: Uuid,
    pub image_url: String,
    pub display_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostImage {
    pub id: Uuid,
    pub post_id: Uuid,
    pub image_url: String,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

/// Browse filters; every `None` means "don't filter on this".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostFilter {
    pub post_type: Option<PostType>,
    pub location: Option<String>,
    pub search: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub gender_preference: Option<GenderPreference>,
}
