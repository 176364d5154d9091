//! Single-form editing of an existing post. Shares the draft and validation
//! rules with the creation wizard but has no steps and no images.

use crate::db::PostStore;
use crate::model::{GenderPreference, PersistedPost, PostType};
use crate::wizard::{build_fields, validate_all, DraftPost, Field, ValidationErrors};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("Post não encontrado")]
    NotFound(Uuid),
    #[error("Dados inválidos: {0}")]
    Validation(ValidationErrors),
    #[error("Erro ao atualizar post. Tente novamente.")]
    Store(#[source] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct EditForm {
    post_id: Uuid,
    owner_id: Uuid,
    draft: DraftPost,
    errors: ValidationErrors,
}

impl EditForm {
    /// Fetch an owned post and pre-fill the form with it.
    #[instrument(skip_all, fields(post_id = %post_id))]
    pub async fn load(
        store: &dyn PostStore,
        post_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Self, EditError> {
        let post = store
            .get_post_for_owner(post_id, owner_id)
            .await
            .map_err(EditError::Store)?
            .ok_or(EditError::NotFound(post_id))?;
        Ok(Self::from_post(&post))
    }

    pub fn from_post(post: &PersistedPost) -> Self {
        Self {
            post_id: post.id,
            owner_id: post.owner_id,
            draft: DraftPost::from_post(post),
            errors: ValidationErrors::new(),
        }
    }

    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    pub fn draft(&self) -> &DraftPost {
        &self.draft
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn update_field(&mut self, field: Field, value: impl Into<String>) {
        self.draft.set(field, value.into());
        self.errors.clear(field);
    }

    pub fn set_post_type(&mut self, post_type: PostType) {
        self.draft.post_type = post_type;
    }

    pub fn set_gender_preference(&mut self, preference: Option<GenderPreference>) {
        self.draft.gender_preference = preference;
    }

    /// Run every rule and keep the result on the form.
    pub fn validate(&mut self) -> bool {
        self.errors = validate_all(&self.draft);
        self.errors.is_empty()
    }

    /// Validate and write the form back. Nothing is written when validation
    /// fails; the errors stay on the form.
    #[instrument(skip_all, fields(post_id = %self.post_id))]
    pub async fn save(&mut self, store: &dyn PostStore) -> Result<PersistedPost, EditError> {
        let fields = match build_fields(&self.draft) {
            Ok(fields) => fields,
            Err(errors) => {
                self.errors = errors.clone();
                return Err(EditError::Validation(errors));
            }
        };
        self.errors = ValidationErrors::new();

        match store
            .update_post(self.post_id, self.owner_id, &fields)
            .await
            .map_err(EditError::Store)?
        {
            Some(post) => {
                info!("post updated");
                Ok(post)
            }
            None => {
                warn!("post vanished before save");
                Err(EditError::NotFound(self.post_id))
            }
        }
    }
}
