//! Post + image submission.
//!
//! The parent record is the unit of success: once it exists it is never rolled
//! back because of images. Images are uploaded one at a time, in display
//! order, and each is linked to the post right after its upload. There is no
//! transaction spanning records and object storage, so compensation is a
//! sequence of explicit best-effort steps:
//! - a link failure deletes the object that was just uploaded;
//! - deleting an image removes the object before the record, so a record never
//!   outlives its object.

use crate::db::PostStore;
use crate::model::NewPostImage;
use crate::storage::{object_key, ObjectStorage};
use crate::wizard::{build_fields, DraftPost, PendingImages, Step, ValidationErrors};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// How many of the requested images made it (uploaded and linked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageWarning {
    pub uploaded: usize,
    pub requested: usize,
}

impl fmt::Display for ImageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.uploaded == 0 {
            f.write_str("Nenhuma imagem foi carregada com sucesso")
        } else {
            write!(
                f,
                "{} de {} imagens foram carregadas com sucesso",
                self.uploaded, self.requested
            )
        }
    }
}

#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("Dados inválidos: {0}")]
    Validation(ValidationErrors),
    #[error("Erro ao criar post. Tente novamente.")]
    Persist(#[source] anyhow::Error),
    #[error("É preciso entrar na conta para publicar")]
    Unauthenticated,
    #[error("O post só pode ser enviado a partir da revisão (etapa atual: {})", .0.title())]
    NotOnReview(Step),
    #[error("O post já está sendo enviado")]
    AlreadySubmitting,
}

#[derive(Debug)]
pub enum Outcome {
    Success { post_id: Uuid },
    /// The post exists but not every image could be attached.
    PartialSuccess { post_id: Uuid, warning: ImageWarning },
    Failure(FailureReason),
}

impl Outcome {
    pub fn post_id(&self) -> Option<Uuid> {
        match self {
            Outcome::Success { post_id } | Outcome::PartialSuccess { post_id, .. } => Some(*post_id),
            Outcome::Failure(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("image {0} not found")]
    ImageNotFound(Uuid),
    #[error("Post não encontrado")]
    PostNotFound(Uuid),
    #[error("data layer error: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct SubmissionPipeline {
    store: Arc<dyn PostStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipeline").finish_non_exhaustive()
    }
}

impl SubmissionPipeline {
    pub fn new(store: Arc<dyn PostStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { store, storage }
    }

    pub fn store(&self) -> &dyn PostStore {
        self.store.as_ref()
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    /// Persist the draft as a post owned by `owner_id`, then attach its images.
    #[instrument(skip_all, fields(owner = %owner_id))]
    pub async fn submit(&self, draft: &DraftPost, owner_id: Uuid) -> Outcome {
        let fields = match build_fields(draft) {
            Ok(fields) => fields,
            Err(errors) => {
                warn!(errors = %errors, "draft rejected at submit");
                return Outcome::Failure(FailureReason::Validation(errors));
            }
        };

        let post = match self.store.create_post(owner_id, &fields).await {
            Ok(post) => post,
            Err(err) => {
                error!(?err, "failed to create post");
                return Outcome::Failure(FailureReason::Persist(err));
            }
        };
        info!(post_id = %post.id, images = draft.images.len(), "post created");

        if draft.images.is_empty() {
            return Outcome::Success { post_id: post.id };
        }

        let requested = draft.images.len();
        let uploaded = self.attach_images(post.id, &draft.images).await;
        if uploaded == requested {
            Outcome::Success { post_id: post.id }
        } else {
            let warning = ImageWarning {
                uploaded,
                requested,
            };
            warn!(post_id = %post.id, uploaded, requested, "post created with missing images");
            Outcome::PartialSuccess {
                post_id: post.id,
                warning,
            }
        }
    }

    /// Upload and link each image in order. A failed image is skipped; the
    /// next successful one takes the next display slot, so orders stay dense.
    async fn attach_images(&self, post_id: Uuid, images: &PendingImages) -> usize {
        let stamp = Utc::now().timestamp_millis();
        let mut uploaded = 0usize;

        for (index, image) in images.iter().enumerate() {
            let key = object_key(post_id, stamp, index, &image.file_name);
            let url = match self
                .storage
                .upload(&key, &image.bytes, &image.content_type)
                .await
            {
                Ok(url) => url,
                Err(err) => {
                    warn!(%post_id, index, %key, error = %err, "image upload failed; skipping");
                    continue;
                }
            };

            let link = NewPostImage {
                post_id,
                image_url: url,
                display_order: uploaded as i64,
            };
            match self.store.create_image(&link).await {
                Ok(_) => uploaded += 1,
                Err(err) => {
                    warn!(%post_id, index, %key, ?err, "image link failed; removing uploaded object");
                    self.remove_object(&key).await;
                }
            }
        }
        uploaded
    }

    /// Best-effort object removal; failures are only logged.
    async fn remove_object(&self, key: &str) {
        if let Err(err) = self.storage.delete(key).await {
            warn!(%key, error = %err, "failed to remove storage object");
        }
    }

    /// Delete one image of a post owned by `owner_id`: storage object first
    /// (best-effort), then the record. Images of other owners' posts are
    /// reported as not found and left untouched.
    #[instrument(skip_all, fields(image_id = %image_id))]
    pub async fn delete_image(&self, image_id: Uuid, owner_id: Uuid) -> Result<(), DeleteError> {
        let image = self
            .store
            .get_image(image_id)
            .await?
            .ok_or(DeleteError::ImageNotFound(image_id))?;
        if self
            .store
            .get_post_for_owner(image.post_id, owner_id)
            .await?
            .is_none()
        {
            warn!(post_id = %image.post_id, owner = %owner_id, "image belongs to another owner");
            return Err(DeleteError::ImageNotFound(image_id));
        }

        match self.storage.key_for_url(&image.image_url) {
            Some(key) => self.remove_object(&key).await,
            None => warn!(url = %image.image_url, "cannot derive storage key; leaving object"),
        }

        if !self.store.delete_image(image_id).await? {
            warn!("image record already gone");
        }
        info!(post_id = %image.post_id, "image deleted");
        Ok(())
    }

    /// Delete an owned post: every image object first (best-effort), then
    /// the post record, which takes its image records with it.
    #[instrument(skip_all, fields(post_id = %post_id))]
    pub async fn delete_post(&self, post_id: Uuid, owner_id: Uuid) -> Result<(), DeleteError> {
        let post = self
            .store
            .get_post_for_owner(post_id, owner_id)
            .await?
            .ok_or(DeleteError::PostNotFound(post_id))?;

        for image in self.store.list_images(post.id).await? {
            match self.storage.key_for_url(&image.image_url) {
                Some(key) => self.remove_object(&key).await,
                None => warn!(url = %image.image_url, "cannot derive storage key; leaving object"),
            }
        }

        if !self.store.delete_post(post.id).await? {
            return Err(DeleteError::PostNotFound(post_id));
        }
        info!("post deleted");
        Ok(())
    }
}
