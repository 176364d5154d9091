//! Record data layer: the `PostStore` seam consumed by the pipeline and the
//! edit form, plus its SQLite implementation.
//!
//! - `model`: view models returned by repositories.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! Errors crossing this seam are opaque `anyhow` errors; callers map them into
//! their own outcome types.

pub mod model;
pub mod repo;

use crate::model::{NewPostImage, PersistedPost, PostFields, PostImage};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use model::OwnerStats;
pub use repo::*;

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, owner_id: Uuid, fields: &PostFields) -> Result<PersistedPost>;

    async fn get_post(&self, id: Uuid) -> Result<Option<PersistedPost>>;

    async fn get_post_for_owner(&self, id: Uuid, owner_id: Uuid) -> Result<Option<PersistedPost>>;

    async fn update_post(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &PostFields,
    ) -> Result<Option<PersistedPost>>;

    /// Deleting a post also removes its image links.
    async fn delete_post(&self, id: Uuid) -> Result<bool>;

    async fn create_image(&self, image: &NewPostImage) -> Result<PostImage>;

    async fn get_image(&self, id: Uuid) -> Result<Option<PostImage>>;

    /// Image links of a post in display order.
    async fn list_images(&self, post_id: Uuid) -> Result<Vec<PostImage>>;

    async fn delete_image(&self, id: Uuid) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn create_post(&self, owner_id: Uuid, fields: &PostFields) -> Result<PersistedPost> {
        repo::insert_post(&self.pool, owner_id, fields).await
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<PersistedPost>> {
        repo::fetch_post(&self.pool, id).await
    }

    async fn get_post_for_owner(&self, id: Uuid, owner_id: Uuid) -> Result<Option<PersistedPost>> {
        repo::fetch_post_for_owner(&self.pool, id, owner_id).await
    }

    async fn update_post(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &PostFields,
    ) -> Result<Option<PersistedPost>> {
        repo::update_post(&self.pool, id, owner_id, fields).await
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        repo::delete_post(&self.pool, id).await
    }

    async fn create_image(&self, image: &NewPostImage) -> Result<PostImage> {
        repo::insert_image(&self.pool, image).await
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<PostImage>> {
        repo::fetch_image(&self.pool, id).await
    }

    async fn list_images(&self, post_id: Uuid) -> Result<Vec<PostImage>> {
        repo::list_images(&self.pool, post_id).await
    }

    async fn delete_image(&self, id: Uuid) -> Result<bool> {
        repo::delete_image(&self.pool, id).await
    }
}
