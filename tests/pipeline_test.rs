use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use toca::db::{self, PostStore, SqliteStore};
use toca::model::{NewPostImage, PersistedPost, PostFields, PostImage};
use toca::pipeline::{DeleteError, FailureReason, Outcome, SubmissionPipeline};
use toca::session::StaticSession;
use toca::storage::{ObjectStorage, StorageError};
use toca::wizard::{DraftPost, Field, PendingImage, Step, Wizard};
use tokio::sync::Mutex;
use uuid::Uuid;

const CDN: &str = "https://cdn.test/post-images/";

async fn setup_store() -> SqliteStore {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    SqliteStore::new(pool)
}

/// Storage double: uploads succeed unless a `false` is scripted for them.
#[derive(Clone, Default)]
struct RecordingStorage {
    upload_results: Arc<Mutex<VecDeque<bool>>>,
    uploads: Arc<Mutex<Vec<String>>>,
    deletes: Arc<Mutex<Vec<String>>>,
    fail_deletes: bool,
}

impl RecordingStorage {
    fn with_uploads(results: Vec<bool>) -> Self {
        Self {
            upload_results: Arc::new(Mutex::new(VecDeque::from(results))),
            ..Default::default()
        }
    }

    fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Default::default()
        }
    }

    async fn uploads(&self) -> Vec<String> {
        self.uploads.lock().await.clone()
    }

    async fn deletes(&self) -> Vec<String> {
        self.deletes.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ObjectStorage for RecordingStorage {
    async fn upload(
        &self,
        key: &str,
        _bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.uploads.lock().await.push(key.to_string());
        let ok = self.upload_results.lock().await.pop_front().unwrap_or(true);
        if ok {
            Ok(format!("{}{}", CDN, key))
        } else {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "bucket unavailable",
            )))
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.lock().await.push(key.to_string());
        if self.fail_deletes {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "bucket unavailable",
            )));
        }
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(CDN).map(str::to_string)
    }
}

/// Storage whose uploads never finish.
struct StalledStorage;

#[async_trait::async_trait]
impl ObjectStorage for StalledStorage {
    async fn upload(
        &self,
        _key: &str,
        _bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        std::future::pending().await
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(CDN).map(str::to_string)
    }
}

/// Real store with scripted failures on the write path.
struct FlakyStore {
    inner: SqliteStore,
    fail_create_post: bool,
    image_results: Mutex<VecDeque<bool>>,
    create_image_calls: Mutex<usize>,
}

impl FlakyStore {
    fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_create_post: false,
            image_results: Mutex::new(VecDeque::new()),
            create_image_calls: Mutex::new(0),
        }
    }
}

#[async_trait::async_trait]
impl PostStore for FlakyStore {
    async fn create_post(&self, owner_id: Uuid, fields: &PostFields) -> Result<PersistedPost> {
        if self.fail_create_post {
            return Err(anyhow!("connection reset"));
        }
        self.inner.create_post(owner_id, fields).await
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<PersistedPost>> {
        self.inner.get_post(id).await
    }

    async fn get_post_for_owner(&self, id: Uuid, owner_id: Uuid) -> Result<Option<PersistedPost>> {
        self.inner.get_post_for_owner(id, owner_id).await
    }

    async fn update_post(
        &self,
        id: Uuid,
        owner_id: Uuid,
        fields: &PostFields,
    ) -> Result<Option<PersistedPost>> {
        self.inner.update_post(id, owner_id, fields).await
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_post(id).await
    }

    async fn create_image(&self, image: &NewPostImage) -> Result<PostImage> {
        *self.create_image_calls.lock().await += 1;
        let ok = self.image_results.lock().await.pop_front().unwrap_or(true);
        if !ok {
            return Err(anyhow!("insert rejected"));
        }
        self.inner.create_image(image).await
    }

    async fn get_image(&self, id: Uuid) -> Result<Option<PostImage>> {
        self.inner.get_image(id).await
    }

    async fn list_images(&self, post_id: Uuid) -> Result<Vec<PostImage>> {
        self.inner.list_images(post_id).await
    }

    async fn delete_image(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_image(id).await
    }
}

fn draft(images: &[&str]) -> DraftPost {
    let mut draft = DraftPost {
        title: "Quarto em república".into(),
        description: "Quarto individual, contas inclusas".into(),
        location: "Barão Geraldo, Campinas".into(),
        price: "850,00".into(),
        available_date: "2026-02-01".into(),
        contact_whatsapp: "(19) 99876-5432".into(),
        ..Default::default()
    };
    let accepted = draft.images.add(
        images
            .iter()
            .map(|name| PendingImage::from_file_name(*name, name.as_bytes().to_vec())),
    );
    assert_eq!(accepted, images.len());
    draft
}

#[tokio::test]
async fn all_images_uploaded_in_order() {
    let store = Arc::new(setup_store().await);
    let storage = RecordingStorage::default();
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(storage.clone()));
    let owner = Uuid::new_v4();

    let outcome = pipeline
        .submit(&draft(&["sala.jpg", "quarto.png", "cozinha.webp"]), owner)
        .await;
    let Outcome::Success { post_id } = outcome else {
        panic!("expected success, got {:?}", outcome);
    };

    let post = store.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.owner_id, owner);
    assert_eq!(post.fields.price, Some(850.0));
    assert_eq!(post.fields.contact_email, None);

    let images = store.list_images(post_id).await.unwrap();
    let orders: Vec<i64> = images.iter().map(|i| i.display_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);

    let uploads = storage.uploads().await;
    assert_eq!(uploads.len(), 3);
    for (i, (key, ext)) in uploads.iter().zip(["jpg", "png", "webp"]).enumerate() {
        assert!(key.starts_with(&format!("{}/", post_id)), "{key}");
        assert!(key.ends_with(&format!("-{}.{}", i, ext)), "{key}");
        assert_eq!(images[i].image_url, format!("{}{}", CDN, key));
    }
    assert!(storage.deletes().await.is_empty());
}

#[tokio::test]
async fn failed_uploads_yield_partial_success() {
    let store = Arc::new(setup_store().await);
    let storage = RecordingStorage::with_uploads(vec![false, true, false]);
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(storage.clone()));

    let outcome = pipeline
        .submit(&draft(&["a.jpg", "b.jpg", "c.jpg"]), Uuid::new_v4())
        .await;
    let Outcome::PartialSuccess { post_id, warning } = outcome else {
        panic!("expected partial success, got {:?}", outcome);
    };
    assert_eq!(warning.to_string(), "1 de 3 imagens foram carregadas com sucesso");

    assert!(store.get_post(post_id).await.unwrap().is_some());
    let images = store.list_images(post_id).await.unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].display_order, 0);
    assert!(images[0].image_url.ends_with("-1.jpg"));
    // Every image was attempted, in order.
    assert_eq!(storage.uploads().await.len(), 3);
}

#[tokio::test]
async fn no_image_uploaded_keeps_the_post() {
    let store = Arc::new(setup_store().await);
    let storage = RecordingStorage::with_uploads(vec![false, false]);
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(storage));

    let outcome = pipeline.submit(&draft(&["a.jpg", "b.jpg"]), Uuid::new_v4()).await;
    let Outcome::PartialSuccess { post_id, warning } = outcome else {
        panic!("expected partial success, got {:?}", outcome);
    };
    assert_eq!(warning.to_string(), "Nenhuma imagem foi carregada com sucesso");
    assert!(store.get_post(post_id).await.unwrap().is_some());
    assert!(store.list_images(post_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn parent_failure_skips_uploads() {
    let mut flaky = FlakyStore::new(setup_store().await);
    flaky.fail_create_post = true;
    let pool = flaky.inner.pool().clone();
    let storage = RecordingStorage::default();
    let pipeline = SubmissionPipeline::new(Arc::new(flaky), Arc::new(storage.clone()));

    let outcome = pipeline.submit(&draft(&["a.jpg", "b.jpg"]), Uuid::new_v4()).await;
    match &outcome {
        Outcome::Failure(reason @ FailureReason::Persist(_)) => {
            assert_eq!(reason.to_string(), "Erro ao criar post. Tente novamente.");
        }
        other => panic!("expected persist failure, got {:?}", other),
    }
    assert!(storage.uploads().await.is_empty());
    let images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_images")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(images, 0);
}

#[tokio::test]
async fn link_failure_removes_uploaded_object() {
    let flaky = FlakyStore::new(setup_store().await);
    flaky
        .image_results
        .lock()
        .await
        .extend([true, false, true]);
    let flaky = Arc::new(flaky);
    let storage = RecordingStorage::default();
    let pipeline = SubmissionPipeline::new(flaky.clone(), Arc::new(storage.clone()));

    let outcome = pipeline
        .submit(&draft(&["a.jpg", "b.jpg", "c.jpg"]), Uuid::new_v4())
        .await;
    let Outcome::PartialSuccess { post_id, warning } = outcome else {
        panic!("expected partial success, got {:?}", outcome);
    };
    assert_eq!(warning.uploaded, 2);
    assert_eq!(*flaky.create_image_calls.lock().await, 3);

    let uploads = storage.uploads().await;
    assert_eq!(storage.deletes().await, vec![uploads[1].clone()]);

    let images = flaky.list_images(post_id).await.unwrap();
    let orders: Vec<i64> = images.iter().map(|i| i.display_order).collect();
    assert_eq!(orders, vec![0, 1]);
    assert!(images[1].image_url.ends_with("-2.jpg"));
}

#[tokio::test]
async fn unparseable_input_fails_before_any_write() {
    let store = Arc::new(setup_store().await);
    let storage = RecordingStorage::default();
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(storage.clone()));

    let mut bad = draft(&["a.jpg"]);
    bad.price = "mil reais".into();
    let outcome = pipeline.submit(&bad, Uuid::new_v4()).await;
    match outcome {
        Outcome::Failure(FailureReason::Validation(errors)) => {
            assert_eq!(errors.get(Field::Price), Some("Preço inválido"));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert!(storage.uploads().await.is_empty());
    let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(posts, 0);
}

#[tokio::test]
async fn delete_image_survives_storage_failure() {
    let store = Arc::new(setup_store().await);
    let storage = RecordingStorage::failing_deletes();
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(storage.clone()));

    let owner = Uuid::new_v4();
    let post_id = pipeline
        .submit(&draft(&["a.jpg", "b.jpg"]), owner)
        .await
        .post_id()
        .unwrap();
    let images = store.list_images(post_id).await.unwrap();

    pipeline.delete_image(images[0].id, owner).await.unwrap();

    assert!(store.get_image(images[0].id).await.unwrap().is_none());
    assert_eq!(store.list_images(post_id).await.unwrap().len(), 1);
    let expected_key = images[0].image_url.strip_prefix(CDN).unwrap().to_string();
    assert_eq!(storage.deletes().await, vec![expected_key]);

    assert!(matches!(
        pipeline.delete_image(images[0].id, owner).await,
        Err(DeleteError::ImageNotFound(_))
    ));
}

#[tokio::test]
async fn delete_image_refuses_other_owners() {
    let store = Arc::new(setup_store().await);
    let storage = RecordingStorage::default();
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(storage.clone()));
    let owner = Uuid::new_v4();

    let post_id = pipeline
        .submit(&draft(&["a.jpg"]), owner)
        .await
        .post_id()
        .unwrap();
    let image = store.list_images(post_id).await.unwrap().remove(0);

    assert!(matches!(
        pipeline.delete_image(image.id, Uuid::new_v4()).await,
        Err(DeleteError::ImageNotFound(_))
    ));
    assert!(store.get_image(image.id).await.unwrap().is_some());
    assert!(storage.deletes().await.is_empty());

    pipeline.delete_image(image.id, owner).await.unwrap();
    assert!(store.list_images(post_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_post_removes_objects_then_records() {
    let store = Arc::new(setup_store().await);
    let storage = RecordingStorage::default();
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(storage.clone()));
    let owner = Uuid::new_v4();

    let post_id = pipeline
        .submit(&draft(&["a.jpg", "b.jpg"]), owner)
        .await
        .post_id()
        .unwrap();

    assert!(matches!(
        pipeline.delete_post(post_id, Uuid::new_v4()).await,
        Err(DeleteError::PostNotFound(_))
    ));
    assert!(store.get_post(post_id).await.unwrap().is_some());

    pipeline.delete_post(post_id, owner).await.unwrap();
    assert!(store.get_post(post_id).await.unwrap().is_none());
    assert!(store.list_images(post_id).await.unwrap().is_empty());
    assert_eq!(storage.deletes().await, storage.uploads().await);
}

fn walk_to_review(wizard: &mut Wizard) {
    wizard.update_field(Field::Title, "Vaga em apartamento");
    wizard.update_field(Field::Description, "Dividir com duas pessoas");
    wizard.update_field(Field::Location, "Trindade, Florianópolis");
    wizard.update_field(Field::ContactTelegram, "@rafa");
    while wizard.current_step() != Step::Review {
        assert!(wizard.next());
    }
}

#[tokio::test]
async fn wizard_submit_requires_review_and_session() {
    let store = Arc::new(setup_store().await);
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(RecordingStorage::default()));
    let signed_in = StaticSession::signed_in(Uuid::new_v4());

    let mut wizard = Wizard::default();
    let outcome = wizard.submit(&pipeline, &signed_in).await;
    assert!(matches!(
        outcome,
        Outcome::Failure(FailureReason::NotOnReview(Step::BasicInfo))
    ));

    walk_to_review(&mut wizard);
    let outcome = wizard.submit(&pipeline, &StaticSession::anonymous()).await;
    assert!(matches!(outcome, Outcome::Failure(FailureReason::Unauthenticated)));
    assert_eq!(wizard.current_step(), Step::Review);
    assert_eq!(wizard.draft().title, "Vaga em apartamento");

    let posts = db::list_posts(store.pool(), &Default::default()).await.unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn wizard_resets_after_submit() {
    let store = Arc::new(setup_store().await);
    let pipeline = SubmissionPipeline::new(store.clone(), Arc::new(RecordingStorage::default()));
    let owner = Uuid::new_v4();

    let mut wizard = Wizard::new(3);
    walk_to_review(&mut wizard);
    wizard.add_images(vec![PendingImage::from_file_name("vista.jpg", vec![0xff, 0xd8])]);

    let outcome = wizard.submit(&pipeline, &StaticSession::signed_in(owner)).await;
    let post_id = outcome.post_id().expect("post created");
    assert!(!wizard.is_submitting());
    assert_eq!(wizard.current_step(), Step::BasicInfo);
    assert!(wizard.draft().title.is_empty());
    assert!(wizard.images().is_empty());
    assert_eq!(wizard.images().max(), 3);

    let post = store.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.fields.contact_telegram.as_deref(), Some("@rafa"));
    assert_eq!(store.list_images(post_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn wizard_keeps_draft_on_store_failure() {
    let mut flaky = FlakyStore::new(setup_store().await);
    flaky.fail_create_post = true;
    let pipeline = SubmissionPipeline::new(Arc::new(flaky), Arc::new(RecordingStorage::default()));

    let mut wizard = Wizard::default();
    walk_to_review(&mut wizard);
    let before = wizard.draft().clone();

    let outcome = wizard
        .submit(&pipeline, &StaticSession::signed_in(Uuid::new_v4()))
        .await;
    assert!(matches!(outcome, Outcome::Failure(FailureReason::Persist(_))));
    assert_eq!(wizard.current_step(), Step::Review);
    assert_eq!(wizard.draft(), &before);
    assert!(!wizard.is_submitting());
}

#[tokio::test]
async fn wizard_surfaces_submit_time_parse_errors() {
    let store = Arc::new(setup_store().await);
    let pipeline = SubmissionPipeline::new(store, Arc::new(RecordingStorage::default()));

    let mut wizard = Wizard::default();
    wizard.update_field(Field::AvailableDate, "semana que vem");
    walk_to_review(&mut wizard);

    let outcome = wizard
        .submit(&pipeline, &StaticSession::signed_in(Uuid::new_v4()))
        .await;
    assert!(outcome.is_failure());
    assert_eq!(wizard.current_step(), Step::Review);
    assert_eq!(wizard.errors().get(Field::AvailableDate), Some("Data inválida"));
}

#[tokio::test]
async fn wizard_recovers_when_submit_is_abandoned() {
    let store = Arc::new(setup_store().await);
    let stalled = SubmissionPipeline::new(store.clone(), Arc::new(StalledStorage));
    let session = StaticSession::signed_in(Uuid::new_v4());

    let mut wizard = Wizard::default();
    walk_to_review(&mut wizard);
    wizard.add_images(vec![PendingImage::from_file_name("vista.jpg", vec![1])]);

    let timed_out = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        wizard.submit(&stalled, &session),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(!wizard.is_submitting());
    assert_eq!(wizard.current_step(), Step::Review);
    assert_eq!(wizard.draft().title, "Vaga em apartamento");

    // Still editable and able to submit again.
    wizard.update_field(Field::Title, "Vaga em apartamento mobiliado");
    assert_eq!(wizard.draft().title, "Vaga em apartamento mobiliado");
    wizard.remove_image(0);
    let working = SubmissionPipeline::new(store.clone(), Arc::new(RecordingStorage::default()));
    let outcome = wizard.submit(&working, &session).await;
    assert!(matches!(outcome, Outcome::Success { .. }), "{:?}", outcome);

    walk_to_review(&mut wizard);
    wizard.add_images(vec![PendingImage::from_file_name("vista.jpg", vec![1])]);
    let _ = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        wizard.submit(&stalled, &session),
    )
    .await;
    wizard.cancel();
    assert_eq!(wizard.current_step(), Step::BasicInfo);
    assert!(wizard.draft().title.is_empty());
}
