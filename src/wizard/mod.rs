//! Multi-step post creation form.
//!
//! The wizard owns one `DraftPost` and its `ValidationErrors`. Forward
//! navigation validates only the step being left; backward navigation is
//! free. Submission is only possible from the review step and hands the draft
//! to a `SubmissionPipeline`.

pub mod draft;
pub mod images;
pub mod validate;

use crate::model::{GenderPreference, PostType};
use crate::pipeline::{FailureReason, Outcome, SubmissionPipeline};
use crate::session::SessionProvider;
use serde::Serialize;
use tracing::{debug, info, instrument};

pub use draft::{DraftPost, Field};
pub use images::{PendingImage, PendingImages, DEFAULT_MAX_IMAGES};
pub use validate::{build_fields, validate_all, validate_step, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    BasicInfo = 1,
    LocationPrice = 2,
    Images = 3,
    ContactPreferences = 4,
    Review = 5,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::BasicInfo,
        Step::LocationPrice,
        Step::Images,
        Step::ContactPreferences,
        Step::Review,
    ];

    pub const COUNT: u8 = 5;

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Step> {
        Step::ALL.get(usize::from(index).checked_sub(1)?).copied()
    }

    /// Following step, saturating at `Review`.
    pub fn next(self) -> Step {
        Step::from_index(self.index().saturating_add(1).min(Step::COUNT)).unwrap_or(Step::Review)
    }

    /// Previous step, saturating at `BasicInfo`.
    pub fn prev(self) -> Step {
        Step::from_index(self.index().saturating_sub(1).max(1)).unwrap_or(Step::BasicInfo)
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::BasicInfo => "Informações",
            Step::LocationPrice => "Localização",
            Step::Images => "Fotos",
            Step::ContactPreferences => "Contato",
            Step::Review => "Revisão",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Editing,
    Submitting,
}

/// Holds the wizard in `Submitting` for as long as it lives. Dropping it,
/// including when the submit future itself is dropped, returns to `Editing`.
struct SubmitGuard<'a>(&'a mut Phase);

impl<'a> SubmitGuard<'a> {
    fn enter(phase: &'a mut Phase) -> Self {
        *phase = Phase::Submitting;
        Self(phase)
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        *self.0 = Phase::Editing;
    }
}

#[derive(Debug, Clone)]
pub struct Wizard {
    step: Step,
    draft: DraftPost,
    errors: ValidationErrors,
    phase: Phase,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGES)
    }
}

impl Wizard {
    pub fn new(max_images: usize) -> Self {
        Self {
            step: Step::BasicInfo,
            draft: DraftPost::with_max_images(max_images),
            errors: ValidationErrors::new(),
            phase: Phase::Editing,
        }
    }

    pub fn current_step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &DraftPost {
        &self.draft
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn images(&self) -> &PendingImages {
        &self.draft.images
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    /// Set a text field. Clears that field's error and nothing else.
    pub fn update_field(&mut self, field: Field, value: impl Into<String>) {
        if self.is_submitting() {
            return;
        }
        self.draft.set(field, value.into());
        self.errors.clear(field);
    }

    pub fn set_post_type(&mut self, post_type: PostType) {
        if !self.is_submitting() {
            self.draft.post_type = post_type;
        }
    }

    pub fn set_gender_preference(&mut self, preference: Option<GenderPreference>) {
        if !self.is_submitting() {
            self.draft.gender_preference = preference;
        }
    }

    /// Accept a batch of images; see `PendingImages::add`.
    pub fn add_images(&mut self, batch: impl IntoIterator<Item = PendingImage>) -> usize {
        if self.is_submitting() {
            return 0;
        }
        self.draft.images.add(batch)
    }

    pub fn remove_image(&mut self, index: usize) -> Option<PendingImage> {
        if self.is_submitting() {
            return None;
        }
        self.draft.images.remove(index)
    }

    /// Rules of `step` against the current draft. Pure.
    pub fn validate(&self, step: Step) -> ValidationErrors {
        validate_step(step, &self.draft)
    }

    /// Advance if the current step validates; otherwise keep the step and
    /// expose the errors. Returns whether the step changed.
    pub fn next(&mut self) -> bool {
        if self.is_submitting() {
            return false;
        }
        let errors = self.validate(self.step);
        if !errors.is_empty() {
            debug!(step = ?self.step, errors = %errors, "step blocked");
            self.errors = errors;
            return false;
        }
        self.errors = errors;
        let next = self.step.next();
        let moved = next != self.step;
        self.step = next;
        moved
    }

    pub fn prev(&mut self) {
        if !self.is_submitting() {
            self.step = self.step.prev();
        }
    }

    /// Throw the draft away and start over.
    pub fn cancel(&mut self) {
        if self.is_submitting() {
            return;
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.draft = DraftPost::with_max_images(self.draft.images.max());
        self.errors = ValidationErrors::new();
        self.step = Step::BasicInfo;
        self.phase = Phase::Editing;
    }

    /// Hand the draft to the pipeline. Only valid from the review step with a
    /// signed-in user. On success (full or partial) the draft is discarded; on
    /// failure, or if the returned future is dropped before completing, the
    /// wizard stays on review with the draft intact and editable.
    #[instrument(skip_all)]
    pub async fn submit(
        &mut self,
        pipeline: &SubmissionPipeline,
        session: &dyn SessionProvider,
    ) -> Outcome {
        if self.is_submitting() {
            return Outcome::Failure(FailureReason::AlreadySubmitting);
        }
        if self.step != Step::Review {
            return Outcome::Failure(FailureReason::NotOnReview(self.step));
        }
        let Some(owner_id) = session.current_user() else {
            return Outcome::Failure(FailureReason::Unauthenticated);
        };

        let outcome = {
            let _guard = SubmitGuard::enter(&mut self.phase);
            pipeline.submit(&self.draft, owner_id).await
        };

        match &outcome {
            Outcome::Success { post_id } | Outcome::PartialSuccess { post_id, .. } => {
                info!(%post_id, "draft submitted");
                self.reset();
            }
            Outcome::Failure(FailureReason::Validation(errors)) => {
                self.errors = errors.clone();
            }
            Outcome::Failure(_) => {}
        }
        outcome
    }
}
