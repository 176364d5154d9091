use crate::storage::content_type_for;

pub const DEFAULT_MAX_IMAGES: usize = 5;

/// A binary asset picked in the wizard but not uploaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PendingImage {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Guess the content type from the file extension.
    pub fn from_file_name(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Ordered, capped list of pending images. Position in the list becomes the
/// display order once uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImages {
    items: Vec<PendingImage>,
    max: usize,
}

impl Default for PendingImages {
    fn default() -> Self {
        Self::with_max(DEFAULT_MAX_IMAGES)
    }
}

impl PendingImages {
    pub fn with_max(max: usize) -> Self {
        Self {
            items: Vec::new(),
            max,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.items.len())
    }

    pub fn can_add_more(&self) -> bool {
        self.remaining() > 0
    }

    /// Append a batch, keeping only image assets and at most `remaining()`
    /// of them. Anything past the cap is dropped, not queued. Returns how
    /// many were accepted.
    pub fn add(&mut self, batch: impl IntoIterator<Item = PendingImage>) -> usize {
        let slots = self.remaining();
        let before = self.items.len();
        self.items
            .extend(batch.into_iter().filter(PendingImage::is_image).take(slots));
        self.items.len() - before
    }

    /// Remove the image at `index`; later images shift down by one.
    pub fn remove(&mut self, index: usize) -> Option<PendingImage> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PendingImage> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[PendingImage] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a PendingImages {
    type Item = &'a PendingImage;
    type IntoIter = std::slice::Iter<'a, PendingImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
