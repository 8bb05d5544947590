use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use image::ImageFormat;
use tutor_contracts::turns::ImageAttachment;

/// The image picked for the next submission, if any.
///
/// The dispatcher reads it with `take`, so an image is consumed by exactly
/// one submission and never resent on a later text-only turn.
#[derive(Debug, Default)]
pub struct PendingUpload {
    current: Option<ImageAttachment>,
}

impl PendingUpload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, image: ImageAttachment) -> Option<ImageAttachment> {
        self.current.replace(image)
    }

    pub fn current_file(&self) -> Option<&ImageAttachment> {
        self.current.as_ref()
    }

    pub fn take(&mut self) -> Option<ImageAttachment> {
        self.current.take()
    }

    pub fn clear(&mut self) -> bool {
        self.current.take().is_some()
    }
}

const SUPPORTED_FORMATS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

pub fn load_image_attachment(path: &Path) -> Result<ImageAttachment> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    let format = image::guess_format(&bytes)
        .with_context(|| format!("{} is not a recognised image", path.display()))?;
    if !SUPPORTED_FORMATS.contains(&format) {
        bail!(
            "{} is {:?}; supported formats are PNG, JPEG and WebP",
            path.display(),
            format
        );
    }
    let mut attachment = ImageAttachment::new(format.to_mime_type(), bytes);
    if let Some(name) = path.file_name().and_then(|value| value.to_str()) {
        attachment = attachment.with_name(name);
    }
    Ok(attachment)
}
