use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::models::GeneratedImage;

/// Something the user can click while the preview is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayTarget {
    Backdrop,
    CloseButton,
    Image,
    Toolbar,
    DownloadButton,
    RemixButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Closed,
    Remixed,
    /// The caller should export the image with [`PreviewOverlay::download`].
    DownloadRequested,
    None,
}

/// Full-screen view of one generated image.
///
/// Holds nothing but the image and the two callbacks; everything it shows
/// is derived from the image.
pub struct PreviewOverlay<'a, C, R>
where
    C: FnMut(),
    R: FnMut(),
{
    image: &'a GeneratedImage,
    on_close: C,
    on_remix: R,
}

impl<'a, C, R> PreviewOverlay<'a, C, R>
where
    C: FnMut(),
    R: FnMut(),
{
    pub fn new(image: &'a GeneratedImage, on_close: C, on_remix: R) -> Self {
        Self {
            image,
            on_close,
            on_remix,
        }
    }

    pub fn image(&self) -> &GeneratedImage {
        self.image
    }

    pub fn data_url(&self) -> String {
        self.image.data_url()
    }

    /// Route a click. Clicks on the image or its toolbar do not reach the backdrop.
    pub fn click(&mut self, target: OverlayTarget) -> OverlayAction {
        match target {
            OverlayTarget::Backdrop | OverlayTarget::CloseButton => {
                (self.on_close)();
                OverlayAction::Closed
            }
            OverlayTarget::RemixButton => {
                (self.on_remix)();
                OverlayAction::Remixed
            }
            OverlayTarget::DownloadButton => OverlayAction::DownloadRequested,
            OverlayTarget::Image | OverlayTarget::Toolbar => OverlayAction::None,
        }
    }

    pub fn download_file_name(&self) -> String {
        format!(
            "ai-wallpaper-{}.{}",
            Utc::now().timestamp_millis(),
            self.image.extension()
        )
    }

    /// Write the image bytes, exactly as generated, into `dir`.
    pub fn download(&self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        let bytes = self
            .image
            .bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let path = dir.as_ref().join(self.download_file_name());
        fs::write(&path, bytes)?;
        log::info!("💾 Wallpaper saved to {}", path.display());
        Ok(path)
    }
}
