use std::path::Path;
use std::sync::Mutex;

use image::ImageReader;
use once_cell::sync::Lazy;
use regex::Regex;

/// pixel size of the longest thumbnail edge when none is configured
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 150;

/// result of a successful thumbnail generation: where the thumbnail was written,
/// plus the dimensions of the source image
#[derive(Debug, PartialEq, Clone)]
pub struct Thumbnail {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// thumbnail generation seam consumed by the metadata service
pub trait ThumbnailGenerator: Send + Sync {
    /// renders a thumbnail of `source` at `destination`. Returns `None` when the
    /// source is not a decodable image; failing to thumbnail is never an error
    fn generate(&self, source: &Path, destination: &Path) -> Option<Thumbnail>;
}

/// the codec stack is not treated as re-entrant, so decoding is serialized process-wide
static DECODE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// generates png thumbnails with the `image` crate
pub struct ImageThumbnailer {
    size: u32,
}

impl ImageThumbnailer {
    pub fn new(size: u32) -> ImageThumbnailer {
        ImageThumbnailer { size }
    }
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        ImageThumbnailer::new(DEFAULT_THUMBNAIL_SIZE)
    }
}

impl ThumbnailGenerator for ImageThumbnailer {
    fn generate(&self, source: &Path, destination: &Path) -> Option<Thumbnail> {
        let _guard = match DECODE_LOCK.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("The thumbnail decode lock was poisoned! Continuing...");
                poisoned.into_inner()
            }
        };
        let reader = match ImageReader::open(source) {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!("Failed to open {} for thumbnailing: {e:?}", source.display());
                return None;
            }
        };
        let decoded = match reader.decode() {
            Ok(decoded) => decoded,
            // not a decodable image, which is the everyday case for non-image files
            Err(_) => return None,
        };
        if let Some(parent) = destination.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!(
                    "Failed to create thumbnail directory {}! Error is {e:?}",
                    parent.display()
                );
                return None;
            }
        }
        let scaled = decoded.thumbnail(self.size, self.size);
        if let Err(e) = scaled.save(destination) {
            log::error!(
                "Failed to write thumbnail {}! Error is {e:?}",
                destination.display()
            );
            return None;
        }
        Some(Thumbnail {
            path: destination.to_string_lossy().to_string(),
            width: decoded.width(),
            height: decoded.height(),
        })
    }
}

static BANNED_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new("[/\\\\<>|:&;#?*\"]").unwrap());

/// replaces characters that are unsafe in a file name with underscores
pub fn sanitize_file_name(name: &str) -> String {
    BANNED_CHARS.replace_all(name, "_").to_string()
}
