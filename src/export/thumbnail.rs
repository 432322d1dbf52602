use std::path::{Path, PathBuf};

use g3drem::{THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use tracing::{debug, info, warn};

use super::error::{ExportError, Result};
use crate::preview::codec::{self, RgbPixels};

/// Extensions recognised when looking for a same-name preview image.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// Find an image next to `output` whose file stem matches it, ignoring case,
/// e.g. `benchy.PNG` for `benchy.g3drem`.
pub fn find_image_with_same_name(output: &Path) -> Option<PathBuf> {
    let stem = output.file_stem()?.to_string_lossy().to_lowercase();
    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let same_stem = path
                .file_stem()
                .is_some_and(|s| s.to_string_lossy().to_lowercase() == stem);
            let is_image = path.extension().is_some_and(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                IMAGE_EXTENSIONS.contains(&ext.as_str())
            });
            same_stem && is_image
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Load an image file and convert it into an 80x60 24-bit BMP.
pub fn load_thumbnail(path: &Path) -> Result<Vec<u8>> {
    let failed = |reason: String| ExportError::Thumbnail {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| failed(e.to_string()))?;
    let pixels = codec::decode_image(&bytes).map_err(|e| failed(e.to_string()))?;
    let scaled = codec::resize_rgb(&pixels, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT)
        .map_err(|e| failed(e.to_string()))?;
    codec::encode_bmp(scaled).map_err(|e| failed(e.to_string()))
}

/// Generic light grey 80x60 BMP used when no preview image is available.
pub fn blank_thumbnail() -> Vec<u8> {
    let pixels = RgbPixels {
        data: vec![0xE0; (THUMBNAIL_WIDTH * THUMBNAIL_HEIGHT * 3) as usize],
        width: THUMBNAIL_WIDTH,
        height: THUMBNAIL_HEIGHT,
    };
    codec::encode_bmp(pixels).unwrap_or_else(|e| {
        // header default: all-zero bitmap of the same size
        warn!("could not encode blank thumbnail: {e}");
        Vec::new()
    })
}

/// Pick the thumbnail for `output`: the explicit image if given, else a
/// same-name image beside the output (when `search_siblings`), else the
/// generic bitmap. Unreadable images fall through to the next source.
pub fn resolve_thumbnail(explicit: Option<&Path>, output: &Path, search_siblings: bool) -> Vec<u8> {
    if let Some(path) = explicit {
        match load_thumbnail(path) {
            Ok(bmp) => {
                info!("using thumbnail {}", path.display());
                return bmp;
            }
            Err(e) => warn!("{e}, trying the next thumbnail source"),
        }
    }

    if search_siblings {
        match find_image_with_same_name(output) {
            Some(path) => match load_thumbnail(&path) {
                Ok(bmp) => {
                    info!("using thumbnail {}", path.display());
                    return bmp;
                }
                Err(e) => warn!("{e}, using the generic thumbnail"),
            },
            None => debug!(
                "no image named like {} found, using the generic thumbnail",
                output.display()
            ),
        }
    }

    blank_thumbnail()
}
