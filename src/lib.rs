//! Dremel 3D printer support: `.g3drem` export and MJPEG camera preview.

pub mod camera;
pub mod diagnostics;
pub mod export;
pub mod preview;
pub mod settings;

use std::path::PathBuf;

/// Where preferences live unless overridden: `<config dir>/dremel3d/preferences.json`.
pub fn default_preferences_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dremel3d")
        .join(settings::store::PREFERENCES_FILE)
}
