use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::camera::error::CameraError;
use crate::camera::types::{CameraAddress, DEFAULT_STREAM_PORT};

/// Persisted user preferences.
///
/// Every field has a default so files written by older versions (or edited
/// by hand) still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Preferences {
    /// Printer host the camera preview connects to.
    pub camera_host: Option<String>,
    pub camera_port: u16,
    /// Ask for a thumbnail image on every export instead of looking for one
    /// next to the output file.
    pub select_thumbnail: bool,
    /// Folder the last manually chosen thumbnail came from.
    pub last_thumbnail_folder: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            camera_host: None,
            camera_port: DEFAULT_STREAM_PORT,
            select_thumbnail: false,
            last_thumbnail_folder: None,
        }
    }
}

impl Preferences {
    /// The remembered camera address, if a host has been set.
    pub fn camera_address(&self) -> Option<Result<CameraAddress, CameraError>> {
        self.camera_host
            .as_deref()
            .map(|host| CameraAddress::new(host, self.camera_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_printer_conventions() {
        let prefs = Preferences::default();
        assert_eq!(prefs.camera_host, None);
        assert_eq!(prefs.camera_port, 10123);
        assert!(!prefs.select_thumbnail);
        assert!(prefs.last_thumbnail_folder.is_none());
    }

    #[test]
    fn serialises_to_json() {
        let prefs = Preferences {
            camera_host: Some("192.168.1.50".to_string()),
            select_thumbnail: true,
            ..Preferences::default()
        };
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["camera_host"], "192.168.1.50");
        assert_eq!(json["camera_port"], 10123);
        assert_eq!(json["select_thumbnail"], true);
        assert!(json["last_thumbnail_folder"].is_null());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"camera_host":"dremel"}"#).unwrap();
        assert_eq!(prefs.camera_host.as_deref(), Some("dremel"));
        assert_eq!(prefs.camera_port, 10123);
        assert!(!prefs.select_thumbnail);
    }

    #[test]
    fn round_trips_through_json() {
        let prefs = Preferences {
            camera_host: Some("printer.local".to_string()),
            camera_port: 8080,
            select_thumbnail: true,
            last_thumbnail_folder: Some(PathBuf::from("/home/user/pictures")),
        };
        let json = serde_json::to_string(&prefs).unwrap();
        let restored: Preferences = serde_json::from_str(&json).unwrap();
        assert_eq!(prefs, restored);
    }

    #[test]
    fn camera_address_uses_stored_port() {
        let prefs = Preferences {
            camera_host: Some("printer.local".to_string()),
            camera_port: 8080,
            ..Preferences::default()
        };
        let address = prefs.camera_address().unwrap().unwrap();
        assert_eq!(address.host(), "printer.local");
        assert_eq!(address.port(), 8080);
    }

    #[test]
    fn camera_address_is_none_without_host() {
        assert!(Preferences::default().camera_address().is_none());
    }
}
