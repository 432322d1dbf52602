use g3drem::{checked_u16, checked_u32, G3dremHeader, MaterialType};
use serde::{Deserialize, Serialize};

/// A sliced print job as handed over by the slicer.
///
/// Every field is optional in JSON; missing print settings leave the
/// corresponding header field at its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrintJob {
    /// Printer definition name, e.g. "Dremel 3D20".
    pub printer: String,
    /// Material profile name of the first extruder.
    pub material: String,
    /// Quality profile name.
    pub quality: Option<String>,
    pub estimated_seconds: Option<f64>,
    /// Filament length in metres.
    pub material_length_m: Option<f64>,
    pub settings: PrintSettings,
    /// G-code chunks, written in order.
    pub gcode: Vec<String>,
    /// Serialised quality profiles for the trailing settings block.
    pub profile: Option<ProfileSnapshot>,
}

/// Slicer settings that end up in the header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrintSettings {
    pub wall_line_count: Option<f64>,
    /// mm/s.
    pub speed_print: Option<f64>,
    /// °C.
    pub default_material_print_temperature: Option<f64>,
    /// Percent.
    pub infill_sparse_density: Option<f64>,
    /// °C.
    pub material_bed_temperature: Option<f64>,
    /// mm.
    pub layer_height: Option<f64>,
    pub left_extruder: bool,
    pub heated_bed: bool,
    pub support_enabled: bool,
}

/// Flattened global and per-extruder quality profiles, already serialised
/// by the slicer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileSnapshot {
    pub global_quality: String,
    pub extruder_quality: Vec<String>,
}

impl PrintJob {
    /// Whether any chunk already carries a settings block.
    pub fn has_settings_block(&self) -> bool {
        self.gcode
            .iter()
            .any(|chunk| chunk.starts_with(super::settings_block::SETTING_KEYWORD))
    }
}

/// Truncate toward zero, like the slicer's own integer conversion.
fn whole(value: f64) -> i64 {
    value.trunc() as i64
}

/// Fill a header from the job's metadata. The thumbnail is left at its
/// default.
///
/// Settings missing from the job keep the header's own defaults (print speed
/// 100, nozzle 220, bed 0). Cura's Dremel plugin substituted speed 50, nozzle 50
/// and bed 60 instead; a job that needs those must state them.
pub fn build_header(job: &PrintJob) -> g3drem::Result<G3dremHeader> {
    let mut header = G3dremHeader::new();
    let settings = &job.settings;

    if let Some(seconds) = job.estimated_seconds {
        header.set_estimated_time(checked_u32("estimated_seconds", whole(seconds))?);
    }
    if let Some(metres) = job.material_length_m {
        let mm = checked_u32("material_length", whole(metres * 1000.0))?;
        header.set_material_lengths(mm, 0);
    }
    header.set_material_types(MaterialType::from_profile_name(&job.material), MaterialType::None);

    if let Some(walls) = settings.wall_line_count {
        header.set_shell_count(checked_u16("wall_line_count", whole(walls))?);
    }
    if let Some(speed) = settings.speed_print {
        header.set_print_speed(checked_u16("speed_print", whole(speed))?);
    }
    if let Some(temp) = settings.default_material_print_temperature {
        header.set_extruder_temps(
            checked_u16("default_material_print_temperature", whole(temp))?,
            0,
        );
    }
    if let Some(infill) = settings.infill_sparse_density {
        header.set_infill_percent(checked_u16("infill_sparse_density", whole(infill))?);
    }
    if let Some(temp) = settings.material_bed_temperature {
        header.set_bed_temperature(checked_u16("material_bed_temperature", whole(temp))?);
    }
    if let Some(mm) = settings.layer_height {
        header.set_layer_height(checked_u16("layer_height", whole(mm * 1000.0))?);
    }

    header.set_flags(
        settings.left_extruder,
        settings.heated_bed,
        settings.support_enabled,
    );

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3drem::{HeaderError, InformationFlags};

    fn sample_job() -> PrintJob {
        PrintJob {
            printer: "Dremel 3D20".to_string(),
            material: "Dremel PLA Red".to_string(),
            quality: Some("Normal".to_string()),
            estimated_seconds: Some(3725.9),
            material_length_m: Some(1.5),
            settings: PrintSettings {
                wall_line_count: Some(2.0),
                speed_print: Some(60.0),
                default_material_print_temperature: Some(215.0),
                infill_sparse_density: Some(15.0),
                material_bed_temperature: Some(0.0),
                layer_height: Some(0.2),
                support_enabled: true,
                ..PrintSettings::default()
            },
            gcode: vec![";FLAVOR:Griffin\nG28\n".to_string()],
            profile: None,
        }
    }

    #[test]
    fn maps_job_fields_into_header() {
        let header = build_header(&sample_job()).unwrap();
        assert_eq!(header.estimated_time(), 3725);
        assert_eq!(header.material_lengths(), (1500, 0));
        assert_eq!(header.material_types(), (MaterialType::Pla, MaterialType::None));
        assert_eq!(header.shell_count(), 2);
        assert_eq!(header.print_speed(), 60);
        assert_eq!(header.extruder_temps(), (215, 0));
        assert_eq!(header.infill_percent(), 15);
        assert_eq!(header.bed_temperature(), 0);
        assert_eq!(header.layer_height(), 200);
        assert_eq!(header.flags().bits(), 0x09);
    }

    #[test]
    fn abs_in_material_name_selects_abs() {
        let job = PrintJob {
            material: "Dremel ABS White".to_string(),
            ..PrintJob::default()
        };
        let header = build_header(&job).unwrap();
        assert_eq!(header.material_types().0, MaterialType::Abs);
    }

    #[test]
    fn missing_values_keep_header_defaults() {
        let header = build_header(&PrintJob::default()).unwrap();
        let defaults = G3dremHeader::new();
        assert_eq!(header.infill_percent(), defaults.infill_percent());
        assert_eq!(header.shell_count(), 3);
        assert_eq!(header.print_speed(), 100);
        assert_eq!(header.extruder_temps(), (220, 0));
        assert_eq!(header.bed_temperature(), 0);
        assert_eq!(header.flags(), InformationFlags::default());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut job = sample_job();
        job.settings.default_material_print_temperature = Some(70_000.0);
        assert!(matches!(
            build_header(&job),
            Err(HeaderError::FieldOverflow {
                field: "default_material_print_temperature",
                value: 70_000
            })
        ));

        let mut job = sample_job();
        job.material_length_m = Some(-2.0);
        assert!(matches!(
            build_header(&job),
            Err(HeaderError::FieldOverflow { field: "material_length", .. })
        ));
    }

    #[test]
    fn deserialises_partial_json() {
        let job: PrintJob = serde_json::from_str(
            r#"{"material":"PLA","settings":{"layer_height":0.1,"heated_bed":true},"gcode":["G28\n"]}"#,
        )
        .unwrap();
        assert_eq!(job.settings.layer_height, Some(0.1));
        assert!(job.settings.heated_bed);
        assert!(job.quality.is_none());
        assert_eq!(job.gcode.len(), 1);
    }

    #[test]
    fn detects_existing_settings_block() {
        let mut job = sample_job();
        assert!(!job.has_settings_block());
        job.gcode.push(";SETTING_3 {}\n".to_string());
        assert!(job.has_settings_block());
    }
}
