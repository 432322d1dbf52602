use std::fmt;
use std::io::Write;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{HeaderError, Result};
use crate::{InformationFlags, MaterialType, DEFAULT_THUMBNAIL_LEN, FIXED_HEADER_LEN, MAGIC};

/// In-memory g3drem header.
///
/// Starts out with the values the printer firmware expects for a plain
/// single-extruder PLA job and a blank 80x60 thumbnail; the exporter then
/// overwrites whatever the slicing profile provides.
#[derive(Clone, PartialEq, Eq)]
pub struct G3dremHeader {
    pub(crate) thumbnail_offset: u32,
    pub(crate) image_offset: u32,
    pub(crate) gcode_offset: u32,
    pub(crate) seconds: u32,
    pub(crate) right_material_mm: u32,
    pub(crate) left_material_mm: u32,
    pub(crate) flags: InformationFlags,
    pub(crate) layer_height_um: u16,
    pub(crate) infill_percent: u16,
    pub(crate) shells: u16,
    pub(crate) print_speed: u16,
    pub(crate) bed_temperature: u16,
    pub(crate) right_extruder_temp: u16,
    pub(crate) left_extruder_temp: u16,
    pub(crate) right_material: MaterialType,
    pub(crate) left_material: MaterialType,
    pub(crate) thumbnail: Vec<u8>,
}

impl Default for G3dremHeader {
    fn default() -> Self {
        let payload_offset = (FIXED_HEADER_LEN + DEFAULT_THUMBNAIL_LEN) as u32;
        Self {
            thumbnail_offset: FIXED_HEADER_LEN as u32,
            image_offset: payload_offset,
            gcode_offset: payload_offset,
            seconds: 0,
            right_material_mm: 0,
            left_material_mm: 0,
            flags: InformationFlags::default(),
            layer_height_um: 0,
            infill_percent: 20,
            shells: 3,
            print_speed: 100,
            bed_temperature: 0,
            right_extruder_temp: 220,
            left_extruder_temp: 0,
            right_material: MaterialType::Pla,
            left_material: MaterialType::None,
            thumbnail: vec![0; DEFAULT_THUMBNAIL_LEN],
        }
    }
}

impl G3dremHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_estimated_time(&mut self, seconds: u32) -> &mut Self {
        self.seconds = seconds;
        self
    }

    /// Filament used per extruder, in millimetres.
    pub fn set_material_lengths(&mut self, right_mm: u32, left_mm: u32) -> &mut Self {
        self.right_material_mm = right_mm;
        self.left_material_mm = left_mm;
        self
    }

    pub fn set_material_types(&mut self, right: MaterialType, left: MaterialType) -> &mut Self {
        self.right_material = right;
        self.left_material = left;
        self
    }

    pub fn set_flags(&mut self, left_extruder: bool, heated_bed: bool, support: bool) -> &mut Self {
        self.flags = InformationFlags::new(left_extruder, heated_bed, support);
        self
    }

    pub fn set_layer_height(&mut self, microns: u16) -> &mut Self {
        self.layer_height_um = microns;
        self
    }

    pub fn set_infill_percent(&mut self, percent: u16) -> &mut Self {
        self.infill_percent = percent;
        self
    }

    pub fn set_shell_count(&mut self, shells: u16) -> &mut Self {
        self.shells = shells;
        self
    }

    pub fn set_print_speed(&mut self, speed: u16) -> &mut Self {
        self.print_speed = speed;
        self
    }

    pub fn set_extruder_temps(&mut self, right: u16, left: u16) -> &mut Self {
        self.right_extruder_temp = right;
        self.left_extruder_temp = left;
        self
    }

    pub fn set_bed_temperature(&mut self, temperature: u16) -> &mut Self {
        self.bed_temperature = temperature;
        self
    }

    /// Replace the thumbnail bitmap and move the image/G-code offsets behind
    /// it.
    ///
    /// `None` or an empty buffer leaves the current thumbnail in place.
    pub fn set_thumbnail(&mut self, bitmap: Option<Vec<u8>>) -> Result<()> {
        let Some(bitmap) = bitmap.filter(|b| !b.is_empty()) else {
            return Ok(());
        };
        let end = (FIXED_HEADER_LEN + bitmap.len()) as i64;
        let offset = crate::checked_u32("gcode_offset", end)?;
        self.image_offset = offset;
        self.gcode_offset = offset;
        self.thumbnail = bitmap;
        Ok(())
    }

    pub fn thumbnail_offset(&self) -> u32 {
        self.thumbnail_offset
    }

    pub fn image_offset(&self) -> u32 {
        self.image_offset
    }

    pub fn gcode_offset(&self) -> u32 {
        self.gcode_offset
    }

    pub fn estimated_time(&self) -> u32 {
        self.seconds
    }

    /// `(right, left)` filament lengths in millimetres.
    pub fn material_lengths(&self) -> (u32, u32) {
        (self.right_material_mm, self.left_material_mm)
    }

    /// `(right, left)` materials.
    pub fn material_types(&self) -> (MaterialType, MaterialType) {
        (self.right_material, self.left_material)
    }

    pub fn flags(&self) -> InformationFlags {
        self.flags
    }

    pub fn layer_height(&self) -> u16 {
        self.layer_height_um
    }

    pub fn infill_percent(&self) -> u16 {
        self.infill_percent
    }

    pub fn shell_count(&self) -> u16 {
        self.shells
    }

    pub fn print_speed(&self) -> u16 {
        self.print_speed
    }

    pub fn bed_temperature(&self) -> u16 {
        self.bed_temperature
    }

    /// `(right, left)` nozzle temperatures.
    pub fn extruder_temps(&self) -> (u16, u16) {
        (self.right_extruder_temp, self.left_extruder_temp)
    }

    pub fn thumbnail(&self) -> &[u8] {
        &self.thumbnail
    }

    /// Total bytes `write_header` emits; the G-code starts right after.
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + self.thumbnail.len()
    }

    /// Write the header and thumbnail to `sink`.
    ///
    /// Every section goes out in a single `write` call whose return value must
    /// match the section length exactly; anything else aborts with
    /// [`HeaderError::ShortWrite`] and nothing further is written. Returns the
    /// number of bytes written.
    pub fn write_header<W: Write + ?Sized>(&self, sink: Option<&mut W>) -> Result<usize> {
        let sink = sink.ok_or(HeaderError::MissingSink)?;

        write_section(sink, "magic", MAGIC)?;

        let mut longs = [0u8; 24];
        LittleEndian::write_u32_into(
            &[
                self.thumbnail_offset,
                self.image_offset,
                self.gcode_offset,
                self.seconds,
                self.right_material_mm,
                self.left_material_mm,
            ],
            &mut longs,
        );
        write_section(sink, "offsets", &longs)?;

        let mut shorts = [0u8; 16];
        LittleEndian::write_u16_into(
            &[
                self.flags.bits(),
                self.layer_height_um,
                self.infill_percent,
                self.shells,
                self.print_speed,
                self.bed_temperature,
                self.right_extruder_temp,
                self.left_extruder_temp,
            ],
            &mut shorts,
        );
        write_section(sink, "settings", &shorts)?;

        write_section(
            sink,
            "materials",
            &[self.right_material.code(), self.left_material.code()],
        )?;
        write_section(sink, "thumbnail", &self.thumbnail)?;

        Ok(self.encoded_len())
    }
}

fn write_section<W: Write + ?Sized>(sink: &mut W, section: &'static str, bytes: &[u8]) -> Result<()> {
    let written = sink.write(bytes)?;
    if written != bytes.len() {
        return Err(HeaderError::ShortWrite {
            section,
            expected: bytes.len(),
            written,
        });
    }
    Ok(())
}

impl fmt::Debug for G3dremHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("G3dremHeader")
            .field("thumbnail_offset", &self.thumbnail_offset)
            .field("image_offset", &self.image_offset)
            .field("gcode_offset", &self.gcode_offset)
            .field("seconds", &self.seconds)
            .field("right_material_mm", &self.right_material_mm)
            .field("left_material_mm", &self.left_material_mm)
            .field("flags", &format_args!("{:#06x}", self.flags.bits()))
            .field("layer_height_um", &self.layer_height_um)
            .field("infill_percent", &self.infill_percent)
            .field("shells", &self.shells)
            .field("print_speed", &self.print_speed)
            .field("bed_temperature", &self.bed_temperature)
            .field("right_extruder_temp", &self.right_extruder_temp)
            .field("left_extruder_temp", &self.left_extruder_temp)
            .field("right_material", &self.right_material)
            .field("left_material", &self.left_material)
            .field("thumbnail_len", &self.thumbnail.len())
            .finish()
    }
}
