//! Support for reading g3drem files back, for inspection and verification.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{HeaderError, Result};
use crate::{G3dremHeader, InformationFlags, MaterialType, FIXED_HEADER_LEN, MAGIC};

/// A parsed g3drem file. The G-code borrows from the input buffer.
#[derive(Debug)]
pub struct G3dremFile<'a> {
    pub header: G3dremHeader,
    pub gcode: &'a [u8],
}

/// Examines `buf` and splits it into header, thumbnail and G-code.
///
/// Only the structure is checked: magic, offsets, and that the file is long
/// enough for what the offsets claim. The thumbnail is not decoded.
pub fn parse_file(buf: &[u8]) -> Result<G3dremFile<'_>> {
    if buf.len() < FIXED_HEADER_LEN {
        return Err(HeaderError::Truncated {
            needed: FIXED_HEADER_LEN,
            available: buf.len(),
        });
    }

    let mut magic = [0u8; 16];
    magic.copy_from_slice(&buf[..16]);
    if &magic != MAGIC {
        return Err(HeaderError::BadMagic(magic));
    }

    let mut longs = [0u32; 6];
    LittleEndian::read_u32_into(&buf[16..40], &mut longs);
    let [thumbnail_offset, image_offset, gcode_offset, seconds, right_mm, left_mm] = longs;

    if thumbnail_offset as usize != FIXED_HEADER_LEN
        || image_offset != gcode_offset
        || (gcode_offset as usize) < FIXED_HEADER_LEN
    {
        return Err(HeaderError::InconsistentOffsets {
            thumbnail: thumbnail_offset,
            image: image_offset,
            gcode: gcode_offset,
        });
    }
    let gcode_start = gcode_offset as usize;
    if gcode_start > buf.len() {
        return Err(HeaderError::Truncated {
            needed: gcode_start,
            available: buf.len(),
        });
    }

    let mut shorts = [0u16; 8];
    LittleEndian::read_u16_into(&buf[40..56], &mut shorts);
    let [flags, layer_height_um, infill_percent, shells, print_speed, bed_temperature, right_temp, left_temp] =
        shorts;

    let header = G3dremHeader {
        thumbnail_offset,
        image_offset,
        gcode_offset,
        seconds,
        right_material_mm: right_mm,
        left_material_mm: left_mm,
        flags: InformationFlags::from_bits(flags),
        layer_height_um,
        infill_percent,
        shells,
        print_speed,
        bed_temperature,
        right_extruder_temp: right_temp,
        left_extruder_temp: left_temp,
        right_material: MaterialType::from_code(buf[56]),
        left_material: MaterialType::from_code(buf[57]),
        thumbnail: buf[FIXED_HEADER_LEN..gcode_start].to_vec(),
    };

    Ok(G3dremFile {
        header,
        gcode: &buf[gcode_start..],
    })
}
