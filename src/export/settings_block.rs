//! Trailing `;SETTING_` comment block that lets slicers reload the profile
//! a file was sliced with.

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;

use super::job::ProfileSnapshot;

/// Marks a line as part of the settings block.
pub const SETTING_KEYWORD: &str = ";SETTING_";

/// Settings serialisation format version.
pub const SETTING_VERSION: u32 = 3;

/// Comment lines are wrapped to this width, prefix included.
pub const LINE_WIDTH: usize = 80;

#[derive(Serialize)]
struct Payload<'a> {
    global_quality: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extruder_quality: &'a Vec<String>,
}

/// JSON layout Cura writes: `", "` and `": "` separators, non-ASCII as
/// lowercase `\uXXXX` escapes (UTF-16 surrogate pairs above the BMP).
struct CuraFormatter;

impl Formatter for CuraFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

fn to_cura_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, CuraFormatter);
    value.serialize(&mut serializer)?;
    // only ASCII is ever written
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Escape characters that would end or confuse a G-code comment.
fn escape(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Serialise `profile` into prefixed, 80-column comment lines.
///
/// Returns an empty string when there is nothing to record.
pub fn serialise(profile: Option<&ProfileSnapshot>) -> serde_json::Result<String> {
    let Some(profile) = profile else {
        tracing::info!("no profile attached, not writing settings to g-code");
        return Ok(String::new());
    };
    if profile.global_quality.trim().is_empty() && profile.extruder_quality.is_empty() {
        tracing::info!("no custom settings found, not writing settings to g-code");
        return Ok(String::new());
    }

    let json = to_cura_json(&Payload {
        global_quality: &profile.global_quality,
        extruder_quality: &profile.extruder_quality,
    })?;
    let escaped: Vec<char> = escape(&json).chars().collect();

    let prefix = format!("{SETTING_KEYWORD}{SETTING_VERSION} ");
    let payload_width = LINE_WIDTH - prefix.len();

    let mut block = String::new();
    for piece in escaped.chunks(payload_width) {
        block.push_str(&prefix);
        block.extend(piece);
        block.push('\n');
    }
    Ok(block)
}

/// Reassemble the profile from a settings block, e.g. one read back from a
/// g3drem file. Lines without the prefix are ignored.
pub fn parse(gcode: &str) -> Option<ProfileSnapshot> {
    let prefix = format!("{SETTING_KEYWORD}{SETTING_VERSION} ");
    let escaped: String = gcode
        .lines()
        .filter_map(|line| line.strip_prefix(prefix.as_str()))
        .collect();
    if escaped.is_empty() {
        return None;
    }

    let mut json = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            json.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => json.push('\\'),
            Some('n') => json.push('\n'),
            Some('r') => json.push('\r'),
            Some(other) => {
                json.push('\\');
                json.push(other);
            }
            None => json.push('\\'),
        }
    }
    serde_json::from_str(&json).ok()
}
