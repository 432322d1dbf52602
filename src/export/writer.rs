use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::error::{ExportError, Result};
use super::job::{build_header, PrintJob};
use super::settings_block;

/// Version reported in the plugin info comment.
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What an export wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Header plus thumbnail.
    pub header_len: usize,
    /// Everything after the header: info comment, G-code, settings block.
    pub gcode_len: usize,
}

impl ExportSummary {
    pub fn total_len(&self) -> usize {
        self.header_len + self.gcode_len
    }
}

/// The comment identifying the exporter, printer, material and quality.
pub fn info_comment(job: &PrintJob) -> String {
    format!(
        "\n;Cura-Dremel-Plugin version {PLUGIN_VERSION}\n;Printing on: {}\n;Using material: \"{}\"\n;Quality: \"{}\"\n",
        job.printer,
        job.material,
        job.quality.as_deref().unwrap_or("unknown"),
    )
}

/// Write a complete g3drem file for `job` into `sink`.
///
/// `thumbnail` replaces the header's blank bitmap; `None` or an empty buffer
/// keeps it. Nothing is written when the job has no G-code.
pub fn write_g3drem<W: Write>(
    sink: &mut W,
    job: &PrintJob,
    thumbnail: Option<Vec<u8>>,
) -> Result<ExportSummary> {
    if job.gcode.is_empty() {
        return Err(ExportError::NoGcode);
    }

    let mut header = build_header(job)?;
    header.set_thumbnail(thumbnail)?;
    let header_len = header.write_header(Some(&mut *sink))?;

    let mut gcode_len = 0;
    let info = info_comment(job);
    sink.write_all(info.as_bytes())?;
    gcode_len += info.len();

    for chunk in &job.gcode {
        sink.write_all(chunk.as_bytes())?;
        gcode_len += chunk.len();
    }

    if !job.has_settings_block() {
        let block = settings_block::serialise(job.profile.as_ref())
            .map_err(|e| ExportError::Io(e.into()))?;
        sink.write_all(block.as_bytes())?;
        gcode_len += block.len();
    }

    sink.flush()?;
    Ok(ExportSummary {
        header_len,
        gcode_len,
    })
}

/// Export `job` to `path`, replacing it atomically (write .tmp then rename).
pub fn export_to_path(
    path: &Path,
    job: &PrintJob,
    thumbnail: Option<Vec<u8>>,
) -> Result<ExportSummary> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("g3drem.tmp");
    let result = File::create(&tmp_path)
        .map_err(ExportError::from)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            let summary = write_g3drem(&mut out, job, thumbnail)?;
            out.into_inner()
                .map_err(|e| ExportError::Io(e.into_error()))?
                .sync_all()?;
            Ok(summary)
        });

    match result {
        Ok(summary) => {
            std::fs::rename(&tmp_path, path)?;
            info!(
                "wrote {} ({} bytes, G-code at offset {})",
                path.display(),
                summary.total_len(),
                summary.header_len
            );
            Ok(summary)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}
