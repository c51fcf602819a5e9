//! Patient QR codes: SVG rendering and on-disk artifacts.
//!
//! Artifacts live at `<media_dir>/qr_codes/qr_<patient id>.svg`. Records store
//! the path relative to the media directory.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const QR_SUBDIR: &str = "qr_codes";

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR generation failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("QR artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Artifact path escapes media directory: {0}")]
    InvalidPath(String),
}

/// Render `data` as an SVG QR code.
pub fn render_svg(data: &str) -> Result<String, QrError> {
    use qrcode::render::svg;
    use qrcode::QrCode;

    let code = QrCode::new(data.as_bytes())?;

    let svg_string = code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .max_dimensions(300, 300)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .quiet_zone(true)
        .build();

    Ok(svg_string)
}

/// Reference stored on the patient row.
pub fn artifact_reference(patient_id: &Uuid) -> String {
    format!("{QR_SUBDIR}/qr_{patient_id}.svg")
}

/// Render `token` and write it for `patient_id`. Returns the relative reference.
pub fn write_artifact(media_dir: &Path, patient_id: &Uuid, token: &str) -> Result<String, QrError> {
    let svg = render_svg(token)?;
    let reference = artifact_reference(patient_id);
    let path = media_dir.join(&reference);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, svg)?;
    Ok(reference)
}

/// Read a stored artifact by its relative reference.
pub fn read_artifact(media_dir: &Path, reference: &str) -> Result<Vec<u8>, QrError> {
    Ok(std::fs::read(resolve(media_dir, reference)?)?)
}

/// Delete a stored artifact. A missing file is not an error.
pub fn remove_artifact(media_dir: &Path, reference: &str) -> Result<(), QrError> {
    match std::fs::remove_file(resolve(media_dir, reference)?) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn resolve(media_dir: &Path, reference: &str) -> Result<PathBuf, QrError> {
    let relative = Path::new(reference);
    let safe = relative
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_)));
    if !safe {
        return Err(QrError::InvalidPath(reference.to_string()));
    }
    Ok(media_dir.join(relative))
}
