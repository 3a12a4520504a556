//! Identity codes: a record's canonical payload rendered as a QR code image,
//! and scanned text resolved back to a battery id.

mod watermark;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma};
use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::BatteryRecord;

/// Default edge length of the rendered image, in pixels.
pub const DEFAULT_SIZE: u32 = 500;

/// Light modules kept around the code on every side.
const QUIET_ZONE: u32 = 4;

/// Smallest edge length accepted from configuration.
pub const MIN_SIZE: u32 = 150;

/// Largest edge length the codec will allocate.
pub const MAX_SIZE: u32 = 4096;

/// Modules left clear between the id watermark and the code.
const WATERMARK_CLEARANCE: u32 = 2;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Payload is missing field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Cannot encode payload: {0}")]
    EncodingFailure(String),

    #[error("Cannot write image {}: {message}", .path.display())]
    ImageIoFailure { path: PathBuf, message: String },
}

impl CodecError {
    fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        CodecError::ImageIoFailure {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Battery identity recovered from a scanned code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
}

/// A rendered and persisted identity code.
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    pub id: Uuid,
    /// Exact text carried by the QR code.
    pub payload: String,
    /// Where the PNG was written.
    pub path: PathBuf,
    pub image: GrayImage,
}

/// Renders identity codes into a picture directory and decodes scanned text.
#[derive(Debug, Clone)]
pub struct IdentityCodec {
    pictures_dir: PathBuf,
    size: u32,
}

impl IdentityCodec {
    pub fn new(pictures_dir: impl Into<PathBuf>, size: u32) -> Self {
        Self {
            pictures_dir: pictures_dir.into(),
            size,
        }
    }

    pub fn pictures_dir(&self) -> &Path {
        &self.pictures_dir
    }

    /// Path of the PNG for a given battery id.
    pub fn artifact_path(&self, id: &Uuid) -> PathBuf {
        self.pictures_dir.join(format!("{}.png", id))
    }

    /// Render `record`'s payload as a watermarked QR image and save it as `<id>.png`.
    ///
    /// The id is stamped in the top margin, shrunk or shortened to leave the
    /// code clear, and left out when the margin is too small. On failure no
    /// file is left behind.
    pub fn encode(&self, record: &BatteryRecord) -> Result<ImageArtifact, CodecError> {
        let id = record.id();
        let (mut image, layout) = render_with_layout(record.payload(), self.size)?;

        let id_text = id.to_string();
        match watermark::fit(&id_text, layout.size, layout.watermark_band()) {
            Some(stamp) => watermark::draw(&mut image, &stamp),
            None => debug!(id = %id, size = layout.size, "no room for id watermark"),
        }

        let path = self.artifact_path(&id);
        fs::create_dir_all(&self.pictures_dir).map_err(|e| CodecError::io(&self.pictures_dir, e))?;
        write_png(&image, &path)?;

        info!(id = %id, path = %path.display(), "identity code written");
        Ok(ImageArtifact {
            id,
            payload: record.payload().to_string(),
            path,
            image,
        })
    }

    /// Resolve raw scanned text to the battery id it carries.
    pub fn decode(&self, raw_text: &str) -> Result<Identity, CodecError> {
        let identity = parse_identity(raw_text)?;
        debug!(id = %identity.id, "identity code decoded");
        Ok(identity)
    }

    /// Delete the stored PNG for `id`. Returns `false` if there was none.
    pub fn remove_artifact(&self, id: &Uuid) -> Result<bool, CodecError> {
        let path = self.artifact_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CodecError::io(&path, e)),
        }
    }
}

/// Parse the canonical JSON payload and validate its `id`.
pub fn parse_identity(raw_text: &str) -> Result<Identity, CodecError> {
    let value: serde_json::Value = serde_json::from_str(raw_text.trim())
        .map_err(|e| CodecError::MalformedPayload(e.to_string()))?;

    let obj = value
        .as_object()
        .ok_or_else(|| CodecError::MalformedPayload("expected a JSON object".to_string()))?;

    let id = obj.get("id").ok_or(CodecError::MissingField("id"))?;
    let id = id
        .as_str()
        .ok_or_else(|| CodecError::InvalidIdentity(format!("id is not a string: {}", id)))?;

    Uuid::parse_str(id)
        .map(|id| Identity { id })
        .map_err(|e| CodecError::InvalidIdentity(format!("{}: {}", id, e)))
}

/// Pixel geometry of a rendered code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    /// Edge length of the raster.
    size: u32,
    /// Edge length of one module.
    scale: u32,
    /// Blank pixels between the raster edge and the first module.
    offset: u32,
}

impl Layout {
    /// Height of the top margin available to the watermark.
    fn watermark_band(&self) -> u32 {
        self.offset.saturating_sub(WATERMARK_CLEARANCE * self.scale)
    }
}

/// Render `payload` as a black-on-white QR code on a `size`×`size` raster.
///
/// Modules are scaled by the largest whole factor that fits the code plus its
/// quiet zone, then centred. If even one pixel per module does not fit, the
/// raster grows to the code's natural size. Sizes above [`MAX_SIZE`] are
/// rejected.
pub fn render(payload: &str, size: u32) -> Result<GrayImage, CodecError> {
    render_with_layout(payload, size).map(|(image, _)| image)
}

fn render_with_layout(payload: &str, size: u32) -> Result<(GrayImage, Layout), CodecError> {
    if size > MAX_SIZE {
        return Err(CodecError::EncodingFailure(format!(
            "image size {} exceeds {}",
            size, MAX_SIZE
        )));
    }

    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| CodecError::EncodingFailure(e.to_string()))?;

    let modules = code.width() as u32;
    let padded = modules + 2 * QUIET_ZONE;
    let size = size.max(padded);
    let scale = size / padded;
    let offset = (size - modules * scale) / 2;

    let mut image = GrayImage::from_pixel(size, size, Luma([255]));
    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let mx = i as u32 % modules;
        let my = i as u32 / modules;
        for dy in 0..scale {
            for dx in 0..scale {
                image.put_pixel(offset + mx * scale + dx, offset + my * scale + dy, Luma([0]));
            }
        }
    }

    Ok((
        image,
        Layout {
            size,
            scale,
            offset,
        },
    ))
}

/// Write `image` as PNG to a temporary sibling, flush and sync it, then move it
/// over `path`. The temporary is removed on any failure.
fn write_png(image: &GrayImage, path: &Path) -> Result<(), CodecError> {
    let tmp = path.with_extension("png.tmp");

    let result = write_png_file(image, &tmp)
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| CodecError::io(path, e)));

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_png_file(image: &GrayImage, path: &Path) -> Result<(), CodecError> {
    let file = File::create(path).map_err(|e| CodecError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    PngEncoder::new(&mut writer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| CodecError::io(path, e))?;

    writer.flush().map_err(|e| CodecError::io(path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| CodecError::io(path, e.error()))?;
    file.sync_all().map_err(|e| CodecError::io(path, e))?;
    Ok(())
}
