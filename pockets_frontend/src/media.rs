//! Client-side inspection of selected files and the local preview handles
//! shown while they upload.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Tag, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::UploadError;
use crate::models::MediaKind;

const THUMBNAIL_EDGE: u32 = 256;
const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub mime: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub exif: ExifData,
}

/// Camera metadata read from an image's EXIF block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifData {
    pub taken_at: Option<NaiveDateTime>,
    /// EXIF orientation, 1 to 8.
    pub orientation: Option<u16>,
}

impl MediaInfo {
    pub fn probe(file_name: &str, bytes: &[u8]) -> Self {
        let mime = infer::get(bytes)
            .map(|kind| kind.mime_type().to_string())
            .or_else(|| mime_from_extension(file_name).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        let kind = MediaKind::from_mime(&mime);
        let (width, height, exif) = match kind {
            MediaKind::Image => {
                let (width, height) = image_dimensions(bytes).unzip();
                (width, height, read_exif(bytes))
            }
            _ => (None, None, ExifData::default()),
        };
        Self {
            mime,
            kind,
            size_bytes: bytes.len() as u64,
            width,
            height,
            exif,
        }
    }
}

pub fn read_exif(bytes: &[u8]) -> ExifData {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return ExifData::default(),
        Err(err) => {
            debug!(error = %err, "unreadable exif block");
            return ExifData::default();
        }
    };
    let taken_at = [Tag::DateTimeOriginal, Tag::DateTime]
        .into_iter()
        .find_map(|tag| exif.get_field(tag, In::PRIMARY))
        .and_then(|field| match &field.value {
            Value::Ascii(parts) => parts.first().and_then(|raw| parse_exif_time(raw)),
            _ => None,
        });
    let orientation = exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .and_then(|value| u16::try_from(value).ok())
        .filter(|value| (1..=8).contains(value));
    ExifData {
        taken_at,
        orientation,
    }
}

fn parse_exif_time(raw: &[u8]) -> Option<NaiveDateTime> {
    let time = exif::DateTime::from_ascii(raw).ok()?;
    NaiveDate::from_ymd_opt(time.year.into(), time.month.into(), time.day.into())?.and_hms_opt(
        time.hour.into(),
        time.minute.into(),
        time.second.into(),
    )
}

fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok(dims) => Some(dims),
        Err(err) => {
            debug!(error = %err, "could not read image dimensions");
            None
        }
    }
}

fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        _ => return None,
    };
    Some(mime)
}

/// A file picked by the user, held in memory until it is uploaded.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Bytes,
    pub info: MediaInfo,
}

impl SelectedFile {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        let info = MediaInfo::probe(&name, &bytes);
        Self { name, bytes, info }
    }

    pub async fn open(path: &Path) -> Result<Self, UploadError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| UploadError::Io(format!("{}: {err}", path.display())))?;
        Ok(Self::from_bytes(name, data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewHandle(Uuid);

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub size: [usize; 2],
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum Preview {
    Image(Thumbnail),
    Audio(Bytes),
    Placeholder(MediaKind),
}

/// Owns every preview currently on screen. Handles must be released when the
/// file leaves the selection, mirroring object-URL revocation in a browser.
#[derive(Clone, Default)]
pub struct PreviewStore {
    previews: Arc<Mutex<HashMap<PreviewHandle, Preview>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_for(&self, file: &SelectedFile) -> PreviewHandle {
        let preview = match file.info.kind {
            MediaKind::Image => match thumbnail(&file.bytes) {
                Some(thumb) => Preview::Image(thumb),
                None => Preview::Placeholder(MediaKind::Image),
            },
            MediaKind::Audio => Preview::Audio(file.bytes.clone()),
            other => Preview::Placeholder(other),
        };
        self.insert(preview)
    }

    pub fn create_audio(&self, bytes: Bytes) -> PreviewHandle {
        self.insert(Preview::Audio(bytes))
    }

    fn insert(&self, preview: Preview) -> PreviewHandle {
        let handle = PreviewHandle(Uuid::new_v4());
        self.lock().insert(handle, preview);
        handle
    }

    pub fn get(&self, handle: PreviewHandle) -> Option<Preview> {
        self.lock().get(&handle).cloned()
    }

    pub fn release(&self, handle: PreviewHandle) -> bool {
        self.lock().remove(&handle).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PreviewHandle, Preview>> {
        self.previews.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn thumbnail(bytes: &[u8]) -> Option<Thumbnail> {
    let image = image::load_from_memory(bytes).ok()?;
    let thumb = image.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE).to_rgba8();
    let size = [thumb.width() as usize, thumb.height() as usize];
    Some(Thumbnail {
        size,
        pixels: thumb.into_raw(),
    })
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// A small JPEG carrying an EXIF block with a capture time and orientation.
#[cfg(test)]
pub(crate) fn jpeg_with_exif(taken_at: &str, orientation: u16) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(8, 6, image::Rgb([20, 90, 160]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .expect("encode jpeg");
    let jpeg = out.into_inner();

    // Big-endian TIFF: IFD0 at 8 holds Orientation and the Exif IFD pointer,
    // the Exif IFD at 38 holds DateTimeOriginal, whose text sits at 56.
    let mut stamp = taken_at.as_bytes().to_vec();
    stamp.push(0);
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\0\x2a");
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0, 0, 0, 1]);
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&[0x87, 0x69, 0x00, 0x04, 0, 0, 0, 1]);
    tiff.extend_from_slice(&38u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&[0x90, 0x03, 0x00, 0x02]);
    tiff.extend_from_slice(&(stamp.len() as u32).to_be_bytes());
    tiff.extend_from_slice(&56u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(&stamp);

    let mut app1 = b"Exif\0\0".to_vec();
    app1.extend_from_slice(&tiff);
    let mut with_exif = jpeg[..2].to_vec();
    with_exif.extend_from_slice(&[0xFF, 0xE1]);
    with_exif.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    with_exif.extend_from_slice(&app1);
    with_exif.extend_from_slice(&jpeg[2..]);
    with_exif
}
