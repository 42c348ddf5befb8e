//! Image XObjects on a page, for the image-presence query and OCR input.

use std::io::Cursor;

use crate::parser::backend::{LopdfBackend, PageId};
use crate::OutlineError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Jpeg2000,
    Png,
    Unknown,
}

impl ImageFormat {
    /// File extension used when handing the bytes to an external tool.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Jpeg2000 => "jp2",
            ImageFormat::Png => "png",
            ImageFormat::Unknown => "bin",
        }
    }
}

/// An image painted on a page, with bytes in a self-describing format.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl PageImage {
    pub fn pixel_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawImageMeta {
    width: u32,
    height: u32,
    bits_per_component: u8,
    channels: u8,
    color_space: ColorSpace,
}

impl RawImageMeta {
    fn expected_byte_count(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

/// Detect the image format from magic bytes.
pub fn detect_image_format(bytes: &[u8]) -> ImageFormat {
    if bytes.len() < 8 {
        return ImageFormat::Unknown;
    }
    if bytes[..3] == [0xFF, 0xD8, 0xFF] {
        return ImageFormat::Jpeg;
    }
    if bytes[..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return ImageFormat::Png;
    }
    if bytes[..8] == [0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20] {
        return ImageFormat::Jpeg2000;
    }
    ImageFormat::Unknown
}

/// `DCTDecode` streams are JPEG files, `JPXDecode` streams JPEG 2000.
pub fn format_from_pdf_filter(filter_name: &str) -> ImageFormat {
    match filter_name {
        "DCTDecode" => ImageFormat::Jpeg,
        "JPXDecode" => ImageFormat::Jpeg2000,
        _ => ImageFormat::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Raw pixel re-encoding
// ---------------------------------------------------------------------------

fn extract_image_meta(dict: &lopdf::Dictionary) -> Option<RawImageMeta> {
    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;

    let bits_per_component = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|obj| obj.as_i64().ok())
        .map(|v| v as u8)
        .unwrap_or(8);

    let (color_space, channels) = match dict.get(b"ColorSpace").ok()?.as_name().ok()? {
        b"DeviceRGB" => (ColorSpace::Rgb, 3),
        b"DeviceGray" => (ColorSpace::Gray, 1),
        b"DeviceCMYK" => (ColorSpace::Cmyk, 4),
        _ => return None,
    };

    Some(RawImageMeta {
        width,
        height,
        bits_per_component,
        channels,
        color_space,
    })
}

/// Re-encode 8-bit raw pixel data as PNG.
fn encode_raw_as_png(meta: &RawImageMeta, raw_bytes: &[u8]) -> Option<Vec<u8>> {
    if meta.bits_per_component != 8 || raw_bytes.len() != meta.expected_byte_count() {
        return None;
    }

    let dyn_image = match meta.color_space {
        ColorSpace::Gray => image::DynamicImage::ImageLuma8(image::GrayImage::from_raw(
            meta.width,
            meta.height,
            raw_bytes.to_vec(),
        )?),
        ColorSpace::Rgb => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            meta.width,
            meta.height,
            raw_bytes.to_vec(),
        )?),
        ColorSpace::Cmyk => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            meta.width,
            meta.height,
            cmyk_to_rgb(raw_bytes),
        )?),
    };

    let mut buf = Vec::new();
    dyn_image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(buf)
}

fn cmyk_to_rgb(cmyk_bytes: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(cmyk_bytes.len() / 4 * 3);
    for pixel in cmyk_bytes.chunks_exact(4) {
        let k = pixel[3] as u16;
        for &channel in &pixel[..3] {
            rgb.push(255u16.saturating_sub((channel as u16 + k).min(255)) as u8);
        }
    }
    rgb
}

// ---------------------------------------------------------------------------
// Page-level queries
// ---------------------------------------------------------------------------

/// Whether the page's resources declare at least one image XObject.
pub fn page_has_images(backend: &LopdfBackend, page_id: PageId) -> Result<bool, OutlineError> {
    let doc = backend.raw_doc();
    let page_dict = page_dict(doc, page_id)?;
    let Some(xobjects) = resolve_xobject_dict(doc, page_dict) else {
        return Ok(false);
    };
    Ok(xobjects
        .iter()
        .filter_map(|(_, obj)| as_stream(resolve_object(doc, obj)))
        .any(|stream| is_image_stream(&stream.dict)))
}

/// Every image on the page whose bytes can be handed to an image reader.
/// Images in unsupported encodings are skipped.
pub fn page_images(backend: &LopdfBackend, page_id: PageId) -> Result<Vec<PageImage>, OutlineError> {
    let doc = backend.raw_doc();
    let page_dict = page_dict(doc, page_id)?;
    let Some(xobjects) = resolve_xobject_dict(doc, page_dict) else {
        return Ok(Vec::new());
    };

    let mut images = Vec::new();
    for (name, obj) in xobjects.iter() {
        let Some(stream) = as_stream(resolve_object(doc, obj)) else {
            continue;
        };
        if !is_image_stream(&stream.dict) {
            continue;
        }
        let name = String::from_utf8_lossy(name).into_owned();
        match image_from_stream(&name, stream) {
            Some(image) => images.push(image),
            None => log::debug!("skipping image {} on page {:?}: unsupported encoding", name, page_id),
        }
    }

    Ok(images)
}

/// The page image covering the most pixels, if any can be read.
pub fn largest_page_image(
    backend: &LopdfBackend,
    page_id: PageId,
) -> Result<Option<PageImage>, OutlineError> {
    Ok(page_images(backend, page_id)?
        .into_iter()
        .max_by_key(PageImage::pixel_area))
}

fn image_from_stream(name: &str, stream: &lopdf::Stream) -> Option<PageImage> {
    let dict = &stream.dict;
    let width = dict.get(b"Width").ok()?.as_i64().ok()?;
    let height = dict.get(b"Height").ok()?.as_i64().ok()?;
    let filter_name = extract_filter_name(dict);

    let pass_through = filter_name
        .as_deref()
        .map(format_from_pdf_filter)
        .unwrap_or(ImageFormat::Unknown);

    let (format, bytes) = if pass_through != ImageFormat::Unknown {
        (pass_through, stream.content.clone())
    } else {
        let bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        match detect_image_format(&bytes) {
            ImageFormat::Unknown => {
                let meta = extract_image_meta(dict)?;
                (ImageFormat::Png, encode_raw_as_png(&meta, &bytes)?)
            }
            detected => (detected, bytes),
        }
    };

    Some(PageImage {
        name: name.to_string(),
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
        format,
        bytes,
    })
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn page_dict(doc: &lopdf::Document, page_id: PageId) -> Result<&lopdf::Dictionary, OutlineError> {
    doc.get_object(page_id)
        .and_then(|obj| obj.as_dict())
        .map_err(|e| OutlineError::Lookup(format!("page object: {}", e)))
}

fn is_image_stream(dict: &lopdf::Dictionary) -> bool {
    dict.get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name().ok())
        .is_some_and(|n| n == b"Image")
}

fn resolve_object<'a>(doc: &'a lopdf::Document, obj: &'a lopdf::Object) -> &'a lopdf::Object {
    match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn resolve_dict<'a>(
    doc: &'a lopdf::Document,
    obj: &'a lopdf::Object,
) -> Option<&'a lopdf::Dictionary> {
    match resolve_object(doc, obj) {
        lopdf::Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

/// Resources -> XObject, inherited from the page tree when the page itself
/// has no Resources entry.
fn resolve_xobject_dict<'a>(
    doc: &'a lopdf::Document,
    page_dict: &'a lopdf::Dictionary,
) -> Option<&'a lopdf::Dictionary> {
    let resources = match page_dict.get(b"Resources") {
        Ok(obj) => resolve_dict(doc, obj)?,
        Err(_) => {
            let parent = page_dict.get(b"Parent").ok()?.as_reference().ok()?;
            let parent_dict = doc.get_object(parent).ok()?.as_dict().ok()?;
            return resolve_xobject_dict(doc, parent_dict);
        }
    };
    resolve_dict(doc, resources.get(b"XObject").ok()?)
}

fn as_stream(obj: &lopdf::Object) -> Option<&lopdf::Stream> {
    match obj {
        lopdf::Object::Stream(s) => Some(s),
        _ => None,
    }
}

fn extract_filter_name(dict: &lopdf::Dictionary) -> Option<String> {
    match dict.get(b"Filter").ok()? {
        lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        lopdf::Object::Array(arr) => arr
            .last()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}
