use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{self, content::Content};

use crate::OutlineError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

/// Descriptor flag bit 19 (1-based): ForceBold.
const FORCE_BOLD_FLAG: i64 = 1 << 18;

/// Font weights at or above this value are rendered bold.
const BOLD_WEIGHT: f32 = 600.0;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Font information extracted from a page's resource dictionary.
#[derive(Debug, Clone, Default)]
pub struct BackendFontInfo {
    /// Resource key as it appears in the page's font dictionary (e.g. `b"F1"`).
    pub name: Vec<u8>,
    pub base_font: Option<String>,
    /// Set when the font descriptor declares ForceBold or a heavy weight.
    pub descriptor_bold: bool,
    /// `Type0` fonts use multi-byte codes; `widths` does not apply to them.
    pub is_composite: bool,
    pub first_char: u32,
    /// Glyph advances in thousandths of text space, indexed from `first_char`.
    /// Empty when the font does not declare them.
    pub widths: Vec<f32>,
}

impl BackendFontInfo {
    /// Whether glyphs in this font should be treated as bold, judged from the
    /// base-font name and the descriptor.
    pub fn is_bold(&self) -> bool {
        self.descriptor_bold || self.base_font.as_deref().is_some_and(is_bold_font_name)
    }

    /// Advance width of a single-byte character code, in thousandths of text
    /// space. `None` when the font gives no usable metrics for it.
    pub fn glyph_width(&self, code: u8) -> Option<f32> {
        if self.is_composite {
            return None;
        }
        let idx = (code as u32).checked_sub(self.first_char)?;
        self.widths.get(idx as usize).copied().filter(|w| *w > 0.0)
    }
}

/// A simplified, lopdf-independent representation of a PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`]. Stream payloads are dropped.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(
            dict.iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect(),
        ),
        lopdf::Object::Stream(stream) => PdfValue::Dict(
            stream
                .dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect(),
        ),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Best-effort decoding of raw PDF string bytes.
///
/// UTF-16BE with BOM first, then UTF-8, then Latin-1 byte-to-codepoint.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let code_units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Returns `true` for base-font names carrying a bold-ish weight marker,
/// e.g. `Helvetica-Bold`, `ABCDEF+Inter-SemiBold`, `Arial Black`.
pub fn is_bold_font_name(base_font: &str) -> bool {
    let upper = base_font.to_uppercase();
    ["BOLD", "BLACK", "HEAVY", "SEMIBOLD", "DEMI"]
        .iter()
        .any(|marker| upper.contains(marker))
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// Low-level access to a parsed PDF. The span extractor only talks to this
/// trait, so it can be driven by hand-written content streams in tests.
pub trait PdfBackend {
    /// Mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, OutlineError>;

    /// Raw (decompressed) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, OutlineError>;

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, OutlineError>;

    /// Decode string bytes from a text-showing operator using whatever
    /// encoding hints are available for `font_name` on `page`.
    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    pub fn load_path(path: &Path) -> Result<Self, OutlineError> {
        let bytes = std::fs::read(path)?;
        Self::load_bytes(&bytes)
    }

    pub fn load_bytes(data: &[u8]) -> Result<Self, OutlineError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| OutlineError::Open(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(OutlineError::Encrypted);
        }

        Ok(Self { doc })
    }

    pub fn raw_doc(&self) -> &lopdf::Document {
        &self.doc
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// The page MediaBox as `[llx, lly, urx, ury]`, inherited from the page
    /// tree when the page itself does not declare one.
    pub fn media_box(&self, page: PageId) -> Result<[f32; 4], OutlineError> {
        self.page_box(page, b"MediaBox")?
            .ok_or_else(|| OutlineError::Lookup("MediaBox not found for page".into()))
    }

    /// The visible region: the (inherited) CropBox clipped to the MediaBox.
    ///
    /// A missing, malformed or disjoint CropBox means the whole MediaBox.
    pub fn crop_box(&self, page: PageId) -> Result<[f32; 4], OutlineError> {
        let media = self.media_box(page)?;
        let crop = match self.page_box(page, b"CropBox") {
            Ok(Some(crop)) => crop,
            Ok(None) => return Ok(media),
            Err(e) => {
                log::debug!("ignoring CropBox: {}", e);
                return Ok(media);
            }
        };

        let clipped = [
            crop[0].max(media[0]),
            crop[1].max(media[1]),
            crop[2].min(media[2]),
            crop[3].min(media[3]),
        ];
        if clipped[0] >= clipped[2] || clipped[1] >= clipped[3] {
            return Ok(media);
        }
        Ok(clipped)
    }

    /// The page's `/Rotate` in degrees as declared (or inherited), 0 when
    /// absent.
    pub fn rotation(&self, page: PageId) -> Result<i64, OutlineError> {
        let page_dict = self.page_dict(page)?;
        let rotate = match self.find_inherited(page_dict, b"Rotate") {
            Some(obj) => obj,
            None => return Ok(0),
        };
        match self.resolve(rotate) {
            lopdf::Object::Integer(i) => Ok(*i),
            lopdf::Object::Real(f) => Ok(f.round() as i64),
            other => Err(OutlineError::Lookup(format!(
                "Rotate must be a number, got {:?}",
                other
            ))),
        }
    }

    // -- private helpers ----------------------------------------------------

    fn page_dict(&self, page: PageId) -> Result<&lopdf::Dictionary, OutlineError> {
        self.doc
            .get_object(page)
            .and_then(|obj| obj.as_dict())
            .map_err(|e| OutlineError::Lookup(format!("page object: {}", e)))
    }

    /// A rectangle entry such as MediaBox, normalized so `llx <= urx` and
    /// `lly <= ury`.
    fn page_box(&self, page: PageId, key: &[u8]) -> Result<Option<[f32; 4]>, OutlineError> {
        let page_dict = self.page_dict(page)?;
        let Some(obj) = self.find_inherited(page_dict, key) else {
            return Ok(None);
        };
        let rect = self.resolve_array(obj).ok_or_else(|| {
            OutlineError::Lookup(format!("{} is not an array", String::from_utf8_lossy(key)))
        })?;

        let nums = self.array_to_f32s(&rect)?;
        if nums.len() < 4 {
            return Err(OutlineError::Lookup(format!(
                "{} has {} elements, expected 4",
                String::from_utf8_lossy(key),
                nums.len()
            )));
        }

        Ok(Some([
            nums[0].min(nums[2]),
            nums[1].min(nums[3]),
            nums[0].max(nums[2]),
            nums[1].max(nums[3]),
        ]))
    }

    /// Look `key` up on `dict`, then on its `Parent` chain.
    fn find_inherited<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        key: &[u8],
    ) -> Option<&'a lopdf::Object> {
        if let Ok(obj) = dict.get(key) {
            return Some(obj);
        }

        let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent_dict = self.doc.get_object(parent_id).ok()?.as_dict().ok()?;
        self.find_inherited(parent_dict, key)
    }

    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    fn resolve_array(&self, obj: &lopdf::Object) -> Option<Vec<lopdf::Object>> {
        match obj {
            lopdf::Object::Array(arr) => Some(arr.clone()),
            lopdf::Object::Reference(id) => self
                .doc
                .get_object(*id)
                .ok()
                .and_then(|resolved| resolved.as_array().ok())
                .cloned(),
            _ => None,
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a lopdf::Object) -> Option<&'a lopdf::Dictionary> {
        match obj {
            lopdf::Object::Dictionary(d) => Some(d),
            lopdf::Object::Reference(id) => self.doc.get_object(*id).ok()?.as_dict().ok(),
            _ => None,
        }
    }

    fn array_to_f32s(&self, objects: &[lopdf::Object]) -> Result<Vec<f32>, OutlineError> {
        objects
            .iter()
            .map(|obj| {
                let resolved = match obj {
                    lopdf::Object::Reference(id) => self
                        .doc
                        .get_object(*id)
                        .map_err(|e| OutlineError::Lookup(e.to_string()))?,
                    other => other,
                };
                match resolved {
                    lopdf::Object::Integer(i) => Ok(*i as f32),
                    lopdf::Object::Real(f) => Ok(*f),
                    _ => Err(OutlineError::Lookup(format!(
                        "expected number in array, got {:?}",
                        resolved
                    ))),
                }
            })
            .collect()
    }

    /// ForceBold flag or a heavy FontWeight in the font's descriptor.
    fn descriptor_is_bold(&self, font: &lopdf::Dictionary) -> bool {
        let Some(descriptor) = font
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| self.resolve_dict(obj))
        else {
            return false;
        };

        let force_bold = descriptor
            .get(b"Flags")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .is_some_and(|flags| flags & FORCE_BOLD_FLAG != 0);

        let heavy = descriptor
            .get(b"FontWeight")
            .ok()
            .and_then(|o| match o {
                lopdf::Object::Integer(i) => Some(*i as f32),
                lopdf::Object::Real(f) => Some(*f),
                _ => None,
            })
            .is_some_and(|w| w >= BOLD_WEIGHT);

        force_bold || heavy
    }

    fn font_widths(&self, font: &lopdf::Dictionary) -> Vec<f32> {
        font.get(b"Widths")
            .ok()
            .and_then(|obj| self.resolve_array(obj))
            .and_then(|arr| self.array_to_f32s(&arr).ok())
            .unwrap_or_default()
    }

    fn font_encoding_name(&self, page: PageId, font_name: &[u8]) -> Option<String> {
        let fonts = self.doc.get_page_fonts(page).ok()?;
        let font_dict = fonts.get(font_name)?;
        match font_dict.get(b"Encoding").ok()? {
            lopdf::Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>, OutlineError> {
        let fonts_map = self
            .doc
            .get_page_fonts(page)
            .map_err(|e| OutlineError::Lookup(format!("cannot get page fonts: {}", e)))?;

        Ok(fonts_map
            .iter()
            .map(|(name, dict)| BackendFontInfo {
                name: name.clone(),
                base_font: dict
                    .get(b"BaseFont")
                    .ok()
                    .and_then(|o| o.as_name().ok())
                    .map(|n| String::from_utf8_lossy(n).into_owned()),
                descriptor_bold: self.descriptor_is_bold(dict),
                is_composite: dict
                    .get(b"Subtype")
                    .ok()
                    .and_then(|o| o.as_name().ok())
                    .is_some_and(|n| n == b"Type0"),
                first_char: dict
                    .get(b"FirstChar")
                    .ok()
                    .and_then(|o| o.as_i64().ok())
                    .and_then(|c| u32::try_from(c).ok())
                    .unwrap_or(0),
                widths: self.font_widths(dict),
            })
            .collect())
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, OutlineError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| OutlineError::Open(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, OutlineError> {
        let content = Content::decode(data)
            .map_err(|e| OutlineError::Open(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String {
        // Identity-H / Identity-V fonts usually carry 2-byte codes that line
        // up with UTF-16BE for Latin text.
        if let Some(enc_name) = self.font_encoding_name(page, font_name) {
            if enc_name.contains("Identity") && bytes.len() >= 2 && bytes.len() % 2 == 0 {
                let code_units: Vec<u16> = bytes
                    .chunks(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                let decoded = String::from_utf16_lossy(&code_units);
                if !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                    return decoded;
                }
            }
        }

        decode_text_simple(bytes)
    }
}
