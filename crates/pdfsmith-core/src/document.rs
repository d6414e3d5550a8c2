//! Document model adapter
//!
//! Wraps `lopdf::Document` with the page-level primitives the transforms are
//! built from: typed open outcome, page enumeration, cross-document page
//! copy, rotation and metadata mutation, and plain or compacted save.

use crate::crypto;
use crate::error::{PdfSmithError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `/Parent` chains and reference loops
const MAX_DEPTH: usize = 64;

/// US Letter, used when a page tree carries no `/MediaBox` at all
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Result of opening a byte buffer, classified structurally
#[derive(Debug)]
pub enum OpenOutcome {
    Ready(PdfDocument),
    /// The security handler requires a password and none was supplied
    NeedsPassword,
    /// A password was supplied but the security handler rejected it
    WrongPassword,
    Malformed(String),
}

/// Handle to a page object that has been imported but not yet placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle(ObjectId);

impl PageHandle {
    pub(crate) fn id(&self) -> ObjectId {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Prune unreachable objects, compress streams and renumber objects
    pub compact: bool,
}

/// Page geometry in points, taken from the effective `/MediaBox`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSize {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Document information dictionary fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

impl DocumentMetadata {
    const KEYS: [&'static [u8]; 6] = [
        b"Title",
        b"Author",
        b"Subject",
        b"Keywords",
        b"Creator",
        b"Producer",
    ];

    fn fields(&self) -> [&Option<String>; 6] {
        [
            &self.title,
            &self.author,
            &self.subject,
            &self.keywords,
            &self.creator,
            &self.producer,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_none())
    }
}

/// Summary of a PDF file, used by the `info` command
#[derive(Debug, Clone, Serialize)]
pub struct PdfInfo {
    pub page_count: usize,
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    pub metadata: DocumentMetadata,
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub index: usize,
    pub size: PageSize,
    pub rotation: i32,
}

/// In-memory PDF owned by a single operation
#[derive(Debug, Clone)]
pub struct PdfDocument {
    inner: Document,
}

impl PdfDocument {
    /// Open a document, authenticating with `password` if it is encrypted
    pub fn open(bytes: &[u8], password: Option<&str>) -> OpenOutcome {
        let mut inner = match Document::load_mem(bytes) {
            Ok(doc) => doc,
            Err(err) => {
                // Some parsers refuse encrypted files outright; fall back to the token
                if password.is_none() && contains_token(bytes, b"/Encrypt") {
                    return OpenOutcome::NeedsPassword;
                }
                return OpenOutcome::Malformed(err.to_string());
            }
        };

        if !crypto::is_encrypted(&inner) {
            return OpenOutcome::Ready(Self { inner });
        }

        let Some(password) = password else {
            return OpenOutcome::NeedsPassword;
        };

        match crypto::decrypt_in_place(&mut inner, bytes, password) {
            Ok(()) => OpenOutcome::Ready(Self { inner }),
            Err(PdfSmithError::IncorrectPassword) => OpenOutcome::WrongPassword,
            Err(err) => OpenOutcome::Malformed(err.to_string()),
        }
    }

    /// Open an unencrypted document
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Self::open(bytes, None).into_result()
    }

    /// Open a document, decrypting it with `password` when required
    pub fn load_with_password(bytes: &[u8], password: &str) -> Result<Self> {
        Self::open(bytes, Some(password)).into_result()
    }

    /// Open the raw object graph without touching the security handler
    pub(crate) fn load_raw(bytes: &[u8]) -> Result<Document> {
        Document::load_mem(bytes).map_err(|e| PdfSmithError::Load(e.to_string()))
    }

    /// Create a document with a catalog and an empty page tree
    pub fn create_empty() -> Self {
        let mut inner = Document::with_version("1.7");
        let pages_id = inner.new_object_id();
        inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }),
        );
        let catalog_id = inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        inner.trailer.set("Root", catalog_id);
        Self { inner }
    }

    pub(crate) fn from_lopdf(inner: Document) -> Self {
        Self { inner }
    }

    pub(crate) fn as_lopdf(&self) -> &Document {
        &self.inner
    }

    pub(crate) fn as_lopdf_mut(&mut self) -> &mut Document {
        &mut self.inner
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// Page object ids in document order
    pub(crate) fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().into_values().collect()
    }

    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    pub(crate) fn page_id(&self, index: usize) -> Result<ObjectId> {
        let ids = self.page_ids();
        ids.get(index)
            .copied()
            .ok_or(PdfSmithError::IndexOutOfRange {
                index,
                page_count: ids.len(),
            })
    }

    pub fn page_size(&self, index: usize) -> Result<PageSize> {
        let page_id = self.page_id(index)?;
        Ok(self.page_size_of(page_id))
    }

    pub(crate) fn page_size_of(&self, page_id: ObjectId) -> PageSize {
        let rect = self
            .inherited(page_id, b"MediaBox")
            .and_then(|obj| self.rect(obj))
            .unwrap_or(DEFAULT_MEDIA_BOX);
        let (x0, x1) = (rect[0].min(rect[2]), rect[0].max(rect[2]));
        let (y0, y1) = (rect[1].min(rect[3]), rect[1].max(rect[3]));
        PageSize {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// Effective rotation of a page, normalized to 0, 90, 180 or 270
    pub fn rotation(&self, index: usize) -> Result<i32> {
        let page_id = self.page_id(index)?;
        Ok(self.rotation_of(page_id))
    }

    pub(crate) fn rotation_of(&self, page_id: ObjectId) -> i32 {
        let angle = self
            .inherited(page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        normalize_angle(angle)
    }

    /// Set the absolute rotation of a page
    pub fn set_rotation(&mut self, index: usize, angle: i32) -> Result<()> {
        let page_id = self.page_id(index)?;
        self.set_rotation_of(page_id, angle)
    }

    pub(crate) fn set_rotation_of(&mut self, page_id: ObjectId, angle: i32) -> Result<()> {
        if angle % 90 != 0 {
            return Err(PdfSmithError::InvalidRotation(angle));
        }
        let page = self.inner.get_dictionary_mut(page_id)?;
        page.set("Rotate", Object::Integer(normalize_angle(angle as i64) as i64));
        Ok(())
    }

    /// Add `delta` degrees to a page's rotation, returning the new angle
    pub fn rotate_page(&mut self, index: usize, delta: i32) -> Result<i32> {
        let page_id = self.page_id(index)?;
        self.rotate_page_of(page_id, delta)
    }

    pub(crate) fn rotate_page_of(&mut self, page_id: ObjectId, delta: i32) -> Result<i32> {
        if delta % 90 != 0 {
            return Err(PdfSmithError::InvalidRotation(delta));
        }
        let angle = normalize_angle(self.rotation_of(page_id) as i64 + delta as i64);
        self.set_rotation_of(page_id, angle)?;
        Ok(angle)
    }

    /// Decoded content of a page, all content streams concatenated
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>> {
        let page_id = self.page_id(index)?;
        Ok(self.inner.get_page_content(page_id)?)
    }

    /// Deep-copy pages of `source` into this document.
    ///
    /// Objects reachable from a page are imported once per call and shared
    /// between the copies of different pages. A page requested more than once
    /// is imported afresh for every repeat so the copies stay independent.
    /// The returned handles must be placed with [`PdfDocument::append_page`].
    pub fn copy_pages(&mut self, source: &PdfDocument, indices: &[usize]) -> Result<Vec<PageHandle>> {
        let source_pages = source.page_ids();
        let page_count = source_pages.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= page_count) {
            return Err(PdfSmithError::IndexOutOfRange { index, page_count });
        }

        let mut shared_map = HashMap::new();
        let mut seen = HashSet::new();
        let mut handles = Vec::with_capacity(indices.len());

        for &index in indices {
            let page_id = source_pages[index];
            let handle = if seen.insert(page_id) {
                self.import_page(source, page_id, &mut shared_map)?
            } else {
                self.import_page(source, page_id, &mut HashMap::new())?
            };
            handles.push(handle);
        }

        Ok(handles)
    }

    fn import_page(
        &mut self,
        source: &PdfDocument,
        page_id: ObjectId,
        id_map: &mut HashMap<ObjectId, ObjectId>,
    ) -> Result<PageHandle> {
        let mut page = source.inner.get_dictionary(page_id)?.clone();
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Some(value) = source.inherited(page_id, key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        page.remove(b"Parent");

        let new_page_id = self.inner.new_object_id();
        id_map.insert(page_id, new_page_id);

        let copied = import_dictionary(&mut self.inner, &source.inner, &page, id_map);
        self.inner
            .objects
            .insert(new_page_id, Object::Dictionary(copied));
        Ok(PageHandle(new_page_id))
    }

    /// Append an imported page to the end of the page tree
    pub fn append_page(&mut self, handle: PageHandle) -> Result<()> {
        let pages_id = self.pages_root_id()?;
        let PageHandle(page_id) = handle;

        self.inner
            .get_dictionary_mut(page_id)?
            .set("Parent", Object::Reference(pages_id));

        let pages = self.inner.get_dictionary_mut(pages_id)?;
        let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        match pages.get_mut(b"Kids") {
            Ok(Object::Array(kids)) => kids.push(Object::Reference(page_id)),
            _ => pages.set("Kids", vec![Object::Reference(page_id)]),
        }
        pages.set("Count", Object::Integer(count + 1));
        Ok(())
    }

    /// Add a page with the given content stream and resources
    pub(crate) fn add_page(
        &mut self,
        width: f32,
        height: f32,
        resources: Dictionary,
        content: Vec<u8>,
    ) -> Result<()> {
        let content_id = self
            .inner
            .add_object(lopdf::Stream::new(Dictionary::new(), content));
        let page_id = self.inner.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => resources,
            "Contents" => content_id,
        });
        self.append_page(PageHandle(page_id))
    }

    pub(crate) fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        self.inner.add_object(object)
    }

    pub fn metadata(&self) -> DocumentMetadata {
        let Some(info) = self.info_dict() else {
            return DocumentMetadata::default();
        };
        let read = |key: &[u8]| {
            info.get(key)
                .ok()
                .map(|obj| self.resolve(obj))
                .and_then(|obj| obj.as_str().ok())
                .map(decode_text_string)
        };
        DocumentMetadata {
            title: read(b"Title"),
            author: read(b"Author"),
            subject: read(b"Subject"),
            keywords: read(b"Keywords"),
            creator: read(b"Creator"),
            producer: read(b"Producer"),
        }
    }

    /// Write every `Some` field of `metadata` into the information dictionary
    pub fn set_metadata(&mut self, metadata: &DocumentMetadata) -> Result<()> {
        let info_id = self.ensure_info_dict()?;
        let info = self.inner.get_dictionary_mut(info_id)?;
        for (key, value) in DocumentMetadata::KEYS.iter().zip(metadata.fields()) {
            if let Some(value) = value {
                info.set(key.to_vec(), encode_text_string(value));
            }
        }
        Ok(())
    }

    /// Remove title, author, subject, keywords, creator and producer
    pub fn clear_metadata(&mut self) {
        let info_id = match self.inner.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        match info_id {
            Some(id) => {
                if let Ok(info) = self.inner.get_dictionary_mut(id) {
                    strip_metadata_keys(info);
                    if info.is_empty() {
                        self.inner.trailer.remove(b"Info");
                    }
                }
            }
            None => {
                if let Ok(Object::Dictionary(info)) = self.inner.trailer.get_mut(b"Info") {
                    strip_metadata_keys(info);
                }
            }
        }
    }

    pub fn save(&mut self) -> Result<Vec<u8>> {
        self.save_with(SaveOptions::default())
    }

    pub fn save_with(&mut self, options: SaveOptions) -> Result<Vec<u8>> {
        if options.compact {
            self.inner.prune_objects();
            self.inner.delete_zero_length_streams();
            self.inner.compress();
            self.inner.renumber_objects();
        }

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfSmithError::Operation(format!("Failed to save PDF: {}", e)))?;
        Ok(buffer)
    }

    pub fn summary(&self, size_bytes: usize) -> PdfInfo {
        let pages = self
            .page_ids()
            .into_iter()
            .enumerate()
            .map(|(index, id)| PageSummary {
                index,
                size: self.page_size_of(id),
                rotation: self.rotation_of(id),
            })
            .collect::<Vec<_>>();
        PdfInfo {
            page_count: pages.len(),
            version: self.inner.version.clone(),
            encrypted: crypto::is_encrypted(&self.inner),
            size_bytes,
            metadata: self.metadata(),
            pages,
        }
    }

    pub(crate) fn pages_root_id(&self) -> Result<ObjectId> {
        let catalog_id = self
            .inner
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| PdfSmithError::Operation("No Root in trailer".into()))?;
        self.inner
            .get_dictionary(catalog_id)
            .map_err(|_| PdfSmithError::Operation("Catalog not found".into()))?
            .get(b"Pages")
            .and_then(Object::as_reference)
            .map_err(|_| PdfSmithError::Operation("No Pages in catalog".into()))
    }

    /// Look up a page attribute, walking up `/Parent` links when absent
    pub(crate) fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = Some(page_id);
        for _ in 0..MAX_DEPTH {
            let dict = self.inner.get_dictionary(current?).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(self.resolve(value));
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    /// Follow indirect references until a direct object is reached
    pub(crate) fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        let mut current = object;
        for _ in 0..MAX_DEPTH {
            match current {
                Object::Reference(id) => match self.inner.get_object(*id) {
                    Ok(next) => current = next,
                    Err(_) => return &Object::Null,
                },
                _ => return current,
            }
        }
        current
    }

    fn rect(&self, object: &Object) -> Option<[f32; 4]> {
        let items = self.resolve(object).as_array().ok()?;
        if items.len() != 4 {
            return None;
        }
        let mut rect = [0.0; 4];
        for (slot, item) in rect.iter_mut().zip(items) {
            *slot = number(self.resolve(item))?;
        }
        Some(rect)
    }

    fn info_dict(&self) -> Option<&Dictionary> {
        let info = self.inner.trailer.get(b"Info").ok()?;
        self.resolve(info).as_dict().ok()
    }

    fn ensure_info_dict(&mut self) -> Result<ObjectId> {
        let existing = match self.inner.trailer.get(b"Info") {
            Ok(Object::Reference(id)) if self.inner.get_dictionary(*id).is_ok() => return Ok(*id),
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        let id = self.inner.add_object(existing);
        self.inner.trailer.set("Info", id);
        Ok(id)
    }
}

impl OpenOutcome {
    pub fn into_result(self) -> Result<PdfDocument> {
        match self {
            OpenOutcome::Ready(doc) => Ok(doc),
            OpenOutcome::NeedsPassword => Err(PdfSmithError::PasswordRequired),
            OpenOutcome::WrongPassword => Err(PdfSmithError::IncorrectPassword),
            OpenOutcome::Malformed(reason) => Err(PdfSmithError::Load(reason)),
        }
    }
}

fn import_object(
    dest: &mut Document,
    source: &Document,
    object: &Object,
    id_map: &mut HashMap<ObjectId, ObjectId>,
) -> Object {
    match object {
        Object::Reference(id) => import_reference(dest, source, *id, id_map),
        Object::Array(items) => {
            let mut copied = Vec::with_capacity(items.len());
            for item in items {
                copied.push(import_object(dest, source, item, id_map));
            }
            Object::Array(copied)
        }
        Object::Dictionary(dict) => Object::Dictionary(import_dictionary(dest, source, dict, id_map)),
        Object::Stream(stream) => {
            let mut copied = stream.clone();
            copied.dict = import_dictionary(dest, source, &stream.dict, id_map);
            Object::Stream(copied)
        }
        other => other.clone(),
    }
}

fn import_dictionary(
    dest: &mut Document,
    source: &Document,
    dict: &Dictionary,
    id_map: &mut HashMap<ObjectId, ObjectId>,
) -> Dictionary {
    let mut copied = Dictionary::new();
    for (key, value) in dict.iter() {
        copied.set(key.clone(), import_object(dest, source, value, id_map));
    }
    copied
}

fn import_reference(
    dest: &mut Document,
    source: &Document,
    old_id: ObjectId,
    id_map: &mut HashMap<ObjectId, ObjectId>,
) -> Object {
    if let Some(&new_id) = id_map.get(&old_id) {
        return Object::Reference(new_id);
    }
    let Ok(object) = source.get_object(old_id) else {
        return Object::Null;
    };
    // Links into the rest of the source page tree would drag every page along
    if is_page_tree_node(object) {
        return Object::Null;
    }

    let new_id = dest.new_object_id();
    id_map.insert(old_id, new_id);
    let copied = import_object(dest, source, object, id_map);
    dest.objects.insert(new_id, copied);
    Object::Reference(new_id)
}

fn is_page_tree_node(object: &Object) -> bool {
    match object.as_dict().and_then(|d| d.get(b"Type")) {
        Ok(Object::Name(name)) => name == b"Page" || name == b"Pages",
        _ => false,
    }
}

fn strip_metadata_keys(info: &mut Dictionary) {
    for key in DocumentMetadata::KEYS {
        info.remove(key);
    }
}

pub(crate) fn normalize_angle(angle: i64) -> i32 {
    angle.rem_euclid(360) as i32
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

fn contains_token(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise PDFDocEncoding)
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    // Latin-1 agrees with PDFDocEncoding on every printable code used in practice
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a text string as a literal when it is ASCII, UTF-16BE otherwise
pub(crate) fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
