//! Password encryption with the PDF Standard Security Handler
//!
//! Encryption writes RC4-128 (V2, R3) by default or AES-128 (V4, R4) on
//! request. Decryption authenticates with either the user or the owner
//! password and accepts revisions 2 to 4.

mod aes;
mod algorithms;
mod handler;
mod rc4;

use crate::document::{OpenOutcome, PdfDocument};
use crate::error::{PdfSmithError, Result};
use handler::{CryptMethod, ObjectCipher, SecurityHandler};
use lopdf::xref::{XrefEntry, XrefType};
use lopdf::{dictionary, Document, Object, ObjectId, ObjectStream, Reader, StringFormat};
use std::collections::BTreeSet;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Passwords for a single encrypt call; never written anywhere in clear
#[derive(Debug, Clone)]
pub struct EncryptionDescriptor {
    pub user_password: String,
    /// Defaults to the user password
    pub owner_password: Option<String>,
}

impl EncryptionDescriptor {
    pub fn new(user_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: None,
        }
    }

    pub fn with_owner(mut self, owner_password: impl Into<String>) -> Self {
        self.owner_password = Some(owner_password.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionAlgorithm {
    #[default]
    Rc4_128,
    Aes128,
}

impl EncryptionAlgorithm {
    /// (V, R, minimum PDF version)
    fn parameters(self) -> (i64, u32, &'static str) {
        match self {
            EncryptionAlgorithm::Rc4_128 => (2, 3, "1.4"),
            EncryptionAlgorithm::Aes128 => (4, 4, "1.6"),
        }
    }

    fn method(self) -> CryptMethod {
        match self {
            EncryptionAlgorithm::Rc4_128 => CryptMethod::Rc4,
            EncryptionAlgorithm::Aes128 => CryptMethod::AesV2,
        }
    }
}

/// User access permissions granted when opened with the user password
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub print: bool,
    pub modify: bool,
    pub copy: bool,
    pub annotate: bool,
    pub fill_forms: bool,
    pub accessibility: bool,
    pub assemble: bool,
    pub print_high_quality: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            print: true,
            modify: true,
            copy: true,
            annotate: true,
            fill_forms: true,
            accessibility: true,
            assemble: true,
            print_high_quality: true,
        }
    }

    /// The `/P` value: reserved bits set, bits 1 and 2 clear
    pub fn bits(&self) -> i32 {
        let flags = [
            (self.print, 3),
            (self.modify, 4),
            (self.copy, 5),
            (self.annotate, 6),
            (self.fill_forms, 9),
            (self.accessibility, 10),
            (self.assemble, 11),
            (self.print_high_quality, 12),
        ];
        let p = flags
            .iter()
            .filter(|(granted, _)| *granted)
            .fold(0xFFFF_F0C0u32, |p, (_, bit)| p | 1 << (bit - 1));
        p as i32
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptOptions {
    pub algorithm: EncryptionAlgorithm,
    pub permissions: Permissions,
    pub encrypt_metadata: bool,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            algorithm: EncryptionAlgorithm::default(),
            permissions: Permissions::default(),
            encrypt_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionStatus {
    NotEncrypted,
    Encrypted,
    /// The bytes could not be parsed at all
    Unknown,
}

pub(crate) fn is_encrypted(doc: &Document) -> bool {
    doc.trailer.has(b"Encrypt")
}

/// Password-protect a document
pub fn encrypt(
    bytes: &[u8],
    descriptor: &EncryptionDescriptor,
    options: &EncryptOptions,
) -> Result<Vec<u8>> {
    if descriptor.user_password.is_empty() {
        return Err(PdfSmithError::Encryption(
            "a user password is required".into(),
        ));
    }

    let mut doc = PdfDocument::load_raw(bytes)?;
    if is_encrypted(&doc) {
        return Err(PdfSmithError::Encryption(
            "document is already encrypted".into(),
        ));
    }
    strip_cross_reference_streams(&mut doc);
    let file_id = ensure_file_id(&mut doc);

    let (version, revision, min_version) = options.algorithm.parameters();
    let user = algorithms::password_bytes(&descriptor.user_password);
    let owner = descriptor
        .owner_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(algorithms::password_bytes)
        .unwrap_or_else(|| user.clone());
    let permissions = options.permissions.bits();

    let owner_hash = algorithms::compute_owner_hash(&owner, &user, revision, 16);
    let params = algorithms::KeyParams {
        revision,
        key_length: 16,
        owner_hash: &owner_hash,
        permissions,
        file_id: &file_id,
        encrypt_metadata: options.encrypt_metadata,
    };
    let file_key = algorithms::compute_file_key(&user, &params);
    let user_hash = algorithms::compute_user_hash(&file_key, &file_id, revision);

    ObjectCipher::new(file_key, options.algorithm.method(), options.encrypt_metadata)
        .encrypt_document(&mut doc)?;

    let mut encrypt = dictionary! {
        "Filter" => "Standard",
        "V" => version,
        "R" => revision as i64,
        "Length" => 128,
        "O" => Object::String(owner_hash, StringFormat::Hexadecimal),
        "U" => Object::String(user_hash, StringFormat::Hexadecimal),
        "P" => permissions as i64,
    };
    if options.algorithm == EncryptionAlgorithm::Aes128 {
        encrypt.set(
            "CF",
            dictionary! {
                "StdCF" => dictionary! {
                    "Type" => "CryptFilter",
                    "CFM" => "AESV2",
                    "AuthEvent" => "DocOpen",
                    "Length" => 16,
                },
            },
        );
        encrypt.set("StmF", "StdCF");
        encrypt.set("StrF", "StdCF");
        if !options.encrypt_metadata {
            encrypt.set("EncryptMetadata", false);
        }
    }
    let encrypt_id = doc.add_object(encrypt);
    doc.trailer.set("Encrypt", encrypt_id);
    raise_version(&mut doc, min_version);

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| PdfSmithError::Encryption(e.to_string()))?;
    if output.is_empty() {
        return Err(PdfSmithError::Encryption(
            "encryption produced an empty document".into(),
        ));
    }
    tracing::debug!(algorithm = ?options.algorithm, size = output.len(), "encrypted document");
    Ok(output)
}

/// Remove password protection, decrypting every string and stream
pub fn decrypt(bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut doc =
        PdfDocument::load_raw(bytes).map_err(|e| PdfSmithError::Decryption(e.to_string()))?;
    if !is_encrypted(&doc) {
        return Err(PdfSmithError::NotEncrypted);
    }
    decrypt_in_place(&mut doc, bytes, password)?;

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| PdfSmithError::Decryption(e.to_string()))?;
    tracing::debug!(size = output.len(), "decrypted document");
    Ok(output)
}

/// Authenticate and decrypt; the document is untouched when the password is wrong.
///
/// `bytes` must be the buffer `doc` was loaded from: object streams are
/// re-read from it because the loader cannot parse them while encrypted.
pub(crate) fn decrypt_in_place(doc: &mut Document, bytes: &[u8], password: &str) -> Result<()> {
    let handler = SecurityHandler::from_document(doc)?;
    let cipher = handler.authenticate(password)?;

    let encrypt_id = doc
        .trailer
        .get(b"Encrypt")
        .and_then(Object::as_reference)
        .ok();
    reload_object_streams(doc, bytes);
    cipher.decrypt_document(doc, encrypt_id)?;

    if let Some(id) = encrypt_id {
        doc.objects.remove(&id);
    }
    doc.trailer.remove(b"Encrypt");
    expand_object_streams(doc);
    strip_cross_reference_streams(doc);
    Ok(())
}

/// Restore object stream containers to their on-disk ciphertext.
///
/// The loader drops a container it fails to parse, and anything it did
/// manage to parse out of ciphertext is garbage, so compressed members are
/// removed and every container is read again from its xref offset.
fn reload_object_streams(doc: &mut Document, bytes: &[u8]) {
    let mut containers = BTreeSet::new();
    let mut members = Vec::new();
    for (&number, entry) in &doc.reference_table.entries {
        if let XrefEntry::Compressed { container, .. } = entry {
            containers.insert(*container);
            members.push((number, 0));
        }
    }
    if containers.is_empty() {
        return;
    }
    for id in members {
        doc.objects.remove(&id);
    }

    let mut reader = Reader {
        buffer: bytes,
        document: Document::new(),
    };
    reader.document.reference_table = doc.reference_table.clone();

    for number in containers {
        let generation = match doc.reference_table.entries.get(&number) {
            Some(XrefEntry::Normal { generation, .. }) => *generation,
            _ => continue,
        };
        let id = (number, generation);
        match reader.get_object(id) {
            Ok(object) => {
                doc.objects.insert(id, object);
            }
            Err(err) => tracing::debug!(?id, %err, "object stream container unreadable"),
        }
    }
}

pub fn detect_encryption(bytes: &[u8]) -> EncryptionStatus {
    match PdfDocument::open(bytes, None) {
        OpenOutcome::Ready(_) => EncryptionStatus::NotEncrypted,
        OpenOutcome::NeedsPassword | OpenOutcome::WrongPassword => EncryptionStatus::Encrypted,
        OpenOutcome::Malformed(_) => EncryptionStatus::Unknown,
    }
}

/// Members of encrypted object streams only become readable once decrypted
fn expand_object_streams(doc: &mut Document) {
    let containers: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter(|(_, object)| matches!(object, Object::Stream(s) if handler::has_type(&s.dict, b"ObjStm")))
        .map(|(id, _)| *id)
        .collect();

    for id in containers {
        let Some(Object::Stream(mut stream)) = doc.objects.remove(&id) else {
            continue;
        };
        match ObjectStream::new(&mut stream) {
            Ok(parsed) => {
                for (member, object) in parsed.objects {
                    doc.objects.entry(member).or_insert(object);
                }
            }
            Err(err) => tracing::debug!(?id, %err, "skipped unreadable object stream"),
        }
    }
}

/// Entries a cross-reference stream dictionary leaves behind in the trailer
const XREF_STREAM_KEYS: [&[u8]; 7] = [
    b"Type",
    b"W",
    b"Index",
    b"Length",
    b"Filter",
    b"DecodeParms",
    b"XRefStm",
];

/// Write a classic cross-reference table with every object at top level
fn strip_cross_reference_streams(doc: &mut Document) {
    doc.objects.retain(|_, object| match object {
        Object::Stream(stream) => {
            !handler::has_type(&stream.dict, b"XRef") && !handler::has_type(&stream.dict, b"ObjStm")
        }
        _ => true,
    });
    doc.reference_table.cross_reference_type = XrefType::CrossReferenceTable;
    for key in XREF_STREAM_KEYS {
        doc.trailer.remove(key);
    }
}

fn ensure_file_id(doc: &mut Document) -> Vec<u8> {
    let existing = handler::file_id(doc);
    if !existing.is_empty() {
        return existing;
    }
    let mut id = vec![0u8; 16];
    OsRng.fill_bytes(&mut id);
    doc.trailer.set(
        "ID",
        vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id.clone(), StringFormat::Hexadecimal),
        ],
    );
    id
}

fn raise_version(doc: &mut Document, minimum: &str) {
    let parse = |v: &str| v.trim().parse::<f32>().unwrap_or(0.0);
    if parse(&doc.version) < parse(minimum) {
        doc.version = minimum.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_pdf, build_pdf_with_title, PageSpec};
    use pretty_assertions::assert_eq;

    fn three_pages() -> Vec<u8> {
        build_pdf_with_title(
            &[
                PageSpec::labeled("first"),
                PageSpec::labeled("second"),
                PageSpec::labeled("third"),
            ],
            Some("Secret Plans"),
        )
    }

    #[test]
    fn test_permission_bits() {
        assert_eq!(Permissions::all().bits(), -4);

        let none = Permissions {
            print: false,
            modify: false,
            copy: false,
            annotate: false,
            fill_forms: false,
            accessibility: false,
            assemble: false,
            print_high_quality: false,
        };
        assert_eq!(none.bits() as u32, 0xFFFF_F0C0);

        let print_only = Permissions { print: true, ..none };
        assert_eq!(print_only.bits() as u32, 0xFFFF_F0C4);
    }

    #[test]
    fn test_encrypt_then_open_requires_password() {
        let encrypted = encrypt(&three_pages(), &EncryptionDescriptor::new("pw"), &EncryptOptions::default()).unwrap();

        assert_eq!(detect_encryption(&encrypted), EncryptionStatus::Encrypted);
        assert!(matches!(PdfDocument::open(&encrypted, None), OpenOutcome::NeedsPassword));
        assert!(matches!(
            PdfDocument::open(&encrypted, Some("nope")),
            OpenOutcome::WrongPassword
        ));
        let doc = PdfDocument::load_with_password(&encrypted, "pw").unwrap();
        assert_eq!(doc.page_count(), 3);
    }

    #[test]
    fn test_encrypted_bytes_hide_content() {
        let encrypted = encrypt(&three_pages(), &EncryptionDescriptor::new("pw"), &EncryptOptions::default()).unwrap();
        let contains = |needle: &[u8]| encrypted.windows(needle.len()).any(|w| w == needle);
        assert!(!contains(b"Secret Plans"));
        assert!(!contains(b"(second)"));
        assert!(contains(b"/Encrypt"));
    }

    #[test]
    fn test_decrypt_restores_content_and_metadata() {
        for algorithm in [EncryptionAlgorithm::Rc4_128, EncryptionAlgorithm::Aes128] {
            let original = three_pages();
            let options = EncryptOptions {
                algorithm,
                ..Default::default()
            };
            let encrypted = encrypt(&original, &EncryptionDescriptor::new("pw"), &options).unwrap();
            let decrypted = decrypt(&encrypted, "pw").unwrap();

            let before = PdfDocument::load(&original).unwrap();
            let after = PdfDocument::load(&decrypted).unwrap();
            assert_eq!(detect_encryption(&decrypted), EncryptionStatus::NotEncrypted);
            assert_eq!(after.page_count(), 3);
            assert_eq!(after.metadata(), before.metadata());
            for index in 0..3 {
                assert_eq!(after.page_content(index).unwrap(), before.page_content(index).unwrap());
            }
        }
    }

    #[test]
    fn test_owner_password_also_decrypts() {
        let descriptor = EncryptionDescriptor::new("reader").with_owner("admin");
        let encrypted = encrypt(&three_pages(), &descriptor, &EncryptOptions::default()).unwrap();

        assert!(decrypt(&encrypted, "reader").is_ok());
        assert!(decrypt(&encrypted, "admin").is_ok());
        assert!(matches!(
            decrypt(&encrypted, "guest"),
            Err(PdfSmithError::IncorrectPassword)
        ));
    }

    #[test]
    fn test_encrypt_rejects_empty_password_and_double_encryption() {
        let pdf = build_pdf(&[PageSpec::default()]);
        assert!(matches!(
            encrypt(&pdf, &EncryptionDescriptor::new(""), &EncryptOptions::default()),
            Err(PdfSmithError::Encryption(_))
        ));

        let encrypted = encrypt(&pdf, &EncryptionDescriptor::new("pw"), &EncryptOptions::default()).unwrap();
        assert!(matches!(
            encrypt(&encrypted, &EncryptionDescriptor::new("pw"), &EncryptOptions::default()),
            Err(PdfSmithError::Encryption(_))
        ));
    }

    #[test]
    fn test_decrypt_plain_document() {
        let pdf = build_pdf(&[PageSpec::default()]);
        assert!(matches!(decrypt(&pdf, "pw"), Err(PdfSmithError::NotEncrypted)));
    }

    #[test]
    fn test_detect_garbage_is_unknown() {
        assert_eq!(detect_encryption(b"%PDF-garbage"), EncryptionStatus::Unknown);
    }

    #[test]
    fn test_encrypt_raises_version_for_aes() {
        let mut doc = Document::with_version("1.3");
        raise_version(&mut doc, "1.6");
        assert_eq!(doc.version, "1.6");
        raise_version(&mut doc, "1.4");
        assert_eq!(doc.version, "1.6");
    }
}
