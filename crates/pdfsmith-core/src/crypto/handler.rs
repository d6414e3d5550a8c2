//! Reads an `/Encrypt` dictionary and applies the per-object cipher to a
//! whole document

use super::algorithms::{self, KeyParams};
use super::{aes, rc4};
use crate::error::{PdfSmithError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

/// Crypt filter method for strings or streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptMethod {
    Identity,
    Rc4,
    AesV2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Parameters of a Standard Security Handler as found in a document
#[derive(Debug, Clone)]
pub(crate) struct SecurityHandler {
    revision: u32,
    key_length: usize,
    owner_hash: Vec<u8>,
    user_hash: Vec<u8>,
    permissions: i32,
    encrypt_metadata: bool,
    stream_method: CryptMethod,
    string_method: CryptMethod,
    file_id: Vec<u8>,
}

impl SecurityHandler {
    pub(crate) fn from_document(doc: &Document) -> Result<Self> {
        let dict = encrypt_dictionary(doc)
            .ok_or_else(|| PdfSmithError::Decryption("missing /Encrypt dictionary".into()))?;

        match dict.get(b"Filter") {
            Ok(Object::Name(name)) if name == b"Standard" => {}
            _ => {
                return Err(PdfSmithError::Decryption(
                    "only the Standard security handler is supported".into(),
                ))
            }
        }

        let version = integer(doc, dict, b"V").unwrap_or(0);
        let revision = integer(doc, dict, b"R").unwrap_or(2) as u32;
        let length_bits = integer(doc, dict, b"Length").unwrap_or(40);

        let (key_length, stream_method, string_method) = match version {
            1 => (5, CryptMethod::Rc4, CryptMethod::Rc4),
            2 | 3 => ((length_bits / 8) as usize, CryptMethod::Rc4, CryptMethod::Rc4),
            4 => {
                let stream = crypt_filter(doc, dict, b"StmF")?;
                let string = crypt_filter(doc, dict, b"StrF")?;
                let length = crypt_filter_length(doc, dict).unwrap_or(16);
                (length, stream, string)
            }
            other => {
                return Err(PdfSmithError::Decryption(format!(
                    "security handler version {} is not supported",
                    other
                )))
            }
        };
        if !(2..=4).contains(&revision) {
            return Err(PdfSmithError::Decryption(format!(
                "security handler revision {} is not supported",
                revision
            )));
        }

        let owner_hash = string(doc, dict, b"O")
            .ok_or_else(|| PdfSmithError::Decryption("missing /O entry".into()))?;
        let user_hash = string(doc, dict, b"U")
            .ok_or_else(|| PdfSmithError::Decryption("missing /U entry".into()))?;
        // Some writers store /P as an unsigned 32-bit value
        let permissions = integer(doc, dict, b"P").unwrap_or(-4) as i32;
        let encrypt_metadata = !matches!(dict.get(b"EncryptMetadata"), Ok(Object::Boolean(false)));

        Ok(Self {
            revision,
            key_length,
            owner_hash,
            user_hash,
            permissions,
            encrypt_metadata,
            stream_method,
            string_method,
            file_id: file_id(doc),
        })
    }

    fn params(&self) -> KeyParams<'_> {
        KeyParams {
            revision: self.revision,
            key_length: self.key_length,
            owner_hash: &self.owner_hash,
            permissions: self.permissions,
            file_id: &self.file_id,
            encrypt_metadata: self.encrypt_metadata,
        }
    }

    /// Try `password` as the user password, then as the owner password
    pub(crate) fn authenticate(&self, password: &str) -> Result<ObjectCipher> {
        let password = algorithms::password_bytes(password);
        let params = self.params();
        let file_key = algorithms::authenticate_user(&password, &self.user_hash, &params)
            .or_else(|| algorithms::authenticate_owner(&password, &self.user_hash, &params))
            .ok_or(PdfSmithError::IncorrectPassword)?;

        Ok(ObjectCipher {
            file_key,
            stream_method: self.stream_method,
            string_method: self.string_method,
            encrypt_metadata: self.encrypt_metadata,
        })
    }
}

/// Per-object encryption keyed by an authenticated file key
pub(crate) struct ObjectCipher {
    file_key: Vec<u8>,
    stream_method: CryptMethod,
    string_method: CryptMethod,
    encrypt_metadata: bool,
}

impl ObjectCipher {
    pub(crate) fn new(file_key: Vec<u8>, method: CryptMethod, encrypt_metadata: bool) -> Self {
        Self {
            file_key,
            stream_method: method,
            string_method: method,
            encrypt_metadata,
        }
    }

    pub(crate) fn encrypt_document(&self, doc: &mut Document) -> Result<()> {
        self.apply(doc, Direction::Encrypt, None)
    }

    /// Decrypt every string and stream except the `/Encrypt` dictionary itself
    pub(crate) fn decrypt_document(&self, doc: &mut Document, skip: Option<ObjectId>) -> Result<()> {
        self.apply(doc, Direction::Decrypt, skip)
    }

    fn apply(&self, doc: &mut Document, direction: Direction, skip: Option<ObjectId>) -> Result<()> {
        for (&id, object) in doc.objects.iter_mut() {
            if Some(id) == skip {
                continue;
            }
            match object {
                Object::Stream(stream) => {
                    self.apply_strings(&mut stream.dict, id, direction);
                    if has_type(&stream.dict, b"XRef")
                        || (!self.encrypt_metadata && has_type(&stream.dict, b"Metadata"))
                    {
                        continue;
                    }
                    let content = self
                        .transform(self.stream_method, id, &stream.content, direction)
                        .map_err(|reason| stream_error(direction, id, reason))?;
                    stream.set_content(content);
                }
                other => self.apply_object_strings(other, id, direction),
            }
        }
        Ok(())
    }

    fn apply_strings(&self, dict: &mut Dictionary, id: ObjectId, direction: Direction) {
        for (_, value) in dict.iter_mut() {
            self.apply_object_strings(value, id, direction);
        }
    }

    fn apply_object_strings(&self, object: &mut Object, id: ObjectId, direction: Direction) {
        match object {
            Object::String(bytes, format) => {
                match self.transform(self.string_method, id, bytes, direction) {
                    Ok(transformed) => {
                        *bytes = transformed;
                        if direction == Direction::Encrypt {
                            *format = StringFormat::Hexadecimal;
                        }
                    }
                    // Producers occasionally leave strings in the clear; keep them as found
                    Err(reason) => tracing::debug!(?id, reason, "left undecryptable string as is"),
                }
            }
            Object::Array(items) => {
                for item in items {
                    self.apply_object_strings(item, id, direction);
                }
            }
            Object::Dictionary(dict) => self.apply_strings(dict, id, direction),
            _ => {}
        }
    }

    fn transform(
        &self,
        method: CryptMethod,
        id: ObjectId,
        data: &[u8],
        direction: Direction,
    ) -> std::result::Result<Vec<u8>, &'static str> {
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => Ok(rc4::rc4(&algorithms::object_key(&self.file_key, id, false), data)),
            CryptMethod::AesV2 => {
                let key = algorithms::object_key(&self.file_key, id, true);
                match direction {
                    Direction::Encrypt => aes::encrypt(&key, data),
                    Direction::Decrypt => aes::decrypt(&key, data),
                }
            }
        }
    }
}

fn stream_error(direction: Direction, id: ObjectId, reason: &str) -> PdfSmithError {
    let message = format!("stream {} {}: {}", id.0, id.1, reason);
    match direction {
        Direction::Encrypt => PdfSmithError::Encryption(message),
        Direction::Decrypt => PdfSmithError::Decryption(message),
    }
}

pub(crate) fn encrypt_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Encrypt").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// First element of the trailer `/ID`, empty when absent
pub(crate) fn file_id(doc: &Document) -> Vec<u8> {
    doc.trailer
        .get(b"ID")
        .and_then(Object::as_array)
        .ok()
        .and_then(|ids| ids.first())
        .and_then(|first| match first {
            Object::String(bytes, _) => Some(bytes.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

pub(crate) fn has_type(dict: &Dictionary, name: &[u8]) -> bool {
    matches!(dict.get(b"Type"), Ok(Object::Name(n)) if n == name)
}

fn resolved<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

fn integer(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok().map(|o| resolved(doc, o)).and_then(|o| o.as_i64().ok())
}

fn string(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Vec<u8>> {
    match resolved(doc, dict.get(key).ok()?) {
        Object::String(bytes, _) => Some(bytes.clone()),
        _ => None,
    }
}

/// Resolve `/StmF` or `/StrF` through the `/CF` map
fn crypt_filter(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<CryptMethod> {
    let name = match dict.get(key) {
        Ok(Object::Name(name)) => name.as_slice(),
        _ => return Ok(CryptMethod::Identity),
    };
    if name == b"Identity" {
        return Ok(CryptMethod::Identity);
    }

    let filter = dict
        .get(b"CF")
        .ok()
        .map(|cf| resolved(doc, cf))
        .and_then(|cf| cf.as_dict().ok())
        .and_then(|cf| cf.get(name).ok())
        .map(|f| resolved(doc, f))
        .and_then(|f| f.as_dict().ok())
        .ok_or_else(|| {
            PdfSmithError::Decryption(format!(
                "crypt filter {} is not defined",
                String::from_utf8_lossy(name)
            ))
        })?;

    match filter.get(b"CFM") {
        Ok(Object::Name(cfm)) if cfm == b"V2" => Ok(CryptMethod::Rc4),
        Ok(Object::Name(cfm)) if cfm == b"AESV2" => Ok(CryptMethod::AesV2),
        Ok(Object::Name(cfm)) if cfm == b"None" => Ok(CryptMethod::Identity),
        Ok(Object::Name(cfm)) => Err(PdfSmithError::Decryption(format!(
            "crypt filter method {} is not supported",
            String::from_utf8_lossy(cfm)
        ))),
        _ => Ok(CryptMethod::Identity),
    }
}

/// Key length of the stream crypt filter; `/Length` may be in bytes or bits
fn crypt_filter_length(doc: &Document, dict: &Dictionary) -> Option<usize> {
    let name = match dict.get(b"StmF") {
        Ok(Object::Name(name)) => name.clone(),
        _ => return None,
    };
    let cf = resolved(doc, dict.get(b"CF").ok()?).as_dict().ok()?;
    let filter = resolved(doc, cf.get(&name).ok()?).as_dict().ok()?;
    let length = integer(doc, filter, b"Length")? as usize;
    Some(if length > 16 { length / 8 } else { length })
}
