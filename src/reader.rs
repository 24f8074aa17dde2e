//! Parses compiled catalogs back into translation entries.
//!
//! The whole file is held in memory. After the magic check the top-level
//! blocks are walked once; the hashes and messages blocks are only borrowed,
//! the small metadata blocks are decoded as they are met (a repeated block
//! replaces the earlier one). Records are then decoded in index order.
//!
//! Records written in stripped mode may omit context, source text or
//! comment. An omitted field keeps the value decoded for the previous record
//! in index order, so decoding is sequential and carries a [`RecordState`].

use std::io::Read;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, warn};

use crate::catalog::{Catalog, EntryType, TranslationEntry};
use crate::error::{QmError, QmResult};
use crate::format::{
    BlockTag, FieldTag, HASH_ENTRY_SIZE, MAGIC, MAGIC_LENGTH, NULL_STRING_LEN, elf_hash,
};
use crate::numerus::{BuiltinNumerus, NumerusProvider};

const PLURAL_MARKER: &str = "%n";

/// Bounds-checked forward reader over a byte slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Cursor { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take(&mut self, len: usize, what: &'static str) -> QmResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(QmError::Truncated {
                what,
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_u8(&mut self, what: &'static str) -> QmResult<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn read_u16(&mut self, what: &'static str) -> QmResult<u16> {
        Ok(BigEndian::read_u16(self.take(2, what)?))
    }

    fn read_u32(&mut self, what: &'static str) -> QmResult<u32> {
        Ok(BigEndian::read_u32(self.take(4, what)?))
    }
}

/// Decodes UTF-8 strictly; on failure the lossy text is kept and `failed` is set.
fn decode_utf8(bytes: &[u8], failed: &mut bool) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => {
            *failed = true;
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Reads a length-prefixed UTF-16BE string; the null sentinel yields "".
fn read_utf16(cursor: &mut Cursor<'_>, what: &'static str) -> QmResult<String> {
    let len = cursor.read_u32(what)?;
    if len == NULL_STRING_LEN {
        return Ok(String::new());
    }
    if len & 1 != 0 {
        return Err(QmError::OddUtf16Length(len));
    }
    let bytes = cursor.take(len as usize, what)?;
    let units: Vec<u16> = bytes.chunks_exact(2).map(BigEndian::read_u16).collect();
    Ok(String::from_utf16_lossy(&units))
}

/// Reads a length-prefixed UTF-8 byte string; the null sentinel yields "".
fn read_utf8(cursor: &mut Cursor<'_>, what: &'static str, failed: &mut bool) -> QmResult<String> {
    let len = cursor.read_u32(what)?;
    if len == NULL_STRING_LEN {
        return Ok(String::new());
    }
    let bytes = cursor.take(len as usize, what)?;
    Ok(decode_utf8(bytes, failed))
}

/// Fields that carry over from one record to the next when omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordState {
    pub context: String,
    pub source_text: String,
    pub comment: String,
}

/// The context lookup table stored by stripped catalogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextIndex {
    table: Vec<u16>,
    pool: Vec<u8>,
}

impl ContextIndex {
    pub fn parse(data: &[u8]) -> QmResult<Self> {
        let mut cursor = Cursor::new(data, 0);
        let size = cursor.read_u16("context table size")?;
        let mut table = Vec::with_capacity(usize::from(size));
        for _ in 0..size {
            table.push(cursor.read_u16("context table")?);
        }
        let pool = cursor.take(cursor.remaining(), "context pool")?.to_vec();
        Ok(ContextIndex { table, pool })
    }

    pub fn table_size(&self) -> usize {
        self.table.len()
    }

    /// Looks a context up the way the runtime does: hash to a bucket, then
    /// scan Pascal strings until a match or an empty string.
    pub fn contains(&self, context: &str) -> bool {
        if self.table.is_empty() {
            return false;
        }
        let bytes = context.as_bytes();
        let bucket = elf_hash(bytes) as usize % self.table.len();
        let slot = self.table[bucket];
        if slot == 0 {
            return false;
        }
        let mut pos = usize::from(slot) << 1;
        while let Some(&len) = self.pool.get(pos) {
            let len = usize::from(len);
            if len == 0 {
                return false;
            }
            let Some(name) = self.pool.get(pos + 1..pos + 1 + len) else {
                return false;
            };
            if name == bytes {
                return true;
            }
            pos += 1 + len;
        }
        false
    }

    /// Every context name stored in the pool, in pool order.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut pos = 2;
        while let Some(&len) = self.pool.get(pos) {
            let len = usize::from(len);
            pos += 1;
            if len == 0 {
                continue;
            }
            let Some(name) = self.pool.get(pos..pos + len) else {
                break;
            };
            names.push(String::from_utf8_lossy(name).into_owned());
            pos += len;
        }
        names
    }
}

/// Everything recovered from a compiled catalog.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub catalog: Catalog,
    /// `(hash, offset)` pairs in file order.
    pub index: Vec<(u32, u32)>,
    /// Present when the file carries a well-formed contexts block.
    pub contexts: Option<ContextIndex>,
}

/// Parses a catalog with the built-in plural rules.
pub fn load_catalog(data: &[u8]) -> QmResult<Catalog> {
    load_catalog_with(data, &BuiltinNumerus)
}

pub fn load_catalog_with(data: &[u8], provider: &dyn NumerusProvider) -> QmResult<Catalog> {
    decode(data, provider).map(|decoded| decoded.catalog)
}

/// Reads a whole stream into memory and parses it.
pub fn read_catalog(reader: &mut impl Read) -> QmResult<Catalog> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    load_catalog(&data)
}

/// Parses a catalog, keeping the raw index and context table alongside the entries.
pub fn decode(data: &[u8], provider: &dyn NumerusProvider) -> QmResult<DecodedFile> {
    if data.len() < MAGIC_LENGTH || data[..MAGIC_LENGTH] != MAGIC {
        return Err(QmError::BadMagic);
    }

    let mut catalog = Catalog::new();
    let mut messages: &[u8] = &[];
    let mut hashes: &[u8] = &[];
    let mut contexts = None;
    let mut utf8_failed = false;

    let mut cursor = Cursor::new(data, MAGIC_LENGTH);
    while cursor.remaining() > 4 {
        let tag = cursor.read_u8("block tag")?;
        let len = cursor.read_u32("block length")?;
        if tag == 0 || len == 0 {
            break;
        }
        let payload = cursor.take(len as usize, "block")?;
        debug!(tag, len, "catalog block");

        match BlockTag::from_byte(tag) {
            Some(BlockTag::Hashes) => hashes = payload,
            Some(BlockTag::Messages) => messages = payload,
            Some(BlockTag::Dependencies) => {
                let mut deps = Cursor::new(payload, 0);
                let mut dependencies = Vec::new();
                while deps.remaining() > 0 {
                    match read_utf16(&mut deps, "dependency") {
                        Ok(dependency) => dependencies.push(dependency),
                        Err(e) => {
                            warn!("stopping at malformed dependency: {}", e);
                            break;
                        }
                    }
                }
                catalog.dependencies = dependencies;
            }
            Some(BlockTag::Language) => {
                catalog.language_code = decode_utf8(payload, &mut utf8_failed);
            }
            Some(BlockTag::NumerusRules) => catalog.numerus_rules = payload.to_vec(),
            Some(BlockTag::Contexts) => match ContextIndex::parse(payload) {
                Ok(index) => contexts = Some(index),
                Err(e) => {
                    warn!("ignoring malformed context table: {}", e);
                    contexts = None;
                }
            },
            None => debug!(tag, "skipping unknown block"),
        }
    }

    let guess_plurals = provider
        .numerus_info(&catalog.language_code)
        .map(|info| info.forms == 1)
        .unwrap_or(true);

    let item_count = hashes.len() / HASH_ENTRY_SIZE;
    let mut index = Vec::with_capacity(item_count);
    let mut state = RecordState::default();

    for item in hashes.chunks_exact(HASH_ENTRY_SIZE) {
        let hash = BigEndian::read_u32(&item[0..4]);
        let offset = BigEndian::read_u32(&item[4..8]);
        index.push((hash, offset));

        if offset as usize >= messages.len() {
            return Err(QmError::MessageOffset {
                offset,
                len: messages.len(),
            });
        }
        let translations = decode_record(messages, offset as usize, &mut state, &mut utf8_failed)?;

        let is_plural = if translations.len() > 1 {
            true
        } else {
            guess_plurals && state.source_text.contains(PLURAL_MARKER)
        };

        catalog.push(TranslationEntry {
            context: state.context.clone(),
            source_text: state.source_text.clone(),
            comment: state.comment.clone(),
            translations,
            id: String::new(),
            entry_type: EntryType::Finished,
            is_plural,
        });
    }

    if utf8_failed {
        return Err(QmError::InvalidUtf8);
    }

    debug!(
        entries = catalog.len(),
        language = %catalog.language_code,
        "decoded catalog"
    );

    Ok(DecodedFile {
        catalog,
        index,
        contexts,
    })
}

/// Decodes one record starting at `offset`, updating `state` with every
/// field the record carries, and returns its translations.
fn decode_record(
    messages: &[u8],
    offset: usize,
    state: &mut RecordState,
    utf8_failed: &mut bool,
) -> QmResult<Vec<String>> {
    let mut cursor = Cursor::new(messages, offset);
    let mut translations = Vec::new();
    loop {
        let tag = cursor.read_u8("message field tag")?;
        match FieldTag::from_byte(tag) {
            Some(FieldTag::End) => break,
            Some(FieldTag::Translation) => {
                translations.push(read_utf16(&mut cursor, "translation")?);
            }
            Some(FieldTag::Obsolete1) => {
                cursor.take(4, "obsolete field")?;
            }
            Some(FieldTag::SourceText) => {
                state.source_text = read_utf8(&mut cursor, "source text", utf8_failed)?;
            }
            Some(FieldTag::Context) => {
                state.context = read_utf8(&mut cursor, "context", utf8_failed)?;
            }
            Some(FieldTag::Comment) => {
                state.comment = read_utf8(&mut cursor, "comment", utf8_failed)?;
            }
            _ => {}
        }
    }
    Ok(translations)
}
