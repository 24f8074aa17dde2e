//! Serializes translation records into the compiled catalog layout.
//!
//! Records are kept sorted by (context, source text, comment). [`Releaser::squeeze`]
//! turns them into the payloads of the hashes, messages and contexts blocks;
//! [`Releaser::save`] then writes the tagged block stream.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use tracing::debug;

use crate::catalog::TranslationEntry;
use crate::error::{QmError, QmResult};
use crate::format::{
    BlockTag, FieldTag, MAGIC, MAX_CONTEXT_NAME_LEN, MAX_CONTEXT_POOL_SIZE, NULL_STRING_LEN,
    Prefix, context_table_size, elf_hash,
};
use crate::options::SaveMode;

/// Sort key of a record, compared bytewise field by field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MessageKey {
    context: Vec<u8>,
    source_text: Vec<u8>,
    comment: Vec<u8>,
}

impl MessageKey {
    fn new(context: &str, source_text: &str, comment: &str) -> Self {
        MessageKey {
            context: context.as_bytes().to_vec(),
            source_text: source_text.as_bytes().to_vec(),
            comment: comment.as_bytes().to_vec(),
        }
    }

    fn hash(&self) -> u32 {
        let mut bytes = Vec::with_capacity(self.source_text.len() + self.comment.len());
        bytes.extend_from_slice(&self.source_text);
        bytes.extend_from_slice(&self.comment);
        elf_hash(&bytes)
    }
}

fn common_prefix(m1: &MessageKey, m2: &MessageKey) -> Prefix {
    if m1.hash() != m2.hash() {
        return Prefix::NoPrefix;
    }
    if m1.context != m2.context {
        return Prefix::Hash;
    }
    if m1.source_text != m2.source_text {
        return Prefix::HashContext;
    }
    if m1.comment != m2.comment {
        return Prefix::HashContextSourceText;
    }
    Prefix::HashContextSourceTextComment
}

fn length_u32(what: &'static str, len: usize) -> QmResult<u32> {
    u32::try_from(len).map_err(|_| QmError::TooLarge { what, len })
}

/// Length-prefixed UTF-16BE string; an empty string is written as the null sentinel
/// when `empty_as_null` is set.
fn put_utf16(out: &mut Vec<u8>, text: &str, empty_as_null: bool) -> QmResult<()> {
    if text.is_empty() && empty_as_null {
        out.write_u32::<BigEndian>(NULL_STRING_LEN)?;
        return Ok(());
    }
    let units: Vec<u16> = text.encode_utf16().collect();
    out.write_u32::<BigEndian>(length_u32("UTF-16 string", units.len() * 2)?)?;
    for unit in units {
        out.write_u16::<BigEndian>(unit)?;
    }
    Ok(())
}

fn put_field(out: &mut Vec<u8>, tag: FieldTag, bytes: &[u8]) -> QmResult<()> {
    out.write_u8(tag as u8)?;
    out.write_u32::<BigEndian>(length_u32("string", bytes.len())?)?;
    out.write_all(bytes)?;
    Ok(())
}

/// Builds a compiled catalog from individual records.
#[derive(Debug, Default)]
pub struct Releaser {
    language: String,
    messages: BTreeMap<MessageKey, Vec<String>>,
    numerus_rules: Vec<u8>,
    dependencies: Vec<String>,

    message_array: Vec<u8>,
    offset_array: Vec<u8>,
    context_array: Vec<u8>,
    dependency_array: Vec<u8>,
    warnings: Vec<String>,
}

impl Releaser {
    pub fn new(language: &str) -> Self {
        Releaser {
            language: language.to_owned(),
            ..Default::default()
        }
    }

    /// Adds a record keyed by (context, source text, comment).
    ///
    /// Unless `force_comment` is set, the record is stored without its comment
    /// when no record already occupies the comment-less slot. A later record
    /// with the same key replaces the earlier one.
    pub fn insert(&mut self, entry: &TranslationEntry, translations: Vec<String>, force_comment: bool) {
        let key = MessageKey::new(&entry.context, &entry.source_text, &entry.comment);
        if !force_comment {
            let stripped = MessageKey {
                comment: Vec::new(),
                ..key.clone()
            };
            if !self.messages.contains_key(&stripped) {
                self.messages.insert(stripped, translations);
                return;
            }
        }
        self.messages.insert(key, translations);
    }

    /// Adds a record keyed by the entry id alone.
    pub fn insert_id_based(&mut self, entry: &TranslationEntry, translations: Vec<String>) {
        let key = MessageKey::new("", &entry.id, "");
        self.messages.insert(key, translations);
    }

    pub fn set_numerus_rules(&mut self, rules: &[u8]) {
        self.numerus_rules = rules.to_vec();
    }

    pub fn set_dependencies(&mut self, dependencies: &[String]) {
        self.dependencies = dependencies.to_vec();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Warnings raised by the last [`squeeze`](Self::squeeze).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn message_data(&self) -> &[u8] {
        &self.message_array
    }

    pub fn offset_data(&self) -> &[u8] {
        &self.offset_array
    }

    pub fn context_data(&self) -> &[u8] {
        &self.context_array
    }

    /// Builds the block payloads from the current records. Must run before [`save`](Self::save).
    ///
    /// Fails only when a string is too long for its 32-bit length field.
    pub fn squeeze(&mut self, mode: SaveMode) -> QmResult<()> {
        self.dependency_array.clear();
        for dependency in &self.dependencies {
            put_utf16(&mut self.dependency_array, dependency, false)?;
        }

        self.message_array.clear();
        self.offset_array.clear();
        self.context_array.clear();
        self.warnings.clear();

        if self.messages.is_empty() && mode == SaveMode::Everything {
            return Ok(());
        }

        let records: Vec<(&MessageKey, &Vec<String>)> = self.messages.iter().collect();
        let mut offsets: BTreeSet<(u32, u32)> = BTreeSet::new();
        let mut message_array = Vec::new();

        let mut cp_next = Prefix::NoPrefix;
        for (i, (key, translations)) in records.iter().enumerate() {
            let cp_prev = cp_next;
            cp_next = records
                .get(i + 1)
                .map(|(next, _)| common_prefix(key, next))
                .unwrap_or(Prefix::NoPrefix);
            offsets.insert((key.hash(), length_u32("messages block", message_array.len())?));
            let prefix = Prefix::from_level(cp_prev.level().max(cp_next.level() + 1));
            write_message(key, translations, &mut message_array, mode, prefix)?;
        }

        for (hash, offset) in &offsets {
            self.offset_array.write_u32::<BigEndian>(*hash)?;
            self.offset_array.write_u32::<BigEndian>(*offset)?;
        }
        self.message_array = message_array;

        if mode == SaveMode::Stripped {
            let contexts: BTreeSet<&[u8]> = records.iter().map(|(k, _)| k.context.as_slice()).collect();
            match build_context_table(&contexts) {
                Ok((array, truncated)) => {
                    self.context_array = array;
                    for len in truncated {
                        debug!(len, "Releaser::squeeze: context name truncated");
                        self.warnings.push(format!(
                            "Context name of {} bytes truncated to {} bytes",
                            len, MAX_CONTEXT_NAME_LEN
                        ));
                    }
                }
                Err(pool_size) => {
                    debug!(pool_size, "Releaser::squeeze: Too many contexts");
                    self.warnings.push(format!(
                        "Too many contexts: context pool of {} bytes exceeds {} bytes, context table omitted",
                        pool_size, MAX_CONTEXT_POOL_SIZE
                    ));
                }
            }
        }

        debug!(
            messages = self.messages.len(),
            message_bytes = self.message_array.len(),
            hash_bytes = self.offset_array.len(),
            context_bytes = self.context_array.len(),
            "squeezed catalog"
        );
        Ok(())
    }

    /// Writes the magic marker followed by every non-empty block.
    pub fn save(&self, out: &mut impl Write) -> QmResult<()> {
        out.write_all(&MAGIC)?;
        write_block(out, BlockTag::Language, self.language.as_bytes())?;
        write_block(out, BlockTag::Dependencies, &self.dependency_array)?;
        write_block(out, BlockTag::Hashes, &self.offset_array)?;
        write_block(out, BlockTag::Messages, &self.message_array)?;
        write_block(out, BlockTag::Contexts, &self.context_array)?;
        write_block(out, BlockTag::NumerusRules, &self.numerus_rules)?;
        Ok(())
    }
}

fn write_block(out: &mut impl Write, tag: BlockTag, payload: &[u8]) -> QmResult<()> {
    if payload.is_empty() {
        return Ok(());
    }
    let len = length_u32("block", payload.len())?;
    out.write_u8(tag as u8)?;
    out.write_u32::<BigEndian>(len)?;
    out.write_all(payload)?;
    Ok(())
}

fn write_message(
    key: &MessageKey,
    translations: &[String],
    out: &mut Vec<u8>,
    mode: SaveMode,
    prefix: Prefix,
) -> QmResult<()> {
    for translation in translations {
        out.write_u8(FieldTag::Translation as u8)?;
        put_utf16(out, translation, true)?;
    }

    let prefix = match mode {
        SaveMode::Everything => Prefix::HashContextSourceTextComment,
        SaveMode::Stripped => prefix,
    };

    match prefix {
        Prefix::HashContext => {
            put_field(out, FieldTag::Context, &key.context)?;
        }
        Prefix::HashContextSourceText => {
            put_field(out, FieldTag::SourceText, &key.source_text)?;
            put_field(out, FieldTag::Context, &key.context)?;
        }
        Prefix::NoPrefix | Prefix::Hash | Prefix::HashContextSourceTextComment => {
            put_field(out, FieldTag::Comment, &key.comment)?;
            put_field(out, FieldTag::SourceText, &key.source_text)?;
            put_field(out, FieldTag::Context, &key.context)?;
        }
    }

    out.write_u8(FieldTag::End as u8)?;
    Ok(())
}

/// Builds the contexts block:
///
/// ```text
/// table_size:u16  table[table_size]:u16  pool
/// ```
///
/// `table[h]` holds half the pool offset of the first context whose hash
/// lands in bucket `h` (0 for an empty bucket). The pool is a run of Pascal
/// strings; a bucket's strings are padded with an empty string so the next
/// bucket starts at an even offset. Offset 0 of the pool is never used.
///
/// Returns the table with the original lengths of any clipped names, or the
/// pool size as the error when it exceeds the format's limit.
fn build_context_table(contexts: &BTreeSet<&[u8]>) -> Result<(Vec<u8>, Vec<usize>), usize> {
    let table_size = context_table_size(contexts.len());

    let mut buckets: BTreeMap<u16, Vec<&[u8]>> = BTreeMap::new();
    for context in contexts {
        let bucket = (elf_hash(context) % u32::from(table_size)) as u16;
        buckets.entry(bucket).or_default().push(context);
    }

    let mut table = vec![0u16; usize::from(table_size)];
    let mut pool: Vec<u8> = vec![0, 0];
    let mut truncated = Vec::new();
    for (bucket, names) in buckets {
        table[usize::from(bucket)] = (pool.len() >> 1) as u16;
        for name in names {
            if name.len() > MAX_CONTEXT_NAME_LEN {
                truncated.push(name.len());
            }
            let len = name.len().min(MAX_CONTEXT_NAME_LEN);
            pool.push(len as u8);
            pool.extend_from_slice(&name[..len]);
        }
        if pool.len() & 1 == 1 {
            pool.push(0);
        }
    }

    if pool.len() > MAX_CONTEXT_POOL_SIZE {
        return Err(pool.len());
    }

    let mut array = Vec::with_capacity(2 + table.len() * 2 + pool.len());
    array.extend_from_slice(&table_size.to_be_bytes());
    for slot in table {
        array.extend_from_slice(&slot.to_be_bytes());
    }
    array.extend_from_slice(&pool);
    Ok((array, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(context: &str, source: &str, comment: &str) -> TranslationEntry {
        TranslationEntry::new(context, source, "").with_comment(comment)
    }

    fn utf16be(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    fn field(tag: FieldTag, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![tag as u8];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_save_without_records_writes_only_magic() {
        let mut releaser = Releaser::new("");
        releaser.squeeze(SaveMode::Everything).expect("squeeze");
        let mut out = Vec::new();
        releaser.save(&mut out).expect("writing to a Vec succeeds");
        assert_eq!(out, MAGIC.to_vec());
    }

    #[test]
    fn test_language_block_follows_magic() {
        let mut releaser = Releaser::new("de_DE");
        releaser.squeeze(SaveMode::Everything).expect("squeeze");
        let mut out = Vec::new();
        releaser.save(&mut out).expect("writing to a Vec succeeds");
        let mut expected = MAGIC.to_vec();
        expected.push(BlockTag::Language as u8);
        expected.extend_from_slice(&5u32.to_be_bytes());
        expected.extend_from_slice(b"de_DE");
        assert_eq!(out, expected);
    }

    #[test]
    fn test_full_record_encoding() {
        let mut releaser = Releaser::new("de");
        releaser.insert(&entry("Ctx", "Hi", ""), vec!["Hallo".into()], true);
        releaser.squeeze(SaveMode::Everything).expect("squeeze");

        let mut expected = vec![FieldTag::Translation as u8];
        expected.extend_from_slice(&10u32.to_be_bytes());
        expected.extend_from_slice(&utf16be("Hallo"));
        expected.extend(field(FieldTag::Comment, b""));
        expected.extend(field(FieldTag::SourceText, b"Hi"));
        expected.extend(field(FieldTag::Context, b"Ctx"));
        expected.push(FieldTag::End as u8);
        assert_eq!(releaser.message_data(), expected.as_slice());

        let mut offsets = elf_hash(b"Hi").to_be_bytes().to_vec();
        offsets.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(releaser.offset_data(), offsets.as_slice());
        assert!(releaser.context_data().is_empty(), "no context table when saving everything");
    }

    #[test]
    fn test_empty_translation_uses_null_sentinel() {
        let mut releaser = Releaser::new("");
        releaser.insert(&entry("", "x", ""), vec![String::new()], true);
        releaser.squeeze(SaveMode::Everything).expect("squeeze");
        let data = releaser.message_data();
        assert_eq!(data[0], FieldTag::Translation as u8);
        assert_eq!(&data[1..5], &NULL_STRING_LEN.to_be_bytes());
    }

    #[test]
    fn test_comment_dropped_unless_forced() {
        let mut releaser = Releaser::new("");
        releaser.insert(&entry("C", "S", "first"), vec!["a".into()], false);
        releaser.insert(&entry("C", "S", "second"), vec!["b".into()], false);
        releaser.insert(&entry("C", "T", "kept"), vec!["c".into()], true);
        let keys: Vec<&MessageKey> = releaser.messages.keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0].comment, b"");
        assert_eq!(keys[1].comment, b"second");
        assert_eq!(keys[2].comment, b"kept");
    }

    #[test]
    fn test_id_based_key() {
        let mut releaser = Releaser::new("");
        let e = entry("Ctx", "Source", "cmt").with_id("app.greeting");
        releaser.insert_id_based(&e, vec!["Hallo".into()]);
        let key = releaser.messages.keys().next().expect("one record");
        assert_eq!(key, &MessageKey::new("", "app.greeting", ""));
    }

    #[test]
    fn test_same_hash_neighbours_elide_fields() {
        // Same source and comment under two contexts: identical hashes.
        let mut releaser = Releaser::new("");
        releaser.insert(&entry("A", "Open", ""), vec!["1".into()], true);
        releaser.insert(&entry("B", "Open", ""), vec!["2".into()], true);
        releaser.squeeze(SaveMode::Stripped).expect("squeeze");

        let mut first = vec![FieldTag::Translation as u8];
        first.extend_from_slice(&2u32.to_be_bytes());
        first.extend_from_slice(&utf16be("1"));
        first.extend(field(FieldTag::Context, b"A"));
        first.push(FieldTag::End as u8);

        let mut second = vec![FieldTag::Translation as u8];
        second.extend_from_slice(&2u32.to_be_bytes());
        second.extend_from_slice(&utf16be("2"));
        second.extend(field(FieldTag::Comment, b""));
        second.extend(field(FieldTag::SourceText, b"Open"));
        second.extend(field(FieldTag::Context, b"B"));
        second.push(FieldTag::End as u8);

        let mut expected = first.clone();
        expected.extend(second);
        assert_eq!(releaser.message_data(), expected.as_slice());

        // Both hashes are equal, so the index is ordered by offset.
        let hash = elf_hash(b"Open").to_be_bytes();
        let mut offsets = hash.to_vec();
        offsets.extend_from_slice(&0u32.to_be_bytes());
        offsets.extend_from_slice(&hash);
        offsets.extend_from_slice(&(first.len() as u32).to_be_bytes());
        assert_eq!(releaser.offset_data(), offsets.as_slice());
    }

    #[test]
    fn test_shared_context_keeps_source_text() {
        // "ab" + "c" and "abc" + "" hash the same bytes.
        let mut releaser = Releaser::new("");
        releaser.insert(&entry("C", "ab", "c"), vec!["1".into()], true);
        releaser.insert(&entry("C", "abc", ""), vec!["2".into()], true);
        releaser.squeeze(SaveMode::Stripped).expect("squeeze");

        // Sorted order is ("C","ab","c") then ("C","abc",""); they share
        // hash and context, so the first record needs source text and context.
        let mut first = vec![FieldTag::Translation as u8];
        first.extend_from_slice(&2u32.to_be_bytes());
        first.extend_from_slice(&utf16be("1"));
        first.extend(field(FieldTag::SourceText, b"ab"));
        first.extend(field(FieldTag::Context, b"C"));
        first.push(FieldTag::End as u8);
        assert_eq!(&releaser.message_data()[..first.len()], first.as_slice());
    }

    #[test]
    fn test_everything_mode_never_elides() {
        let mut releaser = Releaser::new("");
        releaser.insert(&entry("A", "Open", ""), vec!["1".into()], true);
        releaser.insert(&entry("B", "Open", ""), vec!["2".into()], true);
        releaser.squeeze(SaveMode::Everything).expect("squeeze");
        let data = releaser.message_data();
        let comment_tags = data
            .windows(5)
            .filter(|w| w[0] == FieldTag::Comment as u8 && w[1..5] == [0, 0, 0, 0])
            .count();
        assert_eq!(comment_tags, 2, "every record carries its comment");
    }

    #[test]
    fn test_context_table_layout() {
        let mut releaser = Releaser::new("");
        releaser.insert(&entry("Ctx", "a", ""), vec!["x".into()], true);
        releaser.squeeze(SaveMode::Stripped).expect("squeeze");
        let data = releaser.context_data();

        assert_eq!(u16::from_be_bytes([data[0], data[1]]), 151);
        let bucket = (elf_hash(b"Ctx") % 151) as usize;
        let slot_at = 2 + bucket * 2;
        assert_eq!(u16::from_be_bytes([data[slot_at], data[slot_at + 1]]), 1);

        let pool = &data[2 + 151 * 2..];
        assert_eq!(pool, &[0, 0, 3, b'C', b't', b'x']);
    }

    #[test]
    fn test_context_table_pads_to_even_offsets() {
        let mut releaser = Releaser::new("");
        releaser.insert(&entry("ab", "a", ""), vec!["x".into()], true);
        releaser.squeeze(SaveMode::Stripped).expect("squeeze");
        let pool = &releaser.context_data()[2 + 151 * 2..];
        assert_eq!(pool, &[0, 0, 2, b'a', b'b', 0]);
    }

    #[test]
    fn test_long_context_truncated_in_table() {
        let long = "K".repeat(300);
        let mut releaser = Releaser::new("");
        releaser.insert(&entry(&long, "a", ""), vec!["x".into()], true);
        releaser.squeeze(SaveMode::Stripped).expect("squeeze");
        let pool = &releaser.context_data()[2 + 151 * 2..];
        assert_eq!(pool[2], 255);
        assert_eq!(pool.len(), 2 + 1 + 255);
        assert_eq!(
            releaser.warnings(),
            &["Context name of 300 bytes truncated to 255 bytes".to_string()]
        );
    }

    #[test]
    fn test_too_many_contexts_drops_table() {
        let mut releaser = Releaser::new("");
        for i in 0..1000 {
            let context = format!("{:0>200}", i);
            releaser.insert(&entry(&context, "s", ""), vec!["t".into()], true);
        }
        releaser.squeeze(SaveMode::Stripped).expect("squeeze");
        assert!(releaser.context_data().is_empty());
        assert_eq!(releaser.warnings().len(), 1);
        assert!(!releaser.message_data().is_empty(), "messages are still written");
    }

    #[test]
    fn test_block_order() {
        let mut releaser = Releaser::new("fr");
        releaser.set_dependencies(&["base_fr.qm".to_string()]);
        releaser.set_numerus_rules(&[0x03, 1]);
        releaser.insert(&entry("C", "S", ""), vec!["T".into()], true);
        releaser.squeeze(SaveMode::Stripped).expect("squeeze");
        let mut out = Vec::new();
        releaser.save(&mut out).expect("writing to a Vec succeeds");

        let mut tags = Vec::new();
        let mut pos = MAGIC.len();
        while pos < out.len() {
            tags.push(out[pos]);
            let len = u32::from_be_bytes([out[pos + 1], out[pos + 2], out[pos + 3], out[pos + 4]]);
            pos += 5 + len as usize;
        }
        assert_eq!(pos, out.len());
        assert_eq!(
            tags,
            vec![
                BlockTag::Language as u8,
                BlockTag::Dependencies as u8,
                BlockTag::Hashes as u8,
                BlockTag::Messages as u8,
                BlockTag::Contexts as u8,
                BlockTag::NumerusRules as u8,
            ]
        );
    }

    #[test]
    fn test_squeeze_is_repeatable() {
        let mut releaser = Releaser::new("");
        releaser.insert(&entry("C", "S", ""), vec!["T".into()], true);
        releaser.squeeze(SaveMode::Everything).expect("squeeze");
        let first = releaser.message_data().to_vec();
        releaser.squeeze(SaveMode::Everything).expect("squeeze");
        assert_eq!(releaser.message_data(), first.as_slice());
    }
}
