//! Wire schema shared by the catalog reader and writer.
//!
//! A compiled catalog is the 16-byte [`MAGIC`] followed by a sequence of blocks:
//!
//! ```text
//! block := tag:u8  length:u32be  payload[length]
//! ```
//!
//! The messages block is itself a concatenation of records made of inner
//! fields ([`FieldTag`]), each record terminated by [`FieldTag::End`].

/// Length of the magic marker opening every catalog.
pub const MAGIC_LENGTH: usize = 16;

/// Magic marker opening every catalog.
pub const MAGIC: [u8; MAGIC_LENGTH] = [
    0x3c, 0xb8, 0x64, 0x18, 0xca, 0xef, 0x9c, 0x95, 0xcd, 0x21, 0x1c, 0xbf, 0x60, 0xa1, 0xbd, 0xdd,
];

/// Length value meaning "null string" for length-prefixed strings.
pub const NULL_STRING_LEN: u32 = 0xFFFF_FFFF;

/// Size of one `(hash, offset)` pair in the hashes block.
pub const HASH_ENTRY_SIZE: usize = 8;

/// Pascal strings in the context pool carry a one-byte length.
pub const MAX_CONTEXT_NAME_LEN: usize = 255;

/// Pool offsets are stored halved in a u16, so the pool cannot grow past this.
pub const MAX_CONTEXT_POOL_SIZE: usize = 131_072;

/// Top-level block tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockTag {
    Contexts = 0x2f,
    Hashes = 0x42,
    Messages = 0x69,
    NumerusRules = 0x88,
    Dependencies = 0x96,
    Language = 0xa7,
}

impl BlockTag {
    /// Maps a raw tag byte to a known block, `None` for anything else.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x2f => Some(BlockTag::Contexts),
            0x42 => Some(BlockTag::Hashes),
            0x69 => Some(BlockTag::Messages),
            0x88 => Some(BlockTag::NumerusRules),
            0x96 => Some(BlockTag::Dependencies),
            0xa7 => Some(BlockTag::Language),
            _ => None,
        }
    }
}

/// Field tags inside a message record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldTag {
    End = 1,
    SourceText16 = 2,
    Translation = 3,
    Context16 = 4,
    Obsolete1 = 5,
    SourceText = 6,
    Context = 7,
    Comment = 8,
    Obsolete2 = 9,
}

impl FieldTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(FieldTag::End),
            2 => Some(FieldTag::SourceText16),
            3 => Some(FieldTag::Translation),
            4 => Some(FieldTag::Context16),
            5 => Some(FieldTag::Obsolete1),
            6 => Some(FieldTag::SourceText),
            7 => Some(FieldTag::Context),
            8 => Some(FieldTag::Comment),
            9 => Some(FieldTag::Obsolete2),
            _ => None,
        }
    }
}

/// How much of a record is shared with a neighbour that has the same hash,
/// from least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Prefix {
    NoPrefix = 0,
    Hash = 1,
    HashContext = 2,
    HashContextSourceText = 3,
    HashContextSourceTextComment = 4,
}

impl Prefix {
    /// Builds a prefix from its numeric level, saturating at the most specific one.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Prefix::NoPrefix,
            1 => Prefix::Hash,
            2 => Prefix::HashContext,
            3 => Prefix::HashContextSourceText,
            _ => Prefix::HashContextSourceTextComment,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Classic ELF string hash.
///
/// Hashing stops at the first NUL byte, mirroring the C-string walk the
/// format was defined with. A zero result is forced to 1 because 0 marks an
/// empty slot in lookup tables.
pub fn elf_hash(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &byte in bytes.iter().take_while(|&&b| b != 0) {
        h = (h << 4).wrapping_add(u32::from(byte));
        let g = h & 0xf000_0000;
        if g != 0 {
            h ^= g >> 24;
        }
        h &= !g;
    }
    if h == 0 { 1 } else { h }
}

/// Picks the context hash table size for a number of distinct contexts.
pub fn context_table_size(distinct_contexts: usize) -> u16 {
    let n = distinct_contexts;
    let size = if n < 200 {
        if n < 60 { 151 } else { 503 }
    } else if n < 2500 {
        if n < 750 { 1511 } else { 5003 }
    } else if n < 10000 {
        15013
    } else {
        3 * n / 2
    };
    u16::try_from(size).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elf_hash_known_values() {
        // h = ((0 << 4) + 'a') = 0x61
        assert_eq!(elf_hash(b"a"), 0x61);
        // h = (0x61 << 4) + 'b' = 0x672
        assert_eq!(elf_hash(b"ab"), 0x672);
        assert_eq!(elf_hash(b"Hello"), elf_hash(b"Hello"));
    }

    #[test]
    fn test_elf_hash_never_zero() {
        assert_eq!(elf_hash(b""), 1);
        assert_eq!(elf_hash(b"\0abc"), 1);
        for word in ["x", "OK", "QPushButton", "a much longer source text with spaces"] {
            assert_ne!(elf_hash(word.as_bytes()), 0, "hash of {:?} must be nonzero", word);
        }
    }

    #[test]
    fn test_elf_hash_stops_at_nul() {
        assert_eq!(elf_hash(b"abc\0def"), elf_hash(b"abc"));
    }

    #[test]
    fn test_elf_hash_folds_top_nibble() {
        // Long inputs must keep the top nibble clear after every step.
        let long = "The quick brown fox jumps over the lazy dog".repeat(8);
        assert_eq!(elf_hash(long.as_bytes()) & 0xf000_0000, 0);
    }

    #[test]
    fn test_context_table_size_breakpoints() {
        assert_eq!(context_table_size(0), 151);
        assert_eq!(context_table_size(59), 151);
        assert_eq!(context_table_size(60), 503);
        assert_eq!(context_table_size(199), 503);
        assert_eq!(context_table_size(200), 1511);
        assert_eq!(context_table_size(750), 5003);
        assert_eq!(context_table_size(2500), 15013);
        assert_eq!(context_table_size(10000), 15000);
        assert_eq!(context_table_size(100_000), u16::MAX);
    }

    #[test]
    fn test_prefix_ordering() {
        assert!(Prefix::NoPrefix < Prefix::Hash);
        assert!(Prefix::HashContext < Prefix::HashContextSourceText);
        assert_eq!(Prefix::from_level(7), Prefix::HashContextSourceTextComment);
        assert_eq!(Prefix::from_level(Prefix::HashContext.level()), Prefix::HashContext);
    }

    #[test]
    fn test_tag_bytes_round_trip() {
        for tag in [
            BlockTag::Contexts,
            BlockTag::Hashes,
            BlockTag::Messages,
            BlockTag::NumerusRules,
            BlockTag::Dependencies,
            BlockTag::Language,
        ] {
            assert_eq!(BlockTag::from_byte(tag as u8), Some(tag));
        }
        assert_eq!(BlockTag::from_byte(0), None);
        assert_eq!(FieldTag::from_byte(3), Some(FieldTag::Translation));
        assert_eq!(FieldTag::from_byte(42), None);
    }
}
