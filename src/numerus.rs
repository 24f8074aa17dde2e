//! Locale plural rules ("numerus" rules) for compiled catalogs.
//!
//! A catalog carries a small bytecode program that the runtime evaluates to
//! pick the plural form for a count. Each rule is a boolean expression over
//! the count; the first rule that holds selects its form, and the form after
//! the last rule is the fallback. An empty program therefore means a single
//! form.
//!
//! ```text
//! rules := rule (NEWRULE rule)*
//! rule  := and (OR and)*
//! and   := term (AND term)*
//! term  := opcode operand [operand2 if BETWEEN]
//! ```
//!
//! Languages without a tabled program fall back to CLDR data (via ICU) for
//! their form count.

use std::sync::LazyLock;

use icu_locale::Locale;
use icu_plurals::{PluralCategory, PluralRuleType, PluralRules};
use regex::Regex;

pub const Q_EQ: u8 = 0x01;
pub const Q_LT: u8 = 0x02;
pub const Q_LEQ: u8 = 0x03;
pub const Q_BETWEEN: u8 = 0x04;
pub const Q_OP_MASK: u8 = 0x07;
pub const Q_NOT: u8 = 0x08;
pub const Q_MOD_10: u8 = 0x10;
pub const Q_MOD_100: u8 = 0x20;
pub const Q_LEAD_1000: u8 = 0x40;
pub const Q_AND: u8 = 0xFD;
pub const Q_OR: u8 = 0xFE;
pub const Q_NEWRULE: u8 = 0xFF;

pub const Q_NEQ: u8 = Q_NOT | Q_EQ;
pub const Q_GT: u8 = Q_NOT | Q_LEQ;
pub const Q_GEQ: u8 = Q_NOT | Q_LT;
pub const Q_NOT_BETWEEN: u8 = Q_NOT | Q_BETWEEN;

const NO_PLURAL_RULES: &[u8] = &[];
const ENGLISH_STYLE_RULES: &[u8] = &[Q_EQ, 1];
const FRENCH_STYLE_RULES: &[u8] = &[Q_LEQ, 1];
const LATVIAN_RULES: &[u8] = &[
    Q_MOD_10 | Q_EQ, 1, Q_AND, Q_MOD_100 | Q_NEQ, 11, Q_NEWRULE,
    Q_NEQ, 0,
];
const ICELANDIC_RULES: &[u8] = &[Q_MOD_10 | Q_EQ, 1, Q_AND, Q_MOD_100 | Q_NEQ, 11];
const IRISH_STYLE_RULES: &[u8] = &[Q_EQ, 1, Q_NEWRULE, Q_EQ, 2];
const GAELIC_STYLE_RULES: &[u8] = &[
    Q_EQ, 1, Q_OR, Q_EQ, 11, Q_NEWRULE,
    Q_EQ, 2, Q_OR, Q_EQ, 12, Q_NEWRULE,
    Q_BETWEEN, 3, 19,
];
const SLOVAK_STYLE_RULES: &[u8] = &[Q_EQ, 1, Q_NEWRULE, Q_BETWEEN, 2, 4];
const MACEDONIAN_RULES: &[u8] = &[Q_MOD_10 | Q_EQ, 1, Q_NEWRULE, Q_MOD_10 | Q_EQ, 2];
const LITHUANIAN_RULES: &[u8] = &[
    Q_MOD_10 | Q_EQ, 1, Q_AND, Q_MOD_100 | Q_NEQ, 11, Q_NEWRULE,
    Q_MOD_10 | Q_NEQ, 0, Q_AND, Q_MOD_100 | Q_NOT_BETWEEN, 10, 19,
];
const RUSSIAN_STYLE_RULES: &[u8] = &[
    Q_MOD_10 | Q_EQ, 1, Q_AND, Q_MOD_100 | Q_NEQ, 11, Q_NEWRULE,
    Q_MOD_10 | Q_BETWEEN, 2, 4, Q_AND, Q_MOD_100 | Q_NOT_BETWEEN, 10, 19,
];
const POLISH_RULES: &[u8] = &[
    Q_EQ, 1, Q_NEWRULE,
    Q_MOD_10 | Q_BETWEEN, 2, 4, Q_AND, Q_MOD_100 | Q_NOT_BETWEEN, 10, 19,
];
const ROMANIAN_RULES: &[u8] = &[
    Q_EQ, 1, Q_NEWRULE,
    Q_EQ, 0, Q_OR, Q_MOD_100 | Q_BETWEEN, 1, 19,
];
const SLOVENIAN_RULES: &[u8] = &[
    Q_MOD_100 | Q_EQ, 1, Q_NEWRULE,
    Q_MOD_100 | Q_EQ, 2, Q_NEWRULE,
    Q_MOD_100 | Q_BETWEEN, 3, 4,
];
const WELSH_RULES: &[u8] = &[
    Q_EQ, 0, Q_NEWRULE,
    Q_EQ, 1, Q_NEWRULE,
    Q_BETWEEN, 2, 5, Q_NEWRULE,
    Q_EQ, 6,
];
const ARABIC_RULES: &[u8] = &[
    Q_EQ, 0, Q_NEWRULE,
    Q_EQ, 1, Q_NEWRULE,
    Q_EQ, 2, Q_NEWRULE,
    Q_MOD_100 | Q_BETWEEN, 3, 10, Q_NEWRULE,
    Q_MOD_100 | Q_GEQ, 11,
];

static LANGUAGE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)([a-z]{2,3})(?:[_-]([a-z]{4}))?(?:[_-]([a-z]{2}|[0-9]{3}))?(?:[.@].*)?$")
        .expect("language code pattern is valid")
});

/// Plural rules and canonical form count for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumerusInfo {
    /// Rule bytecode; empty when the language has a single form or only CLDR data is known.
    pub rules: Vec<u8>,
    /// Number of plural forms translations for this locale carry.
    pub forms: usize,
}

/// Maps a catalog language code to its plural rules.
pub trait NumerusProvider {
    /// Returns `None` when the language is unknown to the provider.
    fn numerus_info(&self, language_code: &str) -> Option<NumerusInfo>;
}

/// Built-in rule table with a CLDR fallback for the form count.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinNumerus;

impl NumerusProvider for BuiltinNumerus {
    fn numerus_info(&self, language_code: &str) -> Option<NumerusInfo> {
        let (language, country) = language_and_country(language_code)?;
        if let Some(rules) = tabled_rules(&language, country.as_deref()) {
            let forms = count_rules(rules)? + 1;
            return Some(NumerusInfo {
                rules: rules.to_vec(),
                forms,
            });
        }
        let forms = cldr_form_count(&language, country.as_deref())?;
        Some(NumerusInfo {
            rules: Vec::new(),
            forms,
        })
    }
}

/// Splits a language code such as `pt_BR`, `sr-Latn-RS`, `de_DE.UTF-8` or
/// `ca_ES@valencia` into a lowercase language and an optional uppercase country.
pub fn language_and_country(language_code: &str) -> Option<(String, Option<String>)> {
    let caps = LANGUAGE_CODE_RE.captures(language_code.trim())?;
    let language = caps.get(1)?.as_str().to_lowercase();
    let country = caps.get(3).map(|m| m.as_str().to_uppercase());
    Some((language, country))
}

fn tabled_rules(language: &str, country: Option<&str>) -> Option<&'static [u8]> {
    let rules = match language {
        "ja" | "zh" | "ko" | "vi" | "th" | "id" | "ms" | "km" | "lo" | "my" | "bo" | "dz"
        | "jv" | "su" | "tr" | "hu" | "fa" | "tt" | "yo" | "om" | "gn" | "bi" | "fj" | "na"
        | "za" => NO_PLURAL_RULES,
        "pt" if country == Some("BR") => FRENCH_STYLE_RULES,
        "fr" | "fil" | "hy" | "ff" | "kab" | "ln" | "ti" | "oc" => FRENCH_STYLE_RULES,
        "en" | "de" | "nl" | "sv" | "da" | "nb" | "nn" | "no" | "fi" | "et" | "it" | "es"
        | "pt" | "ca" | "eu" | "gl" | "el" | "eo" | "bg" | "he" | "hi" | "bn" | "af"
        | "sq" | "az" | "ka" | "kk" | "ky" | "mn" | "ne" | "pa" | "ta" | "te" | "ur" | "uz"
        | "fo" | "fy" | "lb" | "ps" | "so" | "sw" | "ku" | "gu" | "kn" | "ml" | "mr" | "tk"
        | "ug" | "zu" | "xh" => ENGLISH_STYLE_RULES,
        "lv" => LATVIAN_RULES,
        "is" => ICELANDIC_RULES,
        "ga" | "se" | "iu" => IRISH_STYLE_RULES,
        "gd" => GAELIC_STYLE_RULES,
        "cs" | "sk" => SLOVAK_STYLE_RULES,
        "mk" => MACEDONIAN_RULES,
        "lt" => LITHUANIAN_RULES,
        "ru" | "uk" | "be" | "sr" | "hr" | "bs" => RUSSIAN_STYLE_RULES,
        "pl" => POLISH_RULES,
        "ro" | "mo" => ROMANIAN_RULES,
        "sl" => SLOVENIAN_RULES,
        "cy" => WELSH_RULES,
        "ar" => ARABIC_RULES,
        _ => return None,
    };
    Some(rules)
}

/// Counts plural categories reachable by integer counts, using CLDR cardinal rules.
fn cldr_form_count(language: &str, country: Option<&str>) -> Option<usize> {
    let tag = match country {
        Some(country) => format!("{}-{}", language, country),
        None => language.to_owned(),
    };
    let locale: Locale = tag.parse().ok()?;
    let pr = PluralRules::try_new(locale.into(), PluralRuleType::Cardinal.into()).ok()?;

    let mut seen: Vec<PluralCategory> = Vec::new();
    for n in 0..=1000usize {
        let category = pr.category_for(n);
        if !seen.contains(&category) {
            seen.push(category);
        }
    }
    Some(seen.len())
}

/// Walks one term and returns the index just past it.
fn skip_term(rules: &[u8], mut i: usize) -> Option<usize> {
    let opcode = *rules.get(i)?;
    i += 1;
    rules.get(i)?;
    i += 1;
    match opcode & Q_OP_MASK {
        Q_EQ | Q_LT | Q_LEQ => {}
        Q_BETWEEN => {
            rules.get(i)?;
            i += 1;
        }
        _ => return None,
    }
    Some(i)
}

/// Number of rules in a program, `None` if it is malformed.
pub fn count_rules(rules: &[u8]) -> Option<usize> {
    if rules.is_empty() {
        return Some(0);
    }
    let mut count = 1;
    let mut i = skip_term(rules, 0)?;
    while i < rules.len() {
        match rules[i] {
            Q_AND | Q_OR => {}
            Q_NEWRULE => count += 1,
            _ => return None,
        }
        i = skip_term(rules, i + 1)?;
    }
    Some(count)
}

/// Selects the plural form index for `n`, the way the runtime evaluates a program.
///
/// Returns `None` for malformed bytecode.
pub fn numerus_form(rules: &[u8], n: i64) -> Option<usize> {
    if rules.is_empty() {
        return Some(0);
    }
    let n = n.unsigned_abs();
    let mut result = 0;
    let mut i = 0;
    loop {
        let mut or_value = false;
        loop {
            let mut and_value = true;
            loop {
                let opcode = *rules.get(i)?;
                let mut left = n;
                if opcode & Q_MOD_10 != 0 {
                    left %= 10;
                } else if opcode & Q_MOD_100 != 0 {
                    left %= 100;
                } else if opcode & Q_LEAD_1000 != 0 {
                    while left >= 1000 {
                        left /= 1000;
                    }
                }
                let right = u64::from(*rules.get(i + 1)?);
                i += 2;
                let mut truth = match opcode & Q_OP_MASK {
                    Q_EQ => left == right,
                    Q_LT => left < right,
                    Q_LEQ => left <= right,
                    Q_BETWEEN => {
                        let top = u64::from(*rules.get(i)?);
                        i += 1;
                        left >= right && left <= top
                    }
                    _ => return None,
                };
                if opcode & Q_NOT != 0 {
                    truth = !truth;
                }
                and_value = and_value && truth;
                if i == rules.len() || rules[i] != Q_AND {
                    break;
                }
                i += 1;
            }
            or_value = or_value || and_value;
            if i == rules.len() || rules[i] != Q_OR {
                break;
            }
            i += 1;
        }
        if or_value {
            return Some(result);
        }
        result += 1;
        if i == rules.len() {
            return Some(result);
        }
        if rules[i] != Q_NEWRULE {
            return None;
        }
        i += 1;
    }
}
