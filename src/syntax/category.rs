use std::{cmp::Ordering, collections::HashMap, fmt, sync::LazyLock};

use regex_syntax::hir::{Class, HirKind};

use super::charclass::CharSet;
use crate::Error;

/// General categories that `\p{..}` accepts by name.
pub const UNICODE_CATEGORIES: &[&str] = &[
    "C", "Cc", "Cf", "Co", "Cs", "L", "Ll", "Lm", "Lo", "Lt", "Lu", "M", "Mc", "Me", "Mn", "N",
    "Nd", "Nl", "No", "P", "Pc", "Pd", "Pe", "Pf", "Pi", "Po", "Ps", "S", "Sc", "Sk", "Sm", "So",
    "Z", "Zl", "Zp", "Zs",
];

// Members of the synthetic word category.
const WORD_CATEGORIES: &[&str] = &["L", "Mn", "Nd", "Pc"];

type Table = Vec<(u32, u32)>;

static TABLES: LazyLock<HashMap<&'static str, Table>> = LazyLock::new(|| {
    UNICODE_CATEGORIES
        .iter()
        .map(|&name| (name, build_table(name)))
        .collect()
});

fn build_table(name: &str) -> Table {
    match name {
        // surrogates are not chars, so no regex-syntax class can hold them
        "Cs" => vec![(0xD800, 0xDFFF)],
        // Cn is not part of C here
        "C" => {
            let mut table: Table = ["Cc", "Cf", "Co", "Cs"]
                .iter()
                .flat_map(|&sub| build_table(sub))
                .collect();
            table.sort_unstable();
            table
        }
        _ => {
            let parsed = regex_syntax::ParserBuilder::new()
                .build()
                .parse(&format!(r"\p{{{}}}", name));
            let Ok(hir) = parsed else {
                log::warn!("no general category table for {}", name);
                return Vec::new();
            };
            match hir.kind() {
                HirKind::Class(Class::Unicode(class)) => class
                    .ranges()
                    .iter()
                    .map(|r| (u32::from(r.start()), u32::from(r.end())))
                    .collect(),
                // one-member categories such as Zl come back as a literal
                HirKind::Literal(literal) => std::str::from_utf8(&literal.0)
                    .ok()
                    .and_then(|s| s.chars().next())
                    .map(|c| vec![(u32::from(c), u32::from(c))])
                    .unwrap_or_default(),
                _ => Vec::new(),
            }
        }
    }
}

fn in_table(table: &[(u32, u32)], ch: u32) -> bool {
    table
        .binary_search_by(|&(lo, hi)| {
            if hi < ch {
                Ordering::Less
            } else if lo > ch {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .is_ok()
}

/// Whether `ch` belongs to the general category `name`. Unknown names hold nothing.
pub fn in_unicode_category(name: &str, ch: u32) -> bool {
    TABLES.get(name).is_some_and(|table| in_table(table, ch))
}

/// What a category test dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    /// `\s`: Unicode White_Space.
    Space,
    /// `\w`: letters, non-spacing marks, decimal digits and connectors.
    Word,
    /// A general category from [`UNICODE_CATEGORIES`].
    Unicode(&'static str),
    /// Any other property name. Never stored in a [`CharSet`]; it is handed
    /// to a [`PropertyResolver`] instead.
    Unresolved(String),
}

impl CategoryKind {
    pub fn from_property(name: &str) -> CategoryKind {
        match UNICODE_CATEGORIES.iter().find(|&&cat| cat == name) {
            Some(&cat) => CategoryKind::Unicode(cat),
            None => CategoryKind::Unresolved(name.to_string()),
        }
    }

    // Stable text used by the charset hash key.
    pub(crate) fn key(&self) -> &str {
        match self {
            CategoryKind::Space => " ",
            CategoryKind::Word => "W",
            CategoryKind::Unicode(name) => name,
            CategoryKind::Unresolved(name) => name,
        }
    }
}

/// A category reference with its own negation flag, independent of the
/// negation of the set holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    pub(crate) negate: bool,
    pub(crate) kind: CategoryKind,
}

impl Category {
    pub(crate) fn new(kind: CategoryKind, negate: bool) -> Category {
        Category { negate, kind }
    }

    /// Membership of `ch` in the category itself, before `negate` is applied.
    pub(crate) fn contains(&self, ch: u32) -> bool {
        match &self.kind {
            CategoryKind::Space => char::from_u32(ch).is_some_and(char::is_whitespace),
            CategoryKind::Word => WORD_CATEGORIES.iter().any(|cat| in_unicode_category(cat, ch)),
            CategoryKind::Unicode(name) => in_unicode_category(name, ch),
            CategoryKind::Unresolved(name) => {
                unreachable!("unresolved property {} stored in a charset", name)
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, self.negate) {
            (CategoryKind::Space, false) => f.write_str("\\s"),
            (CategoryKind::Space, true) => f.write_str("\\S"),
            (CategoryKind::Word, false) => f.write_str("\\w"),
            (CategoryKind::Word, true) => f.write_str("\\W"),
            (CategoryKind::Unicode(name), false) => write!(f, "\\p{{{}}}", name),
            (CategoryKind::Unicode(name), true) => write!(f, "\\P{{{}}}", name),
            (CategoryKind::Unresolved(name), _) => write!(f, "Unknown category: {}", name),
        }
    }
}

/// Resolves `\p{..}` names that are not general categories.
pub trait PropertyResolver {
    /// The set named by `name`. Only its ranges are used, so `negate` must
    /// already be folded into them.
    fn resolve(&self, name: &str, negate: bool) -> Result<CharSet, Error>;
}

/// The default resolver: every property name is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProperties;

impl PropertyResolver for UnsupportedProperties {
    fn resolve(&self, name: &str, _negate: bool) -> Result<CharSet, Error> {
        Err(Error::UnsupportedFeature(format!(
            "unicode property \\p{{{}}}",
            name
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unicode_categories() {
        assert!(in_unicode_category("Lu", 'A' as u32));
        assert!(!in_unicode_category("Lu", 'a' as u32));
        assert!(in_unicode_category("Ll", 'ж' as u32));
        assert!(in_unicode_category("L", 'ж' as u32));
        assert!(in_unicode_category("Nd", '٣' as u32));
        assert!(in_unicode_category("Zl", 0x2028));
        assert!(in_unicode_category("Zp", 0x2029));
        assert!(in_unicode_category("Cs", 0xDC00));
        assert!(in_unicode_category("C", 0xDC00));
        assert!(in_unicode_category("C", 0x07));
        assert!(!in_unicode_category("C", 'x' as u32));
        assert!(!in_unicode_category("Nope", 'x' as u32));
    }

    #[test]
    fn test_every_listed_category_has_members() {
        for name in UNICODE_CATEGORIES {
            assert!(!TABLES[name].is_empty(), "{} is empty", name);
        }
    }

    #[test]
    fn test_synthetic_categories() {
        let space = Category::new(CategoryKind::Space, false);
        assert!(space.contains(' ' as u32));
        assert!(space.contains(0x85));
        assert!(space.contains(0x3000));
        assert!(!space.contains('x' as u32));

        let word = Category::new(CategoryKind::Word, false);
        assert!(word.contains('_' as u32));
        assert!(word.contains('é' as u32));
        assert!(word.contains('9' as u32));
        assert!(!word.contains('-' as u32));
        assert!(!word.contains(0xD800));
    }

    #[test]
    fn test_from_property() {
        assert_eq!(CategoryKind::from_property("Lu"), CategoryKind::Unicode("Lu"));
        assert_eq!(
            CategoryKind::from_property("IsGreek"),
            CategoryKind::Unresolved("IsGreek".to_string())
        );
    }

    #[test]
    fn test_unsupported_properties_fail_loudly() {
        let err = UnsupportedProperties.resolve("IsGreek", false).unwrap_err();
        assert_eq!(err, Error::UnsupportedFeature("unicode property \\p{IsGreek}".to_string()));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::new(CategoryKind::Space, true).to_string(), "\\S");
        assert_eq!(Category::new(CategoryKind::Unicode("Lu"), false).to_string(), "\\p{Lu}");
        assert_eq!(Category::new(CategoryKind::Unicode("Nd"), true).to_string(), "\\P{Nd}");
    }
}
