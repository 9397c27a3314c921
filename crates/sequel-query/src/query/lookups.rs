//! Classification of criteria keys and filter operators.
//!
//! Keys are classified once, up front, into [`CriteriaKey`] and [`Operator`]
//! variants; the compilers then match on those instead of comparing strings.

use sequel_core::{SequelError, SequelResult};

/// What a key of a criteria object means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaKey<'a> {
    /// `or`: an array of alternatives.
    Or,
    /// `and`: an array of conjuncts.
    And,
    /// `like`: a map from attribute to pattern.
    Like,
    /// Anything else names an attribute or column.
    Attribute(&'a str),
}

impl<'a> CriteriaKey<'a> {
    /// Classifies a key. The reserved words match case-insensitively.
    pub fn classify(key: &'a str) -> Self {
        if key.eq_ignore_ascii_case("or") {
            Self::Or
        } else if key.eq_ignore_ascii_case("and") {
            Self::And
        } else if key.eq_ignore_ascii_case("like") {
            Self::Like
        } else {
            Self::Attribute(key)
        }
    }
}

/// Whether an `and`/`or` group requires all or any of its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    All,
    Any,
}

impl Connective {
    /// The joiner placed between group elements.
    pub const fn joiner(self) -> &'static str {
        match self {
            Self::All => " AND ",
            Self::Any => " OR ",
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Self::All => "and",
            Self::Any => "or",
        }
    }
}

/// An operator key nested under an attribute, e.g. `{"age": {">": 21}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Not,
    Like,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Looks an operator key up, accepting both symbol and word forms.
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "<" | "lessThan" => Self::LessThan,
            "<=" | "lessThanOrEqual" => Self::LessThanOrEqual,
            ">" | "greaterThan" => Self::GreaterThan,
            ">=" | "greaterThanOrEqual" => Self::GreaterThanOrEqual,
            "!" | "not" => Self::Not,
            "like" => Self::Like,
            "contains" => Self::Contains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            _ => return None,
        })
    }

    /// Like [`Operator::from_key`], failing with [`SequelError::UnknownOperator`].
    pub fn parse(key: &str) -> SequelResult<Self> {
        Self::from_key(key).ok_or_else(|| SequelError::unknown_operator(key))
    }

    /// Returns `true` if `key` is any recognized operator.
    pub fn is_operator_key(key: &str) -> bool {
        Self::from_key(key).is_some()
    }

    /// The SQL comparison for ordering operators.
    pub const fn comparison(self) -> Option<&'static str> {
        match self {
            Self::LessThan => Some("<"),
            Self::LessThanOrEqual => Some("<="),
            Self::GreaterThan => Some(">"),
            Self::GreaterThanOrEqual => Some(">="),
            _ => None,
        }
    }

    /// The wildcards placed before and after the operand of a pattern
    /// operator. `like` supplies its own.
    pub const fn pattern_affixes(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Like => Some(("", "")),
            Self::Contains => Some(("%", "%")),
            Self::StartsWith => Some(("", "%")),
            Self::EndsWith => Some(("%", "")),
            _ => None,
        }
    }

    /// Returns `true` when the operand must have its wildcards escaped.
    pub const fn escapes_wildcards(self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }
}

/// The comparator used for a pattern match.
///
/// When the column is already wrapped in `LOWER(...)` a plain `LIKE` is
/// enough. Otherwise a case-folding dialect needs `ILIKE`.
pub const fn pattern_comparator(lowered: bool, dialect_folds_case: bool) -> &'static str {
    if !lowered && dialect_folds_case {
        "ILIKE"
    } else {
        "LIKE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_reserved_words() {
        assert_eq!(CriteriaKey::classify("or"), CriteriaKey::Or);
        assert_eq!(CriteriaKey::classify("OR"), CriteriaKey::Or);
        assert_eq!(CriteriaKey::classify("And"), CriteriaKey::And);
        assert_eq!(CriteriaKey::classify("like"), CriteriaKey::Like);
        assert_eq!(CriteriaKey::classify("color"), CriteriaKey::Attribute("color"));
    }

    #[test]
    fn test_operator_aliases() {
        assert_eq!(Operator::from_key("<"), Some(Operator::LessThan));
        assert_eq!(Operator::from_key("lessThan"), Some(Operator::LessThan));
        assert_eq!(Operator::from_key(">="), Some(Operator::GreaterThanOrEqual));
        assert_eq!(Operator::from_key("!"), Some(Operator::Not));
        assert_eq!(Operator::from_key("not"), Some(Operator::Not));
        assert_eq!(Operator::from_key("startsWith"), Some(Operator::StartsWith));
        assert_eq!(Operator::from_key("in"), None);
    }

    #[test]
    fn test_parse_unknown_operator() {
        let err = Operator::parse("in").unwrap_err();
        assert_eq!(err.operator(), Some("in"));
    }

    #[test]
    fn test_comparison_and_affixes() {
        assert_eq!(Operator::GreaterThan.comparison(), Some(">"));
        assert_eq!(Operator::Not.comparison(), None);
        assert_eq!(Operator::Contains.pattern_affixes(), Some(("%", "%")));
        assert_eq!(Operator::EndsWith.pattern_affixes(), Some(("%", "")));
        assert!(Operator::StartsWith.escapes_wildcards());
        assert!(!Operator::Like.escapes_wildcards());
    }

    #[test]
    fn test_pattern_comparator() {
        assert_eq!(pattern_comparator(true, true), "LIKE");
        assert_eq!(pattern_comparator(false, true), "ILIKE");
        assert_eq!(pattern_comparator(false, false), "LIKE");
    }

    #[test]
    fn test_connective() {
        assert_eq!(Connective::Any.joiner(), " OR ");
        assert_eq!(Connective::All.keyword(), "and");
    }
}
