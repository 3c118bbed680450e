//! Mongo operator vocabulary
//!
//! Every `$`-prefixed key that reaches the path algebra or the update parser is
//! resolved here exactly once into an [`Operator`]. Call sites match on the
//! enum instead of comparing strings, which keeps the Mongo dialect in one
//! place.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;

/// Sigil that starts every operator key.
pub const OPERATOR_SIGIL: char = '$';

/// A recognized `$`-operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Logical query combinators (array-valued)
    And,
    Or,
    Nor,
    Not,

    // Element and comparison query operators
    ElemMatch,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    All,
    Exists,
    Type,
    Size,
    Regex,
    Options,
    Mod,
    Where,
    Text,
    Search,

    // Field update operators
    Set,
    SetOnInsert,
    Unset,
    Inc,
    Mul,
    Min,
    Max,
    Rename,
    CurrentDate,
    Bit,

    // Array update operators
    Push,
    AddToSet,
    Pull,
    PullAll,
    Pop,

    // Array update modifiers
    Each,
    Slice,
    Sort,
    Position,

    // Extended JSON wrappers
    Oid,
    Date,

    /// `$`-prefixed key with no entry in the table
    Unrecognized,
}

/// How an update operator treats the values in its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateClass {
    /// Values replace the field (`$set`, `$setOnInsert`)
    Assign,
    /// Values are appended as array elements (`$push`, `$addToSet`)
    Append,
    /// Values are numeric operands (`$inc`, `$mul`)
    Arithmetic,
    /// Values carry no per-field schema meaning (`$unset`, `$pull`, ...)
    PassThrough,
}

static OPERATORS: Lazy<FxHashMap<&'static str, Operator>> = Lazy::new(|| {
    use Operator::*;
    [
        ("$and", And),
        ("$or", Or),
        ("$nor", Nor),
        ("$not", Not),
        ("$elemMatch", ElemMatch),
        ("$eq", Eq),
        ("$ne", Ne),
        ("$gt", Gt),
        ("$gte", Gte),
        ("$lt", Lt),
        ("$lte", Lte),
        ("$in", In),
        ("$nin", Nin),
        ("$all", All),
        ("$exists", Exists),
        ("$type", Type),
        ("$size", Size),
        ("$regex", Regex),
        ("$options", Options),
        ("$mod", Mod),
        ("$where", Where),
        ("$text", Text),
        ("$search", Search),
        ("$set", Set),
        ("$setOnInsert", SetOnInsert),
        ("$unset", Unset),
        ("$inc", Inc),
        ("$mul", Mul),
        ("$min", Min),
        ("$max", Max),
        ("$rename", Rename),
        ("$currentDate", CurrentDate),
        ("$bit", Bit),
        ("$push", Push),
        ("$addToSet", AddToSet),
        ("$pull", Pull),
        ("$pullAll", PullAll),
        ("$pop", Pop),
        ("$each", Each),
        ("$slice", Slice),
        ("$sort", Sort),
        ("$position", Position),
        ("$oid", Oid),
        ("$date", Date),
    ]
    .into_iter()
    .collect()
});

impl Operator {
    /// Resolve a key to an operator
    ///
    /// Returns `None` for plain field keys. A `$`-prefixed key missing from the
    /// table resolves to [`Operator::Unrecognized`] so callers still treat it as
    /// an operator.
    pub fn lookup(key: &str) -> Option<Operator> {
        if !is_operator_key(key) {
            return None;
        }
        Some(OPERATORS.get(key).copied().unwrap_or(Operator::Unrecognized))
    }

    /// Query operators whose array value holds match values, not sub-queries
    pub fn is_value_list(self) -> bool {
        matches!(self, Operator::In | Operator::Nin | Operator::All)
    }

    /// Classify a top-level update operator
    ///
    /// Returns `None` for operators that cannot appear at the top level of an
    /// update document.
    pub fn update_class(self) -> Option<UpdateClass> {
        use Operator::*;
        match self {
            Set | SetOnInsert => Some(UpdateClass::Assign),
            Push | AddToSet => Some(UpdateClass::Append),
            Inc | Mul => Some(UpdateClass::Arithmetic),
            Unset | Min | Max | Rename | CurrentDate | Bit | Pull | PullAll | Pop => {
                Some(UpdateClass::PassThrough)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = OPERATORS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(name, _)| *name)
            .unwrap_or("$<unrecognized>");
        f.write_str(name)
    }
}

/// Whether a key or path segment is written in operator form (`$...`)
#[inline]
pub fn is_operator_key(key: &str) -> bool {
    key.starts_with(OPERATOR_SIGIL)
}
