//! Field-rule catalogs.
//!
//! A record type describes its configuration statements once, as a static
//! slice of [`Rule`]s. The builder and the reconstructor both walk that
//! slice, so whatever a feature can set it can also read back and delete.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Debug, Clone, PartialEq)]
//! struct Neighbor { hold_time: i64, passive: bool }
//!
//! impl Default for Neighbor {
//!     fn default() -> Self { Self { hold_time: -1, passive: false } }
//! }
//!
//! static NEIGHBOR_RULES: &[Rule<Neighbor>] = &[
//!     Rule::Int { keyword: "hold-time", sentinel: -1, get: |n| n.hold_time, set: |n, v| n.hold_time = v },
//!     Rule::Flag { keyword: "passive", get: |n| n.passive, set: |n, v| n.passive = v },
//! ];
//!
//! impl Schema for Neighbor {
//!     fn rules() -> &'static [Rule<Self>] { NEIGHBOR_RULES }
//! }
//! ```

use std::collections::BTreeSet;
use std::fmt;

use crate::builder;
use crate::codec::{quote, split_token, unquote};
use crate::error::{CfgError, CfgResult};
use crate::reconstruct;

/// A record type with a declared statement catalog.
///
/// `Default` must return the all-sentinel record: every integer at its
/// declared sentinel, strings empty, flags false, collections empty.
pub trait Schema: Default + Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Emit the bare prefix as its own statement whenever the record is built.
    const MARKER: bool = false;

    /// The statement catalog, in emission order.
    fn rules() -> &'static [Rule<Self>];

    /// Positional value following the key of a keyed block
    /// (`family inet unicast`: key `inet`, qualifier `unicast`).
    fn qualifier() -> Option<Qualifier<Self>> {
        None
    }
}

/// A record that appears in a repeated block.
///
/// Entries are identified by their key together with their qualifier, when
/// the record declares one: `family inet unicast` and `family inet multicast`
/// are two entries.
pub trait Keyed: Schema {
    /// The identity of this entry.
    fn key(&self) -> &str;

    /// Sets the identity of a freshly created entry.
    fn set_key(&mut self, key: String);
}

/// Accessors for the positional qualifier of a keyed block entry.
pub struct Qualifier<R> {
    /// Reads the qualifier; empty means none.
    pub get: fn(&R) -> &str,
    /// Stores a qualifier read from the device.
    pub set: fn(&mut R, String),
}

/// One statement family of a record.
///
/// `keyword` is the statement text following the record's prefix, without
/// trailing space (`hold-time`, `idle-timeout forever`, `family`).
pub enum Rule<R: 'static> {
    /// Integer with a sentinel meaning "not configured".
    Int {
        keyword: &'static str,
        sentinel: i64,
        get: fn(&R) -> i64,
        set: fn(&mut R, i64),
    },
    /// Free text; empty means "not configured".
    Text {
        keyword: &'static str,
        get: fn(&R) -> &str,
        set: fn(&mut R, String),
    },
    /// Plaintext held locally, `$9$`-encoded on the device.
    Secret {
        keyword: &'static str,
        get: fn(&R) -> &str,
        set: fn(&mut R, String),
    },
    /// Valueless statement, present only when true.
    Flag {
        keyword: &'static str,
        get: fn(&R) -> bool,
        set: fn(&mut R, bool),
    },
    /// Ordered values, one statement each.
    List {
        keyword: &'static str,
        get: fn(&R) -> &[String],
        get_mut: fn(&mut R) -> &mut Vec<String>,
    },
    /// Unordered values, emitted in sorted order.
    Set {
        keyword: &'static str,
        get: fn(&R) -> &BTreeSet<String>,
        get_mut: fn(&mut R) -> &mut BTreeSet<String>,
    },
    /// Integer written straight after the enclosing block keyword
    /// (`teardown 80`). Has no keyword of its own.
    Value {
        sentinel: i64,
        get: fn(&R) -> i64,
        set: fn(&mut R, i64),
    },
    /// Nested record(s) under an extended prefix.
    Block(&'static (dyn NestedRule<R> + Sync)),
}

impl<R: 'static> Rule<R> {
    /// Returns the statement keyword of this rule.
    pub fn keyword(&self) -> &'static str {
        match self {
            Rule::Int { keyword, .. }
            | Rule::Text { keyword, .. }
            | Rule::Secret { keyword, .. }
            | Rule::Flag { keyword, .. }
            | Rule::List { keyword, .. }
            | Rule::Set { keyword, .. } => *keyword,
            Rule::Value { .. } => "",
            Rule::Block(nested) => nested.keyword(),
        }
    }
}

impl<R: 'static> fmt::Debug for Rule<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Rule::Int { .. } => "Int",
            Rule::Text { .. } => "Text",
            Rule::Secret { .. } => "Secret",
            Rule::Flag { .. } => "Flag",
            Rule::List { .. } => "List",
            Rule::Set { .. } => "Set",
            Rule::Value { .. } => "Value",
            Rule::Block(_) => "Block",
        };
        write!(f, "{}({})", kind, self.keyword())
    }
}

/// A rule that owns nested records.
///
/// Implemented by [`KeyedBlocks`] and [`SubBlock`]; feature catalogs only
/// declare statics of those two types.
pub trait NestedRule<R> {
    /// Statement keyword introducing the nested block.
    fn keyword(&self) -> &'static str;

    /// Appends the statements of the nested record(s) under `prefix`.
    fn build(&self, record: &R, prefix: &str, out: &mut Vec<String>);

    /// Merges one statement (already cut after the keyword) into `record`.
    fn absorb(&self, record: &mut R, rest: &str, line: &str) -> CfgResult<()>;

    /// Checks that the nested record(s) can be rendered.
    fn validate(&self, record: &R) -> CfgResult<()>;
}

/// Repeated blocks identified by a key token (`family inet`, `family inet6`).
pub struct KeyedBlocks<R: 'static, C: 'static> {
    pub keyword: &'static str,
    pub get: fn(&R) -> &[C],
    pub get_mut: fn(&mut R) -> &mut Vec<C>,
}

impl<R: 'static, C: Keyed> KeyedBlocks<R, C> {
    fn entry_prefix(&self, prefix: &str, entry: &C) -> String {
        let mut base = format!("{}{} {}", prefix, self.keyword, quote(entry.key()));
        if let Some(qualifier) = C::qualifier() {
            let value = (qualifier.get)(entry);
            if !value.is_empty() {
                base.push(' ');
                base.push_str(&quote(value));
            }
        }
        base
    }
}

impl<R: 'static, C: Keyed> NestedRule<R> for KeyedBlocks<R, C> {
    fn keyword(&self) -> &'static str {
        self.keyword
    }

    fn build(&self, record: &R, prefix: &str, out: &mut Vec<String>) {
        for entry in (self.get)(record) {
            let base = self.entry_prefix(prefix, entry);
            builder::push_set(out, &base);
            builder::build_fields(&format!("{} ", base), entry, out);
        }
    }

    fn absorb(&self, record: &mut R, rest: &str, line: &str) -> CfgResult<()> {
        reconstruct::upsert_keyed((self.get_mut)(record), rest, line)
    }

    fn validate(&self, record: &R) -> CfgResult<()> {
        let mut seen = BTreeSet::new();
        for entry in (self.get)(record) {
            let key = entry.key();
            if key.is_empty() {
                return Err(CfgError::invalid_record(self.keyword, "empty block key"));
            }
            let qualifier = qualifier_of(entry);
            if !seen.insert((key, qualifier)) {
                let shown = if qualifier.is_empty() {
                    key.to_string()
                } else {
                    format!("{} {}", key, qualifier)
                };
                return Err(CfgError::invalid_record(
                    self.keyword,
                    format!("duplicate block key '{}'", shown),
                ));
            }
            builder::validate(entry)?;
        }
        Ok(())
    }
}

/// A single optional nested block (`accepted-prefix-limit`).
pub struct SubBlock<R: 'static, C: 'static> {
    pub keyword: &'static str,
    pub get: fn(&R) -> Option<&C>,
    pub get_mut: fn(&mut R) -> &mut Option<C>,
}

impl<R: 'static, C: Schema> NestedRule<R> for SubBlock<R, C> {
    fn keyword(&self) -> &'static str {
        self.keyword
    }

    fn build(&self, record: &R, prefix: &str, out: &mut Vec<String>) {
        let Some(block) = (self.get)(record) else {
            return;
        };
        let base = format!("{}{}", prefix, self.keyword);
        let start = out.len();
        builder::build_fields(&format!("{} ", base), block, out);
        if out.len() == start {
            // An empty block still has to exist on the device.
            builder::push_set(out, &base);
        }
    }

    fn absorb(&self, record: &mut R, rest: &str, line: &str) -> CfgResult<()> {
        let block = (self.get_mut)(record).get_or_insert_with(C::default);
        reconstruct::absorb_line(block, rest, line)
    }

    fn validate(&self, record: &R) -> CfgResult<()> {
        match (self.get)(record) {
            Some(block) => builder::validate(block),
            None => Ok(()),
        }
    }
}

/// Splits the key token off a keyed block statement and unquotes it.
pub(crate) fn take_key(rest: &str) -> (String, &str) {
    let (raw, after) = split_token(rest);
    (unquote(raw), after)
}

/// The qualifier of `entry`, empty when the record declares none.
pub(crate) fn qualifier_of<C: Schema>(entry: &C) -> &str {
    match C::qualifier() {
        Some(qualifier) => (qualifier.get)(entry),
        None => "",
    }
}
