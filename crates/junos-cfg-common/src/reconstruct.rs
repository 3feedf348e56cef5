//! Block reconstructor: flattened statements → typed record.
//!
//! Lines are consumed in device order. Each line is cut after the base
//! prefix and dispatched to the rule with the longest matching keyword.
//! Keyed blocks are upserted: the first line naming a key (and qualifier,
//! for records that declare one) appends a fresh all-sentinel entry, later
//! lines for the same identity update that entry, so list order follows
//! first appearance and identities never repeat.
//!
//! Lines outside the base prefix, and lines no rule recognizes, are skipped;
//! devices report statements newer than the local catalog.

use tracing::trace;

use crate::codec::{match_keyword, split_token, unquote};
use crate::error::{CfgError, CfgResult};
use crate::schema::{qualifier_of, take_key, Keyed, Rule, Schema};
use crate::secret::decode_secret;

/// Reconstructs one record from `lines`.
///
/// Only lines starting with `base_prefix` contribute (`"set "` for a
/// `display set relative` dump, `"set <prefix>"` for builder output).
pub fn reconstruct<R, S>(lines: &[S], base_prefix: &str) -> CfgResult<R>
where
    R: Schema,
    S: AsRef<str>,
{
    let mut record = R::default();
    for line in lines {
        let line = line.as_ref();
        if let Some(rest) = line.strip_prefix(base_prefix) {
            absorb_line(&mut record, rest.trim(), line)?;
        }
    }
    Ok(record)
}

/// Reconstructs a keyed block list from `lines`.
///
/// Lines must continue with `keyword` after `base_prefix`; the next token
/// is the entry key (`family inet ...` with keyword `family`).
pub fn reconstruct_keyed<C, S>(lines: &[S], base_prefix: &str, keyword: &str) -> CfgResult<Vec<C>>
where
    C: Keyed,
    S: AsRef<str>,
{
    let mut entries = Vec::new();
    for line in lines {
        let line = line.as_ref();
        let Some(rest) = line.strip_prefix(base_prefix) else {
            continue;
        };
        if let Some(rest) = match_keyword(rest.trim(), keyword) {
            upsert_keyed(&mut entries, rest, line)?;
        }
    }
    Ok(entries)
}

/// Merges one keyed block statement into `entries`.
///
/// `rest` starts with the key token, followed by the qualifier token when
/// `C` declares one.
pub(crate) fn upsert_keyed<C: Keyed>(entries: &mut Vec<C>, rest: &str, line: &str) -> CfgResult<()> {
    if rest.is_empty() {
        return Ok(());
    }
    let (key, rest) = take_key(rest);
    let (qualifier, rest) = match C::qualifier() {
        Some(_) => take_key(rest),
        None => (String::new(), rest),
    };

    let existing = entries
        .iter()
        .position(|entry| entry.key() == key && qualifier_of(entry) == qualifier);
    let idx = match existing {
        Some(idx) => idx,
        None => {
            let mut entry = C::default();
            entry.set_key(key);
            if let Some(declared) = C::qualifier() {
                (declared.set)(&mut entry, qualifier);
            }
            entries.push(entry);
            entries.len() - 1
        }
    };

    absorb_line(&mut entries[idx], rest, line)
}

/// Merges one statement (relative to `record`) into `record`.
pub(crate) fn absorb_line<R: Schema>(record: &mut R, rest: &str, line: &str) -> CfgResult<()> {
    if rest.is_empty() {
        return Ok(());
    }

    let matched = R::rules()
        .iter()
        .filter(|rule| !rule.keyword().is_empty())
        .filter_map(|rule| match_keyword(rest, rule.keyword()).map(|value| (rule, value)))
        .max_by_key(|(rule, _)| rule.keyword().len());

    let Some((rule, value)) = matched else {
        return absorb_value(record, rest, line);
    };

    match rule {
        Rule::Int { set, .. } => {
            let parsed = value
                .parse::<i64>()
                .map_err(|e| CfgError::invalid_integer(line, e))?;
            set(record, parsed);
        }
        Rule::Text { set, .. } => set(record, unquote(value)),
        Rule::Secret { set, .. } => {
            let plain =
                decode_secret(&unquote(value)).map_err(|e| CfgError::invalid_secret(line, e))?;
            set(record, plain);
        }
        Rule::Flag { set, .. } => {
            if value.is_empty() {
                set(record, true);
            }
        }
        Rule::List { get_mut, .. } => {
            if !value.is_empty() {
                get_mut(record).push(unquote(value));
            }
        }
        Rule::Set { get_mut, .. } => {
            if !value.is_empty() {
                get_mut(record).insert(unquote(value));
            }
        }
        Rule::Block(nested) => nested.absorb(record, value, line)?,
        Rule::Value { .. } => {}
    }
    Ok(())
}

/// Takes a leading integer for the record's `Value` rule, then merges what
/// follows it (`80 idle-timeout 30`).
fn absorb_value<R: Schema>(record: &mut R, rest: &str, line: &str) -> CfgResult<()> {
    let value_rule = R::rules().iter().find_map(|rule| match rule {
        Rule::Value { set, .. } => Some(set),
        _ => None,
    });
    let (token, after) = split_token(rest);
    match (value_rule, token.parse::<i64>()) {
        (Some(set), Ok(parsed)) => {
            set(record, parsed);
            absorb_line(record, after, line)
        }
        _ => {
            trace!(line, "Skipping unrecognized configuration line");
            Ok(())
        }
    }
}
