//! Command builder: typed record → ordered `set`/`delete` statements.
//!
//! Omission rules, applied per rule kind:
//!
//! | Rule | Emits |
//! |------|-------|
//! | `Int` | one statement unless equal to its sentinel |
//! | `Text`, `Secret` | one statement unless empty |
//! | `Flag` | the bare keyword when true |
//! | `List` | one statement per element, in order |
//! | `Set` | one statement per element, sorted |
//! | `Value` | the bare integer after the prefix unless equal to its sentinel |
//! | `Block` | the nested record(s) under an extended prefix |

use tracing::trace;

use crate::codec::{quote, DELETE_LS, SET_LS};
use crate::error::{CfgError, CfgResult};
use crate::schema::{Rule, Schema};
use crate::secret::encode_secret;

/// Builds the `set` statements for `record` under `prefix`.
///
/// `prefix` is the hierarchy path followed by a space, for example
/// `"protocols bgp group G "`.
pub fn build<R: Schema>(prefix: &str, record: &R) -> Vec<String> {
    let mut out = Vec::new();
    if R::MARKER {
        push_set(&mut out, prefix);
    }
    build_fields(prefix, record, &mut out);
    trace!(prefix, statements = out.len(), "Built set statements");
    out
}

/// Appends `set <statement>` to `out`.
pub fn push_set(out: &mut Vec<String>, statement: &str) {
    out.push(format!("{}{}", SET_LS, statement));
}

/// Appends the statements for every rule of `record` under `prefix`.
pub fn build_fields<R: Schema>(prefix: &str, record: &R, out: &mut Vec<String>) {
    for rule in R::rules() {
        match rule {
            Rule::Int {
                keyword,
                sentinel,
                get,
                ..
            } => {
                let value = get(record);
                if value != *sentinel {
                    push_set(out, &format!("{}{} {}", prefix, keyword, value));
                }
            }
            Rule::Text { keyword, get, .. } => {
                let value = get(record);
                if !value.is_empty() {
                    push_set(out, &format!("{}{} {}", prefix, keyword, quote(value)));
                }
            }
            Rule::Secret { keyword, get, .. } => {
                let value = get(record);
                if !value.is_empty() {
                    let encoded = encode_secret(value);
                    push_set(out, &format!("{}{} {}", prefix, keyword, quote(&encoded)));
                }
            }
            Rule::Flag { keyword, get, .. } => {
                if get(record) {
                    push_set(out, &format!("{}{}", prefix, keyword));
                }
            }
            Rule::List { keyword, get, .. } => {
                for value in get(record) {
                    push_set(out, &format!("{}{} {}", prefix, keyword, quote(value)));
                }
            }
            Rule::Set { keyword, get, .. } => {
                for value in get(record) {
                    push_set(out, &format!("{}{} {}", prefix, keyword, quote(value)));
                }
            }
            Rule::Value { sentinel, get, .. } => {
                let value = get(record);
                if value != *sentinel {
                    push_set(out, &format!("{}{}", prefix, value));
                }
            }
            Rule::Block(nested) => nested.build(record, prefix, out),
        }
    }
}

/// Builds one `delete` statement per declared rule of `R` under `prefix`.
///
/// Deleting every managed keyword before re-adding the desired state turns
/// an update into a full replace of the managed subtree.
pub fn build_delete<R: Schema>(prefix: &str) -> Vec<String> {
    R::rules()
        .iter()
        .filter(|rule| !rule.keyword().is_empty())
        .map(|rule| format!("{}{}{}", DELETE_LS, prefix, rule.keyword()))
        .collect()
}

/// Builds the statement removing the whole subtree at `prefix`.
pub fn delete_all(prefix: &str) -> String {
    format!("{}{}", DELETE_LS, prefix.trim_end())
}

/// Checks that `record` renders to well-formed statements.
///
/// Values must fit on one line and keyed blocks must have non-empty keys
/// and unique (key, qualifier) identities.
pub fn validate<R: Schema>(record: &R) -> CfgResult<()> {
    for rule in R::rules() {
        match rule {
            Rule::Text { keyword, get, .. } | Rule::Secret { keyword, get, .. } => {
                check_single_line(keyword, get(record))?;
            }
            Rule::List { keyword, get, .. } => {
                for value in get(record) {
                    check_single_line(keyword, value)?;
                }
            }
            Rule::Set { keyword, get, .. } => {
                for value in get(record) {
                    check_single_line(keyword, value)?;
                }
            }
            Rule::Block(nested) => nested.validate(record)?,
            Rule::Int { .. } | Rule::Flag { .. } | Rule::Value { .. } => {}
        }
    }
    Ok(())
}

fn check_single_line(keyword: &str, value: &str) -> CfgResult<()> {
    if value.contains(['\n', '\r']) {
        return Err(CfgError::invalid_record(
            keyword,
            "value must not contain line breaks",
        ));
    }
    Ok(())
}
