//! Evaluation of compiled summary queries against in-memory documents.
//!
//! Field resolution follows document-store semantics: a dotted path walks
//! through arrays, so `patients.fullName` yields the name of every embedded
//! patient, and a clause holds when any resolved value satisfies it.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::error::{StorageResult, ValidationError};
use crate::summary::{Clause, Comparator, SortKey, SummaryQuery};

/// Collects every value reachable at `path`, descending into arrays.
pub(crate) fn resolve<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(found) = map.get(segment) {
                        next.push(found);
                    }
                }
                Value::Array(items) => next.extend(
                    items
                        .iter()
                        .filter_map(|item| item.as_object().and_then(|map| map.get(segment))),
                ),
                _ => {}
            }
        }
        current = next;
    }

    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        })
        .collect()
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between values of the same type. `None` across types.
fn same_type_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn satisfies(comparator: Comparator, ordering: Ordering) -> bool {
    match comparator {
        Comparator::GreaterThan => ordering == Ordering::Greater,
        Comparator::GreaterThanOrEqual => ordering != Ordering::Less,
        Comparator::LessThan => ordering == Ordering::Less,
        Comparator::LessThanOrEqual => ordering != Ordering::Greater,
    }
}

/// A predicate with its search patterns compiled once.
pub(crate) struct CompiledPredicate<'q> {
    clauses: Vec<(&'q Clause, Option<Regex>)>,
}

impl<'q> CompiledPredicate<'q> {
    pub fn new(predicate: &'q [Clause]) -> StorageResult<Self> {
        let clauses = predicate
            .iter()
            .map(|clause| -> StorageResult<_> {
                let regex = match clause {
                    Clause::Matches { pattern, .. } => Some(
                        RegexBuilder::new(pattern)
                            .case_insensitive(true)
                            .build()
                            .map_err(|e| ValidationError::InvalidArgument {
                                argument: "search".to_string(),
                                message: e.to_string(),
                            })?,
                    ),
                    _ => None,
                };
                Ok((clause, regex))
            })
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Self { clauses })
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(clause, regex)| clause_holds(clause, regex.as_ref(), document))
    }
}

fn clause_holds(clause: &Clause, regex: Option<&Regex>, document: &Value) -> bool {
    match clause {
        Clause::Equals { field, value } => resolve(document, field)
            .into_iter()
            .any(|found| values_equal(found, value)),
        Clause::ElementMatch {
            array,
            field,
            value,
        } => document
            .get(array)
            .and_then(Value::as_array)
            .is_some_and(|items| {
                items
                    .iter()
                    .any(|item| item.get(field).is_some_and(|found| values_equal(found, value)))
            }),
        Clause::Matches { fields, .. } => regex.is_some_and(|regex| {
            fields.iter().any(|field| {
                resolve(document, field)
                    .into_iter()
                    .filter_map(Value::as_str)
                    .any(|text| regex.is_match(text))
            })
        }),
        Clause::Compare {
            field,
            comparator,
            value,
        } => resolve(document, field).into_iter().any(|found| {
            same_type_cmp(found, value).is_some_and(|ordering| satisfies(*comparator, ordering))
        }),
        Clause::NotEquals { field, value } => !resolve(document, field)
            .into_iter()
            .any(|found| values_equal(found, value)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

fn collate(a: &Value, b: &Value, case_insensitive: bool) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) if case_insensitive => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        _ => same_type_cmp(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b))),
    }
}

static NULL: Value = Value::Null;

/// The value a document sorts by for `key`: the smallest element for
/// ascending keys, the largest for descending ones, `null` when absent.
fn sort_value<'a>(document: &'a Value, key: &SortKey, case_insensitive: bool) -> &'a Value {
    let candidates = resolve(document, &key.field).into_iter();
    let picked = if key.is_ascending() {
        candidates.min_by(|a, b| collate(a, b, case_insensitive))
    } else {
        candidates.max_by(|a, b| collate(a, b, case_insensitive))
    };
    picked.unwrap_or(&NULL)
}

/// Runs `query` over `documents` and returns the page and the total match
/// count.
pub(crate) fn execute(
    documents: impl Iterator<Item = Value>,
    query: &SummaryQuery,
) -> StorageResult<(Vec<Value>, u64)> {
    let predicate = CompiledPredicate::new(&query.predicate)?;
    let mut matched: Vec<Value> = documents.filter(|doc| predicate.matches(doc)).collect();

    matched.sort_by(|a, b| {
        query
            .sort
            .iter()
            .map(|key| {
                let ordering = collate(
                    sort_value(a, key, query.case_insensitive),
                    sort_value(b, key, query.case_insensitive),
                    query.case_insensitive,
                );
                if key.is_ascending() {
                    ordering
                } else {
                    ordering.reverse()
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    let total = matched.len() as u64;
    let page = matched
        .into_iter()
        .skip(usize::try_from(query.skip).unwrap_or(usize::MAX))
        .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
        .collect();
    Ok((page, total))
}
