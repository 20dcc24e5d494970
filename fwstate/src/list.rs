use std::collections::BTreeSet;

use serde::Serialize;

use crate::compare::{canonical_number, same_text};
use crate::schema::{ListStrategy, ValueType};
use crate::value::{Record, Value};

/// Result of applying a declared list to an observed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub items: Vec<Value>,
    pub changed: bool,
}

/// Reconcile with whole-value equality on plain text items.
pub fn reconcile(declared: &[Value], observed: &[Value], strategy: ListStrategy) -> Reconciled {
    reconcile_matching(declared, observed, strategy, &[], ValueType::Text)
}

/// Reconcile, identifying records by the `match_on` fields when given.
///
/// Scalar items compare by text under `value_type`. Observed items keep
/// their order; additions go to the end in declared order. Under `Add`, a
/// declared record whose `match_on` key matches an observed record is merged
/// into it in place. `match_on` does not affect `Replace`.
pub fn reconcile_matching(
    declared: &[Value],
    observed: &[Value],
    strategy: ListStrategy,
    match_on: &[String],
    value_type: ValueType,
) -> Reconciled {
    match strategy {
        ListStrategy::Add => {
            let mut items = observed.to_vec();
            for candidate in declared {
                let existing = items
                    .iter()
                    .position(|item| same_item(item, candidate, match_on, value_type));
                match existing {
                    Some(idx) if !match_on.is_empty() => {
                        if let Some(merged) = merge(&items[idx], candidate) {
                            items[idx] = merged;
                        }
                    }
                    Some(_) => {}
                    None => items.push(candidate.clone()),
                }
            }
            let changed = items.as_slice() != observed;
            Reconciled { items, changed }
        }
        ListStrategy::Remove => {
            let items: Vec<Value> = observed
                .iter()
                .filter(|item| {
                    !declared
                        .iter()
                        .any(|candidate| same_item(item, candidate, match_on, value_type))
                })
                .cloned()
                .collect();
            let changed = items.len() != observed.len();
            Reconciled { items, changed }
        }
        ListStrategy::Replace => {
            let changed = identities(declared, value_type) != identities(observed, value_type);
            Reconciled {
                items: declared.to_vec(),
                changed,
            }
        }
    }
}

fn same_item(a: &Value, b: &Value, match_on: &[String], value_type: ValueType) -> bool {
    if let (Some(left), Some(right)) = (a.as_record(), b.as_record()) {
        if !match_on.is_empty() {
            return match_on.iter().all(|key| {
                left.get(key).and_then(Value::text) == right.get(key).and_then(Value::text)
            });
        }
    }
    match (a.text(), b.text()) {
        (Some(left), Some(right)) => same_text(left, right, value_type),
        _ => a == b,
    }
}

/// Overlay a declared record onto the observed record it matched.
fn merge(observed: &Value, declared: &Value) -> Option<Value> {
    let (Value::Record(observed), Value::Record(declared)) = (observed, declared) else {
        return None;
    };
    let mut merged: Record = observed.clone();
    for (name, value) in declared {
        merged
            .entry(name.clone())
            .and_modify(|slot| slot.assign(value))
            .or_insert_with(|| value.clone());
    }
    Some(Value::Record(merged))
}

fn identities(items: &[Value], value_type: ValueType) -> BTreeSet<Value> {
    items
        .iter()
        .map(|item| match item.text() {
            Some(text) if value_type == ValueType::Numeric => {
                Value::scalar(canonical_number(text))
            }
            Some(text) => Value::scalar(text),
            None => item.clone(),
        })
        .collect()
}
