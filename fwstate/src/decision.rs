//! Change decision: compare declared state with observed state field by field.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::compare::differs;
use crate::declared::{DeclaredError, DeclaredState};
use crate::list::reconcile_matching;
use crate::schema::{FieldKind, Fields, ListStrategy, ResourceSchema, ValueType};
use crate::value::{FieldPath, Observed, Record, Value};

/// Terminal outcome of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The resource does not exist and must be created.
    Create,
    /// The resource exists and at least one declared field differs.
    Update,
    /// Nothing to do.
    Unchanged,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Why a field counts as changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// Declared a value for a field the device has no value for.
    Added,
    /// Declared a different value.
    Modified,
    /// Declared a write-only value.
    Secret,
    /// List reconciliation produced a different list.
    ListChanged,
}

/// One changed field. Secret values are never copied into the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub path: FieldPath,
    pub reason: ChangeReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

/// Result of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub outcome: Outcome,
    pub changes: Vec<FieldChange>,
    /// Reconciled list for every declared sequence field, keyed by path.
    #[serde(skip)]
    resolved_lists: BTreeMap<FieldPath, Vec<Value>>,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        self.outcome != Outcome::Unchanged
    }

    pub fn is_create(&self) -> bool {
        self.outcome == Outcome::Create
    }

    /// The list the builder should write for the sequence field at `path`.
    pub fn resolved_list(&self, path: &FieldPath) -> Option<&[Value]> {
        self.resolved_lists.get(path).map(Vec::as_slice)
    }
}

/// Caller overrides for a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecideOptions {
    /// Strategy applied to every sequence field, overriding the schema.
    pub strategy: Option<ListStrategy>,
}

/// Compare `declared` against `observed` under `schema`.
///
/// Pure: the same inputs always produce the same change set. When the
/// resource is absent the outcome is [`Outcome::Create`] whatever was
/// declared.
pub fn decide(
    declared: &DeclaredState,
    observed: &Observed,
    schema: &ResourceSchema,
    options: &DecideOptions,
) -> Result<ChangeSet, DeclaredError> {
    let mut walk = Walk {
        options,
        changes: Vec::new(),
        lists: BTreeMap::new(),
    };
    walk.record(
        declared.fields(),
        observed.record(),
        &schema.fields,
        &FieldPath::root(),
    )?;

    let outcome = if observed.is_absent() {
        Outcome::Create
    } else if walk.changes.is_empty() {
        Outcome::Unchanged
    } else {
        Outcome::Update
    };
    debug!(
        "{}: outcome={} changed_fields={}",
        schema.name(),
        outcome.as_str(),
        walk.changes.len()
    );

    Ok(ChangeSet {
        outcome,
        changes: walk.changes,
        resolved_lists: walk.lists,
    })
}

struct Walk<'a> {
    options: &'a DecideOptions,
    changes: Vec<FieldChange>,
    lists: BTreeMap<FieldPath, Vec<Value>>,
}

impl Walk<'_> {
    fn record(
        &mut self,
        declared: &Record,
        observed: Option<&Record>,
        fields: &Fields,
        path: &FieldPath,
    ) -> Result<(), DeclaredError> {
        if let Some(unknown) = declared.keys().find(|name| !fields.contains_key(*name)) {
            return Err(DeclaredError::UnknownField {
                path: path.child(unknown),
            });
        }

        for (name, field) in fields {
            let Some(declared_value) = declared.get(name) else {
                continue;
            };
            let field_path = path.child(name);
            let observed_value = observed.and_then(|record| record.get(name));

            match field.kind {
                FieldKind::Scalar => {
                    if differs(Some(declared_value), observed_value, field.value_type) {
                        self.scalar_change(
                            field_path,
                            field.value_type,
                            declared_value,
                            observed_value,
                        );
                    }
                }
                FieldKind::Record => {
                    let Value::Record(declared_record) = declared_value else {
                        return Err(shape(&field_path, "record", declared_value));
                    };
                    let observed_record = observed_value.and_then(Value::as_record);
                    self.record(declared_record, observed_record, &field.fields, &field_path)?;
                }
                FieldKind::Sequence => {
                    let Value::Sequence(declared_items) = declared_value else {
                        return Err(shape(&field_path, "sequence", declared_value));
                    };
                    let observed_items =
                        observed_value.and_then(Value::as_sequence).unwrap_or(&[]);
                    let strategy = self
                        .options
                        .strategy
                        .or(field.strategy)
                        .unwrap_or_default();
                    let result = reconcile_matching(
                        declared_items,
                        observed_items,
                        strategy,
                        &field.match_on,
                        field.value_type,
                    );
                    if result.changed {
                        debug!("{field_path}: list changed under {strategy:?}");
                        self.changes.push(FieldChange {
                            path: field_path.clone(),
                            reason: ChangeReason::ListChanged,
                            before: Some(Value::Sequence(observed_items.to_vec())),
                            after: Some(Value::Sequence(result.items.clone())),
                        });
                    }
                    self.lists.insert(field_path, result.items);
                }
            }
        }
        Ok(())
    }

    fn scalar_change(
        &mut self,
        path: FieldPath,
        value_type: ValueType,
        declared: &Value,
        observed: Option<&Value>,
    ) {
        let change = if value_type == ValueType::Secret {
            FieldChange {
                path,
                reason: ChangeReason::Secret,
                before: None,
                after: None,
            }
        } else {
            FieldChange {
                path,
                reason: if observed.is_some() {
                    ChangeReason::Modified
                } else {
                    ChangeReason::Added
                },
                before: observed.map(|value| match value.text() {
                    Some(text) => Value::scalar(text),
                    None => value.clone(),
                }),
                after: Some(declared.clone()),
            }
        };
        debug!("{}: {:?}", change.path, change.reason);
        self.changes.push(change);
    }
}

fn shape(path: &FieldPath, expected: &'static str, found: &Value) -> DeclaredError {
    DeclaredError::Shape {
        path: path.clone(),
        expected,
        found: found.shape(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{decide, ChangeReason, DecideOptions, Outcome};
    use crate::declared::DeclaredState;
    use crate::schema::{embedded_schema, ListStrategy, ResourceSchema};
    use crate::value::{FieldPath, Observed, Record, Value};

    fn syslog() -> ResourceSchema {
        embedded_schema("syslog").expect("schema")
    }

    fn declared(raw: &str) -> DeclaredState {
        DeclaredState::from_toml_str(raw, &syslog()).expect("declared")
    }

    fn observed() -> Observed {
        let mut auth = Record::new();
        auth.insert("username".to_string(), Value::scalar("collector"));

        let mut record = Record::new();
        record.insert("port".to_string(), Value::scalar("514"));
        record.insert("facility".to_string(), Value::scalar("DAEMON"));
        record.insert(
            "hosts".to_string(),
            Value::Sequence(vec![Value::scalar("10.0.0.1")]),
        );
        record.insert("auth".to_string(), Value::Record(auth));
        Observed::Present(record)
    }

    #[test]
    fn matching_port_is_unchanged() {
        let set = decide(
            &declared("port = \"514\""),
            &observed(),
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert_eq!(set.outcome, Outcome::Unchanged);
        assert!(!set.has_changes());
    }

    #[test]
    fn different_port_is_an_update() {
        let set = decide(
            &declared("port = 1514"),
            &observed(),
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert_eq!(set.outcome, Outcome::Update);
        assert_eq!(set.changes.len(), 1);
        assert_eq!(set.changes[0].path.as_str(), "port");
        assert_eq!(set.changes[0].reason, ChangeReason::Modified);
    }

    #[test]
    fn empty_declaration_never_changes_existing_resource() {
        let set = decide(
            &DeclaredState::empty(),
            &observed(),
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert!(!set.has_changes());
    }

    #[test]
    fn absent_resource_takes_creation_path() {
        let set = decide(
            &DeclaredState::empty(),
            &Observed::Absent,
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert_eq!(set.outcome, Outcome::Create);
        assert!(set.is_create());
        assert!(set.has_changes());
    }

    #[test]
    fn nested_group_fields_are_compared() {
        let set = decide(
            &declared("[auth]\nusername = \"other\""),
            &observed(),
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert_eq!(set.changes[0].path.as_str(), "auth.username");

        let same = decide(
            &declared("[auth]\nusername = \"collector\""),
            &observed(),
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert!(!same.has_changes());
    }

    #[test]
    fn secrets_always_change_and_are_not_reported() {
        let set = decide(
            &declared("[auth]\npassword = \"s3cret\""),
            &observed(),
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert_eq!(set.changes[0].reason, ChangeReason::Secret);
        assert_eq!(set.changes[0].after, None);
    }

    #[test]
    fn list_uses_schema_strategy_unless_overridden() {
        let hosts = FieldPath::root().child("hosts");

        let add = decide(
            &declared("hosts = [\"10.0.0.1\"]"),
            &observed(),
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert!(!add.has_changes());
        assert_eq!(add.resolved_list(&hosts), Some(&[Value::scalar("10.0.0.1")][..]));

        let remove = decide(
            &declared("hosts = [\"10.0.0.1\"]"),
            &observed(),
            &syslog(),
            &DecideOptions {
                strategy: Some(ListStrategy::Remove),
            },
        )
        .expect("decide");
        assert!(remove.has_changes());
        assert_eq!(remove.resolved_list(&hosts), Some(&[][..]));
    }

    #[test]
    fn keyed_record_with_new_port_replaces_the_observed_record() {
        let mut primary = Record::new();
        primary.insert("@name".to_string(), Value::scalar("primary"));
        primary.insert("server".to_string(), Value::scalar("10.0.0.1"));
        primary.insert("port".to_string(), Value::scalar("514"));
        let mut record = Record::new();
        record.insert(
            "servers".to_string(),
            Value::Sequence(vec![Value::Record(primary.clone())]),
        );
        let observed = Observed::Present(record);

        let set = decide(
            &declared(
                "[[servers]]\n\"@name\" = \"primary\"\nserver = \"10.0.0.1\"\nport = \"1514\"",
            ),
            &observed,
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");

        assert_eq!(set.outcome, Outcome::Update);
        assert_eq!(set.changes.len(), 1);
        assert_eq!(set.changes[0].path.as_str(), "servers");
        assert_eq!(set.changes[0].reason, ChangeReason::ListChanged);

        primary.insert("port".to_string(), Value::scalar("1514"));
        assert_eq!(
            set.resolved_list(&FieldPath::root().child("servers")),
            Some(&[Value::Record(primary)][..])
        );
    }

    #[test]
    fn attributed_observed_scalar_compares_by_text() {
        let mut port = Record::new();
        port.insert("@unit".to_string(), Value::scalar("udp"));
        port.insert("#text".to_string(), Value::scalar("514"));
        let mut record = Record::new();
        record.insert("port".to_string(), Value::Record(port));
        let observed = Observed::Present(record);

        let same = decide(
            &declared("port = 514"),
            &observed,
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert!(!same.has_changes());

        let moved = decide(
            &declared("port = 1514"),
            &observed,
            &syslog(),
            &DecideOptions::default(),
        )
        .expect("decide");
        assert_eq!(moved.changes[0].before, Some(Value::scalar("514")));
    }

    #[test]
    fn decide_is_repeatable() {
        let d = declared("port = 1514\nhosts = [\"10.0.0.2\"]");
        let first = decide(&d, &observed(), &syslog(), &DecideOptions::default()).expect("decide");
        let second = decide(&d, &observed(), &syslog(), &DecideOptions::default()).expect("decide");
        assert_eq!(first, second);
    }
}
