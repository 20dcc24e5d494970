//! One fetch-decide-build-submit cycle for a single resource.
//!
//! The engine itself performs no I/O: fetching and submitting go through the
//! [`Fetcher`] and [`Submitter`] collaborators, and their failures are
//! surfaced as-is without retries.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use log::info;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::decision::{decide, ChangeSet, DecideOptions, FieldChange, Outcome};
use crate::declared::{DeclaredError, DeclaredState};
use crate::normalize::{normalize, ShapeMismatch};
use crate::payload::{build, redact, to_wire};
use crate::schema::{ListStrategy, ResourceSchema};
use crate::value::{Observed, Record};

/// Opaque failure raised by a collaborator.
pub type CollaboratorError = Box<dyn Error + Send + Sync>;

/// Identifies one resource instance on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a fetch returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// The raw object, still in the wire object model.
    Found(JsonValue),
    /// The remote reported that the resource does not exist.
    NotFound,
}

/// Reads the current remote object for a key.
pub trait Fetcher {
    fn fetch(&self, key: &ResourceKey) -> Result<Fetched, CollaboratorError>;
}

/// Whether a submit creates a resource or replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    Create,
    Update,
}

impl SubmitMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

/// Everything a submitter needs to write one resolved object.
#[derive(Debug)]
pub struct SubmitRequest<'a> {
    pub key: &'a ResourceKey,
    pub mode: SubmitMode,
    pub object: &'a Record,
    /// `object` converted back to the wire object model.
    pub wire: JsonValue,
    pub schema: &'a ResourceSchema,
}

/// Sends a resolved object to the remote side as a full replacement.
pub trait Submitter {
    fn submit(&self, request: &SubmitRequest<'_>) -> Result<RemoteResponse, CollaboratorError>;
}

/// Structured reply from a submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteResponse {
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl RemoteResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }
}

/// Caller options for [`reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Overrides every sequence field's schema strategy.
    pub strategy: Option<ListStrategy>,
    /// Decide and build, but never submit.
    pub check_mode: bool,
}

/// Outcome of a full reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub key: ResourceKey,
    pub changed: bool,
    pub outcome: Outcome,
    pub changes: Vec<FieldChange>,
    /// The object that was (or, in check mode, would be) submitted, with
    /// secret fields masked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<RemoteResponse>,
    pub check_mode: bool,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),
    #[error(transparent)]
    Declared(#[from] DeclaredError),
    #[error("fetch failed for {key}: {source}")]
    FetchFailed {
        key: ResourceKey,
        source: CollaboratorError,
    },
    #[error("submit failed for {key}: {source}")]
    SubmitFailed {
        key: ResourceKey,
        source: CollaboratorError,
    },
}

/// Everything decided about a resource before anything is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub observed: Observed,
    pub change_set: ChangeSet,
    /// Built only when the change set has changes.
    pub resolved: Option<Record>,
}

/// Fetch, normalize and decide for `key`, building the resolved object when
/// something changed. Never submits.
pub fn plan(
    key: &ResourceKey,
    declared: &DeclaredState,
    fetcher: &dyn Fetcher,
    schema: &ResourceSchema,
    strategy: Option<ListStrategy>,
) -> Result<Plan, ReconcileError> {
    let fetched = fetcher
        .fetch(key)
        .map_err(|source| ReconcileError::FetchFailed {
            key: key.clone(),
            source,
        })?;
    let observed = match fetched {
        Fetched::Found(raw) => normalize(&raw, schema)?,
        Fetched::NotFound => Observed::Absent,
    };

    let change_set = decide(declared, &observed, schema, &DecideOptions { strategy })?;
    let resolved = change_set
        .has_changes()
        .then(|| build(declared, &observed, &change_set, schema));

    Ok(Plan {
        observed,
        change_set,
        resolved,
    })
}

/// Bring the resource at `key` to the declared state.
///
/// Submits only when the decision reports changes and `check_mode` is off.
pub fn reconcile(
    key: &ResourceKey,
    declared: &DeclaredState,
    fetcher: &dyn Fetcher,
    submitter: &dyn Submitter,
    schema: &ResourceSchema,
    options: &ReconcileOptions,
) -> Result<ReconcileReport, ReconcileError> {
    let plan = plan(key, declared, fetcher, schema, options.strategy)?;
    let outcome = plan.change_set.outcome;

    let response = match &plan.resolved {
        Some(resolved) if !options.check_mode => {
            let mode = if plan.change_set.is_create() {
                SubmitMode::Create
            } else {
                SubmitMode::Update
            };
            let request = SubmitRequest {
                key,
                mode,
                object: resolved,
                wire: to_wire(resolved, schema),
                schema,
            };
            let response =
                submitter
                    .submit(&request)
                    .map_err(|source| ReconcileError::SubmitFailed {
                        key: key.clone(),
                        source,
                    })?;
            Some(response)
        }
        _ => None,
    };

    info!(
        "{} {key}: outcome={} changed={} submitted={}",
        schema.name(),
        outcome.as_str(),
        plan.change_set.has_changes(),
        response.is_some()
    );

    Ok(ReconcileReport {
        key: key.clone(),
        changed: plan.change_set.has_changes(),
        outcome,
        changes: plan.change_set.changes,
        resolved: plan.resolved.map(|resolved| redact(&resolved, schema)),
        response,
        check_mode: options.check_mode,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;
    use serde_json::{json, Value as JsonValue};

    use super::{
        reconcile, CollaboratorError, Fetched, Fetcher, ReconcileError, ReconcileOptions,
        RemoteResponse, ResourceKey, SubmitMode, SubmitRequest, Submitter,
    };
    use crate::declared::DeclaredState;
    use crate::decision::Outcome;
    use crate::schema::{embedded_schema, ResourceSchema};

    struct StaticFetcher(Option<JsonValue>);

    impl Fetcher for StaticFetcher {
        fn fetch(&self, _key: &ResourceKey) -> Result<Fetched, CollaboratorError> {
            Ok(match &self.0 {
                Some(raw) => Fetched::Found(raw.clone()),
                None => Fetched::NotFound,
            })
        }
    }

    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn fetch(&self, _key: &ResourceKey) -> Result<Fetched, CollaboratorError> {
            Err("connection refused".into())
        }
    }

    #[derive(Default)]
    struct RecordingSubmitter {
        calls: RefCell<Vec<(SubmitMode, JsonValue)>>,
    }

    impl Submitter for RecordingSubmitter {
        fn submit(&self, request: &SubmitRequest<'_>) -> Result<RemoteResponse, CollaboratorError> {
            self.calls
                .borrow_mut()
                .push((request.mode, request.wire.clone()));
            Ok(RemoteResponse::success("configured"))
        }
    }

    fn syslog() -> ResourceSchema {
        embedded_schema("syslog").expect("schema")
    }

    fn key() -> ResourceKey {
        ResourceKey::new("corp-syslog")
    }

    fn observed() -> StaticFetcher {
        StaticFetcher(Some(json!({"port": "514", "facility": "DAEMON"})))
    }

    #[test]
    fn unchanged_resource_is_not_submitted() {
        let schema = syslog();
        let declared = DeclaredState::from_toml_str("port = 514", &schema).expect("declared");
        let submitter = RecordingSubmitter::default();

        let report = reconcile(
            &key(),
            &declared,
            &observed(),
            &submitter,
            &schema,
            &ReconcileOptions::default(),
        )
        .expect("reconcile");

        assert!(!report.changed);
        assert_eq!(report.outcome, Outcome::Unchanged);
        assert!(report.response.is_none());
        assert!(submitter.calls.borrow().is_empty());
    }

    #[test]
    fn changed_resource_submits_full_replacement() {
        let schema = syslog();
        let declared = DeclaredState::from_toml_str("port = 1514", &schema).expect("declared");
        let submitter = RecordingSubmitter::default();

        let report = reconcile(
            &key(),
            &declared,
            &observed(),
            &submitter,
            &schema,
            &ReconcileOptions::default(),
        )
        .expect("reconcile");

        assert!(report.changed);
        assert_eq!(
            report.response.map(|r| r.status),
            Some("success".to_string())
        );
        assert_eq!(
            submitter.calls.borrow().as_slice(),
            &[(
                SubmitMode::Update,
                json!({"port": "1514", "facility": "DAEMON"})
            )]
        );
    }

    #[test]
    fn missing_resource_is_created() {
        let schema = syslog();
        let declared = DeclaredState::from_toml_str("port = 514", &schema).expect("declared");
        let submitter = RecordingSubmitter::default();

        let report = reconcile(
            &key(),
            &declared,
            &StaticFetcher(None),
            &submitter,
            &schema,
            &ReconcileOptions::default(),
        )
        .expect("reconcile");

        assert_eq!(report.outcome, Outcome::Create);
        assert_eq!(submitter.calls.borrow()[0].0, SubmitMode::Create);
    }

    #[test]
    fn check_mode_reports_without_submitting() {
        let schema = syslog();
        let declared = DeclaredState::from_toml_str("port = 1514", &schema).expect("declared");
        let submitter = RecordingSubmitter::default();

        let report = reconcile(
            &key(),
            &declared,
            &observed(),
            &submitter,
            &schema,
            &ReconcileOptions {
                check_mode: true,
                ..ReconcileOptions::default()
            },
        )
        .expect("reconcile");

        assert!(report.changed);
        assert!(report.resolved.is_some());
        assert!(report.response.is_none());
        assert!(submitter.calls.borrow().is_empty());
    }

    #[test]
    fn report_masks_secrets_but_submits_them() {
        let schema = syslog();
        let declared = DeclaredState::from_toml_str("[auth]\npassword = \"hunter2\"", &schema)
            .expect("declared");
        let submitter = RecordingSubmitter::default();

        let report = reconcile(
            &key(),
            &declared,
            &observed(),
            &submitter,
            &schema,
            &ReconcileOptions::default(),
        )
        .expect("reconcile");

        let json = serde_json::to_string(&report).expect("serialize");
        assert!(!json.contains("hunter2"));
        assert!(json.contains("(secret)"));
        assert_eq!(
            submitter.calls.borrow()[0].1["auth"]["password"],
            json!("hunter2")
        );
    }

    #[test]
    fn fetch_failures_are_surfaced() {
        let schema = syslog();
        let err = reconcile(
            &key(),
            &DeclaredState::empty(),
            &FailingFetcher,
            &RecordingSubmitter::default(),
            &schema,
            &ReconcileOptions::default(),
        )
        .expect_err("fetch failure");

        assert!(matches!(err, ReconcileError::FetchFailed { .. }));
        assert_eq!(
            err.to_string(),
            "fetch failed for corp-syslog: connection refused"
        );
    }

    #[test]
    fn shape_mismatch_aborts_before_submit() {
        let schema = syslog();
        let submitter = RecordingSubmitter::default();
        let err = reconcile(
            &key(),
            &DeclaredState::from_toml_str("port = 1514", &schema).expect("declared"),
            &StaticFetcher(Some(json!({"auth": ["a", "b"]}))),
            &submitter,
            &schema,
            &ReconcileOptions::default(),
        )
        .expect_err("shape");

        assert!(matches!(err, ReconcileError::ShapeMismatch(_)));
        assert!(submitter.calls.borrow().is_empty());
    }
}
