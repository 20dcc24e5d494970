//! Declarative reconciliation of firewall resources managed through an XML
//! management API.
//!
//! Given the configuration a caller declares for one resource and the object
//! the device currently holds, the engine decides whether anything must
//! change and builds the full replacement object to submit.
//!
//! # Pipeline
//!
//! 1. [`normalize`] turns the loosely shaped device object into an
//!    [`value::Observed`] whose cardinality follows the [`schema`].
//! 2. [`decision`] compares it with the [`declared`] state field by field,
//!    using [`compare`] for scalars and [`list`] for sequences.
//! 3. [`payload`] overlays the declared changes on the observed object.
//! 4. [`reconcile`] drives one fetch-decide-build-submit cycle through the
//!    [`reconcile::Fetcher`] and [`reconcile::Submitter`] collaborators;
//!    [`store`] provides file-backed ones.
//!
//! # Example
//!
//! ```ignore
//! use fwstate::declared::DeclaredState;
//! use fwstate::reconcile::{reconcile, ReconcileOptions, ResourceKey};
//! use fwstate::schema::embedded_schema;
//! use fwstate::store::FileStore;
//!
//! let schema = embedded_schema("syslog")?;
//! let declared = DeclaredState::from_toml_str("port = 1514", &schema)?;
//! let store = FileStore::new("state");
//! let report = reconcile(
//!     &ResourceKey::new("corp-syslog"),
//!     &declared,
//!     &store,
//!     &store,
//!     &schema,
//!     &ReconcileOptions::default(),
//! )?;
//! println!("changed={}", report.changed);
//! ```
//!
//! XML parsing, writing and the xmltodict-style object model live in
//! `xml-object-core`; everything resource-specific is in this crate.

pub mod compare;
pub mod decision;
pub mod declared;
pub mod list;
pub mod normalize;
pub mod payload;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod store;
pub mod value;
