//! File-backed collaborators: one XML document per resource key.
//!
//! A stored document is either the bare object element (`<entry name="..">`)
//! or a full management API `<response>` envelope as captured from a device.

use std::fs;
use std::path::PathBuf;

use log::debug;
use serde_json::Value as JsonValue;
use thiserror::Error;
use xml_object_core::{
    parse_file, to_object, write_file, ApiResponse, ObjectError, ParseError, WriteError, XmlNode,
};

use crate::payload::render_element;
use crate::reconcile::{
    CollaboratorError, Fetched, Fetcher, RemoteResponse, ResourceKey, SubmitRequest, Submitter,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid resource key '{0}': keys may not contain path separators or '..'")]
    InvalidKey(String),
    #[error("failed to parse {path}: {source}")]
    Parse { path: String, source: ParseError },
    #[error("device returned status '{status}': {message}")]
    Remote { status: String, message: String },
    #[error("failed to render resolved object: {0}")]
    Render(#[from] ObjectError),
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: WriteError },
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads and writes `<root>/<key>.xml`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the document for `key`.
    pub fn path_for(&self, key: &ResourceKey) -> Result<PathBuf, StoreError> {
        let raw = key.as_str();
        if raw.is_empty() || raw.contains(['/', '\\']) || raw.contains("..") {
            return Err(StoreError::InvalidKey(raw.to_string()));
        }
        Ok(self.root.join(format!("{raw}.xml")))
    }

    fn read(&self, key: &ResourceKey) -> Result<Fetched, StoreError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            debug!("{}: no document, resource is absent", path.display());
            return Ok(Fetched::NotFound);
        }
        let node = parse_file(&path).map_err(|source| StoreError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        fetched_from_node(&node)
    }

    fn write(&self, request: &SubmitRequest<'_>) -> Result<RemoteResponse, StoreError> {
        let path = self.path_for(request.key)?;
        let element = render_element(request.object, request.schema, request.key.as_str())?;
        fs::create_dir_all(&self.root)?;
        write_file(&element, &path).map_err(|source| StoreError::Write {
            path: path.display().to_string(),
            source,
        })?;

        let mut response =
            RemoteResponse::success(format!("{} {}", request.mode.as_str(), request.key));
        response
            .diagnostics
            .push(format!("wrote {}", path.display()));
        Ok(response)
    }
}

/// Interpret a stored or captured document.
///
/// Envelopes reporting "object not present" or an empty result are
/// [`Fetched::NotFound`]; other error envelopes fail with the device message.
/// A text-only `<result>` is passed on as a string placeholder.
pub fn fetched_from_node(node: &XmlNode) -> Result<Fetched, StoreError> {
    let Some(response) = ApiResponse::from_node(node) else {
        return Ok(Fetched::Found(to_object(node)));
    };

    if response.is_object_missing() {
        return Ok(Fetched::NotFound);
    }
    if !response.is_success() {
        return Err(StoreError::Remote {
            status: response.status.clone(),
            message: response.message(),
        });
    }

    match response.payload() {
        None => Ok(Fetched::NotFound),
        Some(payload) if payload.tag == "result" && payload.children.is_empty() => Ok(
            Fetched::Found(JsonValue::String(payload.text.clone().unwrap_or_default())),
        ),
        Some(payload) => Ok(Fetched::Found(to_object(payload))),
    }
}

impl Fetcher for FileStore {
    fn fetch(&self, key: &ResourceKey) -> Result<Fetched, CollaboratorError> {
        Ok(self.read(key)?)
    }
}

impl Submitter for FileStore {
    fn submit(&self, request: &SubmitRequest<'_>) -> Result<RemoteResponse, CollaboratorError> {
        Ok(self.write(request)?)
    }
}
