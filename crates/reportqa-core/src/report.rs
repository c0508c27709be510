//! The analytics report model and its conversion into documents.
//!
//! A report is an ordered list of named sections, each holding arbitrary
//! JSON-compatible content. Section order is preserved end to end so that
//! the same report always yields the same documents in the same order.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::traits::ReportSource;
use crate::types::Document;

pub const DEFAULT_SOURCE_TAG: &str = "generated_report";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub name: String,
    pub content: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a section. Replacing keeps the original position.
    ///
    /// Values go through their serde representation, so date/time types
    /// become their canonical string form and non-finite floats become
    /// `null`. A value that cannot be represented at all is stored as a
    /// descriptive string instead of failing.
    pub fn insert<T: Serialize + ?Sized>(&mut self, name: impl Into<String>, value: &T) -> &mut Self {
        let name = name.into();
        let content = coerce(&name, value);
        match self.sections.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.content = content,
            None => self.sections.push(ReportSection { name, content }),
        }
        self
    }

    /// Build a report from a parsed JSON value; the top level must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                sections: map
                    .into_iter()
                    .map(|(name, content)| ReportSection { name, content })
                    .collect(),
            }),
            other => Err(Error::Report(format!(
                "top-level report value must be an object, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(s)?)
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn coerce<T: Serialize + ?Sized>(name: &str, value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(section = name, error = %e, "report value is not representable as JSON; storing as text");
            Value::String(format!("<unserializable: {e}>"))
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Converts a [`Report`] into one [`Document`] per section.
#[derive(Debug, Clone)]
pub struct ReportSerializer {
    source_tag: String,
}

impl Default for ReportSerializer {
    fn default() -> Self {
        Self { source_tag: DEFAULT_SOURCE_TAG.to_string() }
    }
}

impl ReportSerializer {
    pub fn new(source_tag: impl Into<String>) -> Self {
        Self { source_tag: source_tag.into() }
    }

    /// Text is `"<section>: <pretty JSON>"` with two-space indentation, which
    /// places nested entries on their own lines for the chunker.
    pub fn serialize(&self, report: &Report) -> Vec<Document> {
        report
            .sections()
            .iter()
            .map(|section| {
                let body = serde_json::to_string_pretty(&section.content)
                    .unwrap_or_else(|_| section.content.to_string());
                Document {
                    section: section.name.clone(),
                    text: format!("{}: {}", section.name, body),
                    source_tag: self.source_tag.clone(),
                }
            })
            .collect()
    }
}

/// Reads the report from a JSON file produced by the analytics job.
#[derive(Debug, Clone)]
pub struct JsonFileReport {
    path: PathBuf,
}

impl JsonFileReport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSource for JsonFileReport {
    fn load(&self) -> Result<Report> {
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            Error::Report(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let report = Report::from_json_str(&raw)?;
        tracing::info!(path = %self.path.display(), sections = report.len(), "loaded report");
        Ok(report)
    }
}

/// An already-built report held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticReport(pub Report);

impl ReportSource for StaticReport {
    fn load(&self) -> Result<Report> {
        Ok(self.0.clone())
    }
}
