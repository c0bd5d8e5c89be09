use std::path::Path;

use anyhow::{anyhow, Context, Result};
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::SchemaViolation;

const RUN_MANIFEST_SCHEMA: &str = include_str!("../schemas/run_manifest.schema.json");
const PROVENANCE_SCHEMA: &str = include_str!("../schemas/provenance.schema.json");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    RunManifest,
    /// A single provenance record (the ledger file is a list of these).
    Provenance,
}

impl SchemaKind {
    pub fn label(&self) -> &'static str {
        match self {
            SchemaKind::RunManifest => "run_manifest",
            SchemaKind::Provenance => "provenance",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            SchemaKind::RunManifest => "run_manifest.schema.json",
            SchemaKind::Provenance => "provenance.schema.json",
        }
    }

    fn builtin_source(&self) -> &'static str {
        match self {
            SchemaKind::RunManifest => RUN_MANIFEST_SCHEMA,
            SchemaKind::Provenance => PROVENANCE_SCHEMA,
        }
    }
}

/// Opaque schema collaborator consulted before anything is persisted.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, kind: SchemaKind, doc: &Value) -> Result<(), SchemaViolation>;
}

/// JSON Schema (draft-07) backed validator.
pub struct JsonSchemaValidator {
    manifest: JSONSchema,
    provenance: JSONSchema,
}

impl JsonSchemaValidator {
    /// Schemas compiled into this crate.
    pub fn builtin() -> Result<Self> {
        let manifest = parse_source(SchemaKind::RunManifest, SchemaKind::RunManifest.builtin_source())?;
        let provenance = parse_source(SchemaKind::Provenance, SchemaKind::Provenance.builtin_source())?;
        Self::from_documents(&manifest, &provenance)
    }

    /// Loads `run_manifest.schema.json` and `provenance.schema.json` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let load = |kind: SchemaKind| -> Result<Value> {
            let path = dir.join(kind.file_name());
            let s = std::fs::read_to_string(&path).with_context(|| format!("read schema {}", path.display()))?;
            parse_source(kind, &s).with_context(|| format!("schema {}", path.display()))
        };
        Self::from_documents(&load(SchemaKind::RunManifest)?, &load(SchemaKind::Provenance)?)
    }

    pub fn from_documents(manifest: &Value, provenance: &Value) -> Result<Self> {
        Ok(Self {
            manifest: compile(SchemaKind::RunManifest, manifest)?,
            provenance: compile(SchemaKind::Provenance, provenance)?,
        })
    }

    fn schema(&self, kind: SchemaKind) -> &JSONSchema {
        match kind {
            SchemaKind::RunManifest => &self.manifest,
            SchemaKind::Provenance => &self.provenance,
        }
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, kind: SchemaKind, doc: &Value) -> Result<(), SchemaViolation> {
        let result = self.schema(kind).validate(doc);
        if let Err(errors) = result {
            let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(SchemaViolation { kind, messages });
        }
        Ok(())
    }
}

fn parse_source(kind: SchemaKind, source: &str) -> Result<Value> {
    serde_json::from_str(source).with_context(|| format!("invalid JSON in {} schema", kind.label()))
}

fn compile(kind: SchemaKind, doc: &Value) -> Result<JSONSchema> {
    JSONSchema::compile(doc).map_err(|e| anyhow!("compile {} schema: {}", kind.label(), e))
}
