//! In-memory protocol table with an optional active protocol.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::frame::{FrameParser, decode_frame};
use crate::validate::{ValidationError, validate};
use crate::{ParsedFrame, Protocol};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("protocol '{name}' is invalid: {}", join(.errors))]
    Invalid {
        name: String,
        errors: Vec<ValidationError>,
    },
    #[error("protocol not found: {id}")]
    NotFound { id: String },
    #[error("no active protocol")]
    NoActive,
    #[error("protocol json: {0}")]
    Json(#[from] serde_json::Error),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validated protocol snapshots keyed by id.
///
/// Snapshots are shared as `Arc<Protocol>`; replacing an id does not affect
/// parsers already holding the old snapshot.
#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    protocols: BTreeMap<String, Arc<Protocol>>,
    active: Option<String>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store `protocol`, replacing any snapshot with the same id.
    pub fn register(&mut self, protocol: Protocol) -> Result<Arc<Protocol>, RegistryError> {
        let errors = validate(&protocol);
        if !errors.is_empty() {
            return Err(RegistryError::Invalid {
                name: protocol.name,
                errors,
            });
        }
        let snapshot = Arc::new(protocol);
        debug!(id = %snapshot.id, name = %snapshot.name, "protocol registered");
        self.protocols
            .insert(snapshot.id.clone(), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn register_json(&mut self, json: &str) -> Result<Arc<Protocol>, RegistryError> {
        let protocol = Protocol::from_json(json)?;
        self.register(protocol)
    }

    /// Remove a protocol; the active selection is cleared when it pointed at it.
    pub fn remove(&mut self, id: &str) -> Option<Arc<Protocol>> {
        let removed = self.protocols.remove(id)?;
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        debug!(id, "protocol removed");
        Some(removed)
    }

    /// Select the active protocol, or clear the selection with `None`.
    pub fn set_active(&mut self, id: Option<&str>) -> Result<(), RegistryError> {
        match id {
            Some(id) if !self.protocols.contains_key(id) => Err(RegistryError::NotFound {
                id: id.to_string(),
            }),
            _ => {
                self.active = id.map(str::to_string);
                debug!(active = ?self.active, "active protocol changed");
                Ok(())
            }
        }
    }

    pub fn active(&self) -> Option<&Arc<Protocol>> {
        self.active.as_ref().and_then(|id| self.protocols.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Protocol>> {
        self.protocols.get(id)
    }

    /// Registered protocols ordered by id.
    pub fn list(&self) -> Vec<Arc<Protocol>> {
        self.protocols.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// New stream parser bound to the current snapshot of `id`.
    pub fn parser_for(&self, id: &str) -> Result<FrameParser, RegistryError> {
        self.get(id)
            .map(|protocol| FrameParser::new(Arc::clone(protocol)))
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    /// Decode one delimited frame with the active protocol.
    pub fn parse(&self, data: &[u8]) -> Result<ParsedFrame, RegistryError> {
        let protocol = self.active().ok_or(RegistryError::NoActive)?;
        Ok(decode_frame(protocol, data))
    }

    /// Decode one delimited frame with a specific protocol.
    pub fn parse_with(&self, id: &str, data: &[u8]) -> Result<ParsedFrame, RegistryError> {
        let protocol = self
            .get(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        Ok(decode_frame(protocol, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldType, ProtocolField};

    fn protocol(id: &str) -> Protocol {
        let mut protocol = Protocol::new(id)
            .with_header(vec![0xAA])
            .with_field(ProtocolField::new("v", FieldType::Uint8, 0));
        protocol.id = id.to_string();
        protocol
    }

    #[test]
    fn register_rejects_invalid() {
        let mut registry = ProtocolRegistry::new();
        let bad = protocol("bad").with_field(ProtocolField::new("v", FieldType::Hex, 1));
        let err = registry.register(bad).unwrap_err();
        match &err {
            RegistryError::Invalid { errors, .. } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("duplicate field name 'v'"));
        assert!(registry.is_empty());
    }

    #[test]
    fn active_selection_and_removal() {
        let mut registry = ProtocolRegistry::new();
        registry.register(protocol("b")).unwrap();
        registry.register(protocol("a")).unwrap();
        let ids: Vec<_> = registry.list().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(matches!(registry.parse(&[0xAA, 1]), Err(RegistryError::NoActive)));
        registry.set_active(Some("a")).unwrap();
        assert_eq!(registry.parse(&[0xAA, 1]).unwrap().fields[0].value, "1");
        assert!(matches!(
            registry.set_active(Some("zzz")),
            Err(RegistryError::NotFound { .. })
        ));
        assert_eq!(registry.active().map(|p| p.id.as_str()), Some("a"));

        registry.remove("a");
        assert!(registry.active().is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn parsers_keep_their_snapshot() {
        let mut registry = ProtocolRegistry::new();
        registry.register(protocol("p")).unwrap();
        let mut parser = registry.parser_for("p").unwrap();
        let mut replacement = protocol("p");
        replacement.header = Some(vec![0xBB]);
        registry.register(replacement).unwrap();

        assert_eq!(parser.feed(&[0xAA, 0x07]).count(), 1);
        assert!(registry.parse_with("p", &[0xBB, 0x07]).unwrap().valid);
        assert!(registry.parser_for("missing").is_err());
    }

    #[test]
    fn register_json_reports_parse_errors() {
        let mut registry = ProtocolRegistry::new();
        assert!(matches!(
            registry.register_json("{"),
            Err(RegistryError::Json(_))
        ));
    }
}
