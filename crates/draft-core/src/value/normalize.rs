//! Snapshot normalizado para detección de cambios.
//!
//! Cada hoja `Binary` se reemplaza por un token derivado de su tripleta de
//! metadata. El token es una variante propia (`BlobToken`), distinta de
//! `Text`, para que un campo de texto nunca colisione con un archivo.
//! Nunca se persiste.
use indexmap::IndexMap;
use serde_json::{json, Number, Value};

use super::path::FieldPath;
use super::types::DraftValue;
use super::visit::{traverse, LeafVisitor};
use crate::hashing::hash_value;

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    BlobToken(String),
    Sequence(Vec<NormalizedValue>),
    Object(IndexMap<String, NormalizedValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSnapshot(NormalizedValue);

impl NormalizedSnapshot {
    pub fn of(value: &DraftValue) -> Self {
        NormalizedSnapshot(traverse(value, &mut Normalizer))
    }

    pub fn value(&self) -> &NormalizedValue {
        &self.0
    }

    /// Forma JSON; los tokens quedan como `{"$blob": token}`.
    pub fn to_json(&self) -> Value {
        fn conv(v: &NormalizedValue) -> Value {
            match v {
                NormalizedValue::Null => Value::Null,
                NormalizedValue::Bool(b) => Value::Bool(*b),
                NormalizedValue::Number(n) => Value::Number(n.clone()),
                NormalizedValue::Text(s) => Value::String(s.clone()),
                NormalizedValue::BlobToken(t) => json!({ "$blob": t }),
                NormalizedValue::Sequence(items) => Value::Array(items.iter().map(conv).collect()),
                NormalizedValue::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), conv(v))).collect()),
            }
        }
        conv(&self.0)
    }

    /// Hash blake3 del JSON canónico. Útil para logs y para anotar el
    /// borrador persistido; la detección de cambios compara la estructura.
    pub fn fingerprint(&self) -> String {
        hash_value(&self.to_json())
    }
}

struct Normalizer;

impl LeafVisitor for Normalizer {
    type Output = NormalizedValue;

    fn leaf(&mut self, _path: &FieldPath, value: &DraftValue) -> NormalizedValue {
        match value {
            DraftValue::Null => NormalizedValue::Null,
            DraftValue::Bool(b) => NormalizedValue::Bool(*b),
            DraftValue::Number(n) => NormalizedValue::Number(n.clone()),
            DraftValue::Text(s) => NormalizedValue::Text(s.clone()),
            DraftValue::Binary(b) => NormalizedValue::BlobToken(b.token()),
            // traverse sólo entrega hojas
            DraftValue::Sequence(_) | DraftValue::Object(_) => NormalizedValue::Null,
        }
    }

    fn sequence(&mut self, _path: &FieldPath, items: Vec<NormalizedValue>) -> NormalizedValue {
        NormalizedValue::Sequence(items)
    }

    fn object(&mut self, _path: &FieldPath, fields: IndexMap<String, NormalizedValue>) -> NormalizedValue {
        NormalizedValue::Object(fields)
    }
}
