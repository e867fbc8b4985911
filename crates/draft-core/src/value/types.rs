//! Tipos del snapshot del wizard: `DraftValue` y `BinaryValue`.
//!
//! Rol en el flujo:
//! - El wizard entrega en cada edición un `DraftValue` completo (árbol de
//!   escalares, objetos y secuencias).
//! - Las hojas `Binary` representan archivos subidos (fotos de campo). Nunca
//!   se comparan por bytes: su identidad es la tripleta de metadata
//!   (`name`, `size`, `last_modified`).
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Tripleta de identidad de un archivo subido.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobMeta {
    pub name: String,
    pub size: u64,
    /// Epoch en milisegundos, tal como lo reporta el navegador.
    pub last_modified: i64,
}

/// Payload binario opaco con su metadata.
///
/// Los bytes viven detrás de un `Arc` para que clonar snapshots (cosa que
/// ocurre en cada edición) no copie imágenes completas.
#[derive(Debug, Clone)]
pub struct BinaryValue {
    pub name: String,
    pub size: u64,
    pub last_modified: i64,
    pub mime_type: Option<String>,
    pub bytes: Arc<Vec<u8>>,
}

impl BinaryValue {
    /// Construye un binario; `size` se deriva de los bytes.
    pub fn new(name: impl Into<String>, last_modified: i64, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(),
               size: bytes.len() as u64,
               last_modified,
               mime_type,
               bytes: Arc::new(bytes) }
    }

    pub fn meta(&self) -> BlobMeta {
        BlobMeta { name: self.name.clone(),
                   size: self.size,
                   last_modified: self.last_modified }
    }

    /// Token determinista usado por la normalización. Los dos campos
    /// numéricos van al final, así que el nombre puede contener `:` sin
    /// ambigüedad.
    pub fn token(&self) -> String {
        format!("blob:{}:{}:{}", self.name, self.size, self.last_modified)
    }
}

/// La igualdad de binarios es igualdad de metadata (nunca de bytes).
impl PartialEq for BinaryValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.size == other.size && self.last_modified == other.last_modified
    }
}

/// Nodo del snapshot del wizard.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DraftValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Sequence(Vec<DraftValue>),
    /// Mapa que preserva el orden de inserción de los campos.
    Object(IndexMap<String, DraftValue>),
    Binary(BinaryValue),
}

impl DraftValue {
    pub fn object() -> Self {
        DraftValue::Object(IndexMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DraftValue::Null)
    }

    pub fn as_binary(&self) -> Option<&BinaryValue> {
        match self {
            DraftValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, DraftValue>> {
        match self {
            DraftValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, DraftValue>> {
        match self {
            DraftValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<DraftValue>> {
        match self {
            DraftValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DraftValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Acceso por campo (sólo objetos).
    pub fn get(&self, field: &str) -> Option<&DraftValue> {
        self.as_object().and_then(|m| m.get(field))
    }

    /// Acceso por índice (sólo secuencias).
    pub fn at(&self, index: usize) -> Option<&DraftValue> {
        self.as_sequence().and_then(|s| s.get(index))
    }

    /// Inserta un campo si el nodo es objeto; devuelve `self` para encadenar
    /// en tests y fixtures.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<DraftValue>) -> Self {
        if let DraftValue::Object(map) = &mut self {
            map.insert(field.into(), value.into());
        }
        self
    }

    /// `true` si algún nodo del árbol es un `Binary`.
    pub fn contains_binary(&self) -> bool {
        match self {
            DraftValue::Binary(_) => true,
            DraftValue::Sequence(items) => items.iter().any(DraftValue::contains_binary),
            DraftValue::Object(map) => map.values().any(DraftValue::contains_binary),
            _ => false,
        }
    }
}

impl From<Value> for DraftValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DraftValue::Null,
            Value::Bool(b) => DraftValue::Bool(b),
            Value::Number(n) => DraftValue::Number(n),
            Value::String(s) => DraftValue::Text(s),
            Value::Array(items) => DraftValue::Sequence(items.into_iter().map(DraftValue::from).collect()),
            Value::Object(map) => DraftValue::Object(map.into_iter().map(|(k, v)| (k, DraftValue::from(v))).collect()),
        }
    }
}

impl From<BinaryValue> for DraftValue {
    fn from(value: BinaryValue) -> Self {
        DraftValue::Binary(value)
    }
}

impl From<&str> for DraftValue {
    fn from(value: &str) -> Self {
        DraftValue::Text(value.to_string())
    }
}

impl From<String> for DraftValue {
    fn from(value: String) -> Self {
        DraftValue::Text(value)
    }
}

impl From<bool> for DraftValue {
    fn from(value: bool) -> Self {
        DraftValue::Bool(value)
    }
}

impl From<i64> for DraftValue {
    fn from(value: i64) -> Self {
        DraftValue::Number(Number::from(value))
    }
}

impl From<Vec<DraftValue>> for DraftValue {
    fn from(value: Vec<DraftValue>) -> Self {
        DraftValue::Sequence(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binary_equality_ignores_bytes() {
        let a = BinaryValue::new("frente.jpg", 1_700_000_000_000, None, vec![1, 2, 3]);
        let mut b = BinaryValue::new("frente.jpg", 1_700_000_000_000, Some("image/jpeg".into()), vec![9, 9, 9]);
        assert_eq!(a, b);
        b.last_modified += 1;
        assert_ne!(a, b);
    }

    #[test]
    fn from_json_preserves_field_order() {
        let v = DraftValue::from(json!({"z": 1, "a": [true, null], "m": "x"}));
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(v.get("a").and_then(|s| s.at(0)), Some(&DraftValue::Bool(true)));
    }

    #[test]
    fn contains_binary_finds_nested_leaf() {
        let photo = BinaryValue::new("p.png", 1, None, vec![0]);
        let v = DraftValue::object().with("fotos", vec![DraftValue::object(), DraftValue::object().with("frente", photo)]);
        assert!(v.contains_binary());
        assert!(!DraftValue::from(json!({"a": {"b": [1, 2]}})).contains_binary());
    }
}
