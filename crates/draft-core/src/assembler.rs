//! Ensamblado y restauración de borradores.
//!
//! - `collect_blobs`: extrae cada hoja `Binary` indexada por su ruta canónica.
//! - `strip_blobs`: produce el payload escalar (JSON) con `null` en el lugar
//!   de cada binario.
//! - `restore`: reinyecta los binarios en un clon del payload escalar.
//!
//! Invariante: `restore(strip_blobs(S), collect_blobs(S)) == S` (igualdad de
//! binarios por metadata).
use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::warn;
use serde_json::Value;

use crate::value::{traverse, BinaryValue, DraftValue, FieldPath, LeafVisitor, PathSegment};

/// Ruta canónica → binario.
pub type BlobMap = BTreeMap<String, BinaryValue>;

struct BlobCollector(BlobMap);

impl LeafVisitor for BlobCollector {
    type Output = ();

    fn leaf(&mut self, path: &FieldPath, value: &DraftValue) {
        if let DraftValue::Binary(b) = value {
            self.0.insert(path.to_string(), b.clone());
        }
    }

    fn sequence(&mut self, _path: &FieldPath, _items: Vec<()>) {}

    fn object(&mut self, _path: &FieldPath, _fields: IndexMap<String, ()>) {}
}

struct Stripper;

impl LeafVisitor for Stripper {
    type Output = Value;

    fn leaf(&mut self, _path: &FieldPath, value: &DraftValue) -> Value {
        match value {
            DraftValue::Bool(b) => Value::Bool(*b),
            DraftValue::Number(n) => Value::Number(n.clone()),
            DraftValue::Text(s) => Value::String(s.clone()),
            _ => Value::Null,
        }
    }

    fn sequence(&mut self, _path: &FieldPath, items: Vec<Value>) -> Value {
        Value::Array(items)
    }

    fn object(&mut self, _path: &FieldPath, fields: IndexMap<String, Value>) -> Value {
        Value::Object(fields.into_iter().collect())
    }
}

pub fn collect_blobs(snapshot: &DraftValue) -> BlobMap {
    let mut collector = BlobCollector(BlobMap::new());
    traverse(snapshot, &mut collector);
    collector.0
}

pub fn strip_blobs(snapshot: &DraftValue) -> Value {
    traverse(snapshot, &mut Stripper)
}

/// Clona `scalar` y escribe cada binario en su ruta, creando objetos o
/// posiciones de secuencia intermedias cuando faltan. Un índice fuera de
/// rango rellena la secuencia con objetos vacíos. Rutas ilegibles se omiten.
pub fn restore(scalar: &DraftValue, blobs: &BlobMap) -> DraftValue {
    let mut out = scalar.clone();
    for (raw, blob) in blobs {
        match raw.parse::<FieldPath>() {
            Ok(path) => insert_at(&mut out, path.segments(), DraftValue::Binary(blob.clone())),
            Err(e) => warn!("restore: skip blob path={raw} err={e}"),
        }
    }
    out
}

fn insert_at(target: &mut DraftValue, segments: &[PathSegment], leaf: DraftValue) {
    let Some((head, rest)) = segments.split_first() else {
        *target = leaf;
        return;
    };
    match head {
        PathSegment::Field(name) => {
            if !matches!(target, DraftValue::Object(_)) {
                *target = DraftValue::object();
            }
            if let DraftValue::Object(map) = target {
                let child = map.entry(name.clone()).or_insert(DraftValue::Null);
                insert_at(child, rest, leaf);
            }
        }
        PathSegment::Index(idx) => {
            if !matches!(target, DraftValue::Sequence(_)) {
                *target = DraftValue::Sequence(Vec::new());
            }
            if let DraftValue::Sequence(items) = target {
                while items.len() <= *idx {
                    items.push(DraftValue::object());
                }
                insert_at(&mut items[*idx], rest, leaf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn photo(name: &str, ts: i64) -> BinaryValue {
        BinaryValue::new(name, ts, Some("image/jpeg".into()), name.as_bytes().to_vec())
    }

    fn sample() -> DraftValue {
        DraftValue::object().with("finca", "La Esperanza")
                            .with("fotos",
                                  vec![DraftValue::object().with("frente", DraftValue::Null),
                                       DraftValue::object().with("frente", photo("frente.jpg", 1))
                                                           .with("nota", "hoja amarilla"),])
                            .with("notas", DraftValue::object().with("adjunto", photo("adjunto.png", 2)))
    }

    #[test]
    fn collect_blobs_keys_by_canonical_path() {
        let blobs = collect_blobs(&sample());
        let keys: Vec<&str> = blobs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["fotos[1].frente", "notas.adjunto"]);
        assert_eq!(blobs["notas.adjunto"].name, "adjunto.png");
    }

    #[test]
    fn strip_replaces_binaries_with_null() {
        let stripped = strip_blobs(&sample());
        assert_eq!(stripped["fotos"][1]["frente"], Value::Null);
        assert_eq!(stripped["fotos"][1]["nota"], json!("hoja amarilla"));
        assert_eq!(stripped["notas"], json!({"adjunto": null}));
    }

    #[test]
    fn roundtrip_restores_original_snapshot() {
        let original = sample();
        let scalar = DraftValue::from(strip_blobs(&original));
        let restored = restore(&scalar, &collect_blobs(&original));
        assert_eq!(restored, original);
        let frente = restored.get("fotos").and_then(|f| f.at(1)).and_then(|f| f.get("frente"));
        assert_eq!(frente.and_then(DraftValue::as_binary).map(|b| b.meta()),
                   Some(photo("frente.jpg", 1).meta()));
    }

    #[test]
    fn missing_blob_leaves_placeholder_null() {
        let original = sample();
        let scalar = DraftValue::from(strip_blobs(&original));
        let mut blobs = collect_blobs(&original);
        blobs.remove("fotos[1].frente");
        let restored = restore(&scalar, &blobs);
        assert!(restored.get("fotos").and_then(|f| f.at(1)).and_then(|f| f.get("frente")).unwrap().is_null());
        assert!(restored.get("notas").and_then(|n| n.get("adjunto")).and_then(DraftValue::as_binary).is_some());
    }

    #[test]
    fn out_of_bounds_index_pads_with_empty_objects() {
        let mut blobs = BlobMap::new();
        blobs.insert("fotos[3].lateral".into(), photo("l.jpg", 5));
        let restored = restore(&DraftValue::from(json!({"fotos": [{"a": 1}]})), &blobs);
        let fotos = restored.get("fotos").and_then(DraftValue::as_sequence).unwrap();
        assert_eq!(fotos.len(), 4);
        assert_eq!(fotos[0], DraftValue::from(json!({"a": 1})));
        assert_eq!(fotos[1], DraftValue::object());
        assert_eq!(fotos[2], DraftValue::object());
        assert!(fotos[3].get("lateral").and_then(DraftValue::as_binary).is_some());
    }

    #[test]
    fn creates_intermediate_structure_on_shallow_scalar() {
        let mut blobs = BlobMap::new();
        blobs.insert("a.b[0][1].c".into(), photo("x", 1));
        blobs.insert("bad[".into(), photo("y", 2));
        let restored = restore(&DraftValue::Null, &blobs);
        let inner = restored.get("a").and_then(|a| a.get("b")).and_then(|b| b.at(0)).and_then(|s| s.at(1));
        assert!(inner.and_then(|o| o.get("c")).and_then(DraftValue::as_binary).is_some());
        assert!(restored.get("bad").is_none());
    }

    #[test]
    fn collect_does_not_mutate_input() {
        let original = sample();
        let copy = original.clone();
        let _ = collect_blobs(&original);
        let _ = strip_blobs(&original);
        assert_eq!(original, copy);
    }
}
