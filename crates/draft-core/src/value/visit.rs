//! Recorrido genérico del árbol `DraftValue`.
//!
//! Un único recorrido recursivo parametrizado por un `LeafVisitor`. Lo usan la
//! recolección de blobs, la normalización y el stripping del payload escalar;
//! cada uno decide qué hacer con las hojas y cómo recomponer contenedores.
use indexmap::IndexMap;

use super::path::FieldPath;
use super::types::DraftValue;

pub trait LeafVisitor {
    type Output;

    /// Hoja: `Null`, `Bool`, `Number`, `Text` o `Binary`.
    fn leaf(&mut self, path: &FieldPath, value: &DraftValue) -> Self::Output;

    fn sequence(&mut self, path: &FieldPath, items: Vec<Self::Output>) -> Self::Output;

    fn object(&mut self, path: &FieldPath, fields: IndexMap<String, Self::Output>) -> Self::Output;
}

/// Recorre `value` en profundidad (orden de campos / índices) sin mutarlo.
pub fn traverse<V: LeafVisitor>(value: &DraftValue, visitor: &mut V) -> V::Output {
    let mut path = FieldPath::root();
    walk(value, &mut path, visitor)
}

fn walk<V: LeafVisitor>(value: &DraftValue, path: &mut FieldPath, visitor: &mut V) -> V::Output {
    match value {
        DraftValue::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push_index(i);
                out.push(walk(item, path, visitor));
                path.pop();
            }
            visitor.sequence(path, out)
        }
        DraftValue::Object(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (k, v) in map {
                path.push_field(k.clone());
                let child = walk(v, path, visitor);
                path.pop();
                out.insert(k.clone(), child);
            }
            visitor.object(path, out)
        }
        leaf => visitor.leaf(path, leaf),
    }
}
