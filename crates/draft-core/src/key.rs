//! `DraftKey`: identidad compuesta (finca, usuario) de un borrador.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::DRAFT_ID_PREFIX;
use crate::errors::DraftError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftKey {
    entity_id: String,
    owner_id: String,
}

impl DraftKey {
    /// Ambos componentes deben ser no vacíos.
    pub fn new(entity_id: impl Into<String>, owner_id: impl Into<String>) -> Result<Self, DraftError> {
        let entity_id = entity_id.into();
        let owner_id = owner_id.into();
        if entity_id.trim().is_empty() {
            return Err(DraftError::InvalidKey("empty entity id".into()));
        }
        if owner_id.trim().is_empty() {
            return Err(DraftError::InvalidKey("empty owner id".into()));
        }
        Ok(Self { entity_id, owner_id })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Identificador de almacenamiento compartido por ambas stores.
    ///
    /// Cada componente escapa `%` y `/`, así que la función es inyectiva.
    pub fn draft_id(&self) -> String {
        format!("{DRAFT_ID_PREFIX}/{}/{}", escape(&self.entity_id), escape(&self.owner_id))
    }

    /// Inversa de `draft_id`; `None` si el texto no tiene la forma esperada.
    pub fn from_draft_id(draft_id: &str) -> Option<Self> {
        let rest = draft_id.strip_prefix(DRAFT_ID_PREFIX)?.strip_prefix('/')?;
        let (entity, owner) = rest.split_once('/')?;
        Self::new(unescape(entity)?, unescape(owner)?).ok()
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "finca={} usuario={}", self.entity_id, self.owner_id)
    }
}

fn escape(component: &str) -> String {
    component.replace('%', "%25").replace('/', "%2F")
}

fn unescape(component: &str) -> Option<String> {
    let mut out = String::with_capacity(component.len());
    let mut rest = component;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3)?;
        match code {
            "25" => out.push('%'),
            "2F" => out.push('/'),
            _ => return None,
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Some(out)
}
