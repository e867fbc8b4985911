//! Gramática canónica de rutas dentro de un snapshot.
//!
//! ```text
//! path    := "" | first rest*
//! first   := field | "." field? | "[" index "]"
//! rest    := "." field? | "[" index "]"
//! index   := [0-9]+
//! ```
//!
//! - Un campo se escribe tal cual salvo `\`, `.`, `[` y `]`, que se escapan
//!   con `\` delante (`a\.b` es el campo literal `a.b`).
//! - El primer segmento omite el `.` inicial; un campo vacío siempre lleva su
//!   `.` (la ruta `.` es el campo vacío de la raíz).
//! - La ruta vacía es la raíz.
//!
//! `to_string` y `parse` son inversas exactas.
use std::fmt;
use std::str::FromStr;

use crate::errors::DraftError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Ruta estructural (`fotos[2].frente`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn push_field(&mut self, name: impl Into<String>) {
        self.segments.push(PathSegment::Field(name.into()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.push_field(name);
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.push_index(index);
        self
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    for c in name.chars() {
        if matches!(c, '\\' | '.' | '[' | ']') {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
                PathSegment::Field(name) => {
                    if i > 0 || name.is_empty() {
                        f.write_str(".")?;
                    }
                    write_escaped(f, name)?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DraftError::InvalidPath { path: s.to_string(),
                                                              reason: reason.to_string() };
        let mut segments = Vec::new();
        let mut chars = s.chars().peekable();
        let mut first = true;
        while let Some(&c) = chars.peek() {
            match c {
                '[' => {
                    chars.next();
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(_) => return Err(invalid("non-digit inside index")),
                            None => return Err(invalid("unterminated index")),
                        }
                    }
                    if digits.is_empty() {
                        return Err(invalid("empty index"));
                    }
                    let idx = digits.parse::<usize>().map_err(|_| invalid("index out of range"))?;
                    segments.push(PathSegment::Index(idx));
                }
                ']' => return Err(invalid("unbalanced ']'")),
                _ => {
                    if c == '.' {
                        chars.next();
                    } else if !first {
                        return Err(invalid("expected '.' or '[' between segments"));
                    }
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        match n {
                            '.' | '[' => break,
                            ']' => return Err(invalid("unescaped ']' in field")),
                            '\\' => {
                                chars.next();
                                match chars.next() {
                                    Some(esc) => name.push(esc),
                                    None => return Err(invalid("dangling escape")),
                                }
                            }
                            _ => {
                                name.push(n);
                                chars.next();
                            }
                        }
                    }
                    segments.push(PathSegment::Field(name));
                }
            }
            first = false;
        }
        Ok(FieldPath { segments })
    }
}
