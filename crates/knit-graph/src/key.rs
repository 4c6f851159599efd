//! Binding keys: canonical `(type, qualifier)` identities.
//!
//! A [`BindingKey`] is the identity every other stage keys its maps on. Keys
//! are canonicalized before comparison so that structurally identical
//! requests collapse to one key:
//!
//! | Written | Canonical |
//! |---------|-----------|
//! | `List<out Foo>` | `List<Foo>` |
//! | `List<? extends Foo>` | `List<Foo>` |
//! | `Map<String, in Foo>` | `Map<String, Foo>` |
//! | `List<*>` / `List<?>` | `List<*>` |
//! | `@Named(b = "2", a = "1")` | `@Named(a = "1", b = "2")` |
//!
//! Configured type aliases (`java.lang.Integer` → `kotlin.Int`) are applied
//! to every type name, including nested arguments.
//!
//! Canonical keys are interned into [`KeyId`] handles by [`KeyInterner`];
//! comparing two `KeyId`s is the same as comparing the canonical keys.

use rustc_hash::FxHashMap;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Type references
// =============================================================================

/// Use-site variance of a type argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variance {
    Invariant,
    Out,
    In,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeArg {
    /// `*` or a bare `?` wildcard.
    Star,
    Type { variance: Variance, ty: TypeRef },
}

/// A structured reference to a (possibly generic) type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeArg>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} at offset {position}")]
pub struct TypeParseError {
    pub position: usize,
    pub reason: &'static str,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            nullable: false,
        }
    }

    /// `name<args...>` with invariant arguments.
    pub fn generic(name: impl Into<String>, args: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            name: name.into(),
            args: args
                .into_iter()
                .map(|ty| TypeArg::Type {
                    variance: Variance::Invariant,
                    ty,
                })
                .collect(),
            nullable: false,
        }
    }

    /// Parse the textual form used by the front-end (`Map<String, out Foo>?`).
    pub fn parse(text: &str) -> Result<Self, TypeParseError> {
        let mut parser = TypeParser {
            text: text.as_bytes(),
            pos: 0,
        };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != parser.text.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }

    /// Last segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Strip use-site variance and apply aliases, recursively.
    #[must_use]
    pub fn canonicalize(&self, aliases: &FxHashMap<String, String>) -> Self {
        let name = aliases
            .get(&self.name)
            .cloned()
            .unwrap_or_else(|| self.name.clone());
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                TypeArg::Star => TypeArg::Star,
                TypeArg::Type { ty, .. } => TypeArg::Type {
                    variance: Variance::Invariant,
                    ty: ty.canonicalize(aliases),
                },
            })
            .collect();
        Self {
            name,
            args,
            nullable: self.nullable,
        }
    }

    /// The type arguments that are not star projections.
    pub fn type_arguments(&self) -> impl Iterator<Item = &TypeRef> {
        self.args.iter().filter_map(|arg| match arg {
            TypeArg::Star => None,
            TypeArg::Type { ty, .. } => Some(ty),
        })
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                match arg {
                    TypeArg::Star => f.write_str("*")?,
                    TypeArg::Type { variance, ty } => {
                        match variance {
                            Variance::Invariant => {}
                            Variance::Out => f.write_str("out ")?,
                            Variance::In => f.write_str("in ")?,
                        }
                        write!(f, "{ty}")?;
                    }
                }
            }
            f.write_str(">")?;
        }
        if self.nullable {
            f.write_str("?")?;
        }
        Ok(())
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct TypeParser<'a> {
    text: &'a [u8],
    pos: usize,
}

impl TypeParser<'_> {
    fn error(&self, reason: &'static str) -> TypeParseError {
        TypeParseError {
            position: self.pos,
            reason,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    fn is_ident_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'$' || b >= 0x80
    }

    /// Consume `word` when it is followed by whitespace.
    fn eat_keyword(&mut self, word: &str) -> bool {
        let end = self.pos + word.len();
        if end < self.text.len()
            && &self.text[self.pos..end] == word.as_bytes()
            && self.text[end].is_ascii_whitespace()
        {
            self.pos = end;
            self.skip_ws();
            return true;
        }
        false
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeParseError> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(Self::is_ident_byte) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        let name = String::from_utf8_lossy(&self.text[start..self.pos]).into_owned();

        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'<') {
            self.pos += 1;
            loop {
                args.push(self.parse_arg()?);
                self.skip_ws();
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b'>') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or '>'")),
                }
            }
        }

        self.skip_ws();
        let nullable = self.peek() == Some(b'?');
        if nullable {
            self.pos += 1;
        }
        Ok(TypeRef {
            name,
            args,
            nullable,
        })
    }

    fn parse_arg(&mut self) -> Result<TypeArg, TypeParseError> {
        self.skip_ws();
        match self.peek() {
            Some(b'*') => {
                self.pos += 1;
                Ok(TypeArg::Star)
            }
            Some(b'?') => {
                self.pos += 1;
                self.skip_ws();
                let variance = if self.eat_keyword("extends") {
                    Variance::Out
                } else if self.eat_keyword("super") {
                    Variance::In
                } else {
                    return Ok(TypeArg::Star);
                };
                let ty = self.parse_type()?;
                Ok(TypeArg::Type { variance, ty })
            }
            _ => {
                let variance = if self.eat_keyword("out") {
                    Variance::Out
                } else if self.eat_keyword("in") {
                    Variance::In
                } else {
                    Variance::Invariant
                };
                let ty = self.parse_type()?;
                Ok(TypeArg::Type { variance, ty })
            }
        }
    }
}

// =============================================================================
// Qualifiers and keys
// =============================================================================

/// A qualifier annotation with its arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Qualifier {
    pub name: String,
    /// Sorted by argument name once canonicalized.
    pub args: Vec<(String, String)>,
}

impl Qualifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// `@Named("value")`-style qualifier.
    pub fn named(value: impl Into<String>) -> Self {
        Self::new("Named").with_arg("value", value)
    }

    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn canonicalize(&self) -> Self {
        let mut args = self.args.clone();
        args.sort();
        Self {
            name: self.name.clone(),
            args,
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        match self.args.as_slice() {
            [] => Ok(()),
            [(name, value)] if name == "value" => write!(f, "(\"{value}\")"),
            args => {
                f.write_str("(")?;
                for (i, (name, value)) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} = \"{value}\"")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Serialize for Qualifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Canonical identity of a requested dependency.
///
/// Immutable once built; use [`with_qualifier`](Self::with_qualifier) to
/// derive a changed copy.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub ty: TypeRef,
    pub qualifier: Option<Qualifier>,
}

impl BindingKey {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            qualifier: None,
        }
    }

    pub fn qualified(ty: TypeRef, qualifier: Qualifier) -> Self {
        Self {
            ty,
            qualifier: Some(qualifier),
        }
    }

    /// Parse an unqualified key from its type text.
    pub fn parse(text: &str) -> Result<Self, TypeParseError> {
        TypeRef::parse(text).map(Self::new)
    }

    #[must_use]
    pub fn with_qualifier(&self, qualifier: Qualifier) -> Self {
        Self {
            ty: self.ty.clone(),
            qualifier: Some(qualifier),
        }
    }

    #[must_use]
    pub fn canonicalize(&self, aliases: &FxHashMap<String, String>) -> Self {
        Self {
            ty: self.ty.canonicalize(aliases),
            qualifier: self.qualifier.as_ref().map(Qualifier::canonicalize),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(qualifier) = &self.qualifier {
            write!(f, "{qualifier} ")?;
        }
        write!(f, "{}", self.ty)
    }
}

// =============================================================================
// Interning
// =============================================================================

/// Interned handle for a canonical [`BindingKey`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct KeyId(pub u32);

impl KeyId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Canonicalizing interner for binding keys.
#[derive(Debug, Default)]
pub struct KeyInterner {
    keys: Vec<BindingKey>,
    ids: FxHashMap<BindingKey, KeyId>,
    aliases: FxHashMap<String, String>,
}

impl KeyInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aliases(aliases: FxHashMap<String, String>) -> Self {
        Self {
            aliases,
            ..Self::default()
        }
    }

    /// Canonicalize `key` and return its handle, allocating one if needed.
    pub fn intern(&mut self, key: BindingKey) -> KeyId {
        let canonical = key.canonicalize(&self.aliases);
        if let Some(&id) = self.ids.get(&canonical) {
            return id;
        }
        let id = KeyId(self.keys.len() as u32);
        self.keys.push(canonical.clone());
        self.ids.insert(canonical, id);
        id
    }

    /// Find the handle of an already-interned key without allocating.
    pub fn lookup(&self, key: &BindingKey) -> Option<KeyId> {
        self.ids.get(&key.canonicalize(&self.aliases)).copied()
    }

    pub fn key(&self, id: KeyId) -> &BindingKey {
        &self.keys[id.index()]
    }

    pub fn display(&self, id: KeyId) -> String {
        self.key(id).to_string()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeyId, &BindingKey)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| (KeyId(i as u32), key))
    }
}
