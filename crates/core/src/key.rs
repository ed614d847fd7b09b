//! Hierarchical keys for entity identity
//!
//! A `Key` is the addressable identity of an entity: a project, an optional
//! namespace, and an ordered path of `(kind, id-or-name)` elements. Keys are
//! immutable; "completing" a partial key always produces a new `Key` and
//! never mutates the original.
//!
//! ## Contract
//!
//! - Every path element has a non-empty `kind`
//! - Only the terminal path element may be incomplete (no id/name)
//! - A key is *partial* when its terminal element is incomplete
//! - Equality and hashing cover `(project, namespace, path)`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The id-or-name slot of a path element
///
/// Backend-assigned identities are integers (`Id`); caller-chosen identities
/// are strings (`Name`). A slot holds exactly one of the two, which makes the
/// "id XOR name" rule structural rather than a runtime check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathId {
    /// Backend-assigned numeric id
    Id(i64),
    /// Caller-chosen string name
    Name(String),
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathId::Id(id) => write!(f, "{}", id),
            PathId::Name(name) => write!(f, "{:?}", name),
        }
    }
}

/// One element of a key path: a kind plus an optional id-or-name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathElement {
    /// Entity kind (non-empty)
    pub kind: String,
    /// Identity slot; `None` means the element is incomplete
    pub id: Option<PathId>,
}

impl PathElement {
    /// Create an incomplete element (awaiting backend id assignment)
    pub fn partial(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
        }
    }

    /// Create an element with a numeric id
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id: Some(PathId::Id(id)),
        }
    }

    /// Create an element with a string name
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: Some(PathId::Name(name.into())),
        }
    }

    /// Whether this element has an id or name
    pub fn is_complete(&self) -> bool {
        self.id.is_some()
    }
}

/// Hierarchical identity for an entity
///
/// # Examples
///
/// ```
/// use lodestore_core::{Key, PathId};
///
/// let parent = Key::with_name("my-project", None, "Account", "alice").unwrap();
/// let partial = parent.child("Task", None).unwrap();
/// assert!(partial.is_partial());
///
/// let completed = partial.completed(PathId::Id(1234)).unwrap();
/// assert!(!completed.is_partial());
/// assert_eq!(completed.id(), Some(1234));
/// // The original is untouched
/// assert!(partial.is_partial());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "KeyParts")]
pub struct Key {
    project: String,
    namespace: Option<String>,
    path: Vec<PathElement>,
}

// Deserialization goes through `Key::new` so the path invariants hold on
// every construction channel, not just the constructors.
#[derive(Deserialize)]
struct KeyParts {
    project: String,
    #[serde(default)]
    namespace: Option<String>,
    path: Vec<PathElement>,
}

impl TryFrom<KeyParts> for Key {
    type Error = Error;

    fn try_from(parts: KeyParts) -> Result<Self> {
        Key::new(parts.project, parts.namespace, parts.path)
    }
}

impl Key {
    /// Create a key from an explicit path
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the path is empty, any kind is empty, or a
    /// non-terminal element is incomplete.
    pub fn new(
        project: impl Into<String>,
        namespace: Option<String>,
        path: Vec<PathElement>,
    ) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::invalid_argument("key path cannot be empty"));
        }
        let last = path.len() - 1;
        for (index, element) in path.iter().enumerate() {
            if element.kind.is_empty() {
                return Err(Error::invalid_argument("kind cannot be empty"));
            }
            if index != last && !element.is_complete() {
                return Err(Error::invalid_argument(
                    "only the terminal path element may be incomplete",
                ));
            }
        }
        Ok(Self {
            project: project.into(),
            namespace,
            path,
        })
    }

    /// Create a partial single-element key
    pub fn partial(
        project: impl Into<String>,
        namespace: Option<String>,
        kind: impl Into<String>,
    ) -> Result<Self> {
        Self::new(project, namespace, vec![PathElement::partial(kind)])
    }

    /// Create a complete single-element key with a numeric id
    pub fn with_id(
        project: impl Into<String>,
        namespace: Option<String>,
        kind: impl Into<String>,
        id: i64,
    ) -> Result<Self> {
        Self::new(project, namespace, vec![PathElement::with_id(kind, id)])
    }

    /// Create a complete single-element key with a string name
    pub fn with_name(
        project: impl Into<String>,
        namespace: Option<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::new(project, namespace, vec![PathElement::with_name(kind, name)])
    }

    /// Project this key belongs to
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Optional namespace
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Ordered path elements
    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    /// Kind of the terminal path element
    pub fn kind(&self) -> &str {
        &self.path[self.path.len() - 1].kind
    }

    /// Numeric id of the terminal element, if any
    pub fn id(&self) -> Option<i64> {
        match self.path[self.path.len() - 1].id {
            Some(PathId::Id(id)) => Some(id),
            _ => None,
        }
    }

    /// String name of the terminal element, if any
    pub fn name(&self) -> Option<&str> {
        match &self.path[self.path.len() - 1].id {
            Some(PathId::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// The terminal id-or-name slot
    pub fn id_or_name(&self) -> Option<&PathId> {
        self.path[self.path.len() - 1].id.as_ref()
    }

    /// Whether the terminal element still lacks an id/name
    pub fn is_partial(&self) -> bool {
        !self.path[self.path.len() - 1].is_complete()
    }

    /// Parent key (path minus the terminal element), or `None` at the root
    pub fn parent(&self) -> Option<Key> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Self {
            project: self.project.clone(),
            namespace: self.namespace.clone(),
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// Extend this key with a child path element
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when this key is partial (a parent must be complete)
    /// or when the child kind is empty.
    pub fn child(&self, kind: impl Into<String>, id: Option<PathId>) -> Result<Key> {
        if self.is_partial() {
            return Err(Error::invalid_argument(
                "a partial key cannot be used as a parent",
            ));
        }
        let mut path = self.path.clone();
        path.push(PathElement {
            kind: kind.into(),
            id,
        });
        Self::new(self.project.clone(), self.namespace.clone(), path)
    }

    /// Produce a completed copy of this partial key
    ///
    /// The returned key has the terminal slot filled with `id`; `self` is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the key is already complete.
    pub fn completed(&self, id: PathId) -> Result<Key> {
        if !self.is_partial() {
            return Err(Error::bad_request("only a partial key can be completed"));
        }
        let mut completed = self.clone();
        let last = completed.path.len() - 1;
        completed.path[last].id = Some(id);
        Ok(completed)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}", self.project)?;
        if let Some(namespace) = &self.namespace {
            write!(f, "[{}]", namespace)?;
        }
        for element in &self.path {
            match &element.id {
                Some(id) => write!(f, "/{}:{}", element.kind, id)?,
                None => write!(f, "/{}:?", element.kind)?,
            }
        }
        write!(f, ")")
    }
}
