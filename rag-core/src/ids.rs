//! Identifier derivation.
//!
//! A [`DocumentId`] is the full BLAKE3 digest of the document's absolute,
//! canonicalized source path, so re-ingesting the same file always targets the
//! same rows and points while equal relative paths under different roots stay
//! distinct. Vector point ids are UUIDv5 over `"{doc_id}#{chunk_index}"`.

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque document identifier (lowercase hex).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Derives the id from a canonicalized absolute path.
    ///
    /// Separators are normalized to `/` so the id does not depend on the host OS.
    pub fn from_source_path(path: &Path) -> Self {
        let mut canonical = String::new();
        for c in path.components() {
            match c {
                Component::Prefix(p) => canonical.push_str(&p.as_os_str().to_string_lossy()),
                Component::RootDir | Component::CurDir => {}
                other => {
                    canonical.push('/');
                    canonical.push_str(&other.as_os_str().to_string_lossy());
                }
            }
        }
        Self::from_canonical(&canonical)
    }

    /// Derives the id from an already canonical `/`-separated path.
    pub fn from_canonical(canonical: &str) -> Self {
        Self(blake3::hash(canonical.as_bytes()).to_hex().to_string())
    }

    /// Wraps an id read back from a store. No validation is applied.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Deterministic UUIDv5 from an arbitrary string id.
pub fn stable_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

/// Point id of a chunk in the vector store.
pub fn point_id(doc_id: &DocumentId, chunk_index: u32) -> Uuid {
    stable_uuid(&format!("{doc_id}#{chunk_index}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn id_is_full_length_hex_and_stable() {
        let a = DocumentId::from_source_path(Path::new("/data/legal/contract.md"));
        let b = DocumentId::from_canonical("/data/legal/contract.md");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn separators_are_normalized() {
        let p: PathBuf = ["/", "data", "legal", "sub", "a.txt"].iter().collect();
        assert_eq!(
            DocumentId::from_source_path(&p),
            DocumentId::from_canonical("/data/legal/sub/a.txt")
        );
    }

    #[test]
    fn same_relative_path_under_different_roots_differs() {
        assert_ne!(
            DocumentId::from_source_path(Path::new("/data/2023/notes.md")),
            DocumentId::from_source_path(Path::new("/data/2024/notes.md"))
        );
    }

    #[test]
    fn point_ids_differ_per_chunk() {
        let id = DocumentId::from_canonical("a.md");
        assert_ne!(point_id(&id, 0), point_id(&id, 1));
        assert_eq!(point_id(&id, 3), point_id(&id, 3));
    }
}
