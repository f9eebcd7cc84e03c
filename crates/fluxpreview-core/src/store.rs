//! In-memory resource store
//!
//! An insertion-ordered set of [`Document`]s keyed by identity. One store is
//! created per render target and owned by that render.

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::document::{Document, ResId};
use crate::error::{CoreError, Result};

/// Order-preserving set of documents, unique by [`ResId`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceStore {
    docs: IndexMap<ResId, Document>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from documents, rejecting duplicate identities
    pub fn from_documents(docs: impl IntoIterator<Item = Document>) -> Result<Self> {
        let mut store = Self::new();
        store.insert_all(docs)?;
        Ok(store)
    }

    /// Insert documents that must not already be present
    ///
    /// Duplicates against existing entries or within the batch fail the
    /// whole call and leave the store untouched.
    pub fn insert_all(&mut self, docs: impl IntoIterator<Item = Document>) -> Result<()> {
        let mut staged: IndexMap<ResId, Document> = IndexMap::new();

        for doc in docs {
            if self.docs.contains_key(doc.id()) {
                return Err(CoreError::DuplicateResource { id: doc.id().clone() });
            }
            match staged.entry(doc.id().clone()) {
                Entry::Occupied(e) => {
                    return Err(CoreError::DuplicateResource { id: e.key().clone() });
                }
                Entry::Vacant(e) => {
                    e.insert(doc);
                }
            }
        }

        self.docs.extend(staged);
        Ok(())
    }

    /// Insert documents, replacing any entry with the same identity
    ///
    /// A replaced entry keeps its position; new identities are appended.
    pub fn absorb_all(&mut self, docs: impl IntoIterator<Item = Document>) {
        for doc in docs {
            self.docs.insert(doc.id().clone(), doc);
        }
    }

    /// Get a document by identity
    pub fn get(&self, id: &ResId) -> Result<&Document> {
        self.docs
            .get(id)
            .ok_or_else(|| CoreError::ResourceNotFound { id: id.clone() })
    }

    pub fn find(&self, id: &ResId) -> Option<&Document> {
        self.docs.get(id)
    }

    pub fn contains(&self, id: &ResId) -> bool {
        self.docs.contains_key(id)
    }

    /// All documents in insertion order
    pub fn list(&self) -> Vec<&Document> {
        self.docs.values().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ResId> {
        self.docs.keys()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.docs.into_values().collect()
    }

    /// Serialize every document, joined with `---` separators
    pub fn to_yaml(&self) -> Result<String> {
        let parts = self
            .docs
            .values()
            .map(Document::to_yaml)
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("---\n"))
    }
}

impl<'a> IntoIterator for &'a ResourceStore {
    type Item = &'a Document;
    type IntoIter = indexmap::map::Values<'a, ResId, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_map(name: &str, value: &str) -> Document {
        Document::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "default"},
            "data": {"value": value}
        }))
        .unwrap()
    }

    fn names(store: &ResourceStore) -> Vec<&str> {
        store.iter().map(Document::name).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = ResourceStore::new();
        store.insert_all(vec![config_map("a", "1"), config_map("b", "2")]).unwrap();

        assert_eq!(store.len(), 2);
        let id = config_map("b", "").id().clone();
        assert_eq!(store.get(&id).unwrap().get_str(&["data", "value"]), Some("2"));
    }

    #[test]
    fn test_insert_duplicate_leaves_store_unchanged() {
        let mut store = ResourceStore::new();
        store.insert_all(vec![config_map("a", "1")]).unwrap();

        let err = store
            .insert_all(vec![config_map("b", "2"), config_map("a", "3")])
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateResource { .. }));
        assert!(err.to_string().contains("ConfigMap/v1/default/a"));
        assert_eq!(names(&store), vec!["a"]);
    }

    #[test]
    fn test_insert_duplicate_within_batch() {
        let mut store = ResourceStore::new();
        let err = store
            .insert_all(vec![config_map("a", "1"), config_map("a", "2")])
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateResource { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_absorb_replaces_in_place() {
        let mut store = ResourceStore::new();
        store.insert_all(vec![config_map("a", "1"), config_map("b", "2")]).unwrap();
        store.absorb_all(vec![config_map("a", "changed"), config_map("c", "3")]);

        assert_eq!(names(&store), vec!["a", "b", "c"]);
        let id = config_map("a", "").id().clone();
        assert_eq!(store.get(&id).unwrap().get_str(&["data", "value"]), Some("changed"));
    }

    #[test]
    fn test_get_missing() {
        let store = ResourceStore::new();
        let id = config_map("missing", "").id().clone();

        assert!(matches!(store.get(&id), Err(CoreError::ResourceNotFound { .. })));
        assert!(store.find(&id).is_none());
    }

    #[test]
    fn test_to_yaml_insertion_order() {
        let store =
            ResourceStore::from_documents(vec![config_map("z", "1"), config_map("a", "2")]).unwrap();
        let yaml = store.to_yaml().unwrap();

        let z = yaml.find("name: z").unwrap();
        let a = yaml.find("name: a").unwrap();
        assert!(z < a);
        assert_eq!(yaml.matches("---\n").count(), 1);
    }
}
