//! The asset store.
//!
//! Assets are referenced by index from serialized documents, never
//! embedded. A prefab asset carries the serialized document bytes of a
//! prefab; opaque assets stand in for everything else a property can
//! reference (textures, meshes). The store interns assets by path, which
//! is the identity that survives serialization.

use std::collections::HashMap;

/// A store-local asset handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AssetId(u32);

impl AssetId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The payload of an asset.
#[derive(Debug, Clone)]
pub enum AssetPayload {
    /// A serialized prefab document.
    Prefab(Vec<u8>),
    /// A non-prefab asset, referenced but never inspected by the engine.
    Opaque,
}

/// A stored asset.
#[derive(Debug, Clone)]
pub struct Asset {
    pub path: String,
    pub payload: AssetPayload,
}

/// A path-interned asset storage.
pub struct AssetStore {
    assets: Vec<Asset>,
    lookup: HashMap<String, AssetId>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            assets: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    fn insert(&mut self, path: &str, payload: AssetPayload) -> AssetId {
        if let Some(&id) = self.lookup.get(path) {
            self.assets[id.0 as usize].payload = payload;
            return id;
        }
        let id = AssetId(self.assets.len() as u32);
        self.assets.push(Asset {
            path: path.to_owned(),
            payload,
        });
        self.lookup.insert(path.to_owned(), id);
        id
    }

    /// Insert (or replace) a prefab asset with the given document bytes.
    pub fn insert_prefab(&mut self, path: &str, bytes: Vec<u8>) -> AssetId {
        self.insert(path, AssetPayload::Prefab(bytes))
    }

    /// Insert (or replace) a non-prefab asset.
    pub fn insert_opaque(&mut self, path: &str) -> AssetId {
        self.insert(path, AssetPayload::Opaque)
    }

    /// Replace the document bytes of an existing prefab asset.
    pub fn set_prefab_bytes(&mut self, id: AssetId, bytes: Vec<u8>) {
        match self.assets.get_mut(id.0 as usize) {
            Some(asset) => asset.payload = AssetPayload::Prefab(bytes),
            None => log::warn!("set_prefab_bytes: invalid asset handle {}", id.0),
        }
    }

    /// The document bytes of a prefab asset, or `None` if the handle is
    /// invalid or the asset is not a prefab.
    pub fn prefab_bytes(&self, id: AssetId) -> Option<&[u8]> {
        match self.assets.get(id.0 as usize)?.payload {
            AssetPayload::Prefab(ref bytes) => Some(bytes),
            AssetPayload::Opaque => None,
        }
    }

    pub fn get(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(id.0 as usize)
    }

    pub fn path(&self, id: AssetId) -> Option<&str> {
        self.assets.get(id.0 as usize).map(|a| a.path.as_str())
    }

    pub fn find_by_path(&self, path: &str) -> Option<AssetId> {
        self.lookup.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_find() {
        let mut store = AssetStore::new();
        let id = store.insert_prefab("ui/panel.prefab", vec![1, 2, 3]);
        assert_eq!(store.find_by_path("ui/panel.prefab"), Some(id));
        assert_eq!(store.prefab_bytes(id), Some(&[1u8, 2, 3][..]));
        assert_eq!(store.path(id), Some("ui/panel.prefab"));
    }

    #[test]
    fn reinsert_same_path_replaces_payload() {
        let mut store = AssetStore::new();
        let a = store.insert_prefab("x.prefab", vec![1]);
        let b = store.insert_prefab("x.prefab", vec![2]);
        assert_eq!(a, b);
        assert_eq!(store.prefab_bytes(a), Some(&[2u8][..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn opaque_has_no_prefab_bytes() {
        let mut store = AssetStore::new();
        let id = store.insert_opaque("tex/brick.png");
        assert!(store.prefab_bytes(id).is_none());
        assert!(store.get(id).is_some());
    }

    #[test]
    fn set_prefab_bytes_updates() {
        let mut store = AssetStore::new();
        let id = store.insert_prefab("a.prefab", vec![]);
        store.set_prefab_bytes(id, vec![9, 9]);
        assert_eq!(store.prefab_bytes(id), Some(&[9u8, 9][..]));
    }
}
