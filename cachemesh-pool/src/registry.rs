//! Registry of cache groups served by this process.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use cachemesh_core::error::{MeshError, Result};

use crate::group::Group;

/// Groups reachable through the peer handler, by name.
#[derive(Default)]
pub struct GroupRegistry {
    groups: DashMap<String, Arc<Group>>,
}

impl GroupRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `group`. Names are unique.
    pub fn register(&self, group: Group) -> Result<Arc<Group>> {
        match self.groups.entry(group.name().to_string()) {
            Entry::Occupied(entry) => Err(MeshError::ConfigError(format!(
                "group '{}' registered twice",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                let group = Arc::new(group);
                entry.insert(group.clone());
                Ok(group)
            }
        }
    }

    /// Returns the group registered as `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(name).map(|entry| entry.value().clone())
    }

    /// Returns the registered group names.
    pub fn names(&self) -> Vec<String> {
        self.groups.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns the number of registered groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no group is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::FnGetter;
    use crate::peer::{PeerFetcher, PeerPicker};
    use bytes::Bytes;

    struct NoPeers;

    impl PeerPicker for NoPeers {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerFetcher>> {
            None
        }
    }

    fn group(name: &str) -> Group {
        let getter = FnGetter::new(|key: String| async move { Ok(Bytes::from(key)) });
        Group::new(name, 4, Arc::new(getter), Arc::new(NoPeers))
    }

    #[test]
    fn test_register_and_get() {
        let registry = GroupRegistry::new();
        registry.register(group("users")).unwrap();

        assert!(registry.get("users").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["users".to_string()]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = GroupRegistry::new();
        registry.register(group("users")).unwrap();

        assert!(matches!(
            registry.register(group("users")),
            Err(MeshError::ConfigError(_))
        ));
        assert_eq!(registry.len(), 1);
    }
}
