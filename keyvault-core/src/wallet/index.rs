use std::collections::HashMap;

use uuid::Uuid;

/// Bidirectional account name <-> id index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct AccountIndex {
    by_name: HashMap<String, Uuid>,
    by_id: HashMap<Uuid, String>,
}

impl AccountIndex {
    pub(crate) fn insert(&mut self, id: Uuid, name: &str) {
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, name.to_string());
    }

    pub(crate) fn remove(&mut self, id: Uuid) -> Option<String> {
        let name = self.by_id.remove(&id)?;
        self.by_name.remove(&name);
        Some(name)
    }

    pub(crate) fn id(&self, name: &str) -> Option<Uuid> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn name(&self, id: Uuid) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub(crate) fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}
