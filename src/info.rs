//! In-memory map of per-image DC luminance and deletion state.

use std::collections::HashMap;

use crate::types::{ImageInfo, PostId, Score};

/// `post_id -> ImageInfo`, rebuilt from the catalog on startup and kept in
/// step with the bucket set by the engine.
#[derive(Default)]
pub struct InfoMap {
    entries: HashMap<PostId, ImageInfo>,
}

impl InfoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, post_id: PostId, avgl: [Score; 3]) {
        self.entries.insert(
            post_id,
            ImageInfo {
                avgl,
                deleted: false,
            },
        );
    }

    pub fn remove(&mut self, post_id: &str) {
        self.entries.remove(post_id);
    }

    /// Flag an entry as logically deleted without dropping it. Unknown ids
    /// are a no-op.
    pub fn mark_deleted(&mut self, post_id: &str) {
        if let Some(info) = self.entries.get_mut(post_id) {
            info.deleted = true;
        }
    }

    pub fn get(&self, post_id: &str) -> Option<&ImageInfo> {
        self.entries.get(post_id)
    }

    pub fn entries(&self) -> &HashMap<PostId, ImageInfo> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut info = InfoMap::new();
        info.insert("a".into(), [0.5, 0.0, 0.0]);

        let entry = info.get("a").unwrap();
        assert_eq!(entry.avgl, [0.5, 0.0, 0.0]);
        assert!(!entry.deleted);

        info.remove("a");
        assert!(info.get("a").is_none());
        assert!(info.is_empty());
    }

    #[test]
    fn test_mark_deleted() {
        let mut info = InfoMap::new();
        info.insert("a".into(), [0.0, 0.0, 0.0]);

        info.mark_deleted("a");
        assert!(info.get("a").unwrap().deleted);

        // a zero DC term alone does not mean deleted
        info.insert("b".into(), [0.0, 0.0, 0.0]);
        assert!(!info.get("b").unwrap().deleted);

        info.mark_deleted("missing");
        assert_eq!(info.len(), 2);
    }
}
