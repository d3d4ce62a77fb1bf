//! Schema enhancers
//!
//! An enhancer is a synchronous, in-memory transform of a freshly fetched
//! schema tree. Each one names the artifact it is cached under and the setting
//! that holds its source URL; the orchestrator does everything else.

pub mod actions;
pub mod serve;
pub mod snippets;

use std::sync::Arc;

pub use actions::ActionSnippetEnhancer;
pub use serve::ServeConfigEnhancer;

use crate::cache::ArtifactId;
use crate::error::Result;
use crate::schema::SchemaObject;

/// A transform applied to a fetched schema before it is cached
pub trait SchemaEnhancer: Send + Sync {
    /// Short name used on the command line and in logs
    fn name(&self) -> &'static str;

    /// File name of the cached artifact
    fn local_filename(&self) -> &'static str;

    /// Settings key holding the source URL
    fn configuration_key(&self) -> &'static str;

    /// Enhance the schema, returning the whole root.
    ///
    /// The root is taken by value: on error the partially enhanced tree is
    /// dropped and nothing reaches the cache.
    fn enhance(&self, root: SchemaObject) -> Result<SchemaObject>;

    fn artifact_id(&self) -> ArtifactId {
        ArtifactId::new(self.local_filename())
    }
}

/// The enhancers run by the refresh pipeline, in run order
pub fn default_enhancers() -> Vec<Arc<dyn SchemaEnhancer>> {
    vec![Arc::new(ActionSnippetEnhancer), Arc::new(ServeConfigEnhancer)]
}

/// Look up one of the default enhancers by its short name
pub fn enhancer_by_name(name: &str) -> Option<Arc<dyn SchemaEnhancer>> {
    default_enhancers().into_iter().find(|e| e.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_enhancers_are_distinct() {
        let enhancers = default_enhancers();
        assert_eq!(enhancers.len(), 2);

        let files: HashSet<_> = enhancers.iter().map(|e| e.local_filename()).collect();
        let keys: HashSet<_> = enhancers.iter().map(|e| e.configuration_key()).collect();
        assert_eq!(files.len(), 2);
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(enhancer_by_name("action").unwrap().local_filename(), "sitescript.schema.json");
        assert_eq!(enhancer_by_name("serve").unwrap().artifact_id(), ArtifactId::new("serve.schema.json"));
        assert!(enhancer_by_name("other").is_none());
    }
}
