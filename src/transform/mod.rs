/// Content transforms
///
/// Named conversions from one content shape to another (briefing data to Markdown,
/// post data to SVG, ...). Extensions register transforms at install time and
/// workflow steps apply them by name.

use crate::error::{CoreError, EntityKind};
use crate::storage::types::Value;
use arc_swap::ArcSwap;
use serde::Serialize;
use std::{collections::HashMap, fmt, sync::Arc};

type TransformFn = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// A named conversion with descriptive source and target types
#[derive(Clone)]
pub struct Transform {
    pub name: String,
    pub source_type: String,
    pub target_type: String,
    func: TransformFn,
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("source_type", &self.source_type)
            .field("target_type", &self.target_type)
            .finish_non_exhaustive()
    }
}

impl Transform {
    pub fn new<F>(
        name: impl Into<String>,
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        func: F,
    ) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            target_type: target_type.into(),
            func: Arc::new(func),
        }
    }

    pub fn apply(&self, input: &Value) -> anyhow::Result<Value> {
        (self.func)(input)
    }
}

/// Listing entry
#[derive(Debug, Clone, Serialize)]
pub struct TransformInfo {
    pub name: String,
    pub source_type: String,
    pub target_type: String,
}

#[derive(Debug, Default)]
pub struct TransformRegistry {
    transforms: ArcSwap<HashMap<String, Arc<Transform>>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a transform under its name
    pub fn register(&self, transform: Transform) {
        let name = transform.name.clone();
        tracing::info!(
            "🔀 Registered transform '{}' ({} -> {})",
            name,
            transform.source_type,
            transform.target_type
        );
        let transform = Arc::new(transform);
        self.transforms.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), Arc::clone(&transform));
            next
        });
    }

    pub fn get(&self, name: &str) -> Option<Arc<Transform>> {
        self.transforms.load().get(name).cloned()
    }

    /// Registered transforms, sorted by name
    pub fn list(&self) -> Vec<TransformInfo> {
        let mut infos: Vec<TransformInfo> = self
            .transforms
            .load()
            .values()
            .map(|t| TransformInfo {
                name: t.name.clone(),
                source_type: t.source_type.clone(),
                target_type: t.target_type.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Apply the transform registered as `name`
    pub fn apply(&self, name: &str, input: &Value) -> anyhow::Result<Value> {
        let transform = self
            .get(name)
            .ok_or_else(|| CoreError::not_found(EntityKind::Transform, name))?;
        transform
            .apply(input)
            .map_err(|e| e.context(format!("transform '{}' failed", name)))
    }
}
