/// Asset CRUD layer
///
/// `AssetEntity` is the only way assets are created or changed. Every mutation
/// validates the resulting payload against the kind's schema and the rules bound
/// to that kind before it reaches the store.

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::schema::{RuleEngine, RuleInput, RuleViolation, SchemaRegistry};
use crate::storage::{Asset, AssetFilter, AssetStore, Metadata, Payload};
use arc_swap::ArcSwap;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};

/// Typed create/read/update/delete over an `AssetStore`
#[derive(Debug)]
pub struct AssetEntity {
    store: Arc<AssetStore>,
    schemas: Arc<SchemaRegistry>,
    rules: Arc<RuleEngine>,
    /// Key: asset kind, Value: rule names applied on every mutation of that kind
    bindings: ArcSwap<HashMap<String, Vec<String>>>,
}

impl AssetEntity {
    pub fn new(store: Arc<AssetStore>, schemas: Arc<SchemaRegistry>, rules: Arc<RuleEngine>) -> Self {
        Self {
            store,
            schemas,
            rules,
            bindings: ArcSwap::default(),
        }
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    pub fn rules(&self) -> &Arc<RuleEngine> {
        &self.rules
    }

    /// Apply `names` to every create/update of `kind` (replaces earlier bindings)
    pub fn bind_rules<S: Into<String>>(&self, kind: &str, names: impl IntoIterator<Item = S>) {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        tracing::info!("🔗 Bound rules {:?} to kind '{}'", names, kind);
        self.bindings.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(kind.to_string(), names.clone());
            next
        });
    }

    /// Rule names bound to `kind`
    pub fn bound_rules(&self, kind: &str) -> Vec<String> {
        self.bindings.load().get(kind).cloned().unwrap_or_default()
    }

    /// Validate and persist a new asset with a fresh id and `version == 1`
    ///
    /// Schema defaults are filled in before validation.
    pub fn create(
        &self,
        kind: &str,
        payload: Payload,
        metadata: Option<Metadata>,
    ) -> CoreResult<Asset> {
        let metadata = metadata.unwrap_or_default();
        let payload = self.schemas.apply_defaults(kind, payload)?;
        let warnings = self.check(kind, &payload, &metadata)?;

        let now = Utc::now();
        let mut asset = Asset {
            id: String::new(),
            kind: kind.to_string(),
            payload,
            metadata,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        // A v4 collision is astronomically unlikely; insert_new makes it harmless
        loop {
            asset.id = uuid::Uuid::new_v4().to_string();
            if self.store.insert_new(asset.clone())? {
                break;
            }
        }

        log_warnings(&asset.id, &warnings);
        tracing::info!("✨ Created {} asset {}", asset.kind, asset.id);
        Ok(asset)
    }

    pub fn read(&self, id: &str) -> CoreResult<Asset> {
        self.store.get(id)
    }

    /// Merge `patch` into the payload, re-validate the merged result and bump the version
    ///
    /// The merge is shallow: each patch key replaces the existing value, and a
    /// `Null` value removes the key.
    pub fn update(&self, id: &str, patch: Payload) -> CoreResult<Asset> {
        let updated = self.store.update_with(id, |existing| {
            let mut payload = existing.payload.clone();
            merge_patch(&mut payload, patch);

            let warnings = self.check(&existing.kind, &payload, &existing.metadata)?;
            log_warnings(id, &warnings);

            Ok(Asset {
                payload,
                updated_at: Utc::now(),
                version: existing.version + 1,
                ..existing.clone()
            })
        })?;

        tracing::debug!("Updated asset {} to version {}", updated.id, updated.version);
        Ok(updated)
    }

    /// Add or replace metadata entries (bumps the version)
    pub fn update_metadata(&self, id: &str, entries: Metadata) -> CoreResult<Asset> {
        self.store.update_with(id, |existing| {
            let mut metadata = existing.metadata.clone();
            metadata.extend(entries);

            // Rules may look at metadata, so they run again; the payload is unchanged
            let input = RuleInput::new(&existing.kind, &existing.payload).with_metadata(&metadata);
            self.rules
                .apply(&self.bound_rules(&existing.kind), &input)
                .into_result()?;

            Ok(Asset {
                metadata,
                updated_at: Utc::now(),
                version: existing.version + 1,
                ..existing.clone()
            })
        })
    }

    pub fn delete(&self, id: &str) -> CoreResult<()> {
        let removed = self.store.delete(id)?;
        tracing::info!("🗑️ Deleted {} asset {}", removed.kind, removed.id);
        Ok(())
    }

    /// Lazily list assets matching `filter`
    pub fn list(&self, filter: AssetFilter) -> impl Iterator<Item = Asset> {
        self.store.list(filter)
    }

    /// Schema validation first, then the rules bound to `kind`
    ///
    /// Returns warnings from warning-severity rules on success.
    fn check(&self, kind: &str, payload: &Payload, metadata: &Metadata) -> CoreResult<Vec<RuleViolation>> {
        if !self.schemas.contains(kind) {
            return Err(CoreError::not_found(EntityKind::Schema, kind));
        }
        self.schemas.validate(kind, payload)?.into_result()?;

        let input = RuleInput::new(kind, payload).with_metadata(metadata);
        self.rules.apply(&self.bound_rules(kind), &input).into_result()
    }
}

fn merge_patch(payload: &mut Payload, patch: Payload) {
    for (key, value) in patch {
        if value.is_null() {
            payload.shift_remove(&key);
        } else {
            payload.insert(key, value);
        }
    }
}

fn log_warnings(id: &str, warnings: &[RuleViolation]) {
    for warning in warnings {
        tracing::warn!("⚠️ Asset {}: {}", id, warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Constraint, FieldSpec, Rule, Schema, TypeTag};
    use crate::storage::types::{payload_from_json, Value};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn entity() -> AssetEntity {
        let schemas = Arc::new(SchemaRegistry::new());
        schemas
            .register(
                Schema::new("briefing")
                    .field(FieldSpec::required("title", TypeTag::Text).with(Constraint::MinLength(1)))
                    .field(FieldSpec::required("budget", TypeTag::Text))
                    .field(FieldSpec::optional("notes", TypeTag::Text))
                    .field(FieldSpec::optional("status", TypeTag::Text).with_default("draft")),
            )
            .unwrap();
        let rules = Arc::new(RuleEngine::new());
        rules.register(Rule::currency("budget_is_currency", "budget"));
        let entity = AssetEntity::new(Arc::new(AssetStore::in_memory()), schemas, rules);
        entity.bind_rules("briefing", ["budget_is_currency"]);
        entity
    }

    fn payload(value: serde_json::Value) -> Payload {
        payload_from_json(value).unwrap()
    }

    #[test]
    fn create_assigns_id_and_first_version() {
        let entity = entity();
        let p = payload(json!({"title": "Launch", "budget": "$5,000", "status": "final"}));
        let created = entity.create("briefing", p.clone(), None).unwrap();

        let read = entity.read(&created.id).unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.payload, p);
        assert_eq!(uuid::Uuid::parse_str(&read.id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn create_stores_schema_defaults() {
        let entity = entity();
        let created = entity
            .create("briefing", payload(json!({"title": "Launch", "budget": "15k"})), None)
            .unwrap();
        assert_eq!(created.field("status"), Some(&Value::from("draft")));
        assert_eq!(entity.read(&created.id).unwrap().payload, created.payload);
    }

    #[test]
    fn create_rejects_unknown_kind_and_invalid_payloads() {
        let entity = entity();
        assert_matches!(
            entity.create("poster", Payload::new(), None),
            Err(CoreError::NotFound { entity: EntityKind::Schema, .. })
        );
        assert_matches!(
            entity.create("briefing", payload(json!({"title": 3})), None),
            Err(CoreError::Validation { violations, .. }) if violations.len() == 2
        );
        assert_matches!(
            entity.create("briefing", payload(json!({"title": "x", "budget": "a lot"})), None),
            Err(CoreError::RuleViolation { .. })
        );
        assert!(entity.store().is_empty());
    }

    #[test]
    fn update_validates_merged_payload_and_bumps_version() {
        let entity = entity();
        let created = entity
            .create("briefing", payload(json!({"title": "Launch", "budget": "$5,000"})), None)
            .unwrap();

        let patch = payload(json!({"notes": "rush"}));
        let first = entity.update(&created.id, patch.clone()).unwrap();
        let second = entity.update(&created.id, patch).unwrap();
        assert_eq!(first.payload, second.payload);
        assert_eq!((first.version, second.version), (2, 3));

        // Removing a required field makes the merged payload invalid
        let err = entity.update(&created.id, payload(json!({"title": null}))).unwrap_err();
        assert_matches!(err, CoreError::Validation { .. });
        assert_eq!(entity.read(&created.id).unwrap().version, 3);
        assert_eq!(entity.read(&created.id).unwrap().field("notes"), Some(&Value::from("rush")));
    }

    #[test]
    fn metadata_updates_bump_version() {
        let entity = entity();
        let created = entity
            .create("briefing", payload(json!({"title": "Launch", "budget": "10k"})), None)
            .unwrap();
        let mut entries = Metadata::new();
        entries.insert("output_path".into(), "/tmp/launch.md".into());
        let updated = entity.update_metadata(&created.id, entries).unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.metadata["output_path"], "/tmp/launch.md");
    }

    #[test]
    fn delete_then_read_is_not_found() {
        let entity = entity();
        let created = entity
            .create("briefing", payload(json!({"title": "Launch", "budget": "10k"})), None)
            .unwrap();
        entity.delete(&created.id).unwrap();
        assert!(entity.read(&created.id).unwrap_err().is_not_found());
        assert!(entity.delete(&created.id).unwrap_err().is_not_found());
        assert!(entity.update(&created.id, Payload::new()).unwrap_err().is_not_found());
    }
}
