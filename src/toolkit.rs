/// Toolkit setup and wiring
///
/// Builds every core component from `Config`, installs extensions and owns the
/// final flush. There is no process-wide instance: callers construct a `Toolkit`
/// and pass it (or its parts) around.

use crate::config::Config;
use crate::entity::AssetEntity;
use crate::error::CoreResult;
use crate::extensions::{self, Extension};
use crate::jobs::JobRegistry;
use crate::schema::{RuleEngine, SchemaRegistry};
use crate::storage::AssetStore;
use crate::transform::TransformRegistry;
use crate::workflow::{WorkflowEngine, WorkflowRegistry};
use std::sync::Arc;

/// Every core component, wired together
#[derive(Debug)]
pub struct Toolkit {
    config: Config,
    store: Arc<AssetStore>,
    schemas: Arc<SchemaRegistry>,
    rules: Arc<RuleEngine>,
    entity: Arc<AssetEntity>,
    jobs: Arc<JobRegistry>,
    workflows: Arc<WorkflowRegistry>,
    transforms: Arc<TransformRegistry>,
    engine: Arc<WorkflowEngine>,
}

impl Toolkit {
    /// Open persisted state described by `config`
    ///
    /// Fails with `StorageError` when an existing asset or job snapshot cannot be
    /// read; nothing is overwritten in that case.
    pub fn open(config: Config) -> CoreResult<Self> {
        tracing::info!("📁 Opening agency state in {}", config.storage.data_dir.display());
        let store = Arc::new(AssetStore::open(&config.storage)?);
        let jobs = Arc::new(JobRegistry::open(&config.storage)?);
        Ok(Self::assemble(config, store, jobs))
    }

    /// Toolkit without any persistence
    pub fn in_memory() -> Self {
        Self::assemble(
            Config::with_data_dir(std::env::temp_dir()),
            Arc::new(AssetStore::in_memory()),
            Arc::new(JobRegistry::in_memory()),
        )
    }

    /// `open` plus the default extensions
    pub fn with_default_extensions(config: Config) -> CoreResult<Self> {
        let toolkit = Self::open(config)?;
        toolkit.install_defaults()?;
        Ok(toolkit)
    }

    fn assemble(config: Config, store: Arc<AssetStore>, jobs: Arc<JobRegistry>) -> Self {
        let schemas = Arc::new(SchemaRegistry::new());
        let rules = Arc::new(RuleEngine::new());
        let entity = Arc::new(AssetEntity::new(
            Arc::clone(&store),
            Arc::clone(&schemas),
            Arc::clone(&rules),
        ));
        let workflows = Arc::new(WorkflowRegistry::new());
        let engine = Arc::new(WorkflowEngine::new(
            Arc::clone(&entity),
            Arc::clone(&jobs),
            Arc::clone(&workflows),
            config.workflow.clone(),
        ));

        Self {
            config,
            store,
            schemas,
            rules,
            entity,
            jobs,
            workflows,
            transforms: Arc::new(TransformRegistry::new()),
            engine,
        }
    }

    pub fn install(&self, extension: &dyn Extension) -> CoreResult<()> {
        extension.install(self)?;
        tracing::info!("🧩 Installed extension '{}'", extension.name());
        Ok(())
    }

    pub fn install_defaults(&self) -> CoreResult<()> {
        for extension in extensions::defaults() {
            self.install(extension.as_ref())?;
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
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

    pub fn entity(&self) -> &Arc<AssetEntity> {
        &self.entity
    }

    pub fn jobs(&self) -> &Arc<JobRegistry> {
        &self.jobs
    }

    pub fn workflows(&self) -> &Arc<WorkflowRegistry> {
        &self.workflows
    }

    pub fn transforms(&self) -> &Arc<TransformRegistry> {
        &self.transforms
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    /// Persist assets and jobs now
    pub fn flush(&self) -> CoreResult<()> {
        self.store.flush()?;
        self.jobs.flush()
    }
}

impl Drop for Toolkit {
    fn drop(&mut self) {
        if self.store.is_dirty() {
            tracing::debug!("💾 Flushing unsaved assets on shutdown");
            if let Err(e) = self.store.flush() {
                tracing::error!("❌ Final flush of asset store failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extensions_register_their_workflows_and_schemas() {
        let toolkit = Toolkit::in_memory();
        toolkit.install_defaults().unwrap();
        // Installing twice replaces definitions instead of failing
        toolkit.install_defaults().unwrap();

        let workflows: Vec<String> = toolkit.workflows().list().into_iter().map(|w| w.name).collect();
        assert_eq!(
            workflows,
            vec![
                "briefing_generation",
                "custom_folder_structure",
                "folder_structure_generation",
                "social_post_generation",
            ]
        );
        assert!(toolkit.schemas().contains("project_briefing"));
        assert!(toolkit.rules().get("budget_is_currency").is_some());
    }

    #[test]
    fn unsaved_assets_are_flushed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        config.storage.autosave = false;
        {
            let toolkit = Toolkit::with_default_extensions(config.clone()).unwrap();
            crate::extensions::folder_structure::generate_custom(
                &toolkit,
                "Demo",
                &["docs".to_string()],
                None,
                false,
            )
            .unwrap();
            assert!(toolkit.store().is_dirty());
        }
        let reopened = Toolkit::open(config).unwrap();
        assert_eq!(reopened.store().len(), 1);
    }
}
