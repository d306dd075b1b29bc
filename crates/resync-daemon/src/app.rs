use std::sync::{Arc, RwLock};

use resync_core::{Notifier, OutputLogger, ResyncConfig, StatStore};
use resync_exec::ProcessRunner;
use resync_logs::FsLogger;
use resync_notify::EmailNotifier;
use resync_scheduler::{Schedules, Scheduler};
use resync_stats::SqliteStatStore;
use tracing::info;

/// Shared state for the HTTP handlers. The store is swapped on reload.
pub struct AppState {
    store: RwLock<Arc<dyn StatStore>>,
}

impl AppState {
    pub fn new(store: Arc<dyn StatStore>) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }

    pub fn store(&self) -> Arc<dyn StatStore> {
        self.store.read().unwrap().clone()
    }

    pub fn set_store(&self, store: Arc<dyn StatStore>) {
        *self.store.write().unwrap() = store;
    }
}

/// One generation of collaborators built from one loaded config.
pub struct Components {
    pub config: Arc<ResyncConfig>,
    pub store: Arc<dyn StatStore>,
    pub scheduler: Scheduler,
}

impl Components {
    /// Every schedule is parsed before anything is opened, so a config that
    /// would fail `Scheduler::start` is rejected here.
    pub fn build(config: ResyncConfig) -> anyhow::Result<Self> {
        Schedules::from_config(&config)?;
        let config = Arc::new(config);

        let store: Arc<dyn StatStore> =
            Arc::new(SqliteStatStore::open(&config.lib_path, config.retention)?);
        let logger: Arc<dyn OutputLogger> =
            Arc::new(FsLogger::new(config.log_path.clone(), config.retention));
        let notifier: Arc<dyn Notifier> =
            Arc::new(EmailNotifier::new(&config, store.clone(), logger.clone())?);
        let command = Arc::new(ProcessRunner::new(config.rsync_path.clone()));

        info!(
            syncs = config.syncs.len(),
            retention = config.retention,
            rsync = %config.rsync_path,
            email = config.email.is_some(),
            "components built"
        );

        let scheduler = Scheduler::new(
            config.clone(),
            store.clone(),
            logger,
            notifier,
            command,
        );
        Ok(Self {
            config,
            store,
            scheduler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resync_core::config::SyncConfig;

    pub(crate) fn config(dir: &std::path::Path, retention: i64) -> ResyncConfig {
        let mut config = ResyncConfig {
            log_path: dir.join("log"),
            lib_path: dir.join("lib"),
            retention,
            ..Default::default()
        };
        config.syncs.insert(
            "docs".into(),
            SyncConfig {
                rsync_args: "-a".into(),
                rsync_source: vec!["/src".into()],
                rsync_destination: "/dst".into(),
                schedule: "0 3 * * *".into(),
                time_limit: None,
            },
        );
        config
    }

    #[tokio::test]
    async fn builds_and_starts() {
        let dir = tempfile::tempdir().unwrap();
        let components = Components::build(config(dir.path(), 3)).unwrap();
        assert!(dir.path().join("lib").join(resync_stats::DB_FILE).exists());

        components.scheduler.start().unwrap();
        components.scheduler.stop().await;

        let mut out = Vec::new();
        components.scheduler.dump(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn bad_cron_is_rejected_before_opening_anything() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 3);
        config.syncs.get_mut("docs").unwrap().schedule = "not a cron".into();
        config.validate().unwrap();

        let err = Components::build(config).err().unwrap();
        assert!(err.to_string().contains("not a cron"), "{err}");
        assert!(!dir.path().join("lib").exists());
    }

    #[tokio::test]
    async fn retention_zero_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let components = Components::build(config(dir.path(), 0)).unwrap();
        assert!(!dir.path().join("lib").exists());
        assert!(components.store.list().unwrap().is_empty());
        assert!(components.scheduler.dump(&mut Vec::new()).is_err());
    }
}
