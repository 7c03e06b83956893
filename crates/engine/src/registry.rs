//! Per-tenant platform clients.
//!
//! Built once at startup from configuration and shared by every worker. Each
//! (application, platform) pair owns a single slot that is filled at most once;
//! the global slots (app ID 0) are filled lazily on first use, tenant slots
//! eagerly by `initialize`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;

use pushgate_common::config::{AppConfig, PlatformConfig};
use pushgate_common::error::PushError;
use pushgate_common::traits::{ClientFactory, PushClient};
use pushgate_common::types::{DEFAULT_APP_ID, Platform};

use crate::error::DispatchError;
use crate::job::NotificationJob;

/// One platform's configuration and its client, once built.
pub struct PlatformSlot {
    config: PlatformConfig,
    client: OnceCell<Arc<dyn PushClient>>,
}

impl PlatformSlot {
    fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// The client, if it has been built.
    pub fn client(&self) -> Option<Arc<dyn PushClient>> {
        self.client.get().cloned()
    }

    /// Build the client unless it exists. Concurrent callers share one build.
    async fn get_or_init(
        &self,
        platform: Platform,
        factory: &dyn ClientFactory,
    ) -> Result<Arc<dyn PushClient>, PushError> {
        let client = self
            .client
            .get_or_try_init(|| async {
                match self.config.credential() {
                    Some(credential) => factory.build(platform, &credential, &self.config),
                    None => Err(PushError::Config(format!(
                        "missing {} API key or credentials",
                        platform
                    ))),
                }
            })
            .await?;
        Ok(client.clone())
    }
}

/// Client slots for one application.
pub struct ApplicationClientSet {
    app_id: u32,
    android: PlatformSlot,
    ios: PlatformSlot,
}

impl ApplicationClientSet {
    fn new(app_id: u32, android: PlatformConfig, ios: PlatformConfig) -> Self {
        Self {
            app_id,
            android: PlatformSlot::new(android),
            ios: PlatformSlot::new(ios),
        }
    }

    pub fn slot(&self, platform: Platform) -> &PlatformSlot {
        match platform {
            Platform::Android => &self.android,
            Platform::Ios => &self.ios,
        }
    }
}

pub struct ClientRegistry {
    factory: Arc<dyn ClientFactory>,
    global: ApplicationClientSet,
    apps: HashMap<u32, ApplicationClientSet>,
}

impl ClientRegistry {
    /// Create the registry. No client is built until `initialize` or first use.
    pub fn new(config: &AppConfig, factory: Arc<dyn ClientFactory>) -> Self {
        let global = ApplicationClientSet::new(
            DEFAULT_APP_ID,
            config.android.clone(),
            config.ios.clone(),
        );
        let apps = config
            .apps
            .iter()
            .map(|app| {
                (
                    app.app_id,
                    ApplicationClientSet::new(app.app_id, app.android.clone(), app.ios.clone()),
                )
            })
            .collect();

        Self {
            factory,
            global,
            apps,
        }
    }

    /// Build the client of every enabled platform of every configured application.
    ///
    /// Failures are logged per application and do not stop the others. Safe to
    /// call more than once; existing clients are kept. Returns the failure count.
    pub async fn initialize(&self) -> usize {
        let mut failures = 0;

        for set in self.apps.values() {
            tracing::info!(app_id = set.app_id, "Init config for app");
            for platform in [Platform::Android, Platform::Ios] {
                let slot = set.slot(platform);
                if !slot.config.enabled {
                    continue;
                }
                match slot.get_or_init(platform, self.factory.as_ref()).await {
                    Ok(_) => {
                        tracing::info!(app_id = set.app_id, platform = %platform, "Platform client ready");
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::error!(
                            app_id = set.app_id,
                            platform = %platform,
                            error = %e,
                            "Failed to init platform client"
                        );
                    }
                }
            }
        }

        failures
    }

    fn application(&self, app_id: u32) -> Option<&ApplicationClientSet> {
        if app_id == DEFAULT_APP_ID {
            Some(&self.global)
        } else {
            self.apps.get(&app_id)
        }
    }

    /// Whether the platform is enabled for the application, `None` if the
    /// application is unknown.
    pub fn platform_enabled(&self, app_id: u32, platform: Platform) -> Option<bool> {
        self.application(app_id)
            .map(|set| set.slot(platform).config.enabled)
    }

    /// Global default retry ceiling for a platform.
    pub fn max_retry(&self, platform: Platform) -> u32 {
        self.global.slot(platform).config.max_retry
    }

    /// Pick the client for a job.
    ///
    /// A credential carried by the job takes precedence over its application ID.
    /// When it equals the credential configured for that application (or the
    /// global configuration for app ID 0) the cached client is used; otherwise a
    /// client is built for this call only and never cached.
    pub async fn resolve(
        &self,
        job: &NotificationJob,
    ) -> Result<Arc<dyn PushClient>, DispatchError> {
        let set = self.application(job.app_id).ok_or_else(|| {
            DispatchError::Config(format!("application {} is not configured", job.app_id))
        })?;
        let slot = set.slot(job.platform);

        if let Some(credential) = &job.credential {
            if slot.config.credential().as_ref() != Some(credential) {
                tracing::debug!(app_id = job.app_id, platform = %job.platform, "Building ad hoc client");
                return Ok(self.factory.build(job.platform, credential, &slot.config)?);
            }
        }

        if job.app_id == DEFAULT_APP_ID {
            return Ok(slot.get_or_init(job.platform, self.factory.as_ref()).await?);
        }

        slot.client().ok_or_else(|| {
            DispatchError::Config(format!(
                "{} client for app {} not configured",
                job.platform, job.app_id
            ))
        })
    }
}
