//! Wiring of stores, strategies and services from configuration.

use crate::config::{BackendSettings, BridgeConfig, ConfigError, LifecycleSettings};
use crate::mapping::{
    adapters::{
        document::DocumentMappingStore, memory::InMemoryMappingStore,
        postgres::PostgresMappingStore,
    },
    domain::{ContextValidator, MappingDomainError, StrategyKind, TenantId},
    ports::{MappingStore, MappingStoreError, ThreadIdResolver},
    resolvers::{DatabaseResolver, DirectResolver, HashResolver},
    services::{MappingLifecycleManager, ResolutionService},
};
use mockable::{Clock, DefaultClock};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while assembling the runtime.
#[derive(Debug, Error)]
pub enum RuntimeBuildError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured default tenant is not a valid identifier.
    #[error("invalid default tenant: {0}")]
    DefaultTenant(#[source] MappingDomainError),

    /// The mapping store could not be opened.
    #[error("failed to open mapping store: {0}")]
    Store(#[from] MappingStoreError),

    /// The blocking store setup task failed.
    #[error("store setup task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Assembled resolution service plus, for the database strategy, its store
/// and lifecycle manager.
pub struct BridgeRuntime<C = DefaultClock>
where
    C: Clock + Send + Sync,
{
    service: ResolutionService,
    store: Option<Arc<dyn MappingStore>>,
    lifecycle: Option<MappingLifecycleManager<dyn MappingStore, C>>,
    lifecycle_settings: LifecycleSettings,
}

impl BridgeRuntime<DefaultClock> {
    /// Builds the runtime using the system clock.
    ///
    /// # Errors
    ///
    /// See [`Self::from_config_with_clock`].
    pub async fn from_config(config: &BridgeConfig) -> Result<Self, RuntimeBuildError> {
        Self::from_config_with_clock(config, Arc::new(DefaultClock)).await
    }
}

impl<C> BridgeRuntime<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Builds the runtime with an explicit clock.
    ///
    /// Stores are only opened for the database strategy. The relational
    /// backend applies its schema before the runtime is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeBuildError`] when the configuration is invalid or
    /// the store cannot be opened.
    pub async fn from_config_with_clock(
        config: &BridgeConfig,
        clock: Arc<C>,
    ) -> Result<Self, RuntimeBuildError> {
        config.validate()?;
        let validator = context_validator(config)?;
        let hash = hash_resolver(config);

        let mut store = None;
        let mut lifecycle = None;
        let resolver: Arc<dyn ThreadIdResolver> = match config.strategy {
            StrategyKind::Direct => Arc::new(DirectResolver::new()),
            StrategyKind::Hash => Arc::new(hash.clone()),
            StrategyKind::Database => {
                let opened = open_store(&config.database.backend).await?;
                lifecycle = Some(
                    MappingLifecycleManager::new(Arc::clone(&opened), Arc::clone(&clock))
                        .with_batch_size(config.lifecycle.batch_size),
                );
                let resolver = DatabaseResolver::new(Arc::clone(&opened), clock)
                    .with_thread_id_prefix(config.database.thread_id_prefix.clone())
                    .with_store_timeout(config.database.store_timeout);
                store = Some(opened);
                Arc::new(resolver)
            }
        };

        let mut service = ResolutionService::new(validator, resolver);
        if config.fallback_to_hash && config.strategy == StrategyKind::Database {
            service = service.with_hash_fallback(hash);
        }

        info!(strategy = %config.strategy, "thread bridge runtime ready");
        Ok(Self {
            service,
            store,
            lifecycle,
            lifecycle_settings: config.lifecycle,
        })
    }

    /// Returns the resolution service.
    #[must_use]
    pub const fn service(&self) -> &ResolutionService {
        &self.service
    }

    /// Returns the mapping store, when the database strategy is configured.
    #[must_use]
    pub const fn store(&self) -> Option<&Arc<dyn MappingStore>> {
        self.store.as_ref()
    }

    /// Returns the lifecycle manager, when the database strategy is
    /// configured.
    #[must_use]
    pub const fn lifecycle(&self) -> Option<&MappingLifecycleManager<dyn MappingStore, C>> {
        self.lifecycle.as_ref()
    }

    /// Returns the configured sweep parameters.
    #[must_use]
    pub const fn lifecycle_settings(&self) -> LifecycleSettings {
        self.lifecycle_settings
    }
}

fn context_validator(config: &BridgeConfig) -> Result<ContextValidator, RuntimeBuildError> {
    if config.tenancy.multi_tenant {
        return Ok(ContextValidator::multi_tenant());
    }
    let raw = config.tenancy.default_tenant.clone().unwrap_or_default();
    let tenant = TenantId::new(raw).map_err(RuntimeBuildError::DefaultTenant)?;
    Ok(ContextValidator::single_tenant(tenant))
}

fn hash_resolver(config: &BridgeConfig) -> HashResolver {
    let resolver = HashResolver::new(config.hash.prefix.clone(), config.hash.hash_length);
    match &config.hash.salt {
        Some(salt) => resolver.with_salt(salt.clone()),
        None => resolver,
    }
}

async fn open_store(
    backend: &BackendSettings,
) -> Result<Arc<dyn MappingStore>, RuntimeBuildError> {
    match backend {
        BackendSettings::Memory => Ok(Arc::new(InMemoryMappingStore::new())),
        BackendSettings::Document { path } => {
            let location = path.clone();
            let store =
                tokio::task::spawn_blocking(move || DocumentMappingStore::open(location)).await??;
            Ok(Arc::new(store))
        }
        BackendSettings::Postgres {
            url,
            max_connections,
        } => {
            let target = url.clone();
            let pool_size = *max_connections;
            let store = tokio::task::spawn_blocking(move || {
                PostgresMappingStore::connect(&target, pool_size, POOL_CONNECTION_TIMEOUT)
            })
            .await??;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}
