//! Explicit registry of polled devices.

use crate::{PollConfig, PollHandle, PollingCoordinator, StopReason};
use derive_more::{Display, From, Into};
use futures::future::join_all;
use oiot_fetch::{ClientConfig, Connector, MeterSource};
use oiot_types::{ConnectorConfig, OiotError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Identifies one configured device within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
pub struct DeviceKey(String);

impl DeviceKey {
    /// Creates a key from any string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives the key for a configuration: the requested device id, or the
    /// client id when no device filter is set.
    #[must_use]
    pub fn for_config(config: &ConnectorConfig) -> Self {
        Self::new(config.device_id().unwrap_or(config.client_id()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Errors raised by registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A device with this key is already registered.
    #[error("Device '{0}' is already configured")]
    AlreadyRegistered(DeviceKey),

    /// No device with this key is registered.
    #[error("Device '{0}' is not configured")]
    NotRegistered(DeviceKey),

    /// Connecting to or authenticating the device failed.
    #[error("Failed to set up device '{key}': {source}")]
    Setup {
        /// The device being set up.
        key: DeviceKey,
        /// The underlying connector error.
        source: OiotError,
    },
}

struct DeviceEntry {
    coordinator: Arc<PollingCoordinator>,
    handle: Option<PollHandle>,
}

/// Owns one coordinator and its poll task per configured device.
///
/// Create one at startup, pass it to whatever needs to look devices up and
/// call [`shutdown`](Self::shutdown) when done.
pub struct DeviceRegistry {
    client_config: ClientConfig,
    poll_config: PollConfig,
    devices: HashMap<DeviceKey, DeviceEntry>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(client_config: ClientConfig, poll_config: PollConfig) -> Self {
        Self {
            client_config,
            poll_config,
            devices: HashMap::new(),
        }
    }

    /// Connects, authenticates and starts polling the configured device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is already registered or setup fails.
    pub async fn register(
        &mut self,
        config: &ConnectorConfig,
    ) -> Result<Arc<PollingCoordinator>, RegistryError> {
        let key = DeviceKey::for_config(config);
        if self.devices.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        let connector = Connector::with_client_config(config, self.client_config.clone())
            .map_err(|source| RegistryError::Setup {
                key: key.clone(),
                source,
            })?;
        self.register_source(key, Arc::new(connector)).await
    }

    /// Sets up and starts polling an arbitrary source under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is taken or setup fails.
    pub async fn register_source(
        &mut self,
        key: DeviceKey,
        source: Arc<dyn MeterSource>,
    ) -> Result<Arc<PollingCoordinator>, RegistryError> {
        if self.devices.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        let coordinator = PollingCoordinator::setup(source, self.poll_config)
            .await
            .map_err(|source| RegistryError::Setup {
                key: key.clone(),
                source,
            })?;
        let handle = coordinator.spawn();
        info!(%key, "device registered");
        self.devices.insert(
            key,
            DeviceEntry {
                coordinator: Arc::clone(&coordinator),
                handle: Some(handle),
            },
        );
        Ok(coordinator)
    }

    /// Returns the coordinator for `key`.
    #[must_use]
    pub fn get(&self, key: &DeviceKey) -> Option<Arc<PollingCoordinator>> {
        self.devices.get(key).map(|entry| Arc::clone(&entry.coordinator))
    }

    /// Iterates over the registered keys.
    pub fn keys(&self) -> impl Iterator<Item = &DeviceKey> {
        self.devices.keys()
    }

    /// Returns the number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns true if no device is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Re-authenticates a halted device and restarts its poll task.
    ///
    /// A device that is still polling normally is left as it is.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or authentication fails again.
    pub async fn resume(&mut self, key: &DeviceKey) -> Result<(), RegistryError> {
        let entry = self
            .devices
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotRegistered(key.clone()))?;

        let running = entry.handle.as_ref().is_some_and(|h| !h.is_finished());
        if running && !entry.coordinator.state().is_auth_failed() {
            debug!(%key, "device is polling, nothing to resume");
            return Ok(());
        }

        entry
            .coordinator
            .reauthenticate()
            .await
            .map_err(|source| RegistryError::Setup {
                key: key.clone(),
                source,
            })?;

        if let Some(old) = entry.handle.take() {
            old.cancel().await;
        }
        entry.handle = Some(entry.coordinator.spawn());
        info!(%key, "device polling resumed");
        Ok(())
    }

    /// Stops polling `key` and drops it from the registry.
    pub async fn remove(&mut self, key: &DeviceKey) -> Option<StopReason> {
        let entry = self.devices.remove(key)?;
        info!(%key, "device removed");
        Some(stop(entry).await)
    }

    /// Stops every poll task and empties the registry.
    pub async fn shutdown(&mut self) -> Vec<(DeviceKey, StopReason)> {
        let stops = self.devices.drain().map(|(key, entry)| async move {
            let reason = stop(entry).await;
            (key, reason)
        });
        join_all(stops).await
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("poll_config", &self.poll_config)
            .field("devices", &self.devices.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

async fn stop(entry: DeviceEntry) -> StopReason {
    match entry.handle {
        Some(handle) => handle.cancel().await,
        None => StopReason::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnapshotView;
    use async_trait::async_trait;
    use oiot_types::{ErrorKind, Measurement, MeasurementSet, Result};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct StaticSource {
        reject: AtomicBool,
    }

    impl StaticSource {
        fn reject(&self, reject: bool) {
            self.reject.store(reject, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            if self.reject.load(Ordering::SeqCst) {
                Err(OiotError::InvalidAuth("bad token".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MeterSource for StaticSource {
        async fn authenticate(&self) -> Result<bool> {
            self.check().map(|()| true)
        }

        async fn fetch(&self) -> Result<MeasurementSet> {
            self.check()?;
            MeasurementSet::try_from_fn(|slot| Ok(Measurement::new(slot, "c", 1.0, "m3")))
        }

        fn device_id(&self) -> Option<String> {
            Some("42".to_string())
        }

        fn device_name(&self) -> String {
            "Meter".to_string()
        }
    }

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(ClientConfig::default(), PollConfig::default())
    }

    #[test]
    fn test_device_key_for_config() {
        let with_device = ConnectorConfig::new("1001", "tok", Some("42")).unwrap();
        assert_eq!(DeviceKey::for_config(&with_device).as_str(), "42");

        let without_device = ConnectorConfig::new("1001", "tok", None::<String>).unwrap();
        assert_eq!(DeviceKey::for_config(&without_device).to_string(), "1001");

        let key: DeviceKey = String::from("7").into();
        let raw: String = key.into();
        assert_eq!(raw, "7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_and_get() {
        let mut registry = registry();
        let key = DeviceKey::new("meter");
        let coordinator = registry
            .register_source(key.clone(), Arc::new(StaticSource::default()))
            .await
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec![&key]);
        assert!(coordinator.current_snapshot().is_some());

        let looked_up = registry.get(&key).unwrap();
        assert!(Arc::ptr_eq(&coordinator, &looked_up));
        assert!(registry.get(&DeviceKey::new("other")).is_none());

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_key_rejected() {
        let mut registry = registry();
        let key = DeviceKey::new("meter");
        registry
            .register_source(key.clone(), Arc::new(StaticSource::default()))
            .await
            .unwrap();

        let err = registry
            .register_source(key.clone(), Arc::new(StaticSource::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(k) if k == key));
        assert_eq!(registry.len(), 1);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_setup_is_not_registered() {
        let mut registry = registry();
        let source = Arc::new(StaticSource::default());
        source.reject(true);

        let err = registry
            .register_source(DeviceKey::new("meter"), source)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Setup { ref source, .. } if source.kind() == ErrorKind::InvalidAuth
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_device_fails_setup() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut registry = DeviceRegistry::new(
            ClientConfig {
                base_url: format!("http://{addr}/api"),
                ..Default::default()
            },
            PollConfig::default().with_timeout(Duration::from_secs(2)),
        );
        let config = ConnectorConfig::new("1001", "tok", Some("42")).unwrap();

        let err = registry.register(&config).await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Setup { ref source, .. } if source.kind() == ErrorKind::CannotConnect
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_stops_polling() {
        let mut registry = registry();
        let key = DeviceKey::new("meter");
        registry
            .register_source(key.clone(), Arc::new(StaticSource::default()))
            .await
            .unwrap();

        assert_eq!(registry.remove(&key).await, Some(StopReason::Cancelled));
        assert!(registry.get(&key).is_none());
        assert_eq!(registry.remove(&key).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_auth_failure() {
        let mut registry = registry();
        let key = DeviceKey::new("meter");
        let source = Arc::new(StaticSource::default());
        let coordinator = registry
            .register_source(key.clone(), source.clone())
            .await
            .unwrap();

        source.reject(true);
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(coordinator.view(), SnapshotView::NeedsReauth);

        assert!(registry.resume(&key).await.is_err());

        source.reject(false);
        registry.resume(&key).await.unwrap();
        assert!(matches!(coordinator.view(), SnapshotView::Stale(_)));

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(matches!(coordinator.view(), SnapshotView::Fresh(_)));

        assert!(matches!(
            registry.resume(&DeviceKey::new("other")).await,
            Err(RegistryError::NotRegistered(_))
        ));
        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_leaves_healthy_device_alone() {
        let mut registry = registry();
        let key = DeviceKey::new("meter");
        let coordinator = registry
            .register_source(key.clone(), Arc::new(StaticSource::default()))
            .await
            .unwrap();
        let status = coordinator.subscribe();

        registry.resume(&key).await.unwrap();
        assert!(!status.has_changed().unwrap());
        assert!(matches!(coordinator.view(), SnapshotView::Fresh(_)));
        assert!(!coordinator.is_stale());

        // The original poll task keeps ticking.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(status.has_changed().unwrap());
        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let mut registry = registry();
        for name in ["a", "b"] {
            registry
                .register_source(DeviceKey::new(name), Arc::new(StaticSource::default()))
                .await
                .unwrap();
        }

        let mut stopped = registry.shutdown().await;
        stopped.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            stopped,
            vec![
                (DeviceKey::new("a"), StopReason::Cancelled),
                (DeviceKey::new("b"), StopReason::Cancelled),
            ]
        );
        assert!(registry.is_empty());
    }
}
