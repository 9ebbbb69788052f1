//! Single-flight discovery sessions.
//!
//! A scan turns discovery on, waits out the discovery window, turns it off,
//! reads the managed object tree and swaps the resulting device set into the
//! [`DeviceRegistry`]. Scans run on a background task; [`ScanOrchestrator::begin`]
//! returns as soon as the task is spawned. At most one scan runs at a time: the
//! owned guard permit travels with the task and is released when it ends,
//! whether the run completed or failed.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, info_span, warn, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::bus::{AdapterHandle, ObjectTreeReader};
use crate::error::{BluegateError, Result};
use crate::registry::DeviceRegistry;
use crate::tree::{ManagedObjectTree, DEVICE_INTERFACE};
use crate::types::{Device, UNKNOWN_DEVICE_NAME};

/// Default length of the discovery window.
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_secs(10);

/// Recorded when a scan task ends without producing a result.
const ABORTED_RUN: &str = "scan task aborted";

/// Returned by [`ScanOrchestrator::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanTicket {
    /// Id of the scan now running (new or already in flight).
    pub scan_id: Uuid,

    /// `false` when the trigger was absorbed by a scan already running.
    pub started: bool,
}

/// A scan currently in its discovery window or harvesting the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunningScan {
    /// Scan id.
    pub scan_id: Uuid,

    /// When the scan was triggered.
    pub started_at: DateTime<Utc>,
}

/// How a finished scan ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanResult {
    /// The registry was replaced with `device_count` devices.
    Completed {
        /// Devices found.
        device_count: usize,
    },
    /// The run was aborted and the registry left unchanged.
    Failed {
        /// The fault that aborted the run.
        error: String,
    },
}

/// Record of the most recent finished scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanOutcome {
    /// Scan id.
    pub scan_id: Uuid,

    /// When the scan was triggered.
    pub started_at: DateTime<Utc>,

    /// When the scan finished.
    pub finished_at: DateTime<Utc>,

    /// Result of the run.
    pub result: ScanResult,
}

/// Scan state as seen from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanStatus {
    /// The running scan, if any.
    pub running: Option<RunningScan>,

    /// The last finished scan, if any.
    pub last: Option<ScanOutcome>,
}

/// Runs discovery sessions against one adapter and feeds the registry.
pub struct ScanOrchestrator {
    adapter: Arc<dyn AdapterHandle>,
    objects: Arc<dyn ObjectTreeReader>,
    registry: Arc<DeviceRegistry>,
    window: Duration,
    guard: Arc<Mutex<()>>,
    // Held while the guard changes hands, so `status.running` is set exactly
    // when the guard is taken.
    handoff: Arc<StdMutex<()>>,
    status: Arc<ArcSwap<ScanStatus>>,
}

impl ScanOrchestrator {
    /// Creates an idle orchestrator.
    pub fn new(
        adapter: Arc<dyn AdapterHandle>,
        objects: Arc<dyn ObjectTreeReader>,
        registry: Arc<DeviceRegistry>,
        window: Duration,
    ) -> Self {
        Self {
            adapter,
            objects,
            registry,
            window,
            guard: Arc::new(Mutex::new(())),
            handoff: Arc::new(StdMutex::new(())),
            status: Arc::new(ArcSwap::from_pointee(ScanStatus::default())),
        }
    }

    /// Length of the discovery window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Starts a scan in the background unless one is already running.
    ///
    /// Never waits for the scan. A trigger arriving while a scan runs does not
    /// touch the adapter; it gets the running scan's id back.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn begin(&self) -> ScanTicket {
        let handoff = lock(&self.handoff);

        let Ok(permit) = Arc::clone(&self.guard).try_lock_owned() else {
            let scan_id = self
                .status
                .load()
                .running
                .as_ref()
                .map_or_else(Uuid::nil, |running| running.scan_id);
            debug!(%scan_id, "Scan already running, trigger absorbed");
            return ScanTicket {
                scan_id,
                started: false,
            };
        };

        let running = RunningScan {
            scan_id: Uuid::new_v4(),
            started_at: Utc::now(),
        };
        let previous = self.status.load().last.clone();
        self.status.store(Arc::new(ScanStatus {
            running: Some(running.clone()),
            last: previous,
        }));

        let scan_id = running.scan_id;
        let run = ScanRun {
            running,
            status: Arc::clone(&self.status),
            handoff: Arc::clone(&self.handoff),
            permit: Some(permit),
            result: None,
        };
        drop(handoff);

        let adapter = Arc::clone(&self.adapter);
        let objects = Arc::clone(&self.objects);
        let registry = Arc::clone(&self.registry);
        let window = self.window;
        let span = info_span!("scan", %scan_id);

        tokio::spawn(
            async move {
                let mut run = run;
                run.result = Some(match run_scan(&*adapter, &*objects, &registry, window).await {
                    Ok(device_count) => ScanResult::Completed { device_count },
                    Err(e) => ScanResult::Failed {
                        error: e.to_string(),
                    },
                });
            }
            .instrument(span),
        );

        info!(%scan_id, "Triggered device scan");
        ScanTicket {
            scan_id,
            started: true,
        }
    }

    /// Current scan status.
    #[must_use]
    pub fn status(&self) -> ScanStatus {
        self.status.load().as_ref().clone()
    }

    /// Whether a scan is running right now.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.load().running.is_some()
    }

    /// Waits until no scan is running.
    pub async fn wait_idle(&self) {
        drop(self.guard.lock().await);
    }
}

fn lock(mutex: &StdMutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scan task's hold on the guard.
///
/// Dropping it publishes the outcome and releases the guard in one handoff,
/// also when the task panicked or was cancelled before recording a result.
struct ScanRun {
    running: RunningScan,
    status: Arc<ArcSwap<ScanStatus>>,
    handoff: Arc<StdMutex<()>>,
    permit: Option<OwnedMutexGuard<()>>,
    result: Option<ScanResult>,
}

impl Drop for ScanRun {
    fn drop(&mut self) {
        let result = self.result.take().unwrap_or_else(|| {
            error!(scan_id = %self.running.scan_id, "Scan task ended without a result");
            ScanResult::Failed {
                error: ABORTED_RUN.to_string(),
            }
        });

        let _handoff = lock(&self.handoff);
        self.status.store(Arc::new(ScanStatus {
            running: None,
            last: Some(ScanOutcome {
                scan_id: self.running.scan_id,
                started_at: self.running.started_at,
                finished_at: Utc::now(),
                result,
            }),
        }));
        drop(self.permit.take());
    }
}

/// One discovery session. Any fault aborts before the registry is touched.
async fn run_scan(
    adapter: &dyn AdapterHandle,
    objects: &dyn ObjectTreeReader,
    registry: &DeviceRegistry,
    window: Duration,
) -> Result<usize> {
    info!(adapter = adapter.path(), window_secs = window.as_secs(), "Starting Bluetooth discovery");
    adapter.start_discovery().await.map_err(|e| step_failed("start_discovery", e))?;

    tokio::time::sleep(window).await;

    adapter.stop_discovery().await.map_err(|e| step_failed("stop_discovery", e))?;
    let tree = objects.fetch_all().await.map_err(|e| step_failed("fetch_objects", e))?;

    let devices = devices_from_tree(&tree);
    let count = devices.len();
    registry.replace_all(devices);

    info!(device_count = count, "Discovered {count} devices");
    Ok(count)
}

fn step_failed(step: &str, err: BluegateError) -> BluegateError {
    error!(step, error = %err, "Discovery failed, registry left unchanged");
    err
}

/// Builds the device set from every `org.bluez.Device1` object in `tree`.
///
/// `Address`, `Paired` and `Connected` are required; objects missing one are
/// skipped. A missing `Name` becomes `"Unknown"`.
#[must_use]
pub fn devices_from_tree(tree: &ManagedObjectTree) -> Vec<Device> {
    tree.with_interface(DEVICE_INTERFACE)
        .filter_map(|(path, props)| {
            let address = props.get("Address").and_then(|v| v.as_str());
            let paired = props.get("Paired").and_then(|v| v.as_bool());
            let connected = props.get("Connected").and_then(|v| v.as_bool());

            let (Some(address), Some(paired), Some(connected)) = (address, paired, connected) else {
                warn!(path, "Skipping device object with missing properties");
                return None;
            };

            let name = props
                .get("Name")
                .and_then(|v| v.as_str())
                .unwrap_or(UNKNOWN_DEVICE_NAME);

            Some(Device {
                address: address.to_string(),
                name: name.to_string(),
                paired,
                connected,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::tree::{PropertyMap, PropertyValue};

    const ADDR: &str = "AA:BB:CC:DD:EE:FF";

    fn orchestrator(mock: &Arc<MockBackend>) -> (ScanOrchestrator, Arc<DeviceRegistry>) {
        let registry = Arc::new(DeviceRegistry::new());
        let orchestrator = ScanOrchestrator::new(
            Arc::clone(mock) as Arc<dyn AdapterHandle>,
            Arc::clone(mock) as Arc<dyn ObjectTreeReader>,
            Arc::clone(&registry),
            DEFAULT_DISCOVERY_WINDOW,
        );
        (orchestrator, registry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_without_name_defaults_to_unknown() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.add_device(ADDR, None, false, false);
        let (orchestrator, registry) = orchestrator(&mock);

        let ticket = orchestrator.begin();
        assert!(ticket.started);
        orchestrator.wait_idle().await;

        let devices = registry.snapshot();
        assert_eq!(
            *devices,
            vec![Device {
                address: ADDR.to_string(),
                name: "Unknown".to_string(),
                paired: false,
                connected: false,
            }]
        );
        let status = orchestrator.status();
        assert!(status.running.is_none());
        let last = status.last.unwrap();
        assert_eq!(last.scan_id, ticket.scan_id);
        assert_eq!(last.result, ScanResult::Completed { device_count: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_returns_before_window_elapses() {
        let mock = Arc::new(MockBackend::new("hci0"));
        let (orchestrator, _registry) = orchestrator(&mock);

        orchestrator.begin();
        tokio::task::yield_now().await;

        assert!(orchestrator.is_running());
        assert!(mock.is_discovering());
        assert_eq!(mock.stop_discovery_calls(), 0);

        orchestrator.wait_idle().await;
        assert!(!orchestrator.is_running());
        assert!(!mock.is_discovering());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_trigger_while_running_is_absorbed() {
        let mock = Arc::new(MockBackend::new("hci0"));
        let (orchestrator, _registry) = orchestrator(&mock);

        let first = orchestrator.begin();
        tokio::task::yield_now().await;
        let second = orchestrator.begin();

        assert!(first.started);
        assert!(!second.started);
        assert_eq!(first.scan_id, second.scan_id);

        orchestrator.wait_idle().await;
        assert_eq!(mock.start_discovery_calls(), 1);
        assert_eq!(mock.stop_discovery_calls(), 1);
        assert_eq!(mock.fetch_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_leaves_registry_unchanged() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.add_device(ADDR, Some("Headphones"), true, true);
        let (orchestrator, registry) = orchestrator(&mock);

        orchestrator.begin();
        orchestrator.wait_idle().await;
        let before = registry.snapshot();
        assert_eq!(before.len(), 1);

        mock.add_device("11:22:33:44:55:66", None, false, false);
        mock.fail_fetch("org.freedesktop.DBus.Error.NoReply");
        orchestrator.begin();
        orchestrator.wait_idle().await;

        assert_eq!(*registry.snapshot(), *before);
        let last = orchestrator.status().last.unwrap();
        assert!(matches!(last.result, ScanResult::Failed { ref error } if error.contains("NoReply")));

        // Back to idle: the next scan goes through.
        mock.clear_fetch_fault();
        assert!(orchestrator.begin().started);
        orchestrator.wait_idle().await;
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_discovery_fault_aborts_run() {
        let mock = Arc::new(MockBackend::new("hci0"));
        mock.fail_adapter("StartDiscovery", "org.bluez.Error.NotReady");
        let (orchestrator, registry) = orchestrator(&mock);

        orchestrator.begin();
        orchestrator.wait_idle().await;

        assert_eq!(mock.stop_discovery_calls(), 0);
        assert_eq!(mock.fetch_calls(), 0);
        assert!(registry.is_empty());
        let last = orchestrator.status().last.unwrap();
        assert!(matches!(last.result, ScanResult::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_result_clears_stale_devices() {
        let mock = Arc::new(MockBackend::new("hci0"));
        let (orchestrator, registry) = orchestrator(&mock);
        registry.replace_all(vec![Device {
            address: ADDR.to_string(),
            name: "Old".to_string(),
            paired: false,
            connected: false,
        }]);
        assert_eq!(registry.len(), 1);

        orchestrator.begin();
        orchestrator.wait_idle().await;
        assert!(registry.is_empty());
    }

    struct CrashingTree;

    #[async_trait::async_trait]
    impl ObjectTreeReader for CrashingTree {
        async fn fetch_all(&self) -> Result<ManagedObjectTree> {
            panic!("object tree reader crashed");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_run_clears_running_state() {
        let mock = Arc::new(MockBackend::new("hci0"));
        let registry = Arc::new(DeviceRegistry::new());
        let orchestrator = ScanOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn AdapterHandle>,
            Arc::new(CrashingTree),
            Arc::clone(&registry),
            DEFAULT_DISCOVERY_WINDOW,
        );

        let ticket = orchestrator.begin();
        orchestrator.wait_idle().await;

        assert!(!orchestrator.is_running());
        let last = orchestrator.status().last.unwrap();
        assert_eq!(last.scan_id, ticket.scan_id);
        assert_eq!(
            last.result,
            ScanResult::Failed {
                error: "scan task aborted".to_string()
            }
        );
        assert!(registry.is_empty());
        assert!(orchestrator.begin().started);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_triggers_never_see_a_nil_scan_id() {
        let mock = Arc::new(MockBackend::new("hci0"));
        let orchestrator = Arc::new(ScanOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn AdapterHandle>,
            Arc::clone(&mock) as Arc<dyn ObjectTreeReader>,
            Arc::new(DeviceRegistry::new()),
            Duration::from_millis(200),
        ));

        let triggers: Vec<_> = (0..32)
            .map(|_| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move { orchestrator.begin() })
            })
            .collect();
        let mut tickets = Vec::new();
        for trigger in triggers {
            tickets.push(trigger.await.unwrap());
        }
        orchestrator.wait_idle().await;

        let started: Vec<Uuid> = tickets.iter().filter(|t| t.started).map(|t| t.scan_id).collect();
        assert!(!started.is_empty());
        assert_eq!(mock.start_discovery_calls(), started.len());
        for ticket in &tickets {
            assert!(!ticket.scan_id.is_nil());
            assert!(started.contains(&ticket.scan_id));
        }
    }

    #[test]
    fn test_devices_from_tree_skips_incomplete_objects() {
        let mut tree = ManagedObjectTree::new();
        let mut complete = PropertyMap::new();
        complete.insert("Address".into(), PropertyValue::from(ADDR));
        complete.insert("Name".into(), PropertyValue::from("Speaker"));
        complete.insert("Paired".into(), PropertyValue::Bool(true));
        complete.insert("Connected".into(), PropertyValue::Bool(false));
        tree.insert("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF", DEVICE_INTERFACE, complete);

        let mut partial = PropertyMap::new();
        partial.insert("Address".into(), PropertyValue::from("11:22:33:44:55:66"));
        tree.insert("/org/bluez/hci0/dev_11_22_33_44_55_66", DEVICE_INTERFACE, partial);

        tree.insert("/org/bluez/hci0", crate::tree::ADAPTER_INTERFACE, PropertyMap::new());

        let devices = devices_from_tree(&tree);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Speaker");
        assert!(devices[0].paired);
    }
}
