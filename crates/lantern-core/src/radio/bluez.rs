//! BlueZ-backed radio (Linux only).

use bluer::{Adapter, AdapterEvent, Address, Session};
use futures::{pin_mut, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{Advertisement, AdvertisementSink, Radio, RadioError, RadioResult};
use crate::frame::manufacturer_scan_record;

/// A radio driving a BlueZ adapter over D-Bus.
///
/// Discovery runs on a background task while scanning. Every device added or
/// updated during discovery is reported once per manufacturer data entry,
/// rebuilt into a raw advertisement record.
pub struct BluezRadio {
    // kept alive for the lifetime of the adapter handle
    _session: Session,
    adapter: Adapter,
    powered: bool,
    discovery: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BluezRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BluezRadio")
            .field("adapter", &self.adapter.name())
            .field("powered", &self.powered)
            .field("scanning", &self.discovery.is_some())
            .finish_non_exhaustive()
    }
}

impl BluezRadio {
    /// Open a BlueZ session and pick an adapter.
    ///
    /// Uses `adapter_name` (e.g. `hci0`) when given, the default adapter
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if BlueZ is unreachable, the adapter does not exist,
    /// or it is powered off.
    pub async fn acquire(adapter_name: Option<&str>) -> RadioResult<Self> {
        let session = Session::new()
            .await
            .map_err(|e| RadioError::SessionInitFailed {
                message: e.to_string(),
            })?;

        let adapter = match adapter_name {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| {
            debug!(error = %e, "adapter lookup failed");
            RadioError::AdapterNotFound
        })?;

        let powered = adapter.is_powered().await.unwrap_or(false);
        if !powered {
            return Err(RadioError::AdapterPoweredOff);
        }

        info!(adapter = adapter.name(), "using Bluetooth adapter");
        Ok(Self {
            _session: session,
            adapter,
            powered,
            discovery: None,
        })
    }
}

impl Radio for BluezRadio {
    fn is_enabled(&self) -> bool {
        self.powered
    }

    fn start_scan(&mut self, sink: AdvertisementSink) -> RadioResult<()> {
        if self.discovery.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let adapter = self.adapter.clone();
        self.discovery = Some(tokio::spawn(async move {
            if let Err(e) = discover(&adapter, &sink).await {
                warn!(error = %e, "BLE discovery ended with an error");
            }
        }));
        Ok(())
    }

    fn stop_scan(&mut self) {
        // dropping the discovery stream ends the BlueZ discovery session
        if let Some(task) = self.discovery.take() {
            task.abort();
        }
    }
}

impl Drop for BluezRadio {
    fn drop(&mut self) {
        self.stop_scan();
    }
}

async fn discover(adapter: &Adapter, sink: &AdvertisementSink) -> bluer::Result<()> {
    let events = adapter.discover_devices_with_changes().await?;
    pin_mut!(events);

    while let Some(event) = events.next().await {
        // with changes enabled, updated devices are re-announced as added
        let AdapterEvent::DeviceAdded(address) = event else {
            continue;
        };
        for advertisement in read_advertisements(adapter, address).await {
            if !sink.deliver(advertisement) {
                return Ok(());
            }
        }
    }
    Ok(())
}

async fn read_advertisements(adapter: &Adapter, address: Address) -> Vec<Advertisement> {
    let Ok(device) = adapter.device(address) else {
        return Vec::new();
    };
    let Ok(Some(rssi)) = device.rssi().await else {
        trace!(%address, "device without rssi");
        return Vec::new();
    };
    let Ok(Some(manufacturer_data)) = device.manufacturer_data().await else {
        return Vec::new();
    };

    manufacturer_data
        .into_iter()
        .map(|(company_id, data)| {
            Advertisement::new(
                manufacturer_scan_record(company_id, &data),
                rssi,
                Some(address.to_string()),
            )
        })
        .collect()
}
