use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{select, tick, Sender};
use tracing::{debug, info, warn};

use crate::config::WiimoteConfig;
use crate::device::Wiimote;
use crate::host::HostInterface;
use crate::result::WiimoteResult;
use crate::UPDATE_FREQ;

/// Number of remotes a host can pair with, including the Balance Board slot.
pub const MAX_WIIMOTES: usize = 5;

type SharedDevices = Arc<Mutex<Vec<Arc<Wiimote>>>>;

/// Owns the emulated Wii remotes of one host and ticks them.
#[derive(Default)]
pub struct WiimoteManager {
    devices: SharedDevices,
}

impl WiimoteManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the next remote. Returns `None` once every slot is taken.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&self, config: WiimoteConfig, host: HostInterface) -> Option<Arc<Wiimote>> {
        let mut devices = lock(&self.devices);
        if devices.len() >= MAX_WIIMOTES {
            warn!("All {MAX_WIIMOTES} Wii remote slots are in use");
            return None;
        }

        let wiimote = Arc::new(Wiimote::new(devices.len() as u32, config, host));
        info!("Added {}", wiimote.name());
        devices.push(Arc::clone(&wiimote));
        Some(wiimote)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Arc<Wiimote>> {
        lock(&self.devices).get(index).map(Arc::clone)
    }

    /// Remotes in slot order.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<Wiimote>> {
        lock(&self.devices).iter().map(Arc::clone).collect()
    }

    /// Advances every remote by one tick.
    pub fn update_all(&self) {
        update_devices(&self.devices);
    }

    /// Starts a thread calling [`Wiimote::update`] on every remote at [`UPDATE_FREQ`].
    ///
    /// The thread ends when the handle is stopped or dropped, or when the manager is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn_ticker(&self) -> WiimoteResult<TickerHandle> {
        let (stop_sender, stop_receiver) = crossbeam_channel::bounded::<()>(1);
        let weak_devices = Arc::downgrade(&self.devices);
        let ticker = tick(Duration::from_secs(1) / UPDATE_FREQ);

        let thread = std::thread::Builder::new()
            .name("wii-remote-ticker".to_string())
            .spawn(move || {
                debug!("Ticker started");
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if !tick_devices(&weak_devices) {
                                break;
                            }
                        }
                        recv(stop_receiver) -> _ => break,
                    }
                }
                debug!("Ticker stopped");
            })?;

        Ok(TickerHandle {
            stop: stop_sender,
            thread: Some(thread),
        })
    }
}

fn lock(devices: &SharedDevices) -> MutexGuard<'_, Vec<Arc<Wiimote>>> {
    match devices.lock() {
        Ok(devices) => devices,
        Err(err) => err.into_inner(),
    }
}

fn update_devices(devices: &SharedDevices) {
    // Remotes lock their own state, so the list is not held while updating.
    let snapshot: Vec<_> = lock(devices).iter().map(Arc::clone).collect();
    for wiimote in snapshot {
        wiimote.update();
    }
}

/// Returns `false` once the manager has been dropped.
fn tick_devices(devices: &Weak<Mutex<Vec<Arc<Wiimote>>>>) -> bool {
    match devices.upgrade() {
        Some(devices) => {
            update_devices(&devices);
            true
        }
        None => false,
    }
}

/// Running ticker thread of a [`WiimoteManager`].
pub struct TickerHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// Stops the thread and waits for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            // The thread may already have ended on its own.
            let _ = self.stop.try_send(());
            if thread.join().is_err() {
                warn!("Ticker thread panicked");
            }
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
