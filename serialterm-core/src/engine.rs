use crate::control::SessionControl;
use crate::decoder::{DecodeMode, DecodedResult, Decoder};
use crate::events::{EventSink, SessionEvent};
use crate::settings::{Settings, SettingsError};
use serialterm_io::{DeviceList, DeviceScanner, PortConfig, PortError, PortHandle, SerialBackend, SystemBackend};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// State guarded by the engine mutex. The worker and every control call
/// take the same lock before touching the handle or the config.
#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) handle: PortHandle,
    pub(crate) config: PortConfig,
    /// Device-level: port should be closed and left alone.
    pub(crate) paused: bool,
    /// Process-level: the worker keeps looping. Never set back to true.
    pub(crate) running: bool,
    /// Last device snapshot the consumer was told about.
    pub(crate) devices: DeviceList,
    /// Last open failure reported, so a dead port is reported once.
    pub(crate) last_open_error: Option<String>,
}

impl Inner {
    pub(crate) fn report_open_failure(&mut self, events: &EventSink, err: &PortError) {
        let message = err.to_string();
        if self.last_open_error.as_deref() != Some(message.as_str()) {
            warn!(error = %err, "open failed");
            events.error(err);
            self.last_open_error = Some(message);
        }
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    /// Signalled on every control call that can end a wait.
    wake: Condvar,
    pub(crate) events: EventSink,
    pub(crate) eol_table: Vec<String>,
    pub(crate) mode: DecodeMode,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the guard for at most `timeout`, or until notified.
    pub(crate) fn wait<'a>(
        &self,
        guard: MutexGuard<'a, Inner>,
        timeout: Duration,
    ) -> MutexGuard<'a, Inner> {
        match self.wake.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }

    pub(crate) fn notify(&self) {
        self.wake.notify_all();
    }
}

/// Receiving end of the decoded-result FIFO. There is exactly one.
#[derive(Debug)]
pub struct OutputQueue {
    rx: mpsc::UnboundedReceiver<DecodedResult>,
}

impl OutputQueue {
    pub fn try_next(&mut self) -> Option<DecodedResult> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&mut self) -> Vec<DecodedResult> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Wait for the next result. `None` once the engine is gone and the
    /// queue is empty.
    pub async fn next(&mut self) -> Option<DecodedResult> {
        self.rx.recv().await
    }
}

/// The background session: owns the worker thread and hands out the
/// control surface and the output queue.
#[derive(Debug)]
pub struct SessionEngine {
    control: SessionControl,
    worker: Option<Worker>,
    thread: Option<JoinHandle<()>>,
    output: Option<OutputQueue>,
}

impl SessionEngine {
    /// Build an engine in the `Paused` state with the port closed.
    /// Nothing runs until [`SessionEngine::start`].
    pub fn new(
        settings: &Settings,
        backend: Arc<dyn SerialBackend>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), SettingsError> {
        settings.validate()?;

        let (events, event_rx) = EventSink::channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                handle: PortHandle::new(backend.clone()),
                config: settings.port_config(),
                paused: true,
                running: true,
                devices: DeviceList::default(),
                last_open_error: None,
            }),
            wake: Condvar::new(),
            events,
            eol_table: settings.eol_table.clone(),
            mode: settings.decode_mode,
        });

        let worker = Worker {
            shared: shared.clone(),
            scanner: DeviceScanner::new(backend),
            decoder: settings.decoder(),
            output: output_tx,
            scan_interval: settings.scan_interval(),
            poll_interval: settings.poll_interval(),
            last_scan: None,
        };

        let engine = Self {
            control: SessionControl::new(shared),
            worker: Some(worker),
            thread: None,
            output: Some(OutputQueue { rx: output_rx }),
        };
        Ok((engine, event_rx))
    }

    /// [`SessionEngine::new`] over the operating system's serial devices.
    pub fn with_system_backend(
        settings: &Settings,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), SettingsError> {
        Self::new(settings, Arc::new(SystemBackend))
    }

    /// Spawn the worker thread. Calling it again is a no-op.
    pub fn start(&mut self) -> std::io::Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let thread = std::thread::Builder::new()
            .name("serialterm-session".into())
            .spawn(move || worker.run())?;
        self.thread = Some(thread);
        Ok(())
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Take the output queue. Only the first call gets it.
    pub fn output_queue(&mut self) -> Option<OutputQueue> {
        self.output.take()
    }

    /// Stop the session and wait for the worker to exit.
    pub fn stop(&mut self) {
        self.control.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("session worker panicked");
            }
        }
    }
}

impl Drop for SessionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Closes the port however the worker exits, unwinding included.
struct CloseOnExit(Arc<Shared>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.running = false;
        if let Err(e) = inner.handle.close() {
            warn!(error = %e, "close on worker exit failed");
        }
    }
}

struct Worker {
    shared: Arc<Shared>,
    scanner: DeviceScanner,
    decoder: Decoder,
    output: mpsc::UnboundedSender<DecodedResult>,
    scan_interval: Duration,
    poll_interval: Duration,
    last_scan: Option<Instant>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("decoder", &self.decoder)
            .field("scan_interval", &self.scan_interval)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Worker {
    fn run(mut self) {
        info!("session worker started");
        let _close = CloseOnExit(self.shared.clone());

        while self.shared.lock().running {
            self.scan_devices();
            if !self.wait_until_open() {
                continue;
            }
            if let Some(bytes) = self.read_once() {
                self.publish(&bytes);
            }
        }

        info!("session worker exited");
    }

    /// Best-effort device poll, at most once per scan interval.
    fn scan_devices(&mut self) {
        if self
            .last_scan
            .is_some_and(|last| last.elapsed() < self.scan_interval)
        {
            return;
        }
        self.last_scan = Some(Instant::now());

        let list = match self.scanner.scan() {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "device scan failed");
                return;
            }
        };

        let mut inner = self.shared.lock();
        if inner.devices.same_devices(&list) {
            return;
        }
        info!(devices = ?list.names(), "update port's list");
        inner.devices = list.clone();
        self.shared.events.emit(SessionEvent::DeviceListChanged(list));
    }

    /// Sleep while paused, then make sure the handle is open.
    /// Returns false when this iteration should not read.
    fn wait_until_open(&mut self) -> bool {
        let mut inner = self.shared.lock();
        if inner.running && inner.paused {
            // Wake at least once per scan interval so the device list
            // stays current while paused.
            inner = self.shared.wait(inner, self.scan_interval);
        }
        if !inner.running || inner.paused {
            return false;
        }
        if inner.handle.is_open() {
            return true;
        }

        let config = inner.config.clone();
        match inner.handle.open(&config) {
            Ok(()) => {
                inner.last_open_error = None;
                true
            }
            Err(e) => {
                inner.report_open_failure(&self.shared.events, &e);
                // Back off one timeout before retrying; pause/stop cut it short.
                drop(self.shared.wait(inner, config.timeout.max(self.poll_interval)));
                false
            }
        }
    }

    /// Wait up to one timeout for input and drain it once. The guard is
    /// released between polls so control calls never wait on a read.
    /// A zero timeout still waits one poll interval.
    fn read_once(&mut self) -> Option<Vec<u8>> {
        let mut inner = self.shared.lock();
        let deadline = Instant::now() + inner.config.timeout.max(self.poll_interval);

        loop {
            if !inner.running || inner.paused || !inner.handle.is_open() {
                return None;
            }

            match inner.handle.try_drain() {
                Ok(bytes) if !bytes.is_empty() => return Some(bytes),
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "read failed, closing port");
                    self.shared.events.error(&e);
                    if let Err(close) = inner.handle.close() {
                        self.shared.events.error(&close);
                    }
                    return None;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            inner = self.shared.wait(inner, self.poll_interval.min(deadline - now));
        }
    }

    fn publish(&self, bytes: &[u8]) {
        debug!(bytes = bytes.len(), "read event");
        let result = self.decoder.process(bytes);
        if self.output.send(result).is_err() {
            debug!("output queue dropped");
        }
    }
}
