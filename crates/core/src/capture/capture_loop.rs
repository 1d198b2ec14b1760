use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::capture::domain::frame_source::CameraDevice;
use crate::shared::frame::Frame;

/// Destination for frames produced by the capture loop.
///
/// Implemented by the session state; the loop only ever touches it under
/// the state's mutex.
pub trait FrameSlot: Send {
    /// Stores a freshly read frame, or marks the slot invalid on `None`.
    fn store_frame(&mut self, frame: Option<Frame>);

    /// Called once when the device fails mid-session.
    fn mark_disconnected(&mut self);
}

/// Pacing of the capture loop.
#[derive(Clone, Copy, Debug)]
pub struct CaptureTiming {
    pub interval: Duration,
    pub idle_retry: Duration,
}

/// Background thread that owns an open device and keeps the shared slot
/// filled with the most recent frame.
///
/// The device moves into the thread on spawn and is handed back by
/// [`CaptureLoop::stop`] only after the thread has exited, so the caller can
/// never release hardware the loop may still read from.
pub struct CaptureLoop {
    stop_tx: Sender<()>,
    handle: JoinHandle<Box<dyn CameraDevice>>,
    device_index: u32,
}

impl CaptureLoop {
    pub fn spawn<S>(
        device: Box<dyn CameraDevice>,
        device_index: u32,
        slot: Arc<Mutex<S>>,
        timing: CaptureTiming,
    ) -> std::io::Result<Self>
    where
        S: FrameSlot + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name(format!("capture-{device_index}"))
            .spawn(move || run(device, &slot, &stop_rx, timing))?;
        Ok(Self {
            stop_tx,
            handle,
            device_index,
        })
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    /// True once the thread has exited on its own (device failure).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals the loop, waits for it to exit and returns the device.
    ///
    /// Returns `None` if the capture thread panicked; the device was dropped
    /// during unwinding in that case.
    pub fn stop(self) -> Option<Box<dyn CameraDevice>> {
        let _ = self.stop_tx.try_send(());
        drop(self.stop_tx);
        self.handle.join().ok()
    }
}

fn run<S: FrameSlot>(
    mut device: Box<dyn CameraDevice>,
    slot: &Mutex<S>,
    stop_rx: &Receiver<()>,
    timing: CaptureTiming,
) -> Box<dyn CameraDevice> {
    log::info!("Capture loop started");
    let mut sequence: usize = 0;

    loop {
        match stop_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => break,
        }

        if !device.is_open() {
            if wait_for_stop(stop_rx, timing.idle_retry) {
                break;
            }
            continue;
        }

        match device.read() {
            Ok(frame) => {
                let frame = frame.map(|f| {
                    sequence += 1;
                    f.with_index(sequence)
                });
                lock(slot).store_frame(frame);
            }
            Err(e) => {
                log::error!("Capture error, stopping capture loop: {e}");
                lock(slot).mark_disconnected();
                break;
            }
        }

        if wait_for_stop(stop_rx, timing.interval) {
            break;
        }
    }

    log::info!("Capture loop stopped");
    device
}

/// Sleeps up to `timeout`, returning early (true) when a stop is requested.
fn wait_for_stop(stop_rx: &Receiver<()>, timeout: Duration) -> bool {
    !matches!(stop_rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout))
}

fn lock<S>(slot: &Mutex<S>) -> std::sync::MutexGuard<'_, S> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::frame_source::CaptureError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingSlot {
        stored: usize,
        invalid: usize,
        last_index: Option<usize>,
        disconnected: bool,
    }

    impl FrameSlot for RecordingSlot {
        fn store_frame(&mut self, frame: Option<Frame>) {
            match frame {
                Some(f) => {
                    self.stored += 1;
                    self.last_index = Some(f.index());
                }
                None => self.invalid += 1,
            }
        }

        fn mark_disconnected(&mut self) {
            self.disconnected = true;
        }
    }

    /// Scripted device: fails with `Err` after `fail_after` reads, yields
    /// `Ok(None)` on every `blank_every`th read.
    struct ScriptedDevice {
        reads: Arc<AtomicUsize>,
        open: Arc<AtomicBool>,
        fail_after: Option<usize>,
        blank_every: Option<usize>,
    }

    impl ScriptedDevice {
        fn new(reads: Arc<AtomicUsize>) -> Self {
            Self {
                reads,
                open: Arc::new(AtomicBool::new(true)),
                fail_after: None,
                blank_every: None,
            }
        }
    }

    impl CameraDevice for ScriptedDevice {
        fn configure(&mut self, _width: u32, _height: u32) -> Result<(), CaptureError> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_after.is_some_and(|limit| n > limit) {
                return Err(CaptureError::Disconnected("unplugged".into()));
            }
            if self.blank_every.is_some_and(|k| n % k == 0) {
                return Ok(None);
            }
            Ok(Some(Frame::new(vec![0u8; 12], 2, 2, 3, 0)))
        }

        fn release(&mut self) {}
    }

    fn timing() -> CaptureTiming {
        CaptureTiming {
            interval: Duration::from_millis(1),
            idle_retry: Duration::from_millis(5),
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_loop_fills_slot_with_sequenced_frames() {
        let reads = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(RecordingSlot::default()));
        let device = ScriptedDevice::new(reads.clone());

        let capture = CaptureLoop::spawn(Box::new(device), 0, slot.clone(), timing()).unwrap();
        wait_until(|| slot.lock().unwrap().stored >= 3);
        assert!(capture.stop().is_some());

        let slot = slot.lock().unwrap();
        assert!(slot.last_index.unwrap() >= 3);
        assert!(!slot.disconnected);
    }

    #[test]
    fn test_stop_returns_device_after_thread_exit() {
        let reads = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(RecordingSlot::default()));
        let capture =
            CaptureLoop::spawn(Box::new(ScriptedDevice::new(reads.clone())), 1, slot, timing())
                .unwrap();
        assert_eq!(capture.device_index(), 1);
        wait_until(|| reads.load(Ordering::SeqCst) > 0);

        assert!(capture.stop().is_some());
        let after_stop = reads.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(reads.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_blank_reads_mark_slot_invalid() {
        let reads = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(RecordingSlot::default()));
        let mut device = ScriptedDevice::new(reads);
        device.blank_every = Some(2);

        let capture = CaptureLoop::spawn(Box::new(device), 0, slot.clone(), timing()).unwrap();
        wait_until(|| slot.lock().unwrap().invalid >= 2);
        capture.stop();

        assert!(slot.lock().unwrap().stored >= 1);
    }

    #[test]
    fn test_device_error_ends_loop_and_marks_disconnected() {
        let reads = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(RecordingSlot::default()));
        let mut device = ScriptedDevice::new(reads);
        device.fail_after = Some(2);

        let capture = CaptureLoop::spawn(Box::new(device), 0, slot.clone(), timing()).unwrap();
        wait_until(|| capture.is_finished());

        assert!(slot.lock().unwrap().disconnected);
        assert_eq!(slot.lock().unwrap().stored, 2);
        assert!(capture.stop().is_some());
    }

    #[test]
    fn test_closed_device_is_not_read() {
        let reads = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(RecordingSlot::default()));
        let device = ScriptedDevice::new(reads.clone());
        device.open.store(false, Ordering::SeqCst);
        let open = device.open.clone();

        let capture = CaptureLoop::spawn(Box::new(device), 0, slot.clone(), timing()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        open.store(true, Ordering::SeqCst);
        wait_until(|| reads.load(Ordering::SeqCst) > 0);
        capture.stop();
    }
}
