use super::{CaptureBackend, CaptureConstraints, CaptureError, Facing, Frame, VideoStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

type SharedStream = Arc<Mutex<Option<Box<dyn VideoStream>>>>;

fn lock(stream: &SharedStream) -> MutexGuard<'_, Option<Box<dyn VideoStream>>> {
    stream.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands out the camera, at most one [`CaptureSession`] at a time.
#[derive(Clone)]
pub struct CaptureDeviceManager {
    backend: Arc<dyn CaptureBackend>,
    constraints: CaptureConstraints,
    busy: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl CaptureDeviceManager {
    pub fn new(backend: Arc<dyn CaptureBackend>, constraints: CaptureConstraints) -> Self {
        Self {
            backend,
            constraints,
            busy: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Whether a session currently holds (or is acquiring) the device.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Opens the camera, preferring `preferred` and falling back to any
    /// device when that facing does not exist.
    ///
    /// Fails with [`CaptureError::Unavailable`] while another session holds
    /// the device. Dropping the returned future before it resolves leaves the
    /// device free.
    pub async fn acquire(&self, preferred: Facing) -> Result<CaptureSession, CaptureError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::Unavailable("camera is already in use".into()));
        }
        let slot = DeviceSlot(self.busy.clone());

        let wanted = self.constraints.with_facing(preferred);
        let stream = match self.backend.open(wanted).await {
            Ok(stream) => stream,
            Err(CaptureError::NotFound) if preferred != Facing::Any => {
                debug!(?preferred, "preferred camera missing, trying any device");
                self.backend.open(wanted.with_facing(Facing::Any)).await?
            }
            Err(e) => return Err(e),
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(capture = id, "camera acquired");
        Ok(CaptureSession {
            id,
            stream: Arc::new(Mutex::new(Some(stream))),
            slot: Some(slot),
            claimed: AtomicBool::new(false),
        })
    }

    /// Stops and frees `session`. Passing `None` or an already released
    /// session does nothing.
    pub fn release(&self, session: Option<CaptureSession>) {
        if let Some(mut session) = session {
            session.release();
        }
    }
}

/// Marks the device busy for as long as it lives.
struct DeviceSlot(Arc<AtomicBool>);

impl Drop for DeviceSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Exclusive handle to an open camera stream.
///
/// Dropping it stops the stream and frees the device.
pub struct CaptureSession {
    id: u64,
    stream: SharedStream,
    slot: Option<DeviceSlot>,
    claimed: AtomicBool,
}

impl CaptureSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.slot.is_some()
    }

    /// Stream dimensions once metadata has arrived.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        lock(&self.stream).as_ref().and_then(|s| s.dimensions())
    }

    /// Read-only frame access for a sampler. Goes dark once the session is released.
    pub fn frames(&self) -> FrameSource {
        FrameSource {
            stream: self.stream.clone(),
        }
    }

    /// Returns `true` for exactly one caller over the session's lifetime.
    ///
    /// The scan loop claims the session before handing off a payload, so a
    /// second detection on the same session is discarded.
    pub fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::SeqCst)
    }

    /// Stops all tracks and frees the device. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut stream) = lock(&self.stream).take() {
            stream.stop();
        }
        if self.slot.take().is_some() {
            info!(capture = self.id, "camera released");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Shared read access to a session's frames.
#[derive(Clone)]
pub struct FrameSource {
    stream: SharedStream,
}

impl FrameSource {
    /// Draws the current frame into `surface`. `false` while the stream is
    /// warming up or after the session was released.
    pub fn draw_into(&self, surface: &mut Frame) -> bool {
        match lock(&self.stream).as_mut() {
            Some(stream) => stream.draw_into(surface),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Still {
        stops: Arc<AtomicUsize>,
    }

    impl VideoStream for Still {
        fn dimensions(&self) -> Option<(u32, u32)> {
            Some((2, 2))
        }
        fn draw_into(&mut self, surface: &mut Frame) -> bool {
            surface.resize(2, 2);
            true
        }
        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Only has a front camera.
    struct FrontOnly {
        stops: Arc<AtomicUsize>,
        asked: Mutex<Vec<Facing>>,
    }

    #[async_trait]
    impl CaptureBackend for FrontOnly {
        async fn open(
            &self,
            constraints: CaptureConstraints,
        ) -> Result<Box<dyn VideoStream>, CaptureError> {
            self.asked.lock().unwrap().push(constraints.facing);
            match constraints.facing {
                Facing::Environment => Err(CaptureError::NotFound),
                _ => Ok(Box::new(Still {
                    stops: self.stops.clone(),
                })),
            }
        }
    }

    fn manager() -> (CaptureDeviceManager, Arc<FrontOnly>) {
        let backend = Arc::new(FrontOnly {
            stops: Arc::new(AtomicUsize::new(0)),
            asked: Mutex::new(Vec::new()),
        });
        let m = CaptureDeviceManager::new(backend.clone(), CaptureConstraints::default());
        (m, backend)
    }

    #[tokio::test]
    async fn falls_back_to_any_camera() {
        let (m, backend) = manager();
        let session = m.acquire(Facing::Environment).await.unwrap();
        assert!(session.is_open());
        assert_eq!(
            *backend.asked.lock().unwrap(),
            vec![Facing::Environment, Facing::Any]
        );
    }

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let (m, _) = manager();
        let first = m.acquire(Facing::User).await.unwrap();
        let second = m.acquire(Facing::User).await;
        assert!(matches!(second, Err(CaptureError::Unavailable(_))));
        m.release(Some(first));
        assert!(!m.is_busy());
        assert!(m.acquire(Facing::User).await.is_ok());
    }

    #[tokio::test]
    async fn release_is_idempotent_and_stops_once() {
        let (m, backend) = manager();
        let mut session = m.acquire(Facing::User).await.unwrap();
        let frames = session.frames();
        session.release();
        session.release();
        drop(session);
        m.release(None);
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
        assert!(!m.is_busy());
        assert!(!frames.draw_into(&mut Frame::default()));
    }

    #[tokio::test]
    async fn claim_succeeds_once() {
        let (m, _) = manager();
        let session = m.acquire(Facing::User).await.unwrap();
        assert!(session.claim());
        assert!(!session.claim());
    }

    #[tokio::test]
    async fn failed_open_frees_the_device() {
        let no_camera =
            CaptureDeviceManager::new(Arc::new(NoCamera), CaptureConstraints::default());
        assert_eq!(
            no_camera.acquire(Facing::Environment).await.err(),
            Some(CaptureError::NotFound)
        );
        assert!(!no_camera.is_busy());
    }

    struct NoCamera;

    #[async_trait]
    impl CaptureBackend for NoCamera {
        async fn open(&self, _: CaptureConstraints) -> Result<Box<dyn VideoStream>, CaptureError> {
            Err(CaptureError::NotFound)
        }
    }
}
