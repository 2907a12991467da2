use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;

use crate::gesture::landmarks::{
    DetectionError, GestureSignal, HandPose, HandPrediction, LandmarkModel, ModelLoadError,
    read_hands,
};
use crate::gesture::media::{
    CaptureError, MediaAccessError, MediaDevices, MediaStream, VideoConstraints, VideoFrame,
};

pub const DETECTION_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Idle,
    Loading,
    Ready,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerStatus {
    pub model: ModelState,
    pub camera_enabled: bool,
    pub hand_detected: bool,
    pub last_error: Option<String>,
}

impl Default for TrackerStatus {
    fn default() -> Self {
        Self {
            model: ModelState::Idle,
            camera_enabled: false,
            hand_detected: false,
            last_error: None,
        }
    }
}

impl TrackerStatus {
    pub fn label(&self) -> &'static str {
        match (&self.model, self.camera_enabled, self.hand_detected) {
            (ModelState::Idle | ModelState::Loading, _, _) => "Loading hand detection model…",
            (ModelState::Unavailable(_), _, _) => "Hand detection unavailable",
            (ModelState::Ready, false, _) => "Camera off",
            (ModelState::Ready, true, true) => "Hand detected",
            (ModelState::Ready, true, false) => "No hand detected",
        }
    }
}

/// Receives one signal per completed detection, on the polling thread.
pub trait GestureSink: Send + Sync + 'static {
    fn on_signal(&self, signal: &GestureSignal);
}

impl<F> GestureSink for F
where
    F: Fn(&GestureSignal) + Send + Sync + 'static,
{
    fn on_signal(&self, signal: &GestureSignal) {
        self(signal)
    }
}

pub type ModelLoader =
    Box<dyn FnOnce() -> Result<Box<dyn LandmarkModel>, ModelLoadError> + Send + 'static>;

struct DetectRequest {
    sequence: u64,
    frame: VideoFrame,
}

struct DetectResponse {
    sequence: u64,
    result: Result<Vec<HandPrediction>, DetectionError>,
}

/// Polls a camera at a fixed interval and turns hand landmarks into gesture signals.
///
/// Model loading and inference run on a worker thread; at most one detection
/// is in flight at any time.
pub struct GestureTracker {
    status: Arc<Mutex<TrackerStatus>>,
    pose: Arc<Mutex<Option<HandPose>>>,
    sink: Arc<dyn GestureSink>,
    interval: Duration,
    next_sequence: Arc<AtomicU64>,

    tx_request: Option<Sender<DetectRequest>>,
    rx_response: Receiver<DetectResponse>,
    worker_handle: Option<JoinHandle<()>>,

    poll: Option<PollThread>,
}

struct PollThread {
    tx_stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl GestureTracker {
    pub fn new(loader: ModelLoader, sink: Arc<dyn GestureSink>) -> Self {
        Self::with_interval(loader, sink, DETECTION_INTERVAL)
    }

    pub fn with_interval(
        loader: ModelLoader,
        sink: Arc<dyn GestureSink>,
        interval: Duration,
    ) -> Self {
        let status = Arc::new(Mutex::new(TrackerStatus::default()));
        let (tx_request, rx_request) = channel::unbounded::<DetectRequest>();
        let (tx_response, rx_response) = channel::unbounded::<DetectResponse>();

        let worker_status = Arc::clone(&status);
        let worker_handle = thread::Builder::new()
            .name("hand-detector".into())
            .spawn(move || detector_thread(loader, rx_request, tx_response, worker_status))
            .ok();

        if worker_handle.is_none() {
            tracing::error!("failed to spawn hand detection thread");
            status.lock().model = ModelState::Unavailable("detector thread did not start".into());
        }

        Self {
            status,
            pose: Arc::new(Mutex::new(None)),
            sink,
            interval,
            next_sequence: Arc::new(AtomicU64::new(0)),
            tx_request: Some(tx_request),
            rx_response,
            worker_handle,
            poll: None,
        }
    }

    pub fn status(&self) -> TrackerStatus {
        self.status.lock().clone()
    }

    pub fn pose(&self) -> Option<HandPose> {
        *self.pose.lock()
    }

    pub fn is_enabled(&self) -> bool {
        self.poll.is_some()
    }

    /// Opens a 640x480 front-facing stream and starts polling it.
    ///
    /// On failure the tracker stays disabled and the error is kept in the status.
    pub fn enable(&mut self, devices: &dyn MediaDevices) -> Result<(), MediaAccessError> {
        if self.poll.is_some() {
            return Ok(());
        }

        let stream = match devices.open(&VideoConstraints::default()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "camera access failed");
                let mut status = self.status.lock();
                status.camera_enabled = false;
                status.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let Some(tx_request) = self.tx_request.clone() else {
            return Err(MediaAccessError::Unsupported("tracker is shut down".into()));
        };

        {
            let mut status = self.status.lock();
            status.camera_enabled = true;
            status.last_error = None;
        }

        let (tx_stop, rx_stop) = channel::bounded::<()>(1);
        let ctx = PollContext {
            stream,
            interval: self.interval,
            rx_stop,
            tx_request,
            rx_response: self.rx_response.clone(),
            next_sequence: Arc::clone(&self.next_sequence),
            status: Arc::clone(&self.status),
            pose: Arc::clone(&self.pose),
            sink: Arc::clone(&self.sink),
        };

        let spawned = thread::Builder::new()
            .name("gesture-poll".into())
            .spawn(move || poll_thread(ctx));

        match spawned {
            Ok(handle) => {
                tracing::info!("hand tracking enabled");
                self.poll = Some(PollThread { tx_stop, handle });
                Ok(())
            }
            Err(e) => {
                // the stream went down with the closure
                self.status.lock().camera_enabled = false;
                Err(MediaAccessError::Io(e))
            }
        }
    }

    /// Stops polling and releases the camera. Blocks until the poll thread has exited.
    pub fn disable(&mut self) {
        let Some(poll) = self.poll.take() else {
            return;
        };
        let _ = poll.tx_stop.send(());
        let _ = poll.handle.join();
        tracing::info!("hand tracking disabled");
    }

    /// Reaps a poll thread that exited on its own, e.g. after the stream ended.
    pub fn sync(&mut self) {
        if self.poll.as_ref().is_some_and(|p| p.handle.is_finished()) {
            self.disable();
        }
    }
}

impl Drop for GestureTracker {
    fn drop(&mut self) {
        self.disable();
        self.tx_request = None;
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

fn detector_thread(
    loader: ModelLoader,
    rx_request: Receiver<DetectRequest>,
    tx_response: Sender<DetectResponse>,
    status: Arc<Mutex<TrackerStatus>>,
) {
    status.lock().model = ModelState::Loading;
    tracing::info!("loading hand detection model");

    let mut model = match loader() {
        Ok(model) => model,
        Err(e) => {
            tracing::error!(error = %e, "hand detection model failed to load");
            status.lock().model = ModelState::Unavailable(e.to_string());
            return;
        }
    };

    status.lock().model = ModelState::Ready;
    tracing::info!("hand detection model ready");

    for request in rx_request.iter() {
        let result = model.estimate_hands(&request.frame);
        if tx_response
            .send(DetectResponse {
                sequence: request.sequence,
                result,
            })
            .is_err()
        {
            return;
        }
    }
}

struct PollContext {
    stream: Box<dyn MediaStream>,
    interval: Duration,
    rx_stop: Receiver<()>,
    tx_request: Sender<DetectRequest>,
    rx_response: Receiver<DetectResponse>,
    next_sequence: Arc<AtomicU64>,
    status: Arc<Mutex<TrackerStatus>>,
    pose: Arc<Mutex<Option<HandPose>>>,
    sink: Arc<dyn GestureSink>,
}

/// Per-session bookkeeping for the single in-flight detection.
#[derive(Debug, Default)]
struct PollSession {
    in_flight: Option<u64>,
    previous_palm: [f32; 2],
}

impl PollSession {
    fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    fn begin(&mut self, sequence: u64) {
        self.in_flight = Some(sequence);
    }

    /// `None` for responses to anything but the request currently in flight.
    fn finish(&mut self, response: DetectResponse) -> Option<(GestureSignal, Option<HandPose>)> {
        if self.in_flight != Some(response.sequence) {
            tracing::trace!(sequence = response.sequence, "dropping stale detection");
            return None;
        }
        self.in_flight = None;

        match response.result {
            Ok(hands) => Some(read_hands(&hands, &mut self.previous_palm)),
            Err(e) => {
                tracing::error!(error = %e, "hand detection failed");
                Some((GestureSignal::no_hand(), None))
            }
        }
    }
}

fn poll_thread(mut ctx: PollContext) {
    let ticker = channel::tick(ctx.interval);
    let mut session = PollSession::default();

    loop {
        select! {
            recv(ctx.rx_stop) -> _ => break,
            recv(ctx.rx_response) -> msg => {
                let Ok(response) = msg else { break };
                let Some((signal, pose)) = session.finish(response) else { continue };

                {
                    let mut current = ctx.pose.lock();
                    match (pose, current.as_mut()) {
                        (Some(pose), _) => *current = Some(pose),
                        (None, Some(previous)) => previous.hand_detected = false,
                        (None, None) => {}
                    }
                }
                ctx.status.lock().hand_detected = signal.hand_detected;
                ctx.sink.on_signal(&signal);
            }
            recv(ticker) -> _ => {
                if session.is_busy() || ctx.status.lock().model != ModelState::Ready {
                    continue;
                }

                match ctx.stream.capture_frame() {
                    Ok(frame) => {
                        let sequence = ctx.next_sequence.fetch_add(1, Ordering::Relaxed) + 1;
                        session.begin(sequence);
                        if ctx.tx_request.send(DetectRequest { sequence, frame }).is_err() {
                            break;
                        }
                    }
                    Err(CaptureError::Ended) => {
                        tracing::info!("video stream ended");
                        break;
                    }
                    Err(CaptureError::Failed(e)) => {
                        tracing::warn!(error = %e, "frame capture failed");
                    }
                }
            }
        }
    }

    ctx.stream.stop_tracks();
    *ctx.pose.lock() = None;
    let mut status = ctx.status.lock();
    status.camera_enabled = false;
    status.hand_detected = false;
}
