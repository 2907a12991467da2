use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use handplot::gesture::landmarks::{
    DetectionError, INDEX_TIP, LANDMARK_COUNT, PALM_BASE, THUMB_TIP,
};
use handplot::gesture::media::{CaptureError, MediaAccessError, VideoFrame};
use handplot::gesture::{
    ControlsSink, GesturePolicy, GestureSignal, GestureTracker, HandPrediction, Landmark,
    LandmarkModel, MediaDevices, MediaStream, ModelLoader, ModelState, Recording, ReplayDevices,
    VideoConstraints,
};
use handplot::renderer::OrbitControls;
use handplot::renderer::camera::DEFAULT_POSITION;

const INTERVAL: Duration = Duration::from_millis(10);

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn hand(palm: [f32; 2], pinch: f32) -> Vec<HandPrediction> {
    let mut landmarks = vec![Landmark::default(); LANDMARK_COUNT];
    landmarks[PALM_BASE] = Landmark::new(palm[0], palm[1], 0.0);
    landmarks[THUMB_TIP] = Landmark::new(200.0, 200.0, 0.0);
    landmarks[INDEX_TIP] = Landmark::new(200.0 + pinch, 200.0, 0.0);
    vec![HandPrediction::new(landmarks)]
}

/// Endless camera that counts how many of its tracks are still live.
struct CountingDevices {
    active: Arc<AtomicUsize>,
}

struct CountingStream {
    active: Arc<AtomicUsize>,
    next: u64,
    stopped: bool,
}

impl MediaDevices for CountingDevices {
    fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError> {
        assert_eq!((constraints.width, constraints.height), (640, 480));
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingStream {
            active: Arc::clone(&self.active),
            next: 0,
            stopped: false,
        }))
    }
}

impl MediaStream for CountingStream {
    fn capture_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        if self.stopped {
            return Err(CaptureError::Ended);
        }
        self.next += 1;
        Ok(VideoFrame {
            index: self.next,
            width: 640,
            height: 480,
            pixels: Vec::new(),
        })
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn active_tracks(&self) -> usize {
        usize::from(!self.stopped)
    }
}

struct CountingModel {
    calls: Arc<AtomicUsize>,
}

impl LandmarkModel for CountingModel {
    fn estimate_hands(
        &mut self,
        frame: &VideoFrame,
    ) -> Result<Vec<HandPrediction>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(hand([frame.index as f32, 0.0], 70.0))
    }
}

fn counting_loader(calls: &Arc<AtomicUsize>) -> ModelLoader {
    let calls = Arc::clone(calls);
    Box::new(move || Ok(Box::new(CountingModel { calls }) as Box<dyn LandmarkModel>))
}

type Signals = Arc<Mutex<Vec<GestureSignal>>>;

fn collecting_sink() -> (Signals, impl Fn(&GestureSignal) + Send + Sync + 'static) {
    let signals = Arc::new(Mutex::new(Vec::new()));
    let sink_signals = Arc::clone(&signals);
    (signals, move |s: &GestureSignal| sink_signals.lock().push(*s))
}

#[test]
fn test_disable_stops_detection_and_releases_camera() {
    let calls = Arc::new(AtomicUsize::new(0));
    let active = Arc::new(AtomicUsize::new(0));
    let (signals, sink) = collecting_sink();

    let mut tracker =
        GestureTracker::with_interval(counting_loader(&calls), Arc::new(sink), INTERVAL);
    assert!(wait_for(|| tracker.status().model == ModelState::Ready));

    let devices = CountingDevices {
        active: Arc::clone(&active),
    };
    tracker.enable(&devices).unwrap();
    assert!(tracker.is_enabled());
    assert_eq!(active.load(Ordering::SeqCst), 1);
    assert!(wait_for(|| signals.lock().len() >= 3));

    tracker.disable();
    assert!(!tracker.is_enabled());
    assert_eq!(active.load(Ordering::SeqCst), 0);

    let status = tracker.status();
    assert!(!status.camera_enabled);
    assert!(!status.hand_detected);
    assert!(tracker.pose().is_none());

    // a request already handed to the detector may still finish
    thread::sleep(INTERVAL * 5);
    let detections = calls.load(Ordering::SeqCst);
    let delivered = signals.lock().len();

    thread::sleep(INTERVAL * 20);
    assert_eq!(calls.load(Ordering::SeqCst), detections);
    assert_eq!(signals.lock().len(), delivered);
}

#[test]
fn test_hand_signals_reach_the_sink() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (signals, sink) = collecting_sink();

    let mut tracker =
        GestureTracker::with_interval(counting_loader(&calls), Arc::new(sink), INTERVAL);
    assert!(wait_for(|| tracker.status().model == ModelState::Ready));
    tracker
        .enable(&CountingDevices {
            active: Arc::new(AtomicUsize::new(0)),
        })
        .unwrap();

    assert!(wait_for(|| signals.lock().len() >= 2));
    assert!(wait_for(|| tracker.status().hand_detected));
    tracker.disable();

    let signals = signals.lock();
    assert!(signals.iter().all(|s| s.hand_detected));
    assert!(signals.iter().all(|s| (s.pinch_distance - 70.0).abs() < 1e-4));
    // frame indices climb by one per detection, so the palm moves one pixel each time
    assert!(signals.iter().skip(1).all(|s| s.delta_x >= 1.0));
}

#[test]
fn test_enable_twice_keeps_one_stream() {
    let calls = Arc::new(AtomicUsize::new(0));
    let active = Arc::new(AtomicUsize::new(0));
    let devices = CountingDevices {
        active: Arc::clone(&active),
    };

    let mut tracker = GestureTracker::with_interval(
        counting_loader(&calls),
        Arc::new(|_: &GestureSignal| {}),
        INTERVAL,
    );
    tracker.enable(&devices).unwrap();
    tracker.enable(&devices).unwrap();
    assert_eq!(active.load(Ordering::SeqCst), 1);

    drop(tracker);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[test]
fn test_no_detection_before_model_is_ready() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader: ModelLoader = Box::new(|| {
        Err(handplot::gesture::landmarks::ModelLoadError::Unavailable(
            "missing".into(),
        ))
    });
    let mut tracker =
        GestureTracker::with_interval(loader, Arc::new(|_: &GestureSignal| {}), INTERVAL);
    assert!(wait_for(|| matches!(tracker.status().model, ModelState::Unavailable(_))));

    let active = Arc::new(AtomicUsize::new(0));
    tracker
        .enable(&CountingDevices {
            active: Arc::clone(&active),
        })
        .unwrap();
    thread::sleep(INTERVAL * 10);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!tracker.status().hand_detected);

    tracker.disable();
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[test]
fn test_finished_recording_stops_tracking() {
    let recording = Recording::new(vec![
        hand([10.0, 10.0], 70.0),
        Vec::new(),
        hand([12.0, 10.0], 70.0),
    ]);
    let devices = ReplayDevices::new(Arc::new(recording), false);
    let model = devices.landmarker();
    let loader: ModelLoader = Box::new(move || Ok(Box::new(model) as Box<dyn LandmarkModel>));
    let (signals, sink) = collecting_sink();

    let mut tracker = GestureTracker::with_interval(loader, Arc::new(sink), INTERVAL);
    assert!(wait_for(|| tracker.status().model == ModelState::Ready));
    tracker.enable(&devices).unwrap();

    assert!(wait_for(|| {
        tracker.sync();
        !tracker.is_enabled()
    }));
    assert!(!tracker.status().camera_enabled);

    let signals = signals.lock();
    assert_eq!(signals.len(), 3);
    assert!(signals[0].hand_detected);
    assert!(!signals[1].hand_detected);
    assert_eq!(signals[2].delta_x, 2.0);
}

#[test]
fn test_replayed_hand_moves_the_camera() {
    let frames = (0..20)
        .map(|i| hand([100.0 + 10.0 * i as f32, 100.0], 20.0))
        .collect();
    let devices = ReplayDevices::new(Arc::new(Recording::new(frames)), false);
    let model = devices.landmarker();
    let loader: ModelLoader = Box::new(move || Ok(Box::new(model) as Box<dyn LandmarkModel>));

    let controls = OrbitControls::default().into_shared();
    let sink = ControlsSink::new(Arc::clone(&controls), GesturePolicy::default());

    let mut tracker = GestureTracker::with_interval(loader, Arc::new(sink), INTERVAL);
    assert!(wait_for(|| tracker.status().model == ModelState::Ready));
    tracker.enable(&devices).unwrap();
    assert!(wait_for(|| {
        tracker.sync();
        !tracker.is_enabled()
    }));

    let controls = controls.lock();
    assert_ne!(controls.position(), DEFAULT_POSITION);
    // a tight pinch on every frame only ever zooms in
    assert!(controls.distance() < DEFAULT_POSITION.length());
}
