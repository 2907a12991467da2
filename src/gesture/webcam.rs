//! Live camera capture through the platform video API.
//!
//! The device handle never leaves the `camera-capture` thread that opened it;
//! the stream talks to that thread over channels.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};

use crate::gesture::media::{
    CaptureError, FacingMode, MediaAccessError, MediaDevices, MediaStream, VideoConstraints,
    VideoFrame,
};

const FRAME_RATE: u32 = 30;
const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

enum CaptureCommand {
    Frame,
    Stop,
}

/// Opens the first camera for `User` and the last one for `Environment`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebcamDevices;

impl MediaDevices for WebcamDevices {
    fn open(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaAccessError> {
        let cameras = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| MediaAccessError::Unsupported(e.to_string()))?;
        let info = match constraints.facing_mode {
            FacingMode::User => cameras.first(),
            FacingMode::Environment => cameras.last(),
        }
        .ok_or(MediaAccessError::NotFound)?;
        tracing::info!(camera = %info.human_name(), "opening camera");

        let index = info.index().clone();
        let constraints = *constraints;
        let (tx_cmd, rx_cmd) = channel::unbounded();
        let (tx_frame, rx_frame) = channel::bounded(1);
        let (tx_ready, rx_ready) = channel::bounded(1);

        let handle = thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || capture_thread(index, constraints, rx_cmd, tx_frame, tx_ready))?;

        match rx_ready.recv() {
            Ok(Ok(())) => Ok(Box::new(WebcamStream {
                tx_cmd: Some(tx_cmd),
                rx_frame,
                handle: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(MediaAccessError::Unsupported(
                "camera thread exited before opening the device".into(),
            )),
        }
    }
}

fn capture_thread(
    index: CameraIndex,
    constraints: VideoConstraints,
    rx_cmd: Receiver<CaptureCommand>,
    tx_frame: Sender<Result<VideoFrame, CaptureError>>,
    tx_ready: Sender<Result<(), MediaAccessError>>,
) {
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(constraints.width, constraints.height),
            FrameFormat::MJPEG,
            FRAME_RATE,
        ),
    ));

    let opened = Camera::new(index, format).and_then(|mut camera| {
        camera.open_stream()?;
        Ok(camera)
    });
    let mut camera = match opened {
        Ok(camera) => camera,
        Err(e) => {
            let _ = tx_ready.send(Err(MediaAccessError::Unsupported(e.to_string())));
            return;
        }
    };
    if tx_ready.send(Ok(())).is_err() {
        return;
    }

    let mut next_index = 0u64;
    for cmd in rx_cmd.iter() {
        match cmd {
            CaptureCommand::Frame => {
                let frame = camera
                    .frame()
                    .and_then(|buffer| buffer.decode_image::<RgbFormat>())
                    .map(|image| VideoFrame {
                        index: next_index,
                        width: image.width(),
                        height: image.height(),
                        pixels: image.into_raw(),
                    })
                    .map_err(|e| CaptureError::Failed(e.to_string()));
                next_index += 1;
                if tx_frame.send(frame).is_err() {
                    break;
                }
            }
            CaptureCommand::Stop => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!(error = %e, "camera did not stop cleanly");
    }
    tracing::debug!(frames = next_index, "camera released");
}

pub struct WebcamStream {
    tx_cmd: Option<Sender<CaptureCommand>>,
    rx_frame: Receiver<Result<VideoFrame, CaptureError>>,
    handle: Option<JoinHandle<()>>,
}

impl MediaStream for WebcamStream {
    fn capture_frame(&mut self) -> Result<VideoFrame, CaptureError> {
        let Some(tx_cmd) = &self.tx_cmd else {
            return Err(CaptureError::Ended);
        };
        // a frame that arrived after its request timed out is stale
        while self.rx_frame.try_recv().is_ok() {}
        if tx_cmd.send(CaptureCommand::Frame).is_err() {
            return Err(CaptureError::Ended);
        }
        match self.rx_frame.recv_timeout(FRAME_TIMEOUT) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => {
                Err(CaptureError::Failed("camera did not deliver a frame".into()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Ended),
        }
    }

    fn stop_tracks(&mut self) {
        if let Some(tx_cmd) = self.tx_cmd.take() {
            let _ = tx_cmd.send(CaptureCommand::Stop);
        }
        // unblocks a capture thread waiting to hand over a frame
        self.rx_frame = channel::never();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.handle.is_some())
    }
}

impl Drop for WebcamStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
