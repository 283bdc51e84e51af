use facemesh_core::overlay::{self, OverlayError, OverlayStyle};
use facemesh_core::topology::FACE_OUTLINE;
use facemesh_core::{
    ExpressionClassifier, ExpressionReport, LandmarkProvider, MeshError, ProviderError, Session,
};
use facemesh_hw::{CameraError, FrameSource};
use image::RgbImage;
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("landmark provider unavailable: {0}")]
    ProviderUnavailable(#[from] ProviderError),
    #[error("landmark inference failed: {0}")]
    Inference(#[source] ProviderError),
    #[error(transparent)]
    InvalidMesh(#[from] MeshError),
    #[error("render failed: {0}")]
    Render(#[from] OverlayError),
    #[error("failed to write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
    #[error("no frame has been rendered yet")]
    NoFrame,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Point-in-time view of the engine for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub version: &'static str,
    pub source: String,
    pub frame_interval_ms: u64,
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub faces_in_view: usize,
    pub captures_taken: u64,
    pub has_capture: bool,
}

/// Tuning for the engine loop.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Target time from the start of one tick to the start of the next.
    pub frame_interval: Duration,
    /// Frames discarded before the loop starts (camera AE stabilization).
    pub warmup_frames: usize,
    pub style: OverlayStyle,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            warmup_frames: 0,
            style: OverlayStyle::default(),
        }
    }
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Capture {
        reply: oneshot::Sender<bool>,
    },
    Expression {
        reply: oneshot::Sender<Result<Option<ExpressionReport>, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Snapshot {
        path: PathBuf,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Shutdown,
}

/// Clone-safe handle to the engine thread.
///
/// The engine stops on [`EngineHandle::shutdown`] or once every handle is dropped.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Snapshot the first face in view. `false` when no face is detected.
    pub async fn capture(&self) -> Result<bool, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Capture { reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Classify the captured mesh. `None` before the first capture.
    pub async fn expression(&self) -> Result<Option<ExpressionReport>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Expression { reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Status { reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Write the most recently rendered overlay canvas to `path`.
    pub async fn snapshot(&self, path: PathBuf) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Snapshot { path, reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.send(EngineRequest::Shutdown).await
    }

    async fn send(&self, req: EngineRequest) -> Result<(), EngineError> {
        self.tx.send(req).await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the frame source, the provider and the session. Each tick
/// runs fetch frame → detect → render as one step; requests are served
/// between ticks.
pub fn spawn_engine<S, P, C>(
    mut source: S,
    provider: P,
    classifier: C,
    options: EngineOptions,
) -> Result<EngineHandle, EngineError>
where
    S: FrameSource + Send + 'static,
    P: LandmarkProvider + Send + 'static,
    C: ExpressionClassifier + Send + 'static,
{
    if options.warmup_frames > 0 {
        tracing::info!(count = options.warmup_frames, "discarding warmup frames");
        for _ in 0..options.warmup_frames {
            let _ = source.next_frame();
        }
    }

    let (tx, rx) = mpsc::channel::<EngineRequest>(8);

    let engine = Engine {
        source_name: source.describe(),
        source,
        provider,
        classifier,
        session: Session::new(),
        style: options.style,
        frame_interval: options.frame_interval,
        canvas: None,
        frames_processed: 0,
        frames_failed: 0,
        consecutive_failures: 0,
    };

    std::thread::Builder::new()
        .name("facemesh-engine".into())
        .spawn(move || engine.run(rx))?;

    Ok(EngineHandle { tx })
}

struct Engine<S, P, C> {
    source: S,
    source_name: String,
    provider: P,
    classifier: C,
    session: Session,
    style: OverlayStyle,
    frame_interval: Duration,
    canvas: Option<RgbImage>,
    frames_processed: u64,
    frames_failed: u64,
    consecutive_failures: u64,
}

impl<S, P, C> Engine<S, P, C>
where
    S: FrameSource,
    P: LandmarkProvider,
    C: ExpressionClassifier,
{
    fn run(mut self, mut rx: mpsc::Receiver<EngineRequest>) {
        tracing::info!(source = %self.source_name, "engine thread started");

        'ticks: loop {
            let started = Instant::now();

            loop {
                match rx.try_recv() {
                    Ok(req) => {
                        if self.handle(req).is_break() {
                            break 'ticks;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        tracing::info!("all engine handles dropped");
                        break 'ticks;
                    }
                }
            }

            match self.tick() {
                Ok(()) => {
                    if self.consecutive_failures > 0 {
                        tracing::info!(failed = self.consecutive_failures, "engine recovered");
                    }
                    self.consecutive_failures = 0;
                }
                Err(err) => {
                    self.frames_failed += 1;
                    self.consecutive_failures += 1;
                    if self.consecutive_failures == 1 {
                        tracing::warn!(error = %err, "engine tick failed");
                    } else {
                        tracing::debug!(error = %err, streak = self.consecutive_failures, "engine tick failed");
                    }
                }
            }

            if let Some(rest) = self.frame_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        tracing::info!(frames = self.frames_processed, "engine thread exiting");
    }

    /// One frame: fetch, detect, update the session, render.
    fn tick(&mut self) -> Result<(), EngineError> {
        let frame = self.source.next_frame()?;
        let faces = self
            .provider
            .estimate_faces(&frame.data, frame.width, frame.height)
            .map_err(EngineError::Inference)?;

        if faces.is_empty() {
            tracing::debug!(seq = frame.sequence, "no face detected");
        } else {
            tracing::trace!(seq = frame.sequence, faces = faces.len(), "face detected");
        }
        self.session.update_faces(faces);

        let canvas = overlay::compose(
            &frame.data,
            frame.width,
            frame.height,
            self.session.primary_face(),
            self.session.captured(),
            &self.style,
        )?;
        self.canvas = Some(canvas);
        self.frames_processed += 1;
        Ok(())
    }

    fn handle(&mut self, req: EngineRequest) -> ControlFlow<()> {
        match req {
            EngineRequest::Capture { reply } => {
                let taken = self.session.capture();
                if let Some(captured) = self.session.captured().filter(|_| taken) {
                    if let Err(err) = captured.mesh().require(&FACE_OUTLINE) {
                        tracing::warn!(error = %err, "captured mesh has no face outline; silhouette not drawn");
                    }
                    match self.session.expression(&self.classifier) {
                        Ok(Some(expression)) => {
                            tracing::info!(%expression, "classified captured mesh")
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(error = %err, "captured mesh cannot be classified"),
                    }
                }
                let _ = reply.send(taken);
            }
            EngineRequest::Expression { reply } => {
                let _ = reply.send(self.session.report(&self.classifier).map_err(EngineError::from));
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
            EngineRequest::Snapshot { path, reply } => {
                let result = match &self.canvas {
                    Some(canvas) => canvas.save(&path).map_err(EngineError::from),
                    None => Err(EngineError::NoFrame),
                };
                if result.is_ok() {
                    tracing::info!(path = %path.display(), "wrote snapshot");
                }
                let _ = reply.send(result);
            }
            EngineRequest::Shutdown => {
                tracing::info!("engine shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            version: env!("CARGO_PKG_VERSION"),
            source: self.source_name.clone(),
            frame_interval_ms: self.frame_interval.as_millis() as u64,
            frames_processed: self.frames_processed,
            frames_failed: self.frames_failed,
            faces_in_view: self.session.faces().len(),
            captures_taken: self.session.captures_taken(),
            has_capture: self.session.captured().is_some(),
        }
    }
}
