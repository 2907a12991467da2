use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::math::color::{ColorParams, HuePolicy};
use crate::math::expr::{Expression, compile};
use crate::math::mesh::{Appearance, SurfaceMesh, build};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotSettings {
    pub resolution: usize,
    pub size: f64,
    pub hue_policy: HuePolicy,
}

pub enum PlotCommand {
    Rebuild {
        formula: String,
        appearance: Appearance,
    },
    Stop,
}

pub enum PlotResult {
    Surface(SurfaceMesh),
    Error(String),
}

/// Compiles formulas and samples surfaces off the render thread.
pub struct PlotEngine {
    tx_cmd: Sender<PlotCommand>,
    rx_result: Receiver<PlotResult>,
    last_error: Arc<Mutex<Option<String>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PlotEngine {
    pub fn new(settings: PlotSettings) -> Self {
        let (tx_cmd, rx_cmd) = channel::unbounded::<PlotCommand>();
        let (tx_result, rx_result) = channel::bounded::<PlotResult>(2);
        let last_error = Arc::new(Mutex::new(None));
        let last_error_clone = Arc::clone(&last_error);

        let thread_handle = thread::Builder::new()
            .name("plot-engine".into())
            .spawn(move || plot_thread(settings, rx_cmd, tx_result, last_error_clone))
            .ok();

        if thread_handle.is_none() {
            tracing::error!("failed to spawn plot engine thread");
        }

        Self {
            tx_cmd,
            rx_result,
            last_error,
            thread_handle,
        }
    }

    pub fn rebuild(&self, formula: &str, appearance: Appearance) {
        let _ = self.tx_cmd.send(PlotCommand::Rebuild {
            formula: formula.to_string(),
            appearance,
        });
    }

    pub fn try_recv_result(&self) -> Option<PlotResult> {
        self.rx_result.try_recv().ok()
    }

    /// Blocks until the next result arrives or the engine has shut down.
    pub fn recv_result(&self) -> Option<PlotResult> {
        self.rx_result.recv().ok()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn stop(&self) {
        let _ = self.tx_cmd.send(PlotCommand::Stop);
    }
}

impl Drop for PlotEngine {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(PlotCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Compiles `formula` unless `cache` already holds it.
fn compiled<'a>(
    cache: &'a mut Option<Expression>,
    formula: &str,
) -> Result<&'a Expression, String> {
    let reuse = cache.as_ref().is_some_and(|expr| expr.source() == formula);
    if !reuse {
        *cache = None;
        let expr = compile(formula).map_err(|e| format!("Invalid equation: {e}"))?;
        tracing::debug!(formula, "compiled formula");
        *cache = Some(expr);
    }
    cache.as_ref().ok_or_else(|| "Invalid equation: not compiled".to_string())
}

fn plot_thread(
    settings: PlotSettings,
    rx_cmd: Receiver<PlotCommand>,
    tx_result: Sender<PlotResult>,
    last_error: Arc<Mutex<Option<String>>>,
) {
    let colors = ColorParams::for_size(settings.size, settings.hue_policy);
    let mut cache: Option<Expression> = None;

    loop {
        let mut cmd = match rx_cmd.recv() {
            Ok(c) => c,
            Err(_) => return,
        };

        // Edits arrive per keystroke; only the newest queued rebuild matters.
        while let Ok(next) = rx_cmd.try_recv() {
            if matches!(cmd, PlotCommand::Stop) {
                break;
            }
            cmd = next;
        }

        match cmd {
            PlotCommand::Rebuild {
                formula,
                appearance,
            } => {
                let started = Instant::now();
                let result = compiled(&mut cache, &formula).and_then(|expr| {
                    build(
                        expr,
                        settings.resolution,
                        settings.size,
                        &colors,
                        appearance,
                    )
                    .map_err(|e| format!("Invalid equation: {e}"))
                });

                match result {
                    Ok(mesh) => {
                        tracing::debug!(
                            formula = %formula,
                            vertices = mesh.vertex_count(),
                            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                            "surface rebuilt"
                        );
                        *last_error.lock() = None;
                        let _ = tx_result.send(PlotResult::Surface(mesh));
                    }
                    Err(e) => {
                        tracing::info!(formula = %formula, error = %e, "formula rejected");
                        *last_error.lock() = Some(e.clone());
                        let _ = tx_result.send(PlotResult::Error(e));
                    }
                }
            }
            PlotCommand::Stop => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(resolution: usize) -> PlotEngine {
        PlotEngine::new(PlotSettings {
            resolution,
            size: 5.0,
            hue_policy: HuePolicy::Wrap,
        })
    }

    #[test]
    fn test_rebuild_returns_surface() {
        let engine = engine(8);
        engine.rebuild("sin(x) * cos(z)", Appearance::default());
        match engine.recv_result() {
            Some(PlotResult::Surface(mesh)) => assert_eq!(mesh.vertex_count(), 64),
            _ => panic!("expected a surface"),
        }
        assert_eq!(engine.last_error(), None);
    }

    #[test]
    fn test_error_is_reported_once_as_text() {
        let engine = engine(8);
        engine.rebuild("sin(x *", Appearance::default());
        match engine.recv_result() {
            Some(PlotResult::Error(message)) => {
                assert!(message.starts_with("Invalid equation:"), "{message}");
            }
            _ => panic!("expected an error"),
        }
        assert!(engine.last_error().is_some());
    }

    #[test]
    fn test_appearance_travels_with_mesh() {
        let engine = engine(4);
        let appearance = Appearance {
            base_color: [1, 2, 3],
            wireframe: true,
        };
        engine.rebuild("x", appearance);
        match engine.recv_result() {
            Some(PlotResult::Surface(mesh)) => assert_eq!(mesh.appearance, appearance),
            _ => panic!("expected a surface"),
        }
    }

    #[test]
    fn test_runaway_formula_is_an_error_and_the_worker_survives() {
        let engine = engine(4);
        let deep = format!("{}x{}", "(".repeat(5000), ")".repeat(5000));
        engine.rebuild(&deep, Appearance::default());
        match engine.recv_result() {
            Some(PlotResult::Error(message)) => assert!(message.contains("nests deeper")),
            _ => panic!("expected an error"),
        }

        engine.rebuild(&vec!["x"; 50_000].join("+"), Appearance::default());
        assert!(matches!(engine.recv_result(), Some(PlotResult::Error(_))));

        engine.rebuild("x + z", Appearance::default());
        assert!(matches!(engine.recv_result(), Some(PlotResult::Surface(_))));
    }

    #[test]
    fn test_cached_expression_is_reused_only_for_same_text() {
        let mut cache = None;
        assert!(compiled(&mut cache, "x + z").is_ok());
        assert_eq!(cache.as_ref().map(|e| e.source()), Some("x + z"));
        assert!(compiled(&mut cache, "x +").is_err());
        assert!(cache.is_none());
    }
}
