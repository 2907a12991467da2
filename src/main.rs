use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use glam::Vec2;

use handplot::config::AppConfig;
use handplot::gesture::{ControlsSink, GestureTracker, MediaDevices, gesture_backend};
use handplot::logging::init_logging;
use handplot::math::{PlotEngine, PlotSettings};
use handplot::renderer::gpu::{SurfaceRecovery, surface_recovery};
use handplot::renderer::{
    CameraControl, GpuState, OrbitControls, PerspectiveCamera, Scene, SharedControls,
};
use handplot::ui::{
    FrameStats, UiActions, UiState, apply_theme, draw_help_overlay, draw_side_panel,
};

#[derive(Default)]
struct PointerState {
    rotating: bool,
    panning: bool,
    last: Option<Vec2>,
}

struct App {
    config: AppConfig,

    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    egui_state: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
    egui_ctx: egui::Context,

    engine: PlotEngine,
    scene: Scene,
    controls: SharedControls,
    tracker: GestureTracker,
    devices: Box<dyn MediaDevices>,
    ui_state: UiState,
    pointer: PointerState,

    frame_count: u32,
    fps_timer: Instant,
    fps: f32,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let engine = PlotEngine::new(PlotSettings {
            resolution: config.plot.resolution,
            size: config.plot.size,
            hue_policy: config.plot.hue_policy,
        });

        let mut orbit = OrbitControls::new(PerspectiveCamera::default());
        orbit.damping_factor = config.camera.damping;
        orbit.rotate_speed = config.camera.rotate_speed;
        orbit.zoom_speed = config.camera.zoom_speed;
        orbit.min_distance = config.camera.min_distance;
        orbit.max_distance = config.camera.max_distance;
        let controls = orbit.into_shared();

        let (devices, loader) = gesture_backend(&config.gesture);
        let sink = Arc::new(ControlsSink::new(
            Arc::clone(&controls),
            config.gesture.policy,
        ));
        let tracker = GestureTracker::with_interval(
            loader,
            sink,
            Duration::from_millis(config.gesture.interval_ms),
        );

        let ui_state = UiState::from_config(&config);
        engine.rebuild(&ui_state.formula, ui_state.appearance());

        Self {
            config,
            window: None,
            gpu: None,
            egui_state: None,
            egui_renderer: None,
            egui_ctx: egui::Context::default(),

            engine,
            scene: Scene::new(),
            controls,
            tracker,
            devices,
            ui_state,
            pointer: PointerState::default(),

            frame_count: 0,
            fps_timer: Instant::now(),
            fps: 0.0,
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) {
        let mut gpu = match pollster::block_on(GpuState::new(window.clone(), self.ui_state.vsync)) {
            Ok(gpu) => gpu,
            Err(e) => {
                tracing::error!(error = %e, "failed to initialise the renderer");
                return;
            }
        };

        let egui_state = egui_winit::State::new(
            self.egui_ctx.clone(),
            self.egui_ctx.viewport_id(),
            &window,
            Some(window.scale_factor() as f32),
            None,
            Some(2048),
        );

        let egui_renderer =
            egui_wgpu::Renderer::new(&gpu.device, gpu.config.format, None, 1, false);

        apply_theme(&self.egui_ctx);

        let size = window.inner_size();
        self.controls
            .lock()
            .set_aspect(size.width as f32, size.height as f32);

        gpu.prepare_scene(&self.scene, self.ui_state.base_color);
        if let Some(mesh) = self.scene.surface() {
            gpu.upload_surface(&self.scene, mesh);
        }

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.egui_state = Some(egui_state);
        self.egui_renderer = Some(egui_renderer);
    }

    fn update(&mut self) {
        self.frame_count += 1;
        let elapsed = self.fps_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            self.fps = self.frame_count as f32 / elapsed;
            self.frame_count = 0;
            self.fps_timer = Instant::now();
        }

        self.tracker.sync();
        self.ui_state.hand_control = self.tracker.is_enabled();

        while let Some(result) = self.engine.try_recv_result() {
            if self.scene.apply(result) {
                if let (Some(gpu), Some(mesh)) = (&mut self.gpu, self.scene.surface()) {
                    gpu.upload_surface(&self.scene, mesh);
                }
            }
        }

        let camera = {
            let mut controls = self.controls.lock();
            controls.update();
            *controls.camera()
        };
        if let Some(gpu) = &self.gpu {
            gpu.update_camera(&camera);
        }
    }

    fn render(&mut self) {
        let (Some(window), Some(egui_state)) = (&self.window, &mut self.egui_state) else {
            return;
        };

        let raw_input = egui_state.take_egui_input(window);

        let status = self.tracker.status();
        let last_error = self.scene.error().map(str::to_owned);
        let stats = FrameStats {
            fps: self.fps,
            vertices: self.scene.surface().map_or(0, |m| m.vertex_count()),
            generation: self.scene.generation(),
            camera_distance: self.controls.lock().distance(),
        };

        let mut ui_actions = UiActions::default();

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            ui_actions = draw_side_panel(
                ctx,
                &mut self.ui_state,
                &status,
                last_error.as_deref(),
                &stats,
            );
            draw_help_overlay(ctx, self.ui_state.hand_control);
        });

        self.handle_ui_actions(ui_actions);

        let Some(gpu) = &mut self.gpu else { return };
        let Some(window) = &self.window else { return };
        let Some(egui_state) = &mut self.egui_state else {
            return;
        };
        let Some(egui_renderer) = &mut self.egui_renderer else {
            return;
        };

        egui_state.handle_platform_output(window, full_output.platform_output);

        // egui sends each texture delta once, so it must land even on a skipped frame
        for (id, delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(&gpu.device, &gpu.queue, *id, delta);
        }

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(err) => {
                match surface_recovery(&err) {
                    SurfaceRecovery::Reconfigure => gpu.resize(gpu.size),
                    SurfaceRecovery::Fatal => {
                        tracing::error!(error = %err, "surface unusable, skipping frame");
                    }
                    SurfaceRecovery::Skip => {}
                }
                for id in &full_output.textures_delta.free {
                    egui_renderer.free_texture(id);
                }
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Main Encoder"),
            });

        egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        gpu.render_scene(&view, &mut encoder);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut render_pass = render_pass.forget_lifetime();
            egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in full_output.textures_delta.free {
            egui_renderer.free_texture(&id);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }

    fn handle_ui_actions(&mut self, actions: UiActions) {
        if actions.rebuild {
            self.engine
                .rebuild(&self.ui_state.formula, self.ui_state.appearance());
        }

        if let Some(enabled) = actions.set_hand_control {
            if enabled {
                // failure is already recorded in the tracker status
                let _ = self.tracker.enable(self.devices.as_ref());
            } else {
                self.tracker.disable();
            }
            self.ui_state.hand_control = self.tracker.is_enabled();
        }

        if actions.reset_view {
            self.controls.lock().reset();
        }

        if let (Some(vsync), Some(gpu)) = (actions.set_vsync, &mut self.gpu) {
            gpu.set_vsync(vsync);
        }
    }

    fn handle_cursor(&mut self, position: PhysicalPosition<f64>) {
        let current = Vec2::new(position.x as f32, position.y as f32);
        let Some(last) = self.pointer.last.replace(current) else {
            return;
        };
        let delta = current - last;
        let height = self.gpu.as_ref().map_or(1.0, |gpu| gpu.size.height as f32);

        let mut controls = self.controls.lock();
        if self.pointer.rotating {
            controls.rotate_by_pixels(delta, height);
        } else if self.pointer.panning {
            controls.pan_by_pixels(delta, height);
        }
    }

    fn shutdown(&mut self) {
        self.tracker.disable();
        self.engine.stop();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                tracing::error!(error = %e, "failed to create window");
                self.shutdown();
                event_loop.exit();
                return;
            }
        };
        self.init_gpu(window);

        if self.gpu.is_none() {
            self.shutdown();
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let (Some(egui_state), Some(window)) = (&mut self.egui_state, &self.window) {
            let response = egui_state.on_window_event(window, &event);
            if response.consumed {
                if matches!(event, WindowEvent::MouseInput { .. }) {
                    self.pointer.rotating = false;
                    self.pointer.panning = false;
                }
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size);
                }
                self.controls
                    .lock()
                    .set_aspect(size.width as f32, size.height as f32);
            }

            WindowEvent::MouseInput { button, state, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.pointer.rotating = pressed,
                    MouseButton::Right | MouseButton::Middle => self.pointer.panning = pressed,
                    _ => {}
                }
            }

            WindowEvent::CursorMoved { position, .. } => self.handle_cursor(position),

            WindowEvent::CursorLeft { .. } => {
                self.pointer = PointerState::default();
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.controls.lock().scroll(notches);
            }

            WindowEvent::RedrawRequested => {
                self.update();
                self.render();
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("handplot: {e}");
            std::process::exit(2);
        }
    };
    init_logging(&config.logging.filter);

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            tracing::error!(error = %e, "failed to create event loop");
            std::process::exit(1);
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    if let Err(e) = event_loop.run_app(&mut app) {
        tracing::error!(error = %e, "event loop terminated");
    }
}
