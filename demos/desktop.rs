use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use eyes::gui::eye_control_panel;
use eyes::{EmotionState, EyeConfig, EyePair, EyeRenderer};
use log::{error, info, warn};
use tungstenite::Message;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

/// Address of the optional WebSocket state feed, e.g. `127.0.0.1:9001`.
const STATE_WS_ENV: &str = "EYES_STATE_WS";

struct App {
    state: Option<AppState>,
    signals: Option<Receiver<String>>,
}

struct AppState {
    window: Arc<Window>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    renderer: EyeRenderer,
    pair: EyePair,
    /// Config the running pair was built from.
    config: EyeConfig,
    /// Config being edited in the panel.
    draft: EyeConfig,
    last_frame: Instant,

    // egui
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl AppState {
    fn request_state(&mut self, state: EmotionState) {
        if let Err(e) = self.pair.set_state(state) {
            warn!("could not enter {state}: {e}");
        }
    }

    /// Replace the pair with one built from `config`, keeping the current state.
    fn rebuild(&mut self, config: EyeConfig) {
        let current = self.pair.state();
        let mut pair = match EyePair::new(&config) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("config rejected: {e}");
                return;
            }
        };
        if current != EmotionState::Idle {
            if let Err(e) = pair.set_state(current) {
                warn!("could not restore {current}: {e}");
            }
        }
        let old = std::mem::replace(&mut self.pair, pair);
        self.renderer.release(&old.dispose());
        self.draft = config.clone();
        self.config = config;
        info!("eye config applied");
    }

    /// Hand the pair's resources back to the renderer before the window goes away.
    fn shutdown(mut self) {
        let released = self.pair.dispose();
        info!("releasing {} eye resources", released.len());
        self.renderer.release(&released);
    }

    fn load_config(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("json", &["json"])
            .pick_file()
        else {
            return;
        };
        let loaded = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| EyeConfig::from_json(&json).map_err(|e| e.to_string()));
        match loaded {
            Ok(config) => {
                info!("loaded config from {}", path.display());
                self.rebuild(config);
            }
            Err(e) => warn!("failed to load {}: {e}", path.display()),
        }
    }
}

/// Accept WebSocket clients on `addr` and forward their text frames as state names.
fn spawn_state_feed(addr: String) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let listener = match TcpListener::bind(&addr) {
            Ok(listener) => listener,
            Err(e) => {
                error!("state feed: cannot bind {addr}: {e}");
                return;
            }
        };
        info!("state feed listening on ws://{addr}");
        for stream in listener.incoming() {
            let Ok(stream) = stream else {
                continue;
            };
            let mut socket = match tungstenite::accept(stream) {
                Ok(socket) => socket,
                Err(e) => {
                    warn!("state feed: handshake failed: {e}");
                    continue;
                }
            };
            loop {
                match socket.read() {
                    Ok(Message::Text(text)) => {
                        if tx.send(text.as_str().to_owned()).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    });
    rx
}

impl App {
    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.shutdown();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("Eyes")
                        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720)),
                )
                .unwrap(),
        );

        let state = pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let surface = instance.create_surface(window.clone()).unwrap();

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                })
                .await
                .unwrap();

            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("eyes_device"),
                        ..Default::default()
                    },
                    None,
                )
                .await
                .unwrap();

            let size = window.inner_size();
            let caps = surface.get_capabilities(&adapter);
            let format = caps.formats[0];

            let surface_config = wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: size.width.max(1),
                height: size.height.max(1),
                present_mode: wgpu::PresentMode::AutoVsync,
                alpha_mode: caps.alpha_modes[0],
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            };
            surface.configure(&device, &surface_config);

            let renderer = EyeRenderer::new(&device, format);
            let config = EyeConfig::default();
            let pair = EyePair::new(&config).unwrap();

            // egui setup
            let egui_ctx = egui::Context::default();
            let egui_state = egui_winit::State::new(
                egui_ctx.clone(),
                egui_ctx.viewport_id(),
                &window,
                Some(window.scale_factor() as f32),
                None,
                None,
            );
            let egui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1, false);

            AppState {
                window,
                device,
                queue,
                surface,
                surface_config,
                renderer,
                pair,
                draft: config.clone(),
                config,
                last_frame: Instant::now(),
                egui_ctx,
                egui_state,
                egui_renderer,
            }
        });

        self.state = Some(state);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        // Pass events to egui first
        let egui_response = state.egui_state.on_window_event(&state.window, &event);
        if egui_response.consumed {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.exit(event_loop);
            }
            WindowEvent::Resized(new_size) => {
                state.surface_config.width = new_size.width.max(1);
                state.surface_config.height = new_size.height.max(1);
                state
                    .surface
                    .configure(&state.device, &state.surface_config);
                state.window.request_redraw();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match logical_key {
                Key::Named(NamedKey::Escape) => self.exit(event_loop),
                Key::Character(c) => match c.as_str() {
                    "l" | "L" => state.load_config(),
                    digit => {
                        let slot = digit
                            .parse::<usize>()
                            .ok()
                            .and_then(|n| n.checked_sub(1))
                            .and_then(|i| EmotionState::ALL.get(i).copied());
                        if let Some(next) = slot {
                            state.request_state(next);
                        }
                    }
                },
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                let output = match state.surface.get_current_texture() {
                    Ok(output) => output,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state
                            .surface
                            .configure(&state.device, &state.surface_config);
                        return;
                    }
                    Err(e) => {
                        error!("surface error: {e:?}");
                        return;
                    }
                };

                // Inbound state signals from the feed
                if let Some(signals) = &self.signals {
                    for name in signals.try_iter() {
                        match state.pair.on_state_change(&name) {
                            Ok(next) => info!("state signal -> {next}"),
                            Err(e) => warn!("ignored state signal: {e}"),
                        }
                    }
                }

                let now = Instant::now();
                let dt = now.duration_since(state.last_frame).as_secs_f32();
                state.last_frame = now;
                state.pair.update(dt);

                // Sync GPU resources with the pair
                state.renderer.release(&state.pair.drain_released());
                state.renderer.prepare(&state.device, &state.pair.eyes());

                // --- egui frame ---
                let raw_input = state.egui_state.take_egui_input(&state.window);
                let current = state.pair.state();
                let mut panel = Default::default();
                let full_output = state.egui_ctx.run(raw_input, |ctx| {
                    panel = eye_control_panel(ctx, current, &mut state.draft);
                });
                if let Some(next) = panel.requested_state {
                    state.request_state(next);
                }
                if panel.apply_config {
                    let config = state.draft.clone();
                    state.rebuild(config);
                }

                state
                    .egui_state
                    .handle_platform_output(&state.window, full_output.platform_output);

                let paint_jobs = state
                    .egui_ctx
                    .tessellate(full_output.shapes, full_output.pixels_per_point);

                // Update egui textures
                for (id, delta) in &full_output.textures_delta.set {
                    state
                        .egui_renderer
                        .update_texture(&state.device, &state.queue, *id, delta);
                }

                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [state.surface_config.width, state.surface_config.height],
                    pixels_per_point: state.window.scale_factor() as f32,
                };

                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let mut encoder =
                    state
                        .device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("eyes_encoder"),
                        });

                // Update egui buffers
                state.egui_renderer.update_buffers(
                    &state.device,
                    &state.queue,
                    &mut encoder,
                    &paint_jobs,
                    &screen_descriptor,
                );

                // Draw eyes
                state.renderer.render(
                    &state.device,
                    &mut encoder,
                    &view,
                    &state.queue,
                    (state.surface_config.width, state.surface_config.height),
                    &state.pair.eyes(),
                    state.config.material.bg_color,
                );

                // Draw egui overlay on top
                {
                    let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("egui_render_pass"),
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

                    state.egui_renderer.render(
                        &mut pass.forget_lifetime(),
                        &paint_jobs,
                        &screen_descriptor,
                    );
                }

                // Free egui textures
                for id in &full_output.textures_delta.free {
                    state.egui_renderer.free_texture(id);
                }

                state.queue.submit(std::iter::once(encoder.finish()));
                output.present();

                state.window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() {
    env_logger::init();

    let signals = std::env::var(STATE_WS_ENV).ok().map(spawn_state_feed);

    let event_loop = EventLoop::new().unwrap();
    let mut app = App {
        state: None,
        signals,
    };
    event_loop.run_app(&mut app).unwrap();
}
