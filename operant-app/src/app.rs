use anyhow::{Context, Result};
use operant_core::ClickAction;
use operant_experiment::layout::{self, KEY_PIXELS};
use operant_experiment::{EndReason, SessionStateMachine, SessionSummary};
use operant_hw::Peripherals;
use operant_render::{CANVAS_HEIGHT, CANVAS_WIDTH, SkiaSurface, Viewport};
use operant_timing::HighPrecisionTimer;
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

/// Longest the loop sleeps without checking the interrupt flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub type Session<P> = SessionStateMachine<P, SkiaSurface, HighPrecisionTimer, StdRng>;

pub struct AppOptions {
    /// Fullscreen with a hidden cursor, as in the chamber
    pub hardware: bool,
    pub stimuli_dir: PathBuf,
}

pub struct App<P: Peripherals> {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    viewport: Viewport,
    session: Session<P>,
    timer: HighPrecisionTimer,
    options: AppOptions,
    interrupted: Arc<AtomicBool>,

    cursor: Option<PhysicalPosition<f64>>,
    cursor_visible: bool,
    presented: Option<u64>,
    /// Shown once the session has ended
    reward: Option<SessionSummary>,
    reward_pecks: usize,
    failure: Option<anyhow::Error>,
}

impl<P: Peripherals> App<P> {
    pub fn new(
        session: Session<P>,
        timer: HighPrecisionTimer,
        options: AppOptions,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            window: None,
            pixels: None,
            viewport: Viewport::fit(CANVAS_WIDTH, CANVAS_HEIGHT),
            session,
            timer,
            cursor_visible: !options.hardware,
            options,
            interrupted,
            cursor: None,
            presented: None,
            reward: None,
            reward_pecks: 0,
            failure: None,
        }
    }

    /// Runs the event loop until the operator leaves the reward screen or
    /// the session faults; returns the fault, if any.
    pub fn run(mut self) -> Result<SessionSummary> {
        let event_loop = EventLoop::new()?;
        info!("Press SPACE once the bird is in the box, ESC to end the session");
        event_loop.run_app(&mut self)?;

        self.end(EndReason::Operator);
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(self.session.summary()),
        }
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let config = self.session.config();
        let mut attributes = Window::default_attributes()
            .with_title(format!("{} - {}", config.experiment_id, config.subject))
            .with_resizable(!self.options.hardware);
        if self.options.hardware {
            let monitor = event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next())
                .context("no monitor available")?;
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        } else {
            attributes = attributes.with_inner_size(PhysicalSize::new(CANVAS_WIDTH, CANVAS_HEIGHT));
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!("Display {}×{} (scale {:.2})", size.width, size.height, window.scale_factor());

        let texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width.max(1), size.height.max(1), texture)?);
        self.viewport = Viewport::fit(size.width.max(1), size.height.max(1));

        window.set_cursor_visible(self.cursor_visible);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let Some(pixels) = self.pixels.as_mut() else {
            return Ok(());
        };
        let surface = self.session.surface_mut();
        surface.rasterize();
        surface.present(&self.viewport, pixels.frame_mut());
        pixels.render().context("presenting frame")?;
        self.presented = Some(surface.display_list().generation());
        Ok(())
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        let (w, h) = (size.width.max(1), size.height.max(1));
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(w, h) {
                warn!("Failed to resize surface: {}", e);
            }
            if let Err(e) = pixels.resize_buffer(w, h) {
                warn!("Failed to resize buffer: {}", e);
            }
        }
        self.viewport = Viewport::fit(w, h);
        self.presented = None;
        info!("Display resized to {}×{}", w, h);
    }

    fn handle_key(&mut self, key: PhysicalKey, event_loop: &ActiveEventLoop) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        match code {
            KeyCode::Space => {
                if let Err(e) = self.begin() {
                    self.fail(e, event_loop);
                }
            }
            KeyCode::Escape => {
                if self.reward.is_some() {
                    event_loop.exit();
                } else {
                    info!("Escape pressed -- ending session");
                    self.end(EndReason::Operator);
                }
            }
            KeyCode::KeyC if self.options.hardware => {
                self.cursor_visible = !self.cursor_visible;
                if let Some(window) = &self.window {
                    window.set_cursor_visible(self.cursor_visible);
                }
            }
            _ => {}
        }
    }

    /// Starts the session and preloads every stimulus it can show
    fn begin(&mut self) -> Result<()> {
        if self.session.has_started() || self.session.is_finished() {
            return Ok(());
        }
        self.session.begin()?;
        let names: Vec<String> = self
            .session
            .assignments()
            .map(|a| a.iter().map(|(_, f)| f.to_string()).collect())
            .unwrap_or_default();
        let loaded = self.session.surface_mut().preload_stimuli(
            &self.options.stimuli_dir,
            names.iter().map(String::as_str),
            KEY_PIXELS as u32,
        )?;
        info!("Preloaded {} stimulus image(s) from {}", loaded, self.options.stimuli_dir.display());
        Ok(())
    }

    fn peck(&mut self, position: PhysicalPosition<f64>, event_loop: &ActiveEventLoop) {
        let Some((x, y)) = self.viewport.to_canvas(position.x, position.y) else {
            return;
        };
        match self.session.click(x, y) {
            Ok(Some(ClickAction::RewardPeck)) => {
                layout::paint_dot(self.session.surface_mut(), (x, y), self.reward_pecks);
                self.reward_pecks += 1;
            }
            Ok(_) => {}
            Err(e) => self.fail(e.into(), event_loop),
        }
    }

    /// Runs teardown (once) and switches to the reward screen
    fn end(&mut self, reason: EndReason) {
        if self.session.terminate(reason) {
            self.show_reward();
        }
    }

    fn show_reward(&mut self) {
        let summary = self.session.summary();
        info!(
            "{} finished {} trial(s), {} reinforced",
            summary.subject, summary.trials_completed, summary.reinforced_trials
        );
        if let Some(path) = &summary.data_file {
            info!("Data saved to {}", path.display());
        }
        layout::draw_reward_screen(self.session.surface_mut(), &summary);
        self.reward = Some(summary);
    }

    fn fail(&mut self, err: anyhow::Error, event_loop: &ActiveEventLoop) {
        error!("Session aborted: {:#}", err);
        self.session.terminate(EndReason::Fault);
        self.failure.get_or_insert(err);
        event_loop.exit();
    }
}

impl<P: Peripherals> ApplicationHandler for App<P> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(e.context("creating window"), event_loop);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.session.surface_mut().detach();
                self.session.terminate(EndReason::Operator);
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(e, event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                self.handle_key(event.physical_key, event_loop);
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor = Some(position),
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(position) = self.cursor {
                    self.peck(position, event_loop);
                }
            }
            WindowEvent::Touch(touch) if touch.phase == TouchPhase::Started => {
                self.peck(touch.location, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.interrupted.swap(false, Ordering::SeqCst) {
            info!("Interrupt received -- ending session");
            self.end(EndReason::Interrupted);
            event_loop.exit();
            return;
        }

        if let Err(e) = self.session.advance() {
            self.fail(e.into(), event_loop);
            return;
        }
        if self.session.is_finished() && self.reward.is_none() {
            self.show_reward();
        }

        let generation = self.session.surface().display_list().generation();
        if self.presented != Some(generation) {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }

        let poll = Instant::now() + POLL_INTERVAL;
        let wake = self
            .session
            .next_deadline()
            .map(|ns| self.timer.instant_at(ns).min(poll))
            .unwrap_or(poll);
        event_loop.set_control_flow(ControlFlow::WaitUntil(wake));
    }
}

impl<P: Peripherals> Drop for App<P> {
    fn drop(&mut self) {
        // parks the chamber if the loop unwound without a teardown
        self.session.terminate(EndReason::Fault);
    }
}
