use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use gonogo_core::{GoNoGoPhase, Phase};
use gonogo_data::{ExportError, export_session_with_fallback};
use gonogo_experiment::{
    ExperimentConfig, ExperimentEvent, ExperimentStateMachine, TrialSchedule,
};
use gonogo_render::{FrameView, SkiaRenderer};
use gonogo_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::SeedableRng;
use rand::rngs::StdRng;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

use crate::cli::Args;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    experiment: ExperimentStateMachine<GoNoGoPhase, HighPrecisionTimer>,
    renderer: Option<SkiaRenderer>,
    participant_id: String,
    output_dir: PathBuf,
    refresh_rate: Option<f64>,
    exported: bool,
    should_exit: bool,
}

impl App {
    pub fn new(args: Args, participant_id: String) -> Result<Self> {
        let config = ExperimentConfig::<GoNoGoPhase>::default();
        let mut rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let schedule = TrialSchedule::generate(&config, &mut rng);
        let experiment =
            ExperimentStateMachine::new(config, schedule, HighPrecisionTimer::new());

        Ok(Self {
            window: None,
            pixels: None,
            experiment,
            renderer: None,
            participant_id,
            output_dir: args.output,
            refresh_rate: None,
            exported: false,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;

        println!("=== GO/NO-GO EXPERIMENT ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Architecture: {}", std::env::consts::ARCH);
        println!("Participant: {}", self.participant_id);
        println!("Press any key to advance screens, SPACE to respond, ESC to exit.\n");

        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow::anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Go/No-Go")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        let scale_factor = window.scale_factor();

        println!("Display Configuration:");
        println!(
            "  Physical size: {}×{}",
            physical_size.width, physical_size.height
        );
        println!("  Scale factor: {:.2}", scale_factor);
        if let Some(refresh_rate) = self.refresh_rate {
            println!("  Refresh rate: {:.1} Hz", refresh_rate);
        }

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            self.experiment.config.practice_trials(),
            self.experiment.config.main_trials(),
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut())
        else {
            return Ok(());
        };

        let view = FrameView {
            phase: *self.experiment.current_phase(),
            word: self.experiment.current_word(),
            trial_state: self.experiment.current_trial_state(),
            feedback: self.experiment.last_feedback(),
            progress: self.experiment.trial_progress(),
        };

        let started = self.experiment.timer.now();
        renderer.render_frame(&view, pixels.frame_mut())?;
        pixels.render()?;
        let frame_time = self.experiment.timer.elapsed(started);
        self.experiment.timer.record_frame(frame_time);

        Ok(())
    }

    fn update(&mut self) {
        for event in self.experiment.update() {
            self.experiment.handle_event(event);
        }

        if self.experiment.current_phase().is_debrief() && !self.exported {
            self.finish_session();
        }
    }

    /// Exports the session log once, on entering the debrief screen.
    fn finish_session(&mut self) {
        self.exported = true;
        match export_session_with_fallback(
            &self.participant_id,
            self.experiment.results(),
            &self.output_dir,
        ) {
            Ok(path) => println!("Results written to {}", path.display()),
            Err(ExportError::NoMainTrials) => {
                eprintln!("No main-block trials recorded; skipping export.");
            }
            Err(err) => eprintln!("Failed to export results: {err}"),
        }
    }

    fn handle_input(&mut self, key: winit::keyboard::PhysicalKey, event_loop: &ActiveEventLoop) {
        use winit::keyboard::{KeyCode, PhysicalKey};

        let PhysicalKey::Code(code) = key else { return };
        if code == KeyCode::Escape {
            self.cleanup_and_exit(event_loop);
            return;
        }

        let phase = *self.experiment.current_phase();
        if phase.is_debrief() {
            // Final screen: any key ends the session.
            self.cleanup_and_exit(event_loop);
        } else if phase.is_message() {
            self.experiment.handle_event(ExperimentEvent::AdvancePressed);
        } else if phase.allows_response() && code == KeyCode::Space {
            self.experiment
                .handle_event(ExperimentEvent::ResponseReceived);
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                eprintln!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                eprintln!("Failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                eprintln!("Failed to resize renderer: {e}");
            }
        }
        println!("Display resized to: {}×{}", new_size.width, new_size.height);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }

        println!("\nExperiment ended.");
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                eprintln!("Failed to create window and surface: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    eprintln!("Render failed: {e}");
                }
                self.update();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(event.physical_key, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                println!("Scale factor changed to {scale_factor:.2}");
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.should_exit {
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
