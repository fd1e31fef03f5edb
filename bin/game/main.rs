use falling_boxes::{Config, Frame, Loader, Physics, Scene};

use std::{path, process, thread, time};

const CONFIG_PATH: &str = "data/config.ron";
const LOADER_WORKERS: usize = 1;

pub struct Game {
    loader: Loader,
    physics: Physics,
    scene: Scene,
    // windowing
    pub window: winit::window::Window,
    window_size: winit::dpi::PhysicalSize<u32>,
    cursor: [f32; 2],
    // timing
    last_frame: time::Instant,
    last_report: time::Instant,
    frames_since_report: u32,
}

struct QuitEvent;

impl Game {
    pub fn new(event_loop: &winit::event_loop::EventLoop<()>, config: &Config) -> Self {
        log::info!("Initializing");

        log::info!("Creating the window");
        let window_attributes = winit::window::Window::default_attributes()
            .with_title("Falling Boxes")
            .with_inner_size(winit::dpi::PhysicalSize::new(1280, 800));
        #[allow(deprecated)]
        let window = event_loop
            .create_window(window_attributes)
            .expect("Unable to create the window");
        let window_size = window.inner_size();

        let loader = Loader::new(LOADER_WORKERS);
        let mut physics = Physics::new(&config.physics);
        let mut scene = Scene::mount(config, &mut physics, &loader);
        scene.camera.resize(window_size.width, window_size.height);

        let now = time::Instant::now();
        Self {
            loader,
            physics,
            scene,
            window,
            window_size,
            cursor: [0.0; 2],
            last_frame: now,
            last_report: now,
            frames_since_report: 0,
        }
    }

    fn redraw(&mut self) -> time::Duration {
        profiling::scope!("Frame");
        let now = time::Instant::now();
        let elapsed = now - self.last_frame;
        self.last_frame = now;

        self.physics.advance(elapsed.as_secs_f32());
        self.scene.update(&mut self.physics, &self.loader);

        let frame = Frame::build(&self.scene, &self.physics);
        self.frames_since_report += 1;
        if now - self.last_report >= time::Duration::from_secs(1) {
            let stats = frame.stats();
            log::debug!(
                "{} fps, {} draw calls, {} instances, {} subtree(s) suspended",
                self.frames_since_report,
                stats.draw_calls,
                stats.instances,
                self.scene.suspended_count(),
            );
            self.frames_since_report = 0;
            self.last_report = now;
        }
        profiling::finish_frame!();
        time::Duration::from_millis(16)
    }

    fn on_click(&mut self) {
        let size = [
            self.window_size.width as f32,
            self.window_size.height as f32,
        ];
        let (origin, dir) = self.scene.camera.ray(self.cursor, size);
        if !self.scene.click_ray(origin, dir, &mut self.physics) {
            log::trace!("Click at {:?} hit nothing clickable", self.cursor);
        }
    }

    fn on_event(
        &mut self,
        event: &winit::event::WindowEvent,
    ) -> Result<winit::event_loop::ControlFlow, QuitEvent> {
        match *event {
            winit::event::WindowEvent::Resized(size) => {
                if size != self.window_size {
                    log::info!("Resizing to {:?}", size);
                    self.window_size = size;
                    self.scene.camera.resize(size.width, size.height);
                }
            }
            winit::event::WindowEvent::KeyboardInput {
                event:
                    winit::event::KeyEvent {
                        physical_key:
                            winit::keyboard::PhysicalKey::Code(winit::keyboard::KeyCode::Escape),
                        state: winit::event::ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                return Err(QuitEvent);
            }
            winit::event::WindowEvent::CursorMoved { position, .. } => {
                self.cursor = [position.x as f32, position.y as f32];
            }
            winit::event::WindowEvent::MouseInput {
                state: winit::event::ElementState::Pressed,
                button: winit::event::MouseButton::Left,
                ..
            } => {
                self.on_click();
            }
            winit::event::WindowEvent::CloseRequested => {
                return Err(QuitEvent);
            }
            winit::event::WindowEvent::RedrawRequested => {
                let wait = self.redraw();

                return Ok(
                    if let Some(repaint_after_instant) = time::Instant::now().checked_add(wait) {
                        winit::event_loop::ControlFlow::WaitUntil(repaint_after_instant)
                    } else {
                        winit::event_loop::ControlFlow::Wait
                    },
                );
            }
            _ => {}
        }

        Ok(winit::event_loop::ControlFlow::Poll)
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        log::info!(
            "Deinitializing after {:.1}s of simulated time",
            self.physics.time()
        );
    }
}

fn main() {
    env_logger::init();

    let config = match Config::load(path::Path::new(CONFIG_PATH)) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    let event_loop = winit::event_loop::EventLoop::new().expect("Unable to create the event loop");
    let mut game = Game::new(&event_loop, &config);

    #[allow(deprecated)]
    let result = event_loop.run(|event, target| match event {
        winit::event::Event::AboutToWait => {
            game.window.request_redraw();
        }
        winit::event::Event::WindowEvent { event, .. } => match game.on_event(&event) {
            Ok(control_flow) => {
                target.set_control_flow(control_flow);
            }
            Err(QuitEvent) => {
                target.exit();
            }
        },
        _ => {}
    });
    if let Err(e) = result {
        log::error!("Event loop failed: {}", e);
    }
}
