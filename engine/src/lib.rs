use std::fmt::Display;
use std::time::Instant;

use anyhow::anyhow;
use log::*;
use renderer::Renderer;
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::{Fullscreen, Window, WindowBuilder};

pub mod config;
pub mod error;
mod frame_counter;
mod renderer;
pub mod vulkan;

pub use config::{EngineConfig, RendererConfig, WindowConfig};
pub use error::{EngineError, ErrorKind};
use frame_counter::FrameCounter;
use vulkan::scheduler::{CancellationToken, FrameOutcome};

#[derive(Debug)]
pub struct Engine {
    window: Window,
    renderer: Renderer,
    event_loop: EventLoop<()>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Engine, EngineError> {
        // Window
        let event_loop = EventLoop::new().map_err(window_error)?;
        let fullscreen = config
            .window
            .fullscreen
            .then(|| Fullscreen::Borderless(None));
        let window = WindowBuilder::new()
            .with_title(config.window.title.as_str())
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
            .with_resizable(config.window.resizable)
            .with_fullscreen(fullscreen)
            .build(&event_loop)
            .map_err(window_error)?;

        let cancel = CancellationToken::new();
        let renderer = unsafe { Renderer::create(&window, &config.renderer, cancel.clone())? };

        Ok(Engine {
            window,
            renderer,
            event_loop,
            config,
            cancel,
        })
    }

    /// Lets another thread stop the render loop, even mid-wait.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run(self) -> Result<(), EngineError> {
        let Engine {
            window,
            mut renderer,
            event_loop,
            config,
            cancel,
        } = self;

        let mut failure = None;
        let mut minimized = false;
        let mut counter = FrameCounter::new(Instant::now());

        let result = event_loop.run(|event, elwt| match event {
            // Request a redraw when all events were processed.
            Event::AboutToWait => window.request_redraw(),
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::RedrawRequested if !elwt.exiting() && !minimized => {
                    match renderer.render() {
                        Ok(FrameOutcome::Presented { .. }) => {
                            if let Some(rate) = counter.tick(Instant::now()) {
                                window.set_title(&frame_counter::title_with_rate(
                                    &config.window.title,
                                    rate,
                                ));
                            }
                        }
                        Ok(FrameOutcome::ShutDown) => elwt.exit(),
                        Ok(_) => {}
                        Err(err) => {
                            failure = Some(err);
                            elwt.exit();
                        }
                    }
                }
                WindowEvent::Resized(size) => {
                    minimized = size.width == 0 || size.height == 0;
                    if !minimized {
                        renderer.resize(size.width, size.height);
                    }
                }
                WindowEvent::CloseRequested => {
                    cancel.cancel();
                    elwt.exit();
                }
                _ => {}
            },
            // Destroy our Vulkan app.
            Event::LoopExiting => unsafe { renderer.destroy() },
            _ => {}
        });

        if let Err(err) = result {
            unsafe { renderer.destroy() };
            return Err(window_error(err));
        }

        match failure {
            Some(err) => Err(err),
            None => {
                info!("Engine shut down cleanly.");
                Ok(())
            }
        }
    }
}

fn window_error(err: impl Display) -> EngineError {
    EngineError::Window(anyhow!("{}", err))
}
