// Clickable: pick and drag circles in a 3D scene

use std::process::ExitCode;

use clickable::app::App;
use clickable::config::DemoConfig;
use clickable::error::AppError;
use clickable::renderer::Renderer;
use winit::event_loop::EventLoop;

async fn run() -> Result<(), AppError> {
    let config = DemoConfig::from_env()?;
    let event_loop = EventLoop::new()?;
    let renderer = Renderer::new(&event_loop, &config).await?;

    App::new(renderer, &config)?.run(event_loop)
}

/// Logs a failed run once and maps it to the process exit status.
fn exit_code(result: Result<(), AppError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    exit_code(run().await)
}
