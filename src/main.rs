use std::{
    fs::File,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pingchart::{
    app::App,
    config::{Args, Settings},
    probe::SystemPing,
    report,
    sampler::{start_sampler_thread, Sampler},
    ui,
};

fn main() -> Result<()> {
    let settings = Settings::from(Args::parse());
    init_logging(&settings)?;

    let probe = SystemPing::new(settings.ping_program.clone(), settings.probe_timeout);
    info!(
        host = %settings.target,
        program = probe.program(),
        window = settings.window,
        interval_ms = settings.interval.as_millis() as u64,
        "starting latency sampler"
    );
    let sampler = Sampler::new(probe, settings.target.clone(), settings.window)
        .record_gaps(settings.record_gaps);

    let running = Arc::new(AtomicBool::new(true));

    if settings.plain {
        let flag = Arc::clone(&running);
        ctrlc::set_handler(move || flag.store(false, Ordering::Relaxed))
            .context("failed to install Ctrl-C handler")?;

        let mut sampler = sampler;
        let stdout = io::stdout();
        report::run(&mut sampler, settings.interval, running, &mut stdout.lock())
            .context("failed to write report")?;
        return Ok(());
    }

    let updates = start_sampler_thread(sampler, settings.interval, Arc::clone(&running));
    let app = App::new(settings.target.to_string(), settings.window, settings.y_scale);
    ui::run(app, updates, running).context("terminal UI failed")?;

    info!("latency sampler stopped");
    Ok(())
}

// Logs go to --log-file when given; plain mode falls back to stderr.
// The chart owns the terminal, so it logs nowhere without a file.
fn init_logging(settings: &Settings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(path) = &settings.log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if settings.plain {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}
