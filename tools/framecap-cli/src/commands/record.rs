//! Record a synthetic scene through a capture session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use framecap_capture_engine::{CaptureSession, ManualFrameLoop, SessionConfig};
use framecap_common::clock::{Clock, FixedIntervalClock, RealtimeClock};

use crate::frame_log::{parse_frame_log, FrameLogRecorder};
use crate::scene::demo_scene;

/// Where frame timestamps come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClockKind {
    /// Wall time since recording started.
    Realtime,
    /// Evenly spaced at the host frame rate.
    Fixed,
    /// No clock; every frame is stamped 0.
    None,
}

pub struct RecordOptions {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub skip: u32,
    pub anti_aliasing: u32,
    pub frames: Option<u64>,
    pub clock: ClockKind,
}

pub async fn run(options: RecordOptions) -> anyhow::Result<()> {
    anyhow::ensure!(options.fps > 0, "fps must be greater than zero");

    println!("Recording synthetic scene");
    println!("  Output: {}", options.output.display());
    println!("  Size: {}x{}", options.width, options.height);
    println!("  FPS: {} (skip {})", options.fps, options.skip);
    println!("  Clock: {:?}", options.clock);
    println!();

    let host = Arc::new(ManualFrameLoop::with_msaa_level(options.anti_aliasing));
    let recorder = FrameLogRecorder::create(&options.output, options.width, options.height)?;

    let mut builder = CaptureSession::builder()
        .cameras(demo_scene(options.width))
        .config(SessionConfig {
            skip: options.skip,
            ..SessionConfig::default()
        });
    let clock: Option<Arc<dyn Clock>> = match options.clock {
        ClockKind::Realtime => {
            let clock = RealtimeClock::start();
            tracing::info!(epoch = clock.epoch_wall(), "Realtime clock started");
            Some(Arc::new(clock))
        }
        ClockKind::Fixed => Some(Arc::new(FixedIntervalClock::from_fps(f64::from(
            options.fps,
        )))),
        ClockKind::None => None,
    };
    if let Some(clock) = clock {
        builder = builder.clock(clock);
    }
    let mut session = builder.start_with_recorder(recorder, host.clone())?;

    match options.frames {
        Some(frames) => println!("Capturing {frames} host frames..."),
        None => println!("Press Ctrl+C to stop recording..."),
    }

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(options.fps)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut signalled = 0u64;

    loop {
        if options.frames.is_some_and(|limit| signalled >= limit) {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = host.end_of_frame() {
                    tracing::error!(frame = signalled, error = %e, "Frame capture failed");
                }
                signalled += 1;
            }
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }

    session.dispose()?;
    let stats = session.stats();

    let written = parse_frame_log(&std::fs::read_to_string(&options.output)?)?.len();
    println!("Host frames:      {}", stats.boundaries);
    println!("Frames committed: {}", stats.frames_committed);
    println!("Frames skipped:   {}", stats.frames_skipped);
    if stats.commit_failures + stats.frames_failed > 0 {
        println!(
            "Failures:         {} commit, {} capture",
            stats.commit_failures, stats.frames_failed
        );
    }
    println!(
        "Frame log: {} ({written} frames)",
        options.output.display()
    );

    Ok(())
}
