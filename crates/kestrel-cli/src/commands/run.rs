//! Graph run command.
//!
//! Builds the preset into a graph, starts every instance and hands the
//! graph to the audio task. A timer thread stands in for the device period
//! interrupt; device I/O is a [`NullDevice`].

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use kestrel_registry::builtin_registry;
use kestrel_runtime::{NullDevice, Runtime};

use super::common::{load_preset, load_runtime_config, runtime_options};

#[derive(Args)]
pub struct RunArgs {
    /// Preset name or path
    preset: String,

    /// Runtime configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop after this many ticks (runs until Ctrl+C otherwise)
    #[arg(long)]
    ticks: Option<u64>,

    /// Tick period in milliseconds
    #[arg(long, default_value = "10")]
    period_ms: u64,

    /// Bytes of silence fed to each device input per tick
    #[arg(long, default_value = "128")]
    feed: usize,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    if args.period_ms == 0 {
        anyhow::bail!("--period-ms must be at least 1");
    }

    let preset = load_preset(&args.preset)?;
    let config = load_runtime_config(args.config.as_deref())?;

    let mut graph = config.graph_manager(Arc::new(builtin_registry()));
    let built = preset.instantiate(&mut graph, config.graph.default_buffer_capacity)?;
    let started = graph.start_graph()?;
    tracing::info!(
        preset = %preset.name,
        instances = started.len(),
        connections = built.connections.len(),
        "graph started"
    );

    let device = NullDevice::new(args.feed);
    let device_counters = device.counters();
    let options = runtime_options(&config, args.ticks);
    let mut runtime = Runtime::with_endpoints(graph, Box::new(device), options)?;
    let handle = runtime.handle();
    let audio = runtime.audio_task();

    let stop_handle = handle.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        stop_handle.stop();
    })?;

    let done = Arc::new(AtomicBool::new(false));
    let timer = {
        let done = Arc::clone(&done);
        let handle = handle.clone();
        let period = Duration::from_millis(args.period_ms);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                thread::sleep(period);
                if let Err(e) = handle.raise_bg_int(audio) {
                    tracing::warn!("timer stopped: {e}");
                    break;
                }
            }
        })
    };

    match args.ticks {
        Some(n) => println!("Running '{}' for {} tick(s)...", preset.name, n),
        None => println!("Running '{}', press Ctrl+C to stop...", preset.name),
    }

    let began = Instant::now();
    runtime.run_forever();
    let elapsed = began.elapsed();

    done.store(true, Ordering::Release);
    if timer.join().is_err() {
        tracing::warn!("timer thread panicked");
    }

    let stats = runtime.stats();
    let sched = runtime.scheduler_stats();
    println!();
    println!("Ran for {:.2}s", elapsed.as_secs_f64());
    println!("  ticks:            {}", stats.ticks());
    println!("  host commands:    {}", stats.commands());
    println!("  faults:           {}", stats.faults());
    println!("  dropped notices:  {}", stats.dropped());
    println!("  messages:         {}", sched.messages);
    println!("  background runs:  {}", sched.background_runs);
    println!("  bytes fed:        {}", device_counters.fed());
    println!("  bytes drained:    {}", device_counters.drained());

    for notice in runtime.take_faults() {
        let name = built
            .name_of(notice.instance)
            .map_or_else(|| notice.instance.to_string(), str::to_string);
        println!(
            "  fault in {}: {} ({} instance(s) stopped)",
            name,
            notice.status,
            notice.stopped.len()
        );
    }
    Ok(())
}
