//! Print every motion update as JSON until Ctrl-C.
//!
//! ```text
//! RUST_LOG=multiaxis=debug cargo run --example monitor --features hid [config.toml]
//! ```

use multiaxis::backends::hid::HidapiBackend;
use multiaxis::{AxisFilter, Config, MotionEvent, MultiAxisDevice};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))?;
    }

    let backend = HidapiBackend::new(&config)?;
    let mut mouse = MultiAxisDevice::with_config(backend, &config);
    mouse.subscribe(
        |event: &MotionEvent| match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("serialize: {e}"),
        },
        AxisFilter::All,
        None,
    );

    println!("mode: {}", serde_json::to_string(&mouse.mode())?);
    mouse.run(&stop);

    for device in mouse.manager().devices() {
        println!("{}", serde_json::to_string(&device.metadata())?);
    }
    Ok(())
}
