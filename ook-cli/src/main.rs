pub mod commands;
pub mod common;
pub mod console;
pub mod devices;

use std::path::PathBuf;

use clap::Parser;

use commands::AppState;

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Options {
    /// Directory holding saved settings files; defaults to a platform data
    /// directory (see `common::default_settings_dir`).
    #[arg(long)]
    settings_dir: Option<PathBuf>,

    /// Run a single command non-interactively instead of starting the REPL.
    #[arg(long)]
    run: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let opts = Options::parse();

    let settings_dir = opts
        .settings_dir
        .unwrap_or_else(common::default_settings_dir);
    let settings_dir = common::SettingsDir::new(settings_dir)?;

    let mut state = AppState::new(settings_dir);
    state.pipeline.devices.register("logger", Box::new(devices::LoggingDevice::new()));
    state.pipeline.devices.register(
        "radio",
        Box::new(NullRadioDevice::new(ook_core::radio::NullRadio::default())),
    );

    if state.settings_dir.exists("default") {
        commands::execute(&mut state, "load");
    }

    if let Some(command) = opts.run {
        state.interactive = false;
        for cmd in commands::split_commands(&command) {
            commands::execute(&mut state, cmd);
        }
        commands::print_ready_packets(&mut state);
        Ok(())
    } else {
        console::run(state)
    }
}

/// Wraps a [`ook_core::radio::RadioDriver`] as a [`ook_core::device::DevicePlugin`]
/// so a real radio's transmit path can be driven by the `transmit` command
/// the same way a pure-software device plugin would be.
struct NullRadioDevice<R> {
    radio: R,
}

impl<R> NullRadioDevice<R> {
    fn new(radio: R) -> Self {
        NullRadioDevice { radio }
    }
}

impl<R: ook_core::radio::RadioDriver> ook_core::device::DevicePlugin for NullRadioDevice<R> {
    fn transmit(&mut self, payload: &str) -> bool {
        self.radio.tx().is_ok() && {
            println!("[radio] transmitting {} bytes worth of timing", payload.len());
            true
        }
    }
}
