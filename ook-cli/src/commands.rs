//! Line parsing and dispatch for the interactive console: a command name, a
//! space, and the rest of the line as that command's argument.

use ook_core::settings::SettingsStore;

use crate::common::SettingsDir;

pub struct AppState {
    pub settings: ook_core::settings::MapSettings,
    pub pipeline: ook_core::pipeline::PipelineController<crate::common::SystemClock>,
    pub settings_dir: SettingsDir,
    /// Whether to ask before destructive commands (`rm`, `sr`). Off for
    /// scripted `--run` invocations, on for the REPL.
    pub interactive: bool,
}

impl AppState {
    pub fn new(settings_dir: SettingsDir) -> Self {
        let mut settings = ook_core::settings::MapSettings::new();
        factory_settings(&mut settings);
        let mut config = ook_core::pipeline::PipelineConfig::default();
        config.refresh_from_settings(&settings);
        AppState {
            settings,
            pipeline: ook_core::pipeline::PipelineController::new(
                config,
                crate::common::SystemClock::default(),
            ),
            settings_dir,
            interactive: true,
        }
    }

    fn refresh_pipeline_config(&mut self) {
        let mut config = *self.pipeline.config();
        config.refresh_from_settings(&self.settings);
        self.pipeline.set_config(config);
    }
}

/// The factory defaults applied before any saved settings file is loaded
/// over them.
fn factory_settings(settings: &mut ook_core::settings::MapSettings) {
    let defaults: &[(&str, &str)] = &[
        ("pulse_gap_len_new_packet", "20000"),
        ("repeat_timeout", "200000"),
        ("first_pulse_min_len", "3000"),
        ("pulse_gap_min_len", "100"),
        ("min_nr_pulses", "8"),
        ("max_nr_pulses", "200"),
        ("noise_penalty", "1"),
        ("noise_threshold", "3"),
        ("bin_width", "150"),
        ("visualizer_pixel", "200"),
        ("print_meaning", ""),
    ];
    for (name, value) in defaults {
        let _ = settings.set(name, value);
    }
}

const HELP_TEXT: &str = r#"
OOK packet receive/transmit core - Command Line Interpreter help.

Available commands:

help               - prints this message
set                - shows current configuration settings
set x              - sets configuration flag x
set x y            - sets configuration value x to y
unset x            - unsets a flag or variable
load [<file>]      - loads the default saved settings, or from a named file
save               - saves to a file named 'default', used at boot time
save [<file>]      - saves the settings to a named file
ls                 - lists stored configuration files
rm <file>          - deletes a configuration file
reboot             - reload the saved default settings and reset the pipeline
standby            - set radio to standby mode
receive            - set radio to receive mode
sim <string>       - takes a RawTimings, Pulsetrain or Meaning string and acts
                     like it just came in off the air
transmit <string>  - takes a RawTimings, Pulsetrain or Meaning string and
                     resolves it ready for transmission

rm default;reboot  - restore factory settings
sr                 - shorthand for "save;reboot"
"#;

/// Split a raw input line into commands on `;`, CR or LF, the way a serial
/// command buffer is split. Empty commands (extra separators, trailing
/// whitespace) are dropped.
pub fn split_commands(line: &str) -> Vec<&str> {
    line.split(|c| c == ';' || c == '\r' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn execute(state: &mut AppState, cmd: &str) {
    println!();

    if let Some(args) = cmd.strip_prefix("help") {
        if !args.is_empty() && !args.starts_with(' ') {
            return unknown(cmd);
        }
        print!("{}", HELP_TEXT);
    } else if let Some(args) = strip_command(cmd, "set") {
        cmd_set(state, args);
    } else if let Some(args) = strip_command(cmd, "unset") {
        cmd_unset(state, args);
    } else if let Some(args) = strip_command(cmd, "load") {
        cmd_load(state, args);
    } else if let Some(args) = strip_command(cmd, "save") {
        cmd_save(state, args);
    } else if strip_command(cmd, "ls").is_some() || cmd.trim() == "ls" {
        cmd_ls(state);
    } else if let Some(args) = strip_command(cmd, "rm") {
        cmd_rm(state, args);
    } else if cmd.trim() == "reboot" {
        cmd_reboot(state);
    } else if cmd.trim() == "receive" {
        state.pipeline.receive();
        println!("Receiver active, waiting for pulses.");
    } else if cmd.trim() == "standby" {
        state.pipeline.standby();
        println!("Transceiver placed in standby mode.");
    } else if let Some(args) = strip_command(cmd, "transmit") {
        cmd_transmit(state, args);
    } else if let Some(args) = strip_command(cmd, "sim") {
        cmd_sim(state, args);
    } else if cmd.trim() == "sr" {
        cmd_save(state, "");
        cmd_reboot(state);
    } else {
        unknown(cmd);
    }
}

fn unknown(cmd: &str) {
    println!(
        "Unknown command '{}'. Enter 'help' for a list of commands.",
        cmd
    );
}

/// `cmd.strip_prefix(name)` followed by a space or end-of-string, so `set`
/// doesn't also swallow `settings`. Returns the trimmed argument string.
fn strip_command<'a>(cmd: &'a str, name: &str) -> Option<&'a str> {
    let rest = cmd.strip_prefix(name)?;
    if rest.is_empty() {
        return None;
    }
    if !rest.starts_with(' ') {
        return None;
    }
    Some(rest.trim())
}

fn cmd_set(state: &mut AppState, args: &str) {
    if args.is_empty() {
        let mut out = alloc_string();
        let _ = state.settings.write_list(&mut out);
        println!("{}", out);
        return;
    }
    let (name, value) = match args.split_once(' ') {
        Some((n, v)) => (n, v.trim()),
        None => match args.split_once('=') {
            Some((n, v)) => (n, v),
            None => (args, ""),
        },
    };
    match state.settings.set(name, value) {
        Ok(()) => {
            if !value.is_empty() {
                println!("'{}' set to '{}'", name, value);
            } else {
                println!("'{}' set", name);
            }
            state.refresh_pipeline_config();
        }
        Err(e) => println!("ERROR: {}", e),
    }
}

fn cmd_unset(state: &mut AppState, args: &str) {
    match state.settings.unset(args) {
        Ok(()) => {
            println!("Setting '{}' removed.", args);
            state.refresh_pipeline_config();
        }
        Err(e) => println!("ERROR: {}", e),
    }
}

fn cmd_load(state: &mut AppState, args: &str) {
    let name = if args.is_empty() { "default" } else { args };
    match state.settings_dir.load(name) {
        Ok(contents) => {
            state.settings.load_list(&contents);
            state.refresh_pipeline_config();
            println!("Loaded settings from file '{}'.", name);
        }
        Err(e) => println!("ERROR: could not load '{}': {}", name, e),
    }
}

fn cmd_save(state: &mut AppState, args: &str) {
    let name = if args.is_empty() { "default" } else { args };
    let mut out = alloc_string();
    let _ = state.settings.write_list(&mut out);
    match state.settings_dir.save(name, &out) {
        Ok(()) => println!("Saved settings to file '{}'.", name),
        Err(e) => println!("ERROR: could not save '{}': {}", name, e),
    }
}

fn cmd_ls(state: &AppState) {
    match state.settings_dir.list() {
        Ok(names) => {
            for name in names {
                println!("{}", name);
            }
        }
        Err(e) => println!("ERROR: {}", e),
    }
}

fn cmd_rm(state: &AppState, args: &str) {
    if state.interactive {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Delete settings file '{}'?", args))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Cancelled.");
            return;
        }
    }
    match state.settings_dir.rm(args) {
        Ok(()) => println!("File '{}' deleted.", args),
        Err(_) => println!("ERROR: rm '{}': file not found.", args),
    }
}

fn cmd_reboot(state: &mut AppState) {
    if state.interactive {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Discard in-memory settings and reload from disk?")
            .default(true)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Cancelled.");
            return;
        }
    }
    let mut settings = ook_core::settings::MapSettings::new();
    factory_settings(&mut settings);
    if state.settings_dir.exists("default") {
        if let Ok(contents) = state.settings_dir.load("default") {
            settings.load_list(&contents);
        }
    }
    state.settings = settings;
    state.refresh_pipeline_config();
    state.pipeline.standby();
    println!("Reloaded default settings.");
}

fn cmd_sim(state: &mut AppState, args: &str) {
    match state.pipeline.simulate_text(args) {
        Ok(()) => {
            print_ready_packets(state);
        }
        Err(e) => println!(
            "ERROR: string does not look like RawTimings, Pulsetrain or Meaning ({}).",
            e
        ),
    }
}

fn cmd_transmit(state: &mut AppState, args: &str) {
    match state.pipeline.resolve_for_transmit(args) {
        Ok(raw) => {
            println!("Transmitting: {}", raw);
        }
        Err(e) => println!(
            "ERROR: string does not look like RawTimings, Pulsetrain or Meaning ({}).",
            e
        ),
    }
}

pub fn print_ready_packets(state: &mut AppState) {
    let _ = state.pipeline.poll_timeouts();
    while let Some(packet) = state.pipeline.poll() {
        if state.settings.is_set("print_raw") && packet.raw.is_present() {
            println!("{}", packet.raw);
        }
        if state.settings.is_set("print_visualizer") {
            let pixel = state.pipeline.config().visualizer_pixel;
            if packet.raw.is_present() {
                if let Ok(v) = packet.raw.visualizer(pixel) {
                    println!("{}", v);
                }
            } else if let Ok(v) = packet.train.visualizer(pixel) {
                println!("{}", v);
            }
        }
        if state.settings.is_set("print_summary") {
            let mut out = alloc_string();
            let _ = packet.train.write_summary(&mut out);
            println!("{}", out);
        }
        if state.settings.is_set("print_pulsetrain") {
            println!("{}", packet.train);
        }
        if state.settings.is_set("print_binlist") {
            let mut out = alloc_string();
            let _ = packet.train.write_bin_list(&mut out);
            println!("{}", out);
        }
        match &packet.meaning {
            Ok(meaning) if state.settings.is_set("print_meaning") => println!("{}", meaning),
            Err(e) if state.settings.is_set("print_meaning") => println!("(no meaning: {})", e),
            _ => {}
        }
        state.pipeline.devices.new_packet(
            &packet.raw,
            &packet.train,
            packet.meaning.as_ref().unwrap_or(&ook_core::meaning::Meaning::new()),
        );
    }
}

fn alloc_string() -> String {
    String::new()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_on_semicolons_and_trims() {
        assert_eq!(split_commands("rm default ; reboot"), vec!["rm default", "reboot"]);
    }

    #[test]
    fn set_without_args_is_distinct_from_settings() {
        assert_eq!(strip_command("set x y", "set"), Some("x y"));
        assert_eq!(strip_command("settings", "set"), None);
    }
}
