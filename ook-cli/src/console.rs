//! The interactive REPL: reads lines with `rustyline`, splits them into
//! commands the way a serial command buffer is split, and dispatches each
//! to [`crate::commands::execute`].

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::{execute, split_commands, AppState};

pub fn run(mut state: AppState) -> anyhow::Result<()> {
    println!("OOK packet core console. Type 'help' for a list of commands.");
    let mut editor = DefaultEditor::new()?;

    loop {
        crate::commands::print_ready_packets(&mut state);

        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str()).ok();
                for cmd in split_commands(&line) {
                    execute(&mut state, cmd);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("bye");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
