use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;

/// Go/No-Go reaction-time task.
///
/// Press SPACE for go words, withhold for the no-go word. Results are
/// written as CSV when the session completes.
#[derive(Debug, Parser)]
#[command(name = "gonogo", version, about)]
pub struct Args {
    /// Participant identifier; prompted on stdin when omitted.
    #[arg(long)]
    pub participant: Option<String>,

    /// Directory the results CSV is written to.
    #[arg(long, default_value = ".")]
    pub output: PathBuf,

    /// Seed for the trial-schedule RNG; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Asks for the participant ID until a non-empty line comes in. A closed
/// stdin yields an empty ID, which the exporter records as UNKNOWN.
pub fn prompt_participant_id() -> io::Result<String> {
    loop {
        print!("Please enter your participant ID: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(String::new());
        }
        let id = line.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
        println!("A participant ID is required.");
    }
}
