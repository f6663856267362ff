mod app;
mod cli;

use app::App;
use clap::Parser;
use cli::Args;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let participant_id = match args.participant.clone() {
        Some(id) => id,
        None => cli::prompt_participant_id()?,
    };

    let app = App::new(args, participant_id)?;
    app.run()
}
