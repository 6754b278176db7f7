//! Pipe a script file into the platform console and filter its output.

use clap::Parser;
use frontdesk::console::{ConsoleFlags, run_console};

#[derive(Parser, Debug)]
#[command(name = "frontdesk-run", about = "Run a script file in the platform console")]
struct Args {
    #[command(flatten)]
    console: ConsoleFlags,

    /// Path to the script file to run
    #[arg(long)]
    script: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let command = match tokio::fs::read_to_string(&args.script).await {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading script {}: {}", args.script, e);
            std::process::exit(1);
        }
    };

    match run_console(&args.console.into_options(), &command).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error executing script: {}", e);
            std::process::exit(1);
        }
    }
}
