//! Execute a command string in the platform console and filter its output.

use clap::Parser;
use frontdesk::console::{ConsoleFlags, run_console};

#[derive(Parser, Debug)]
#[command(name = "frontdesk-exec", about = "Execute a command in the platform console")]
struct Args {
    #[command(flatten)]
    console: ConsoleFlags,

    /// Command to execute
    #[arg(long)]
    command: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Callers that pass the command through an unexpanded shell variable
    // fall back to the environment.
    let command = if args.command == "$CONSOLE_EXEC_COMMAND" {
        match std::env::var("CONSOLE_EXEC_COMMAND") {
            Ok(command) if !command.is_empty() => command,
            _ => {
                eprintln!(
                    "Error: No command provided via --command or CONSOLE_EXEC_COMMAND environment variable"
                );
                std::process::exit(1);
            }
        }
    } else {
        args.command
    };

    match run_console(&args.console.into_options(), &command).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error executing command: {}", e);
            std::process::exit(1);
        }
    }
}
