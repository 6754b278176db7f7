//! Non-interactive driver for the platform's interactive console.
//!
//! Spawns the console as a child process, pipes a command followed by the
//! exit directive into its stdin, and line-filters its output (see
//! [`filter::LineFilter`]). The child's exit code is propagated.

mod filter;

pub use filter::LineFilter;

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

/// Connection and environment flags shared by the developer tools.
#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    /// Path to the console binary.
    pub console_bin: String,
    pub db_user: String,
    pub db_pass: String,
    pub db_name: String,
    pub db_host: String,
    pub db_port: u16,
    pub log_level: String,
    pub data_dir: String,
    pub addons_path: String,
    /// Extra modules passed through to the console command line.
    pub modules: Vec<String>,
    /// Show all output, including initialization noise.
    pub verbose: bool,
}

/// Command-line flags shared by the `frontdesk-exec` and `frontdesk-run`
/// developer tools.
#[derive(clap::Args, Debug, Clone)]
pub struct ConsoleFlags {
    /// Path to the console binary
    #[arg(long)]
    pub console_bin: String,

    /// Database user
    #[arg(long)]
    pub db_user: String,

    /// Database password
    #[arg(long)]
    pub db_pass: String,

    /// Database name
    #[arg(long)]
    pub db_name: String,

    /// Database host
    #[arg(long, default_value = "localhost")]
    pub db_host: String,

    /// Database port
    #[arg(long, default_value = "5432")]
    pub db_port: u16,

    /// Log level passed to the console
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Data directory
    #[arg(long)]
    pub data_dir: String,

    /// Addons path
    #[arg(long)]
    pub addons_path: String,

    /// Modules to pass through (space separated)
    #[arg(long, default_value = "")]
    pub modules: String,

    /// Show all output including initialization
    #[arg(long)]
    pub verbose: bool,
}

impl ConsoleFlags {
    pub fn into_options(self) -> ConsoleOptions {
        ConsoleOptions {
            console_bin: self.console_bin,
            db_user: self.db_user,
            db_pass: self.db_pass,
            db_name: self.db_name,
            db_host: self.db_host,
            db_port: self.db_port,
            log_level: self.log_level,
            data_dir: self.data_dir,
            addons_path: self.addons_path,
            modules: self
                .modules
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            verbose: self.verbose,
        }
    }
}

#[derive(Debug)]
pub enum ConsoleError {
    Spawn(std::io::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleError::Spawn(e) => write!(f, "Failed to spawn console: {}", e),
            ConsoleError::Io(e) => write!(f, "Console I/O error: {}", e),
        }
    }
}

impl std::error::Error for ConsoleError {}

impl ConsoleOptions {
    /// Build the console child command from the flags.
    pub fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.console_bin);
        cmd.arg("shell")
            .arg("-r")
            .arg(&self.db_user)
            .arg("-w")
            .arg(&self.db_pass)
            .arg(format!("--log-level={}", self.log_level))
            .arg(format!("--db_host={}", self.db_host))
            .arg(format!("--db_port={}", self.db_port))
            .arg(format!("--data-dir={}", self.data_dir))
            .arg(format!("--addons-path={}", self.addons_path))
            .arg("-d")
            .arg(&self.db_name);
        for module in &self.modules {
            cmd.arg(module);
        }
        // Keep profiling and coverage hooks out of the child.
        cmd.env("PYTHONDONTWRITEBYTECODE", "1")
            .env_remove("COVERAGE_PROCESS_START")
            .env_remove("GCOV_PREFIX")
            .env_remove("GCOV_PREFIX_STRIP");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Run a command text in the console and stream the filtered output to our
/// stdout. Returns the child's exit code.
pub async fn run_console(options: &ConsoleOptions, command: &str) -> Result<i32, ConsoleError> {
    if options.verbose {
        println!(
            "Starting console: {} shell -d {}",
            options.console_bin, options.db_name
        );
        println!("Executing command:\n{}", command);
        println!("{}", "-".repeat(50));
    }

    let mut child = options
        .build_command()
        .spawn()
        .map_err(ConsoleError::Spawn)?;

    // Feed the command and the exit directive, then close stdin so the
    // console terminates. A child that dies before draining stdin closes the
    // pipe; its exit code is still what we want to report.
    let mut stdin = child.stdin.take().ok_or_else(|| {
        ConsoleError::Spawn(std::io::Error::other("child stdin not captured"))
    })?;
    if let Err(e) = stdin
        .write_all(format!("{}\nexit()\n", command).as_bytes())
        .await
    {
        tracing::debug!(error = %e, "Console did not read the full command");
    }
    drop(stdin);

    let stdout = child.stdout.take().ok_or_else(|| {
        ConsoleError::Spawn(std::io::Error::other("child stdout not captured"))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        ConsoleError::Spawn(std::io::Error::other("child stderr not captured"))
    })?;

    // One filter shared across both streams so the banner/prompt phases are
    // tracked once, as if stderr were folded into stdout.
    let filter = Arc::new(Mutex::new(LineFilter::new(options.verbose)));

    let out_filter = filter.clone();
    let out_task = async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if out_filter.lock().await.show(&line) {
                println!("{}", line);
            }
        }
        Ok::<(), std::io::Error>(())
    };

    let err_task = async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Some(line) = lines.next_line().await? {
            if filter.lock().await.show(&line) {
                println!("{}", line);
            }
        }
        Ok::<(), std::io::Error>(())
    };

    let (out_result, err_result) = futures::join!(out_task, err_task);
    out_result.map_err(ConsoleError::Io)?;
    err_result.map_err(ConsoleError::Io)?;

    let status = child.wait().await.map_err(ConsoleError::Io)?;
    let code = status.code().unwrap_or(1);

    if code != 0 && !options.verbose {
        eprintln!("Process exited with code: {}", code);
    }

    Ok(code)
}
