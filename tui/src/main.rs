use std::io::IsTerminal;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use jex_engine::EngineConfig;
use jex_tui::AppConfig;
use jex_tui::run_main;
use serde_json::Value;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "jex", version, about = "Interactively explore JSON with live filters")]
struct Cli {
    /// JSON file to explore; reads stdin when omitted.
    file: Option<PathBuf>,

    /// Collect latency telemetry and print a summary on exit.
    #[arg(long)]
    telemetry: bool,

    /// Debounce interval for live re-execution, in milliseconds.
    #[arg(long, default_value_t = 30)]
    debounce_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging()?;

    let (data, filename) = load_input(&cli)?;
    let document: Value =
        serde_json::from_slice(&data).with_context(|| format!("failed to parse {filename}"))?;

    let exit = run_main(
        document,
        AppConfig {
            filename,
            engine: EngineConfig {
                debounce: Duration::from_millis(cli.debounce_ms),
                telemetry: cli.telemetry,
                ..EngineConfig::default()
            },
        },
    )
    .await?;

    if let Some(output) = exit.output {
        print!("{output}");
    }
    if let Some(summary) = exit.telemetry_summary {
        eprintln!("{summary}");
    }
    Ok(())
}

fn load_input(cli: &Cli) -> Result<(Vec<u8>, String)> {
    if let Some(path) = &cli.file {
        let data =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        return Ok((data, filename));
    }

    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!("no input: pass a JSON file or pipe JSON to stdin");
    }
    let mut data = Vec::new();
    stdin
        .read_to_end(&mut data)
        .context("failed to read stdin")?;
    Ok((data, "<stdin>".to_string()))
}

/// Log to a file in the temp directory when `RUST_LOG` is set; the alternate
/// screen owns stdout and stderr while the app runs.
fn init_logging() -> Result<Option<WorkerGuard>> {
    let Ok(filter) = EnvFilter::try_from_default_env() else {
        return Ok(None);
    };
    let file = std::fs::File::create(std::env::temp_dir().join("jex.log"))
        .context("failed to create log file")?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}
