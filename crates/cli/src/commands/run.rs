// Run command - benchmark models and print a latency table

use crate::output::{print_field, print_table_header, print_table_row, OutputFormat, UNBOUNDED};
use anyhow::{Context, Result};
use clap::Args;
use firstbyte_core::{
    export_csv, format_millis, BatchInputs, BatchResult, BatchRunner, CancellationFlag,
    LatencyGrade, ModelSpec, ProbeConfig, ProbeResult, Prober, ProgressSink, DEFAULT_MODELS,
    DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT,
};
use firstbyte_openai::OpenAiTransport;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// API key sent as a bearer token
    #[arg(long, env = "FIRSTBYTE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat-completions URL [env: FIRSTBYTE_API_URL]
    #[arg(long)]
    pub api_url: Option<String>,

    /// Model to test; repeat for several. Defaults to the built-in list
    #[arg(long = "model", short = 'm')]
    pub models: Vec<String>,

    /// System prompt sent before the user prompt
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT, conflicts_with = "no_system_prompt")]
    pub system_prompt: String,

    /// Send only the user prompt
    #[arg(long)]
    pub no_system_prompt: bool,

    /// User prompt
    #[arg(long, short, default_value = DEFAULT_USER_PROMPT)]
    pub prompt: String,

    /// Per-model timeout in seconds [env: FIRSTBYTE_TIMEOUT_SECS]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Connect timeout in seconds [env: FIRSTBYTE_CONNECT_TIMEOUT_SECS]
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Probes in flight at once [env: FIRSTBYTE_CONCURRENCY]
    #[arg(long, short)]
    pub concurrency: Option<usize>,

    /// Write results to a CSV file (UTF-8 with BOM)
    #[arg(long, short)]
    pub export: Option<PathBuf>,
}

impl RunArgs {
    /// Layer explicit flags over an environment-derived configuration
    fn probe_config(&self, base: ProbeConfig) -> ProbeConfig {
        let mut config = base;
        if let Some(url) = &self.api_url {
            config = config.with_api_url(url.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.connect_timeout {
            config = config.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(n) = self.concurrency {
            config = config.with_concurrency(n);
        }
        config
    }

    fn model_specs(&self) -> Vec<ModelSpec> {
        if self.models.is_empty() {
            DEFAULT_MODELS.iter().map(|m| ModelSpec::from(*m)).collect()
        } else {
            self.models.iter().map(|m| ModelSpec::from(m.as_str())).collect()
        }
    }

    fn batch_inputs(&self, timeout: Duration) -> BatchInputs {
        let inputs = BatchInputs::new(
            self.prompt.clone(),
            self.api_key.clone().unwrap_or_default(),
            timeout,
        );
        if self.no_system_prompt {
            inputs
        } else {
            inputs.with_system_prompt(self.system_prompt.clone())
        }
    }
}

pub async fn run(args: RunArgs, output: OutputFormat, quiet: bool) -> Result<()> {
    let config = args.probe_config(ProbeConfig::from_env());
    let models = args.model_specs();
    let inputs = args.batch_inputs(config.timeout);

    let transport = OpenAiTransport::from_config(&config)?;
    let runner = BatchRunner::new(Prober::new(transport)).with_concurrency(config.concurrency);

    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let interrupted = || async { tokio::signal::ctrl_c().await.is_ok() };
            if let Some(code) = watch_interrupts(interrupted, &cancel).await {
                std::process::exit(code);
            }
        });
    }

    let progress = ConsoleProgress {
        total: models.len(),
        enabled: output.is_text() && !quiet,
    };
    let batch = runner.run(&models, &inputs, &progress, &cancel).await?;

    if output.is_text() {
        print_results(&batch);
        if !quiet {
            print_summary(&batch);
        }
    } else {
        output.print_value(&serde_json::json!({
            "batch_id": batch.batch_id(),
            "requested": batch.requested(),
            "cancelled": batch.is_cancelled(),
            "results": batch.results(),
        }))?;
    }

    if let Some(path) = &args.export {
        export_csv(&batch, path)
            .with_context(|| format!("Failed to export results to {}", path.display()))?;
        if !quiet {
            eprintln!("Exported {} results to {}", batch.len(), path.display());
        }
    }

    Ok(())
}

/// Exit status after a second interrupt (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// First interrupt stops dispatching new models, the second one returns the
/// exit code to abort with. `None` when the interrupt listener fails.
async fn watch_interrupts<F, Fut>(mut interrupted: F, cancel: &CancellationFlag) -> Option<i32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !interrupted().await {
        return None;
    }
    eprintln!("Stopping after in-flight models finish (Ctrl-C again to abort)...");
    cancel.cancel();

    if !interrupted().await {
        return None;
    }
    eprintln!("Aborted");
    Some(INTERRUPTED_EXIT_CODE)
}

/// Prints one line per model as the batch progresses
struct ConsoleProgress {
    total: usize,
    enabled: bool,
}

impl ProgressSink for ConsoleProgress {
    fn on_started(&self, index: usize, model: &ModelSpec) {
        if self.enabled {
            eprintln!("[{}/{}] Testing {}...", index + 1, self.total, model);
        }
    }

    fn on_result(&self, index: usize, result: &ProbeResult) {
        if !self.enabled {
            return;
        }
        match result.first_byte() {
            Some(first_byte) if result.success() => eprintln!(
                "[{}/{}] {} first byte {} ms, total {} ms",
                index + 1,
                self.total,
                result.model(),
                format_millis(first_byte),
                format_millis(result.total())
            ),
            _ => eprintln!(
                "[{}/{}] {} failed: {}",
                index + 1,
                self.total,
                result.model(),
                result.error().unwrap_or("unknown error")
            ),
        }
    }
}

/// Table cells for one result: first byte, total, length, grade and error.
/// Failed rows carry the error in the last column, untruncated.
fn result_cells(result: &ProbeResult) -> [String; 5] {
    match result.first_byte() {
        Some(first_byte) if result.success() => [
            format_millis(first_byte),
            format_millis(result.total()),
            result.response_length().to_string(),
            format!(
                "{}/{}",
                LatencyGrade::for_first_byte(first_byte),
                LatencyGrade::for_total(result.total())
            ),
            String::new(),
        ],
        _ => [
            "-".to_string(),
            format_millis(result.total()),
            "-".to_string(),
            "-".to_string(),
            result.error().unwrap_or("failed").to_string(),
        ],
    }
}

fn print_results(batch: &BatchResult) {
    if batch.is_empty() {
        println!("No models tested");
        return;
    }

    print_table_header(&[
        ("MODEL", 36),
        ("FIRST BYTE (ms)", 15),
        ("TOTAL (ms)", 10),
        ("CHARS", 6),
        ("GRADE", 13),
        ("ERROR", UNBOUNDED),
    ]);

    for result in batch {
        let [first_byte, total, length, grade, error] = result_cells(result);
        print_table_row(&[
            (result.model().as_str(), 36),
            (&first_byte, 15),
            (&total, 10),
            (&length, 6),
            (&grade, 13),
            (&error, UNBOUNDED),
        ]);
    }
}

fn print_summary(batch: &BatchResult) {
    println!();
    print_field(
        "Tested",
        &format!("{} of {} models", batch.len(), batch.requested()),
    );
    print_field("Succeeded", &batch.success_count().to_string());
    print_field("Failed", &batch.failure_count().to_string());

    let fastest = batch
        .iter()
        .filter(|r| r.success())
        .filter_map(|r| r.first_byte().map(|fb| (r, fb)))
        .min_by_key(|(_, fb)| *fb);
    if let Some((result, first_byte)) = fastest {
        print_field(
            "Fastest",
            &format!("{} ({} ms)", result.model(), format_millis(first_byte)),
        );
    }

    if batch.is_cancelled() {
        print_field("Status", "cancelled");
    }
}
