//! Verso - document and sentence machine translation
//!
//! Command-line entry point: document translation, evaluation, interactive use and
//! a stage-server benchmark.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use verso::cli::{Args, Commands};
use verso::config::PipelineConfig;
use verso::document::CommandPdfExtractor;
use verso::error::VersoError;
use verso::eval::{self, CometScorer, HttpCometScorer, MetricSelection, RunRecorder};
use verso::document::DocumentFormat;
use verso::pipeline::{check_services, TranslationPipeline};
use verso::stage::{RequestCounter, StageServer, TranslateStage, TranslationRequest};
use verso::translate::priority::select_priority;
use verso::translate::{BackendFactory, TranslationBackend};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Verso");

    let mut config = match &args.config {
        Some(config_path) => PipelineConfig::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                PipelineConfig::from_file("config.toml")?
            } else {
                PipelineConfig::default()
            }
        }
    };
    if args.reverse {
        config = config.reversed();
    }
    if args.cpu {
        config.device = "cpu".to_string();
    }
    info!(
        "Pipeline {} translating {} -> {}",
        config.pipeline.as_str(),
        config.src_name,
        config.tgt_name
    );

    match args.command {
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(VersoError::Config(format!(
                    "{} already exists, use --force to overwrite",
                    output.display()
                ))
                .into());
            }
            PipelineConfig::default().save_to_file(&output)?;
            println!("Default configuration written to {}", output.display());
        }
        Commands::Priority { models, src, tgt, document } => {
            let available: Vec<String> = models
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            let src = src.unwrap_or_else(|| config.src_name.clone());
            let tgt = tgt.unwrap_or_else(|| config.tgt_name.clone());

            let priority = select_priority(&available, &src, &tgt, document)?;
            if priority.is_empty() {
                println!("No deployed model serves {} -> {}", src, tgt);
            } else {
                for (rank, model) in priority.iter().enumerate() {
                    println!("{:>2}. {}", rank + 1, model);
                }
            }
        }
        Commands::Translate { input, input_dir, output } => {
            let pdf_input = match (&input, &input_dir) {
                (_, Some(dir)) => walkdir::WalkDir::new(dir)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .any(|e| is_pdf(e.path())),
                (Some(file), None) => is_pdf(file),
                (None, None) => false,
            };
            check_services(&config, pdf_input).await?;
            let pipeline = TranslationPipeline::new(config)?;
            match (input, input_dir) {
                (_, Some(dir)) => {
                    let summary = pipeline.translate_directory(&dir, &output).await?;
                    println!(
                        "Translated {} documents, {} failed",
                        summary.translated.len(),
                        summary.failed.len()
                    );
                    for (path, reason) in &summary.failed {
                        println!("  {}: {}", path.display(), reason);
                    }
                }
                (Some(file), None) => {
                    let done = pipeline.translate_file(&file, &output).await?;
                    println!(
                        "Translated {} records in {:.2}s -> {}",
                        done.records,
                        done.seconds,
                        done.output.display()
                    );
                }
                (None, None) => {
                    return Err(VersoError::Config("either --input or --input-dir is required".to_string()).into());
                }
            }
        }
        Commands::EvalDoc { source, ground_truth, translated } => {
            let extractor = CommandPdfExtractor::new(config.pdf_extractor.clone());
            let pdf_input = is_pdf(&source)
                || is_pdf(&ground_truth)
                || translated.as_deref().is_some_and(is_pdf);
            if translated.is_none() {
                check_services(&config, pdf_input).await?;
            } else if pdf_input {
                extractor.check_availability()?;
            }
            let comet = comet_scorer(&config);
            let run_name = format!(
                "{}_{}",
                source.file_stem().unwrap_or_default().to_string_lossy(),
                ground_truth.file_stem().unwrap_or_default().to_string_lossy()
            );
            let mut recorder = RunRecorder::new(&config.tracking_dir, "eval_document", &run_name);

            let pipeline = match translated {
                Some(_) => None,
                None => Some(TranslationPipeline::new(config)?),
            };
            let scores = eval::evaluate_document(
                pipeline.as_ref(),
                &source,
                &ground_truth,
                translated.as_deref(),
                &extractor,
                comet.as_deref(),
                &mut recorder,
            )
            .await?;
            recorder.finish()?;
            print_scores(scores.bleu, scores.comet);
        }
        Commands::EvalFlores { dataset, flores_id, bleu, comet } => {
            let metrics = MetricSelection { bleu, comet };
            metrics.validate()?;

            check_services(&config, false).await?;
            let scorer = comet_scorer(&config);
            let mut recorder = RunRecorder::from_config(&config);
            let pipeline = TranslationPipeline::new(config)?;

            let scores = eval::evaluate_flores(
                &pipeline,
                &dataset,
                flores_id,
                metrics,
                scorer.as_deref(),
                &mut recorder,
            )
            .await?;
            recorder.finish()?;
            print_scores(scores.bleu, scores.comet);
        }
        Commands::Interactive => {
            check_services(&config, false).await?;
            let pipeline = TranslationPipeline::new(config)?;
            run_interactive(&pipeline).await?;
        }
        Commands::Bench { requests, text, max_batch } => {
            check_services(&config, false).await?;
            run_bench(&config, requests, text, max_batch).await?;
        }
    }

    info!("Verso completed successfully");
    Ok(())
}

fn is_pdf(path: &Path) -> bool {
    matches!(DocumentFormat::from_path(path), Ok(DocumentFormat::Pdf))
}

fn comet_scorer(config: &PipelineConfig) -> Option<Box<dyn CometScorer>> {
    config
        .comet_endpoint
        .as_ref()
        .map(|endpoint| Box::new(HttpCometScorer::new(endpoint.clone())) as Box<dyn CometScorer>)
}

fn print_scores(bleu: Option<f64>, comet: Option<f64>) {
    if let Some(bleu) = bleu {
        println!("BLEU:  {}", bleu);
    }
    match comet {
        Some(comet) => println!("COMET: {:.4}", comet),
        None => println!("COMET: skipped"),
    }
}

/// Read sentences from stdin until EOF, `exit`, `quit` or Ctrl-C
async fn run_interactive(pipeline: &TranslationPipeline) -> Result<()> {
    let config = pipeline.config();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!(
        "Interactive translation {} -> {}. Type 'exit' or press Ctrl-C to quit.",
        config.src_name, config.tgt_name
    );

    loop {
        stdout.write_all(format!("({})< ", config.src_code).as_bytes()).await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else { break };
        let sentence = line.trim();
        if sentence.is_empty() {
            continue;
        }
        if sentence.eq_ignore_ascii_case("exit") || sentence.eq_ignore_ascii_case("quit") {
            break;
        }

        let texts = vec![sentence.to_string()];
        tokio::select! {
            result = pipeline.translate_texts(&texts) => match result {
                Ok(translated) => {
                    let output = translated.into_iter().next().unwrap_or_default();
                    println!("({})> {}", config.tgt_code, output);
                }
                Err(e) => {
                    error!("Translation failed: {}", e);
                    println!("Translation failed: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Translation interrupted");
                println!();
                break;
            }
        }
    }

    info!("Interactive session ended");
    Ok(())
}

/// Concurrent single-sentence requests through the stage server
async fn run_bench(config: &PipelineConfig, requests: usize, text: String, max_batch: usize) -> Result<()> {
    let backend: Arc<dyn TranslationBackend> = Arc::from(BackendFactory::create_backend(config)?);
    let stage = Arc::new(TranslateStage::from_config(config, backend));
    let (server, handle) = StageServer::spawn(stage, max_batch, requests.max(1));
    let counter = Arc::new(RequestCounter::new());

    info!("┌─ Benchmark: {} requests, max batch {} ────────", requests, max_batch);
    let started = Instant::now();

    for i in 0..requests {
        let handle = handle.clone();
        let counter = counter.clone();
        let request = TranslationRequest::single(text.clone(), config.src_name.clone(), config.tgt_name.clone());
        tokio::spawn(async move {
            match handle.translate(request).await {
                Ok(_) => counter.record_success(),
                Err(e) => {
                    warn!("│ Request {} failed: {}", i, e);
                    counter.record_failure();
                }
            }
        });
    }

    counter.wait_for(requests).await;
    let elapsed = started.elapsed().as_secs_f64();
    info!("│ Succeeded: {}, failed: {}", counter.succeeded(), counter.failed());
    info!("└─────────────────────────────────────");

    drop(handle);
    server.shutdown().await?;

    println!(
        "{} requests in {:.2}s ({:.1} req/s): {} succeeded, {} failed",
        requests,
        elapsed,
        requests as f64 / elapsed.max(f64::EPSILON),
        counter.succeeded(),
        counter.failed()
    );
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".verso").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "verso.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("verso.log").display()
    );

    Ok(())
}
