use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{PipelineConfig, PipelineKind};
use crate::document::{DocumentFactory, DocumentFormat, PdfExtractor, CommandPdfExtractor, non_empty_lines};
use crate::error::{Result, VersoError};
use crate::translate::context::ContextSettings;
use crate::translate::{BackendFactory, OllamaGenerator, TranslationBackend};

/// Outcome of one translated document
#[derive(Debug, Clone)]
pub struct DocumentTranslation {
    pub input: PathBuf,
    pub output: PathBuf,
    pub records: usize,
    pub seconds: f64,
}

/// Outcome of a directory run
#[derive(Debug, Clone, Default)]
pub struct DirectorySummary {
    pub translated: Vec<DocumentTranslation>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Fail early when a collaborator of a long run is unreachable
///
/// The generation server is checked for model back-ends, the PDF extractor only
/// when PDF input is expected.
pub async fn check_services(config: &PipelineConfig, pdf_input: bool) -> Result<()> {
    if config.pipeline != PipelineKind::Fake {
        OllamaGenerator::from_config(config)?.check_availability().await?;
    }
    if pdf_input {
        CommandPdfExtractor::new(config.pdf_extractor.clone()).check_availability()?;
    }
    Ok(())
}

/// One back-end plus the document plumbing around it
pub struct TranslationPipeline {
    config: PipelineConfig,
    backend: Box<dyn TranslationBackend>,
    extractor: Box<dyn PdfExtractor>,
    context: Option<ContextSettings>,
}

impl TranslationPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let backend = BackendFactory::create_backend(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    pub fn with_backend(config: PipelineConfig, backend: Box<dyn TranslationBackend>) -> Self {
        let extractor = Box::new(CommandPdfExtractor::new(config.pdf_extractor.clone()));
        Self::with_parts(config, backend, extractor)
    }

    pub fn with_parts(
        config: PipelineConfig,
        backend: Box<dyn TranslationBackend>,
        extractor: Box<dyn PdfExtractor>,
    ) -> Self {
        let context = config
            .use_context
            .then(|| ContextSettings::new(config.context_window, config.separateur_context.clone()));
        Self {
            config,
            backend,
            extractor,
            context,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn TranslationBackend {
        self.backend.as_ref()
    }

    /// Translate records in order from the configured source to the configured target language
    ///
    /// Records are sent in chunks of `batch_size`. Context is built over the whole list
    /// first, so a window may reach back across a chunk boundary.
    pub async fn translate_texts(&self, texts: &[String]) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let contexts = self.context.as_ref().map(|settings| settings.build(texts));
        let batch_size = self.config.batch_size.max(1);
        let total = texts.len().div_ceil(batch_size);
        let mut translated = Vec::with_capacity(texts.len());

        for (idx, chunk) in texts.chunks(batch_size).enumerate() {
            info!("┌─ Batch {}/{} ({} records) ────────", idx + 1, total, chunk.len());
            let started = Instant::now();

            let offset = idx * batch_size;
            let chunk_contexts = contexts.as_ref().map(|c| &c[offset..offset + chunk.len()]);
            let outputs = self
                .backend
                .transform(chunk, &self.config.src_name, &self.config.tgt_name, chunk_contexts)
                .await?;

            if outputs.len() != chunk.len() {
                return Err(VersoError::BatchShape {
                    expected: chunk.len(),
                    actual: outputs.len(),
                });
            }

            info!("│ Processed in {:.2} seconds", started.elapsed().as_secs_f64());
            info!("└─────────────────────────────────────");
            translated.extend(outputs);
        }

        Ok(translated)
    }

    /// Translate one document into `output`
    ///
    /// With `preserve_formatting` the input's structure is kept and the output has the
    /// input's format. Otherwise the flattened lines are written in the output's format.
    pub async fn translate_file(&self, input: &Path, output: &Path) -> Result<DocumentTranslation> {
        info!("Translating {} -> {}", input.display(), output.display());
        if !input.exists() {
            return Err(VersoError::FileNotFound(input.display().to_string()));
        }
        if self.config.preserve_formatting
            && DocumentFormat::from_path(input)? != DocumentFormat::from_path(output)?
        {
            return Err(VersoError::UnsupportedFormat(format!(
                "{} keeps the layout of {} and must use the same extension; \
                 set preserve_formatting = false to convert between formats",
                output.display(),
                input.display()
            )));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let started = Instant::now();
        let records = if self.config.preserve_formatting {
            let mut document = DocumentFactory::open(input, self.extractor.as_ref())?;
            let contents: Vec<String> = document.content().into_iter().map(|r| r.content).collect();
            let translated = self.translate_texts(&contents).await?;
            document.map_translations(&translated)?;
            document.save(output)?;
            contents.len()
        } else {
            let text = DocumentFactory::read_text(input, self.extractor.as_ref())?;
            let lines = non_empty_lines(&text);
            let translated = self.translate_texts(&lines).await?;
            DocumentFactory::write_lines(&translated, output)?;
            lines.len()
        };

        let seconds = started.elapsed().as_secs_f64();
        info!("Total translation time: {:.2} seconds", seconds);
        Ok(DocumentTranslation {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            records,
            seconds,
        })
    }

    /// Translate every supported document under `input_dir`, mirroring paths under `output_dir`
    pub async fn translate_directory(&self, input_dir: &Path, output_dir: &Path) -> Result<DirectorySummary> {
        info!("Processing directory: {}", input_dir.display());
        if !input_dir.is_dir() {
            return Err(VersoError::Config(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }
        fs::create_dir_all(output_dir).await?;

        let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && DocumentFormat::is_supported(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        info!("Found {} documents to translate", files.len());

        let progress = ProgressBar::new(files.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut summary = DirectorySummary::default();
        for file in files {
            let relative = pathdiff::diff_paths(&file, input_dir).unwrap_or_else(|| {
                PathBuf::from(file.file_name().unwrap_or_default())
            });
            let target = output_dir.join(&relative);
            progress.set_message(relative.display().to_string());
            debug!("{} -> {}", file.display(), target.display());

            match self.translate_file(&file, &target).await {
                Ok(done) => {
                    info!("Successfully translated: {}", file.display());
                    summary.translated.push(done);
                }
                Err(e) => {
                    warn!("Failed to translate {}: {}", file.display(), e);
                    summary.failed.push((file, e.to_string()));
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!(
            "Directory done: {} translated, {} failed",
            summary.translated.len(),
            summary.failed.len()
        );
        Ok(summary)
    }
}
