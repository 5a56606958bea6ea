use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Swap the configured source and target languages
    #[arg(long, global = true)]
    pub reverse: bool,

    /// Force CPU inference
    #[arg(long, global = true)]
    pub cpu: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a document, or every document in a directory
    Translate {
        /// Input document (.txt, .docx or .pdf)
        #[arg(short, long, conflicts_with = "input_dir", required_unless_present = "input_dir")]
        input: Option<PathBuf>,

        /// Directory of documents to translate
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Output document, or output directory with --input-dir
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Evaluate a document translation against a ground truth
    EvalDoc {
        /// Source document
        #[arg(short, long)]
        source: PathBuf,

        /// Reference translation of the source document
        #[arg(short, long)]
        ground_truth: PathBuf,

        /// Already translated document; the source is translated when omitted
        #[arg(short, long)]
        translated: Option<PathBuf>,
    },

    /// Translate a FLORES-200 split and score it
    EvalFlores {
        /// FLORES split
        #[arg(long, default_value = "dev", value_parser = ["dev", "devtest"])]
        dataset: String,

        /// Evaluate a single sentence of the split
        #[arg(long)]
        flores_id: Option<usize>,

        /// Compute BLEU
        #[arg(long)]
        bleu: bool,

        /// Compute COMET
        #[arg(long)]
        comet: bool,
    },

    /// Translate sentences typed on stdin
    Interactive,

    /// Show which models would serve a language pair
    Priority {
        /// Deployed model names (comma-separated)
        #[arg(short, long)]
        models: String,

        /// Source language, defaults to the configured one
        #[arg(long)]
        src: Option<String>,

        /// Target language, defaults to the configured one
        #[arg(long)]
        tgt: Option<String>,

        /// Rank for whole-document translation
        #[arg(long)]
        document: bool,
    },

    /// Send concurrent single-sentence requests through the stage server
    Bench {
        /// Number of requests
        #[arg(short = 'n', long, default_value = "100")]
        requests: usize,

        /// Sentence to translate
        #[arg(short, long, default_value = "Hello world")]
        text: String,

        /// Requests coalesced per stage execution
        #[arg(long, default_value = "32")]
        max_batch: usize,
    },

    /// Write the default configuration as TOML
    InitConfig {
        /// Output file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_translate_requires_an_input() {
        assert!(Args::try_parse_from(["verso", "translate", "-o", "out.txt"]).is_err());
        let args = Args::try_parse_from(["verso", "--reverse", "translate", "-i", "a.docx", "-o", "b.docx"]).unwrap();
        assert!(args.reverse);
        assert!(matches!(args.command, Commands::Translate { input: Some(_), .. }));
    }

    #[test]
    fn test_flores_split_is_checked() {
        assert!(Args::try_parse_from(["verso", "eval-flores", "--dataset", "test"]).is_err());
        let args = Args::try_parse_from(["verso", "eval-flores", "--bleu", "--flores-id", "3"]).unwrap();
        match args.command {
            Commands::EvalFlores { dataset, flores_id, bleu, comet } => {
                assert_eq!(dataset, "dev");
                assert_eq!(flores_id, Some(3));
                assert!(bleu && !comet);
            }
            _ => panic!("expected eval-flores"),
        }
    }
}
