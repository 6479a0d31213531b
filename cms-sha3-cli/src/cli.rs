use crate::config::{EvaluatorKind, KeyKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Args {
    /// path to the configuration file, consult [crate::config::Config] for more information.
    #[clap(long, value_name = "PATH", global = true)]
    pub(crate) config: Option<PathBuf>,
    /// application logging level
    #[clap(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub(crate) log_level: LogLevel,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Generate a certificate chain and sign a document with its leaf.
    Generate(GenerateArgs),
    /// Verify every signature embedded in a document.
    Verify(VerifyArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct GenerateArgs {
    /// document to sign, a demo document is used if absent
    #[clap(long, value_name = "PATH")]
    pub(crate) input: Option<PathBuf>,
    /// digest algorithm, e.g. SHA3-256 or SHAKE128
    #[clap(long)]
    pub(crate) digest: Option<String>,
    /// key type of the leaf certificate
    #[clap(long, value_enum)]
    pub(crate) leaf: Option<KeyKind>,
    /// key type of the root certificate
    #[clap(long, value_enum)]
    pub(crate) root: Option<KeyKind>,
    /// bytes reserved for the signature container
    #[clap(long)]
    pub(crate) container_size: Option<usize>,
    #[clap(long)]
    pub(crate) reason: Option<String>,
    #[clap(long)]
    pub(crate) location: Option<String>,
    /// directory to which the signed document and certificates are written
    #[clap(long)]
    pub(crate) outdir: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct VerifyArgs {
    /// signed document
    pub(crate) file: PathBuf,
    /// which certificates are trusted
    #[clap(long, value_enum)]
    pub(crate) trust: Option<EvaluatorKind>,
    /// trusted root certificates (DER or PEM), implies `--trust roots`
    #[clap(long = "root", value_name = "PATH")]
    pub(crate) roots: Vec<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub(crate) enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Trace,
}

impl From<&LogLevel> for tracing_core::LevelFilter {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Debug => tracing_core::Level::DEBUG.into(),
            LogLevel::Info => tracing_core::Level::INFO.into(),
            LogLevel::Warn => tracing_core::Level::WARN.into(),
            LogLevel::Error => tracing_core::Level::ERROR.into(),
            LogLevel::Trace => tracing_core::Level::TRACE.into(),
        }
    }
}
