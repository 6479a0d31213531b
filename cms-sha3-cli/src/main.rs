mod cli;
mod config;
mod render;

use crate::cli::{Args, Command, GenerateArgs, VerifyArgs};
use crate::config::{Config, EvaluatorKind};
use anyhow::{bail, Context, Result};
use clap::Parser;
use cms_sha3::certificate::certificate_from_der_or_pem;
use cms_sha3::{
    AlgorithmCodecRegistry, NullTrustEvaluator, SelfSignedTrustEvaluator, SignatureField,
    SignatureVerificationEngine, SigningOrchestrator, TrustStoreEvaluator,
};
use der::pem::LineEnding;
use der::EncodePem;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::info;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

fn configure_logging(cli: &Args) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            Targets::new()
                .with_target(env!("CARGO_PKG_NAME").replace('-', "_"), &cli.log_level)
                .with_target("cms_sha3", &cli.log_level)
                .with_target("cms_sha3_der", &cli.log_level)
                .with_target("cms_sha3_common", &cli.log_level),
        )
        .init();
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let s = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file {path:?}"))?;
    serde_yaml::from_str(&s).context("failed to parse config file")
}

fn demo_document(name: &str) -> Vec<u8> {
    format!("%CMS-SHA3 demo document\nSigned with {name}\n").into_bytes()
}

async fn generate(
    registry: Arc<AlgorithmCodecRegistry>,
    config: Config,
    args: GenerateArgs,
) -> Result<()> {
    let sign = config.sign;
    let digest = args.digest.unwrap_or(sign.digest);
    let leaf = args.leaf.unwrap_or(sign.leaf);
    let root = args.root.unwrap_or(sign.root);
    let out_dir = args.outdir.unwrap_or(sign.out);
    let name = format!("{} + {digest}", leaf.label());

    let orchestrator = SigningOrchestrator::new(registry.clone());
    let chain = orchestrator
        .generate_chain(leaf.into(), root.into())
        .context("failed to generate certificate chain")?;

    let document = match &args.input {
        Some(path) => fs::read(path)
            .await
            .with_context(|| format!("failed to read {path:?}"))?,
        None => demo_document(&name),
    };
    let mut field = SignatureField::default()
        .with_container_size(args.container_size.unwrap_or(sign.container_size));
    if let Some(reason) = args.reason.or(sign.reason) {
        field = field.with_reason(reason);
    }
    if let Some(location) = args.location.or(sign.location) {
        field = field.with_location(location);
    }
    let signed = orchestrator
        .sign_document(&document, &field, &chain, &digest, None)
        .await
        .with_context(|| format!("failed to sign with {name}"))?;

    fs::create_dir_all(&out_dir)
        .await
        .with_context(|| format!("failed to create directory {out_dir:?}"))?;
    let document_path = out_dir.join(format!("{name}.txt"));
    let files = [
        (document_path.clone(), signed.clone()),
        (
            out_dir.join("leaf.pem"),
            chain.leaf.certificate.to_pem(LineEnding::LF)?.into_bytes(),
        ),
        (
            out_dir.join("root.pem"),
            chain.root.certificate.to_pem(LineEnding::LF)?.into_bytes(),
        ),
    ];
    for (path, contents) in files {
        fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write {path:?}"))?;
    }
    info!("signed document written to {document_path:?}");

    let engine = SignatureVerificationEngine::new(registry);
    let evaluator = SelfSignedTrustEvaluator::new(engine.resolver().clone());
    let report = engine.with_trust_evaluator(evaluator).verify(&signed).await;
    print!("{}", render::render(&report));
    Ok(())
}

async fn verify(
    registry: Arc<AlgorithmCodecRegistry>,
    config: Config,
    args: VerifyArgs,
) -> Result<()> {
    let mut roots = config.trust.roots;
    roots.extend(args.roots.iter().cloned());
    let evaluator = match args.trust {
        Some(evaluator) => evaluator,
        None if !args.roots.is_empty() => EvaluatorKind::Roots,
        None => config.trust.evaluator,
    };

    let engine = SignatureVerificationEngine::new(registry);
    let engine = match evaluator {
        EvaluatorKind::SelfSigned => {
            let evaluator = SelfSignedTrustEvaluator::new(engine.resolver().clone());
            engine.with_trust_evaluator(evaluator)
        }
        EvaluatorKind::Null => engine.with_trust_evaluator(NullTrustEvaluator),
        EvaluatorKind::Roots => {
            if roots.is_empty() {
                bail!("the roots evaluator needs at least one root certificate");
            }
            let mut store = TrustStoreEvaluator::new();
            for path in &roots {
                let data = fs::read(path)
                    .await
                    .with_context(|| format!("failed to read root certificate {path:?}"))?;
                let certificate = certificate_from_der_or_pem(&data)
                    .with_context(|| format!("invalid root certificate {path:?}"))?;
                store.add_trusted_root(&certificate)?;
            }
            info!("loaded {} trusted root(s)", store.len());
            engine.with_trust_evaluator(store)
        }
    };

    let report = engine.verify_file(&args.file).await;
    print!("{}", render::render(&report));
    if let Some(error) = report.error {
        bail!(error.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    configure_logging(&cli);
    let config = load_config(cli.config.as_deref()).await?;

    let registry = Arc::new(AlgorithmCodecRegistry::sha3());
    info!("registered algorithms: {:?}", registry);
    match cli.command {
        Command::Generate(args) => generate(registry, config, args).await,
        Command::Verify(args) => verify(registry, config, args).await,
    }
}
