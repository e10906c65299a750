use anyhow::Context;
use clap::Parser;
use small_iac::core::provisioner::evaluate_document;
use small_iac::utils::logger;
use small_iac::DeploymentDocument;

#[derive(Parser)]
#[command(name = "doc-check")]
#[command(about = "Validate a deployment document and show its execution order")]
struct Args {
    /// Path to the deployment document
    #[arg(short, long, default_value = "deployment.toml")]
    document: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Checking document: {}", args.document);

    let document = DeploymentDocument::from_file(&args.document)
        .with_context(|| format!("failed to load document '{}'", args.document))?;

    let desired = evaluate_document(&document)
        .context("document failed structural or dependency validation")?;

    println!("✅ Document '{}' is valid", document.deployment_name());
    println!(
        "   {} resources, {} data lookups, {} outputs",
        desired.resource_count(),
        desired.data_count(),
        desired.outputs.len()
    );

    println!("Execution order:");
    for (index, node) in desired.execution_order.iter().enumerate() {
        println!("  {:>2}. {}", index + 1, node);
    }

    if !desired.outputs.is_empty() {
        println!("Outputs:");
        for output in &desired.outputs {
            println!("  📤 {} = {}", output.name, output.value);
        }
    }

    Ok(())
}
