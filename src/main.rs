use std::path::PathBuf;

use clap::{Args, Parser};
use tracing::info;

use webhook_config_gen::config::Manifest;
use webhook_config_gen::output::{self, OutputFormat};

#[derive(Parser)]
#[command(name = "webhook-config-gen")]
#[command(bin_name = "webhook-config-gen")]
enum WebhookConfigGenCli {
    Generate(GenerateArgs),
}

#[derive(Args)]
#[command(author, version, about, long_about = None)]
struct GenerateArgs {
    /// Manifest describing the webhook server and its webhooks
    #[arg(short, long)]
    config: PathBuf,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    output: OutputFormat,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout is reserved for the generated manifests
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    match WebhookConfigGenCli::parse() {
        WebhookConfigGenCli::Generate(args) => {
            let mut options = Manifest::from_path(&args.config)?.into_options()?;
            let objects = options.generate()?;
            info!("Generated {} objects", objects.len());
            print!("{}", output::render(&objects, args.output)?);
        }
    };

    Ok(())
}
