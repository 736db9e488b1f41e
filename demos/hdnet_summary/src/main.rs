use burn::backend::NdArray;
use burn::config::Config;
use burn::prelude::Tensor;
use burn::tensor::Distribution;
use clap::Parser;
use hdnet::models::hdnet::prefabs::{HDNET_PREFABS, lookup_prefab};
use hdnet::models::hdnet::{HDNet, HDNetConfig};
use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Name of a well-known config.
    #[arg(long, default_value = "hdnet_reference")]
    prefab: String,

    /// Load the config from a JSON file instead of a prefab.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the resolved config to a JSON file.
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// List the prefab names and exit.
    #[arg(long, default_value_t = false)]
    list_prefabs: bool,

    /// Override the number of classes.
    #[arg(long)]
    classes: Option<usize>,

    /// Use dense input wiring in the dilated modules.
    #[arg(long, default_value_t = false)]
    dense_module_inputs: bool,

    /// Run a forward pass on random input.
    #[arg(long, default_value_t = false)]
    forward: bool,

    /// Batch size for the forward pass.
    #[arg(short, long, default_value_t = 1)]
    batch_size: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stdout().is_terminal());
    Registry::default().with(filter).with(fmt_layer).init();
}

fn resolve_config(args: &Args) -> Result<HDNetConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            HDNetConfig::load(path)?
        }
        None => lookup_prefab(&args.prefab)
            .ok_or_else(|| format!("unknown prefab: {}", args.prefab))?
            .new_config(),
    };

    if let Some(classes) = args.classes {
        config.classes = classes;
    }
    if args.dense_module_inputs {
        config = config.with_dense_module_inputs(true);
    }

    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing();

    if args.list_prefabs {
        for prefab in HDNET_PREFABS {
            println!("{:<16} {}", prefab.name, prefab.description);
        }
        return Ok(());
    }

    let config = resolve_config(&args)?;
    let plan = config.shape_plan()?;
    println!("{plan}");

    if let Some(path) = &args.save_config {
        config.save(path)?;
        tracing::info!(path = %path.display(), "saved config");
    }

    if args.forward {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: HDNet<B> = config.try_init(&device)?;

        let [c, d, h, w] = config.input_shape;
        let input = Tensor::random([args.batch_size, c, d, h, w], Distribution::Default, &device);
        let output = model.forward(input);

        tracing::info!(output = ?output.dims(), "forward pass complete");
    }

    Ok(())
}
