use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::extract::DEFAULT_SUBITEM_SEPARATOR;

#[derive(Parser, Debug)]
#[command(
    name = "gri-extract",
    version,
    about = "Disclosure-structure extraction for converted GRI standard documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Convert(ConvertArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = "md_input")]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[arg(long, default_value = "md_input")]
    pub input_dir: PathBuf,

    /// Convert only these files instead of every markdown file under the input directory.
    #[arg(long = "input")]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = "output_json")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// Skip the backward rescan and the f–h recovery pass.
    #[arg(long, default_value_t = false)]
    pub no_recovery: bool,

    #[arg(long, default_value = DEFAULT_SUBITEM_SEPARATOR)]
    pub subitem_separator: String,

    /// Log every extracted clause.
    #[arg(long, default_value_t = false)]
    pub preview: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "md_input")]
    pub input_dir: PathBuf,

    #[arg(long, default_value = "output_json")]
    pub output_dir: PathBuf,
}
