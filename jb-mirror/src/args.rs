use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
pub struct MirrorArgs {
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[arg(short, long, default_value = "config.yaml", env = "JB_MIRROR_CONFIG")]
    pub config: PathBuf,

    #[arg(short, long, default_value = "artefacts", env = "JB_MIRROR_DESTINATION")]
    pub dest: PathBuf,

    #[arg(long, default_value_t = false)]
    pub cache_api: bool,

    #[arg(long, default_value_t = false)]
    pub clean_unknown: bool,
}
