use dusk_scene::{config::SessionConfig, flow};

fn main() -> anyhow::Result<()> {
    let config = SessionConfig::from_args_or_env(std::env::args())?;
    flow::run(config)
}
