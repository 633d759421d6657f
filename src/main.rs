// src/main.rs

use cronrun::{cli, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    let code = cronrun::run(args).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
