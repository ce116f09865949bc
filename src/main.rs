use catalog_pager::{info_time, process::process_catalog, Config, Result};
use chrono::Local;

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let config = Config::from_env()?;
    process_catalog(&config).await?;
    info_time!(start_time, "Full program time:");

    Ok(())
}
