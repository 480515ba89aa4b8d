pub mod discord;

use crate::config::Config;
use anyhow::Result;

pub async fn run(config: Config) -> Result<()> {
    discord::run(config).await
}
