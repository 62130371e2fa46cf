use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    chatlog::cli::run_cli().await
}
