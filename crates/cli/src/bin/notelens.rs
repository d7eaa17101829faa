use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    notelens_cli::main_entry().await
}
