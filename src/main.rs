#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ashare_sync_lib::run().await
}
