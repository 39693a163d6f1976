#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scrum_sensei_backend::run().await
}
