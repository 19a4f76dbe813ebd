#[tokio::main]
async fn main() -> anyhow::Result<()> {
    food_server::start_server().await
}
