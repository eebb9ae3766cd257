#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    atrium_server::run().await
}
