#[tokio::main]
async fn main() {
    if let Err(e) = vidprobe::run().await {
        eprintln!("vidprobe: {}", e);
        std::process::exit(1);
    }
}
