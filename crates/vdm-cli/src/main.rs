#[tokio::main]
async fn main() {
    std::process::exit(vdm_cli::run().await);
}
