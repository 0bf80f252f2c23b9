#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = cbt_console::run().await {
        eprintln!("cbt-console fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
