#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = cbt_console::run_author().await {
        eprintln!("cbt-author fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
