// Entry point for `cargo run -p dashboard`. The root `finsight dashboard` command does the same.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = configuration::load_settings()?;
    settings.validate()?;
    let _guard = configuration::init_tracing(&settings.logging, settings.api.debug)?;
    dashboard::run_dashboard(&settings).await
}
