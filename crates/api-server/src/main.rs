// This main function is the entry point when running `cargo run -p api-server`.
// It loads settings, installs logging and hands over to `run_server`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = configuration::load_settings()?;
    settings.validate()?;
    let _guard = configuration::init_tracing(&settings.logging, settings.api.debug)?;
    api_server::run_server(&settings).await
}
