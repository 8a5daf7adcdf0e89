use polyblog::config::Config;
use polyblog::run_app;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            log::error!("Configuration error: {:#}", error);
            std::process::exit(1);
        }
    };

    if let Err(error) = run_app(config).await {
        log::error!("Server error: {:#}", error);
        std::process::exit(1);
    }
}
