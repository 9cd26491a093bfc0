use std::{env, fmt, sync::Arc};

use mint_ledger::{build_postgres_ledger, config::MintConfig, lightning::DeterministicLightning, server};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let app_env = match env::var("MINT_APP_ENV") {
        Ok(v) if v.trim() == "dev" => AppEnv::Dev,
        _ => AppEnv::Prod,
    };

    println!("running in {app_env} mode");

    if app_env == AppEnv::Dev {
        match dotenvy::dotenv() {
            Ok(path) => println!(".env read successfully from {}", path.display()),
            Err(e) => println!("no .env file loaded: {e}"),
        };
    }

    tracing_subscriber::fmt::init();

    let config = MintConfig::read_config_with_defaults();

    // TODO: select a real Lightning backend (LND/CLN/a Lightning service
    // provider) once one of the Lightning crates in the dependency tree is
    // wired up; DeterministicLightning is a stand-in that never touches the
    // network.
    let lightning: Arc<dyn mint_ledger::lightning::LightningClient> =
        Arc::new(DeterministicLightning::new(
            config.info.name.clone().unwrap_or_else(|| "mint".to_string()),
        ));

    let ledger = Arc::new(build_postgres_ledger(lightning, &config).await?);
    server::run_server(ledger, config).await
}

#[derive(Debug, PartialEq, Eq)]
pub enum AppEnv {
    Dev,
    Prod,
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Prod => write!(f, "prod"),
        }
    }
}
