use clap::Parser;
use maxcompute_dbapi::utils::error::ErrorSeverity;
use maxcompute_dbapi::utils::{logger, validation::Validate};
use maxcompute_dbapi::{
    CliConfig, DbConnection, DbError, MaxComputeConnection, RunOutcome, StatementRunner,
};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting mc-runner");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let exit_code = match run(&config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            match e.severity() {
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            }
        }
    };

    std::process::exit(exit_code);
}

async fn run(config: &CliConfig) -> Result<i32, DbError> {
    let (datasource, options) = config.resolve()?;
    let mut conn = MaxComputeConnection::connect_with_options(datasource, options).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = StatementRunner::new(&conn, config.format)
        .run(&config.execute, &mut out)
        .await;
    conn.close().await;

    match outcome? {
        RunOutcome::Rows(_) | RunOutcome::Executed => Ok(0),
        RunOutcome::Failed(message) => {
            eprintln!("❌ {}", message);
            Ok(2)
        }
    }
}
