use sliding_limiter::{
    config::LimiterConfig, connect_store, init_tracing, metrics::MetricsService,
    rate_limit::SlidingWindowRateLimiter,
};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize tracing
    init_tracing();

    // Get config file path and subject names from command line
    let mut args = env::args().skip(1);
    let config_path = args
        .next()
        .unwrap_or_else(|| "config/limiter.yaml".to_string());
    let names: Vec<String> = args.collect();

    // Load configuration
    let config = match LimiterConfig::from_file(&config_path).and_then(|cfg| {
        cfg.validate()?;
        Ok(cfg)
    }) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            eprintln!("Usage: sliding-limiter [config_file] <name>...");
            process::exit(1);
        }
    };

    let metrics = match MetricsService::install() {
        Ok(metrics) => metrics,
        Err(e) => {
            eprintln!("Metrics error: {}", e);
            process::exit(1);
        }
    };

    let store = match connect_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Store error: {}", e);
            process::exit(1);
        }
    };

    let limiter = match SlidingWindowRateLimiter::from_config(&config, store) {
        Ok(limiter) => limiter,
        Err(e) => {
            eprintln!("Limiter error: {}", e);
            process::exit(1);
        }
    };

    for name in &names {
        match limiter.check(name).await {
            Ok(outcome) => {
                let verdict = if outcome.allowed { "allowed" } else { "limited" };
                println!(
                    "{}\t{}\t{}/{}",
                    name, verdict, outcome.hits, outcome.max_hits
                );
            }
            Err(e) => {
                eprintln!("{}\terror\t{}", name, e);
                process::exit(1);
            }
        }
    }

    tracing::debug!("Metrics snapshot:\n{}", metrics.render());
}
