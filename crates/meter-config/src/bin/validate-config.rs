//! Config validation CLI tool
//!
//! Validates a meterd configuration file and reports any errors.

use meter_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a meterd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match meter_config::load_config(&config_path) {
        Ok(policy) => {
            let billing = &policy.billing;
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", meter_config::CURRENT_CONFIG_VERSION);
            println!("  Listen address: {}", policy.service.listen_addr);
            println!("  Data directory: {}", policy.service.data_dir.display());
            println!();
            println!("Billing:");
            println!("  Currency: {}", billing.currency);
            println!("  Tick interval: {}s", billing.tick_seconds());
            println!("  Minimum session: {} min", billing.min_session_minutes);
            println!("  Platform fee: {}", billing.platform_fee_rate);
            println!(
                "  Warnings at: {} min, {} min",
                billing.warning_thresholds.two_minute, billing.warning_thresholds.one_minute
            );
            println!("  On exhausted funds: {}", billing.on_exhausted.as_str());

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                meter_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                meter_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                meter_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                meter_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        meter_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
