use shelf_domain::config::{Config, ConfigSeverity};

/// Print every validation issue plus a summary line.  Returns `false` when
/// at least one issue is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let mut issues = config.validate();
    if std::env::var(&config.server.api_token_env).is_err() {
        issues.push(shelf_domain::config::ConfigError {
            severity: ConfigSeverity::Warning,
            field: "server.api_token_env".into(),
            message: format!(
                "${} is not set; protected routes accept unauthenticated requests",
                config.server.api_token_env
            ),
        });
    }

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }
    let errors = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    println!(
        "\n{errors} error(s), {} warning(s) in {config_path}",
        issues.len() - errors
    );
    errors == 0
}

/// Dump the resolved config (defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{rendered}");
    Ok(())
}
