use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and the current configuration, and the caller
/// should exit.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets are deliberately absent from this list
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "SPR_HOST",
        "SPR_PORT",
        "SPR_DATABASE_URL",
        "SPR_OMISE_API_URL",
        "SPR_OMISE_TIMEOUT_SECS",
        "SPR_OMISE_CHARGE_SCAN_LIMIT",
        "SPR_WEBHOOK_IP_WHITELIST",
        "SPR_USE_X_FORWARDED_FOR",
        "SPR_USE_FORWARDED",
        "SPR_BUFFER_UNKNOWN_HINTS",
        "SPR_SWEEP_INTERVAL_SECS",
        "SPR_SWEEP_BATCH_SIZE",
        "SPR_DIAGNOSTICS_LOG",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
