use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
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
    // Secrets (JWT secret, Paystack keys) are deliberately absent from this list
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "WALLET_HOST",
        "WALLET_PORT",
        "WALLET_DATABASE_URL",
        "WALLET_CURRENCY",
        "WALLET_SESSION_DURATION",
        "WALLET_API_KEY_PREFIX",
        "WALLET_MAX_ACTIVE_KEYS",
        "WALLET_PAYSTACK_BASE_URL",
        "WALLET_PAYSTACK_CALLBACK_URL",
        "WALLET_WEBHOOK_HMAC_CHECKS",
        "WALLET_RECONCILE_INTERVAL",
        "WALLET_RECONCILE_MIN_AGE",
        "WALLET_DEPOSIT_ABANDON_AFTER",
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
