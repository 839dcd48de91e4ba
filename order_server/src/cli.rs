use std::{env, env::VarError};

/// There are no command line options. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "SOL_HOST",
        "SOL_PORT",
        "SOL_DATABASE_URL",
        "SOL_TEST_ORDER_PREFIX",
        "SOL_WEBHOOK_RATE_LIMIT",
        "SOL_USE_X_FORWARDED_FOR",
        "SOL_USE_FORWARDED",
        "SOL_SWEEP_INTERVAL",
        "SOL_INVOICE_URL",
        "SOL_INVOICE_TIMEOUT",
        "SOL_REQUEST_TIMEOUT",
        "SOL_WEBHOOK_TIMEOUT",
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
