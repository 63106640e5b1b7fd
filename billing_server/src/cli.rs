use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
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
    // BILLING_PAYMENT_SYSTEMS is a path, not the secrets themselves
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "BILLING_HOST",
        "BILLING_PORT",
        "BILLING_DATABASE_URL",
        "BILLING_RUN_MIGRATIONS",
        "BILLING_PSP_ACCOUNTING_CURRENCY",
        "BILLING_GEOIP_DB",
        "BILLING_PAYMENT_SYSTEMS",
        "BILLING_USE_X_FORWARDED_FOR",
        "BILLING_USE_FORWARDED",
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
