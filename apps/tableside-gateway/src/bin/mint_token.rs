//! Dev tool: sign a bearer token with the local `JWT_SECRET` so a client can
//! connect to a running gateway.

use std::io::{self, Write};
use std::path::Path;

use tableside_gateway::auth::tokens::{self, DEFAULT_TTL_SECS};
use tableside_gateway::auth::Identity;
use tableside_gateway::config;

fn prompt(label: &str, default: Option<&str>) -> String {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    let input = input.trim().to_string();
    if input.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        input
    }
}

fn main() {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    let secret = match std::env::var("JWT_SECRET") {
        Ok(s) if !s.is_empty() => s,
        _ => {
            eprintln!("JWT_SECRET must be set (environment or .env)");
            std::process::exit(1);
        }
    };

    let mut staff_roles: Vec<String> = config::staff_roles(std::env::var("STAFF_ROLES").ok().as_deref())
        .into_iter()
        .collect();
    staff_roles.sort();
    println!("Mint a gateway bearer token. Staff roles: {}", staff_roles.join(", "));

    let identity = Identity {
        id: prompt("Subject (user id)", Some("usr_dev")),
        email: prompt("Email", Some("dev@localhost")),
        role: prompt("Role", Some("staff")),
    };
    let default_hours = (DEFAULT_TTL_SECS / 3600).to_string();
    let hours: i64 = prompt("Valid for (hours)", Some(&default_hours))
        .parse()
        .unwrap_or(DEFAULT_TTL_SECS / 3600);

    match tokens::mint(&secret, &identity, tokens::ttl_hours(hours)) {
        Ok(token) => {
            println!();
            println!("{token}");
            println!();
            let port = std::env::var("PORT").unwrap_or_else(|_| "4000".to_string());
            let path = std::env::var("GATEWAY_PATH").unwrap_or_else(|_| "/ws".to_string());
            println!("Browser clients: ws://localhost:{port}{path}?token={token}");
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
