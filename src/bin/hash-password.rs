//! Print a bcrypt hash for `ADMIN_HASH_PASSWORD`.
//!
//! Usage: hash-password <PASSWORD> [COST]

use bcrypt::{hash, DEFAULT_COST};
use std::env;

const MIN_PASSWORD_LEN: usize = 8;

fn main() {
    let mut args = env::args().skip(1);
    let password = args.next().unwrap_or_else(|| {
        eprintln!("Usage: hash-password <PASSWORD> [COST]");
        std::process::exit(1);
    });
    if password.chars().count() < MIN_PASSWORD_LEN {
        eprintln!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        );
        std::process::exit(1);
    }
    let cost = match args.next() {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("COST must be a number between 4 and 31");
            std::process::exit(1);
        }),
        None => DEFAULT_COST,
    };

    match hash(&password, cost) {
        Ok(hashed) => {
            println!("Cost : {}", cost);
            println!("Hash : {}\n", hashed);
            println!("# Paste this into your .env:");
            println!("ADMIN_HASH_PASSWORD={}", hashed);
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
