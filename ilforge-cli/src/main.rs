//! ilforge CLI — decode, render, and round-trip raw method bodies.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Usage or input error
//! - 2: Decode or replay failure

mod commands;

use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "render" => commands::render(&args[2..]),
        "roundtrip" => commands::roundtrip(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("error: unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    if let Err(code) = result {
        process::exit(code);
    }
}

fn print_usage() {
    eprintln!("Usage: ilforge <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  render <body.bin>      Decode a raw method body and print the listing");
    eprintln!("  roundtrip <body.bin>   Decode, replay, and verify the bytes reproduce");
}
