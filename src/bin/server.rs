//! Fish chat server binary.
//! Run with: cargo run --bin fishchat-server

use std::process::ExitCode;

use fishchat_agent::start_fishchat;

fn main() -> ExitCode {
    start_fishchat::run()
}
