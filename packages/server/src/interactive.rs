//! Interactive mode for the server.

use dialoguer::{Confirm, Input};

use crate::ServerAddr;

/// Prompts for the listen address, then starts the server.
///
/// Defaults come from `BIND_ADDR`/`PORT` as in [`super::run_server`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if a prompt fails or the server
/// fails to start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Fire Portal Server");
    println!();

    let defaults = ServerAddr::from_env();

    let host: String = Input::new()
        .with_prompt("Bind address")
        .default(defaults.host)
        .interact_text()
        .map_err(std::io::Error::other)?;

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(defaults.port)
        .interact_text()
        .map_err(std::io::Error::other)?;

    let start = Confirm::new()
        .with_prompt(format!("Start server on {host}:{port}?"))
        .default(true)
        .interact()
        .map_err(std::io::Error::other)?;

    if !start {
        println!("Cancelled.");
        return Ok(());
    }

    super::serve(ServerAddr { host, port }).await
}
