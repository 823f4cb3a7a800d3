//! rma-auth console
//!
//! Serves the challenge/response command over the console: the UART on
//! ESP32 builds, stdin/stdout on host builds.
//!
//! ```text
//! > challenge
//! CHALLENGE ABCD...==
//! > auth K7QZ2MNP
//! OK
//! ```

use std::io::{BufRead, Write};

use log::{info, warn};

use rma_auth::clock::SystemClock;
use rma_auth::config::Config;
use rma_auth::console::handle_line;
use rma_auth::crypto::{HmacSha256, X25519KeyExchange};
use rma_auth::entropy::HardwareRng;
use rma_auth::identity::{DeviceIdentity, StaticIdentity};
use rma_auth::RmaAuth;

fn main() -> anyhow::Result<()> {
    init_platform();

    info!("rma-auth v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    if config.board_id.is_none() {
        warn!("board id not provisioned - challenges will fail");
    }

    let rng = HardwareRng::new()?;
    info!("RNG initialized");

    let identity = device_identity(&config)?;
    let auth = RmaAuth::with_parts(
        config.server.clone(),
        X25519KeyExchange::new(rng),
        identity,
        SystemClock::new(),
        HmacSha256,
        config.limits,
    );

    let server = auth.server_key();
    info!(
        "authority key id {} ({})",
        server.key_id,
        hex::encode(server.public_key)
    );

    info!("Entering console loop - type `challenge` or `auth <code>`");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = String::new();

    loop {
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            if idle() {
                continue;
            }
            return Ok(());
        }

        let reply = handle_line(&auth, &line);
        if !reply.is_empty() {
            writeln!(stdout, "{reply}")?;
            stdout.flush()?;
        }
    }
}

#[cfg(target_os = "espidf")]
fn init_platform() {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
}

#[cfg(not(target_os = "espidf"))]
fn init_platform() {}

/// No console input yet. Returns `false` when input has ended for good.
#[cfg(target_os = "espidf")]
fn idle() -> bool {
    // Small delay to prevent busy-spinning on the UART
    esp_idf_hal::delay::FreeRtos::delay_ms(10);
    true
}

#[cfg(not(target_os = "espidf"))]
fn idle() -> bool {
    false
}

#[cfg(target_os = "espidf")]
fn device_identity(config: &Config) -> anyhow::Result<Box<dyn DeviceIdentity>> {
    let identity: Box<dyn DeviceIdentity> = match &config.device_id {
        Some(id) => Box::new(static_identity(config, id.clone())),
        None => Box::new(rma_auth::identity::EfuseIdentity::new(config.board_id)?),
    };
    Ok(identity)
}

#[cfg(not(target_os = "espidf"))]
fn device_identity(config: &Config) -> anyhow::Result<Box<dyn DeviceIdentity>> {
    let Some(id) = config.device_id.clone() else {
        anyhow::bail!("RMA_AUTH_DEVICE_ID must be set on host builds");
    };
    Ok(Box::new(static_identity(config, id)))
}

fn static_identity(config: &Config, id: Vec<u8>) -> StaticIdentity {
    match config.board_id {
        Some(board_id) => StaticIdentity::new(board_id, id),
        None => StaticIdentity::unprovisioned(id),
    }
}
