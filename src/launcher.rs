//! Shell launcher
//!
//! Starts the signaling server as a child process, waits until it answers its
//! health probe, then opens a client view on one of its pages. A server that
//! never comes up is fatal: no view is opened against it.

use std::{
    env, io,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::{
    process::{Child, Command},
    time::{sleep, Instant},
};
use tracing::{debug, error, info};

use crate::{config::LaunchArgs, error::LaunchError, server::Health};

const PROBE_INTERVAL: Duration = Duration::from_millis(200);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn launch(args: &LaunchArgs) -> Result<(), LaunchError> {
    let mut child = spawn_server(args.port)?;
    let base_url = format!("http://localhost:{}", args.port);

    let health = wait_until_ready(
        &base_url,
        Duration::from_secs(args.ready_timeout_secs),
        || child.try_wait(),
    )
    .await?;
    info!("Server ready ({} connections)", health.connections);

    let url = format!("{}{}", base_url, args.page.path());
    if args.no_open {
        info!("Client view: {}", url);
    } else if let Err(e) = open_client_view(&url) {
        error!("Could not open a client view: {}", e);
        info!("Open {} manually", url);
    }

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(LaunchError::Wait)?;
            info!("Server exited: {}", status);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping server");
            child.kill().await.map_err(LaunchError::Wait)?;
        }
    }
    Ok(())
}

fn spawn_server(port: u16) -> Result<Child, LaunchError> {
    let exe = env::current_exe().map_err(LaunchError::CurrentExe)?;
    info!("Starting signaling server: {} server --port {}", exe.display(), port);

    Command::new(exe)
        .arg("server")
        .arg("--port")
        .arg(port.to_string())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(LaunchError::Spawn)
}

/// Probe `GET {base_url}/health` until it answers.
///
/// `exited` is checked before every probe so a server that dies during startup
/// fails fast instead of running out the clock.
pub async fn wait_until_ready<F>(
    base_url: &str,
    ready_timeout: Duration,
    mut exited: F,
) -> Result<Health, LaunchError>
where
    F: FnMut() -> io::Result<Option<ExitStatus>>,
{
    let client = reqwest::Client::new();
    let url = format!("{}/health", base_url);
    let deadline = Instant::now() + ready_timeout;

    loop {
        if let Some(status) = exited().map_err(LaunchError::Wait)? {
            return Err(LaunchError::Exited(status));
        }

        match probe(&client, &url).await {
            Ok(health) => return Ok(health),
            Err(e) => debug!("Server not ready yet: {}", e),
        }

        if Instant::now() >= deadline {
            return Err(LaunchError::Timeout(ready_timeout));
        }
        sleep(PROBE_INTERVAL).await;
    }
}

async fn probe(client: &reqwest::Client, url: &str) -> Result<Health, reqwest::Error> {
    client
        .get(url)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

fn open_client_view(url: &str) -> io::Result<()> {
    let mut command = if cfg!(target_os = "windows") {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else {
        std::process::Command::new("xdg-open")
    };

    command
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}
