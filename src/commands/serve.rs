use anyhow::Result;
use shelfd::config::Config;
use shelfd::daemon::{self, Daemon};

/// Run the daemon in the foreground
pub async fn serve(mut config: Config, listen: Option<String>) -> Result<()> {
    if let Some(listen) = listen {
        config.http.listen_addr = listen;
    }
    config.validate()?;

    if let Some(pid) = daemon::get_daemon_pid(&config.library.root) {
        anyhow::bail!("Daemon is already running (PID {})", pid);
    }

    let daemon = Daemon::start(config).await?;
    daemon.run().await
}
