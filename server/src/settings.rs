use clap::Parser;
use std::time::Duration;

/// Relay configuration, from flags or the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "whiteboard-server", about = "Relay for a shared drawing surface")]
pub struct Settings {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Seconds between pings sent to each participant.
    #[arg(long, default_value_t = 5)]
    pub heartbeat_interval: u64,

    /// Seconds of silence after which a participant is dropped.
    #[arg(long, default_value_t = 10)]
    pub client_timeout: u64,

    /// Largest accepted WebSocket frame, in bytes. Every snapshot is one frame.
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    pub max_frame_size: usize,

    /// Participants admitted at once; further connections are refused.
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 1024)]
    pub max_connections: usize,
}

impl Settings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reads_flags() {
        let settings = Settings::parse_from([
            "whiteboard-server",
            "--port",
            "9000",
            "--client-timeout",
            "30",
        ]);
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.client_timeout(), Duration::from_secs(30));
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(5));
        assert_eq!(settings.max_connections, 1024);
    }
}
