//! Subcommand handlers.

pub mod config_cmd;
pub mod run;

use std::net::IpAddr;

use dnh_config::Config;

use crate::cli::RunArgs;

/// Layer `dnh run` flags over the loaded config.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(port) = args.ws_port {
        config.ws_port = port;
    }
    if let Some(secs) = args.ping_interval {
        config.ping_interval_secs = secs;
    }
}

/// Loopback or unspecified binds are the common cases; anything else is
/// worth a mention in the startup log.
pub fn is_local(bind: IpAddr) -> bool {
    bind.is_loopback() || bind.is_unspecified()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_loaded_values() {
        let mut config = Config::default();
        let args = RunArgs {
            bind: Some(IpAddr::from([127, 0, 0, 1])),
            http_port: None,
            ws_port: Some(9001),
            ping_interval: Some(0),
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.ws_addr().to_string(), "127.0.0.1:9001");
        assert_eq!(config.http_port, 5700);
        assert_eq!(config.ping_interval_secs, 0);
        assert!(is_local(config.bind));
    }
}
