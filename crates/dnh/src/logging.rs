// ── Tracing setup ──

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Default filter for a `-v` count. Hub events log under the `dnh`
/// target, which stays at info even when quiet.
fn default_filter(verbosity: u8, config_verbose: bool) -> &'static str {
    match verbosity {
        0 if config_verbose => "debug",
        0 => "warn,dnh=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the flags.
///
/// Keep the returned guard alive for as long as the log file should be
/// written.
pub fn init_tracing(
    verbosity: u8,
    config_verbose: bool,
    json: bool,
    log_file: Option<&Path>,
) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity, config_verbose)));

    let stderr: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file, guard) = match log_file.and_then(split_log_path) {
        Some((dir, name)) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .with(filter)
        .try_init()
    {
        eprintln!("tracing already initialised: {e}");
    }
    guard
}

fn split_log_path(path: &Path) -> Option<(&Path, &std::ffi::OsStr)> {
    let name = path.file_name()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Some((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_filters() {
        assert_eq!(default_filter(0, false), "warn,dnh=info");
        assert_eq!(default_filter(0, true), "debug");
        assert_eq!(default_filter(1, true), "info");
        assert_eq!(default_filter(3, false), "trace");
    }

    #[test]
    fn log_path_without_directory_uses_cwd() {
        let (dir, name) = split_log_path(Path::new("hub.log")).unwrap_or_else(|| unreachable!());
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "hub.log");
    }
}
