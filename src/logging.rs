use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Maps `-q` / `-v` occurrences to a level:
/// quiet is `ERROR`, none is `INFO`, `-v` is `DEBUG`, `-vv` and up is `TRACE`.
pub fn level_for(verbosity: u64, quiet: bool) -> LevelFilter {
  if quiet {
    return LevelFilter::ERROR;
  }
  match verbosity {
    0 => LevelFilter::INFO,
    1 => LevelFilter::DEBUG,
    _ => LevelFilter::TRACE,
  }
}

/// Installs the global subscriber. Logs go to stderr so the run summary on
/// stdout stays machine-readable; `RUST_LOG` takes precedence over the flags.
pub fn init(verbosity: u64, quiet: bool) {
  let filter = EnvFilter::builder()
    .with_default_directive(level_for(verbosity, quiet).into())
    .from_env_lossy();

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn verbosity_levels() {
    assert_eq!(level_for(0, false), LevelFilter::INFO);
    assert_eq!(level_for(1, false), LevelFilter::DEBUG);
    assert_eq!(level_for(4, false), LevelFilter::TRACE);
    assert_eq!(level_for(3, true), LevelFilter::ERROR);
  }
}
