use std::{net::SocketAddr, path::PathBuf, process::ExitCode, time::Duration};

use clap::{Parser, Subcommand};
use tracing::error;
use wallet_loadgen::{
  engine::LoadTest,
  error::{LoadTestError, LoadTestResult},
  logging, probe,
  profile::{parse_duration, AmountRange, LoadTestConfig, Profile},
  stub::{self, StubConfig},
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  /// Increase log verbosity (-v debug, -vv trace)
  #[clap(short, long, global = true, parse(from_occurrences))]
  verbose: u64,

  /// Only log errors
  #[clap(short, long, global = true)]
  quiet: bool,

  #[clap(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run a load test against the wallet endpoint
  Run(RunArgs),

  /// List the built-in workload profiles
  Profiles,

  /// Serve a stub wallet endpoint for dry runs
  Stub(StubArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
  #[clap(short, long, value_enum, default_value = "load")]
  profile: Profile,

  #[clap(long, env = "WALLET_LOADGEN_BASE_URL")]
  base_url: Option<String>,

  /// Concurrent virtual users (profile default when omitted)
  #[clap(long)]
  vus: Option<usize>,

  /// Run duration, e.g. 5s or 1m
  #[clap(short, long, parse(try_from_str = parse_duration))]
  duration: Option<Duration>,

  /// Pause after each iteration
  #[clap(long, parse(try_from_str = parse_duration))]
  sleep: Option<Duration>,

  /// Latency bound for the response time check
  #[clap(long, parse(try_from_str = parse_duration))]
  max_latency: Option<Duration>,

  /// Per-request timeout
  #[clap(long, parse(try_from_str = parse_duration))]
  timeout: Option<Duration>,

  /// Time allowed for in-flight iterations after the run ends
  #[clap(long, parse(try_from_str = parse_duration))]
  graceful_stop: Option<Duration>,

  #[clap(long)]
  min_amount: Option<u64>,

  #[clap(long)]
  max_amount: Option<u64>,

  /// Seed for reproducible request sequences
  #[clap(long)]
  seed: Option<u64>,

  /// Read wallet balances back after the run
  #[clap(long)]
  probe_balances: bool,

  /// Write the run summary as JSON
  #[clap(long)]
  summary_export: Option<PathBuf>,

  /// Exit with an error if any check failed
  #[clap(long)]
  fail_on_checks: bool,
}

#[derive(Parser, Debug)]
struct StubArgs {
  #[clap(long, default_value = "127.0.0.1:8080")]
  listen: SocketAddr,

  /// Status returned for every wallet operation
  #[clap(long, default_value = "200")]
  status: u16,

  /// Artificial delay before each reply
  #[clap(long, default_value = "0ms", parse(try_from_str = parse_duration))]
  delay: Duration,
}

impl RunArgs {
  fn into_config(self) -> LoadTestResult<LoadTestConfig> {
    let mut config = LoadTestConfig::from_profile(self.profile).with_seed(self.seed);

    if let Some(base_url) = self.base_url {
      config = config.with_base_url(base_url);
    }
    if let Some(vus) = self.vus {
      config = config.with_vus(vus);
    }
    if let Some(duration) = self.duration {
      config = config.with_duration(duration);
    }
    if let Some(sleep) = self.sleep {
      config = config.with_sleep(sleep);
    }
    if let Some(max_latency) = self.max_latency {
      config = config.with_max_latency(max_latency);
    }
    if let Some(timeout) = self.timeout {
      config = config.with_request_timeout(timeout);
    }
    if let Some(graceful_stop) = self.graceful_stop {
      config = config.with_graceful_stop(graceful_stop);
    }
    if self.min_amount.is_some() || self.max_amount.is_some() {
      let min = self.min_amount.unwrap_or(config.amounts.min);
      let max = self.max_amount.unwrap_or(config.amounts.max);
      config = config.with_amounts(AmountRange::new(min, max)?);
    }

    Ok(config)
  }
}

async fn run(args: RunArgs) -> LoadTestResult<()> {
  let probe_balances = args.probe_balances;
  let summary_export = args.summary_export.clone();
  let fail_on_checks = args.fail_on_checks;

  let load_test = LoadTest::new(args.into_config()?)?;
  let mut summary = load_test.run().await?;

  if probe_balances {
    summary.balances = probe::probe_balances(load_test.client(), load_test.config()).await;
  }

  println!("{}", summary.render());

  if let Some(path) = summary_export {
    summary.export(&path)?;
  }

  let failed = summary.checks_failed();
  if fail_on_checks && failed > 0 {
    return Err(LoadTestError::ChecksFailed {
      failed,
      total: summary.checks_total(),
    });
  }
  Ok(())
}

fn list_profiles() {
  for profile in Profile::ALL {
    let settings = profile.settings();
    let wallets: Vec<String> = settings.wallets.ids().iter().map(|id| id.to_string()).collect();
    println!("{profile}: {}", settings.description);
    println!("  vus: {}", settings.vus);
    println!("  duration: {}s", settings.duration.as_secs_f64());
    println!("  amount: [{}, {}]", settings.amounts.min, settings.amounts.max);
    println!("  wallets: {}", wallets.join(", "));
  }
}

async fn serve_stub(args: StubArgs) -> LoadTestResult<()> {
  let config = StubConfig {
    status: args.status,
    delay: args.delay,
  };
  stub::serve(args.listen, config, async {
    let _ = tokio::signal::ctrl_c().await;
  })
  .await
}

#[tokio::main]
async fn main() -> ExitCode {
  let args = Args::parse();
  logging::init(args.verbose, args.quiet);

  let result = match args.command {
    Command::Run(run_args) => run(run_args).await,
    Command::Profiles => {
      list_profiles();
      Ok(())
    }
    Command::Stub(stub_args) => serve_stub(stub_args).await,
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!(error = %err, "wallet-loadgen failed");
      eprintln!("error: {err}");
      ExitCode::FAILURE
    }
  }
}
