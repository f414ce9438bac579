use clap::{Args, Parser, Subcommand};
use opskit::core::config::ConfigManager;
use opskit::core::files::{read_by_extension, read_file, write_by_extension};
use opskit::core::logging::{init_logger, Logger};
use opskit::core::operator::{Operator, SystemOperator};
use opskit::modules::mail::Mail;
use opskit::modules::network_tools::{interface_names, ProbeConfig, Prober, ResultTable, StatusSummary};
use opskit::{log_info, log_warning};
use serde_json::json;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Administrative helpers: parallel ping probes and local mail delivery
#[derive(Parser, Debug)]
#[command(name = "opskit", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML or JSON configuration file
    #[arg(short = 'f', long, default_value = "opskit.yaml", env = "OPSKIT_CONFIG", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ping hosts in parallel and print the results as JSON
    Ping(PingArgs),
    /// Print the up/down summary of a saved result file
    Status {
        /// Result file written by `ping --save`
        file: String,
    },
    /// Mail the content of a text file through the configured SMTP server
    Mail(MailArgs),
}

#[derive(Args, Debug)]
struct PingArgs {
    /// Hosts or IP addresses to probe
    #[arg(required = true)]
    hosts: Vec<String>,

    /// Use ping6
    #[arg(short = '6', long)]
    six: bool,

    /// Network interface to send pings from
    #[arg(short = 'I', long)]
    interface: Option<String>,

    /// Echo requests per host
    #[arg(short = 'c', long, allow_negative_numbers = true)]
    count: Option<i64>,

    /// Maximum number of hosts probed at the same time
    #[arg(short = 'w', long, allow_negative_numbers = true)]
    workers: Option<i64>,

    /// Number of probe rounds; results accumulate across rounds
    #[arg(long, default_value_t = 1)]
    rounds: u32,

    /// Seconds to wait between rounds
    #[arg(long, default_value_t = 10)]
    interval: u64,

    /// Save the result table (YAML for .yaml/.yml, JSON otherwise)
    #[arg(long)]
    save: Option<String>,

    /// Mail the results to these addresses
    #[arg(long)]
    mail_to: Vec<String>,
}

#[derive(Args, Debug)]
struct MailArgs {
    /// Recipients
    #[arg(long, required = true)]
    to: Vec<String>,

    #[arg(long)]
    cc: Vec<String>,

    #[arg(long)]
    bcc: Vec<String>,

    #[arg(short, long)]
    subject: Option<String>,

    /// Text file used as the mail body
    file: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let manager = ConfigManager::new(&cli.config)?;
    let config = manager.get().clone();

    let new_logger = || {
        Logger::new(
            config.logging.file_path.as_deref(),
            config.logging.console_output,
            config.logging.log_level(),
        )
    };
    init_logger(new_logger());
    log_info!("main", "using config {}", manager.path().display());

    match cli.command {
        Command::Ping(args) => {
            let operator: Arc<dyn Operator> = Arc::new(SystemOperator::new(new_logger(), "ping"));
            run_ping(args, &config, operator)
        }
        Command::Status { file } => {
            let results: ResultTable =
                read_by_extension(&file)?.ok_or_else(|| format!("no results in {}", file))?;
            let summary = StatusSummary::from_results(&results)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Mail(args) => {
            let operator: Arc<dyn Operator> = Arc::new(SystemOperator::new(new_logger(), "mail"));
            let body = read_file(&args.file)?.ok_or_else(|| format!("{} is missing or empty", args.file))?;

            let mut mail = Mail::new(
                operator,
                &args.to,
                &config.mail.sender,
                args.subject.as_deref().or(config.mail.subject.as_deref()),
                &args.cc,
                &args.bcc,
            )?;
            mail.add_text(&body);
            mail.send(&config.mail)?;
            Ok(())
        }
    }
}

fn run_ping(
    args: PingArgs,
    config: &opskit::core::AppConfig,
    operator: Arc<dyn Operator>,
) -> Result<(), Box<dyn std::error::Error>> {
    let interface = args.interface.or_else(|| config.ping.interface.clone());
    if let Some(ref name) = interface {
        if !interface_names().iter().any(|known| known == name) {
            log_warning!("main", "network interface {} not found on this machine", name);
        }
    }

    let probe_config = ProbeConfig::new(
        args.six || config.ping.six,
        interface,
        args.count.unwrap_or(config.ping.count),
        args.workers.unwrap_or(config.ping.max_pool_size),
    );
    let prober = Prober::new(Arc::clone(&operator), probe_config);

    // SIGINT only ends the run between rounds
    let stop = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&stop))?;

    let rounds = args.rounds.max(1);
    for round in 1..=rounds {
        log_info!("main", "probe round {}/{}: {} hosts", round, rounds, args.hosts.len());
        prober.probe(&args.hosts);

        if round == rounds || !wait_for(Duration::from_secs(args.interval), &stop) {
            break;
        }
    }

    let results = prober.results();
    let status = prober.status()?;
    let report = json!({ "status": status, "results": results });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = args.save {
        match write_by_extension(&path, &results)? {
            Some(_) => log_info!("main", "results saved to {}", path),
            None => log_warning!("main", "results not saved: directory of {} missing", path),
        }
    }

    if !args.mail_to.is_empty() {
        let subject = format!("ping: {}/{} hosts up", status.up, status.num);
        let mut mail = Mail::new(operator, &args.mail_to, &config.mail.sender, Some(subject.as_str()), &[], &[])?;
        mail.add_value(&json!(status));
        mail.add_value(&json!(results));
        mail.send(&config.mail)?;
    }

    Ok(())
}

/// Sleeps for `duration` unless `stop` is raised first. Returns `false` if
/// the wait was interrupted.
fn wait_for(duration: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        thread::sleep(Duration::from_millis(100));
    }
    !stop.load(Ordering::Relaxed)
}
