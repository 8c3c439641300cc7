use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use energy_monitor::{models::*, services::ConfigService, EnergyMonitor, MonitorError};
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "energy-monitor")]
#[command(about = "Per-appliance electricity monitoring, billing and forecasting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding config.json and the CSV ledgers
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbose output (written to debug.log)
    #[arg(short, long)]
    verbose: bool,

    /// Show version and build information
    #[arg(long)]
    about: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor appliances for a while, then record the session
    Monitor {
        /// Appliance to monitor (repeatable)
        #[arg(short, long)]
        appliance: Vec<String>,
        /// Monitor every known appliance
        #[arg(long)]
        all: bool,
        /// How long to monitor before stopping
        #[arg(short, long, default_value = "10")]
        seconds: u64,
    },
    /// Show the current daily records
    Records,
    /// Show archived records
    Archive,
    /// Forecast consumption with exponential smoothing
    Forecast {
        #[arg(long, value_enum, default_value = "day")]
        horizon: Horizon,
    },
    /// Show the monthly bill
    Bill,
    /// Archive the daily records and start over
    Reset,
    /// Configure the monitor
    Config {
        /// Set the rate per kWh
        #[arg(long)]
        rate: Option<f64>,
        /// Set the alert threshold in kW
        #[arg(long)]
        threshold: Option<f64>,
        /// Set the sampling interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Horizon {
    Day,
    Month,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.about {
        show_about();
        return Ok(());
    }

    if cli.verbose {
        use std::fs::OpenOptions;
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open("debug.log")?;

        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .target(env_logger::Target::Pipe(Box::new(log_file)))
            .init();
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("energy-monitor")
    });
    std::fs::create_dir_all(&data_dir)?;
    debug!("Using data directory {}", data_dir.display());

    let config_service = FileConfigService::new(&data_dir);

    match cli.command {
        Some(Commands::Config {
            rate,
            threshold,
            interval_ms,
        }) => configure_monitor(&config_service, rate, threshold, interval_ms)?,
        Some(Commands::Monitor {
            appliance,
            all,
            seconds,
        }) => {
            let appliances = if all {
                Appliance::ALL.to_vec()
            } else {
                appliance
                    .iter()
                    .map(|name| name.parse::<Appliance>())
                    .collect::<Result<Vec<_>, _>>()?
            };
            if appliances.is_empty() {
                bail!("Name at least one --appliance, or pass --all");
            }
            let monitor = open_monitor(&data_dir, &config_service).await?;
            run_monitor(&monitor, &appliances, Duration::from_secs(seconds)).await?;
        }
        Some(Commands::Records) | None => {
            let monitor = open_monitor(&data_dir, &config_service).await?;
            match monitor.daily_records().await {
                Some(records) => print_records("Daily Records", &records),
                None => println!("📝 No data available."),
            }
        }
        Some(Commands::Archive) => {
            let monitor = open_monitor(&data_dir, &config_service).await?;
            match monitor.archived_records().await? {
                Some(records) => print_records("Archived Records", &records),
                None => println!("📝 No archived data available."),
            }
        }
        Some(Commands::Forecast { horizon }) => {
            let monitor = open_monitor(&data_dir, &config_service).await?;
            show_forecast(&monitor, horizon).await?;
        }
        Some(Commands::Bill) => {
            let monitor = open_monitor(&data_dir, &config_service).await?;
            match monitor.monthly_bill().await {
                Some(bill) => print_bill(&bill),
                None => println!("📝 No data available."),
            }
        }
        Some(Commands::Reset) => {
            let monitor = open_monitor(&data_dir, &config_service).await?;
            let archived = monitor.reset_data().await?;
            println!("✅ Data has been reset ({archived} records archived).");
        }
    }

    Ok(())
}

async fn open_monitor(
    data_dir: &Path,
    config_service: &FileConfigService,
) -> Result<EnergyMonitor> {
    let config = config_service.load_or_create()?;
    Ok(EnergyMonitor::open(data_dir, config).await?)
}

async fn run_monitor(
    monitor: &EnergyMonitor,
    appliances: &[Appliance],
    duration: Duration,
) -> Result<()> {
    let controller = monitor.controller();
    for appliance in appliances {
        controller.start(*appliance).await?;
        println!(
            "▶️  {} {}",
            SessionStatus::MonitoringStarted.message(),
            appliance.to_string().bright_white()
        );
    }

    let mut alerts = monitor.subscribe_alerts();
    let mut ticker = tokio::time::interval(monitor.config().sample_interval());
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("⏹️  Interrupted, stopping sessions");
                break;
            }
            Ok(alert) = alerts.recv() => {
                println!(
                    "{} {} reached {:.2} kW (threshold {:.2} kW)",
                    "⚠️  ALERT".bright_red().bold(),
                    alert.appliance,
                    alert.running_total_kw,
                    alert.threshold_kw
                );
            }
            _ = ticker.tick() => {
                for appliance in appliances {
                    let sample = controller.store().latest_sample(*appliance);
                    println!(
                        "  {:<16} {:>6.3} kW  (total {:>7.3} kW)  {}",
                        appliance.name(),
                        sample.consumption,
                        controller.store().running_total(*appliance),
                        humantime::format_rfc3339_seconds(sample.timestamp.into())
                    );
                }
            }
        }
    }

    let mut records = Vec::new();
    for appliance in appliances {
        if let Some(record) = controller.stop(*appliance).await? {
            records.push(record);
        }
    }
    println!("⏹️  {}", SessionStatus::MonitoringStopped.message());
    if !records.is_empty() {
        print_records("Recorded Sessions", &records);
    }
    Ok(())
}

async fn show_forecast(monitor: &EnergyMonitor, horizon: Horizon) -> Result<()> {
    let (label, result) = match horizon {
        Horizon::Day => ("next day", monitor.forecast_next_day().await),
        Horizon::Month => ("next 30 days", monitor.forecast_next_month().await),
    };

    match result {
        Ok(forecast) => {
            println!("{}", format!("🔮 Forecast for the {label}:").bright_cyan().bold());
            println!("  Consumption: {:.3} kW", forecast.forecast_consumption);
            println!("  Cost: {:.2} INR", forecast.forecast_cost);
            Ok(())
        }
        Err(e @ (MonitorError::InsufficientData { .. } | MonitorError::PredictionError(_))) => {
            println!("❌ {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_records(title: &str, records: &[DailyRecord]) {
    println!("{}", format!("📊 {title} ({} rows):", records.len()).bright_yellow().bold());
    println!(
        "  {:<10}  {:<8}  {:<16}  {:>12}  {:>10}  {:>10}",
        "Date", "Time", "Appliance", "Consumption", "Cost", "Seconds"
    );
    for record in records {
        println!(
            "  {:<10}  {:<8}  {:<16}  {:>9.3} kW  {:>10.2}  {:>10.1}",
            record.date,
            record.time.format("%H:%M:%S"),
            record.appliance.name(),
            record.total_consumption_kw,
            record.cost,
            record.total_time_seconds
        );
    }
}

fn print_bill(bill: &MonthlyBill) {
    println!("{}", format!("🧾 Monthly Bill ({})", bill.current_date).bright_yellow().bold());
    println!(
        "  {:<16}  {:>12}  {:>10}  {:>10}  {:>12}",
        "Appliance", "Consumption", "Cost", "Seconds", "Average"
    );
    for line in &bill.lines {
        println!(
            "  {:<16}  {:>9.3} kW  {:>10.2}  {:>10.1}  {:>9.3} kW",
            line.appliance.name(),
            line.total_consumption_kw,
            line.cost,
            line.total_time_seconds,
            line.average_consumption_kw
        );
    }
    println!(
        "  {:<16}  {:>9.3} kW  {:>10.2}  {:>10.1}  {:>9.3} kW",
        "Total",
        bill.total_consumption_kw,
        bill.total_cost,
        bill.total_time_seconds,
        bill.average_consumption_kw
    );
}

fn configure_monitor(
    config_service: &FileConfigService,
    rate: Option<f64>,
    threshold: Option<f64>,
    interval_ms: Option<u64>,
) -> Result<()> {
    let mut config = config_service.load_or_create()?;

    if let Some(rate) = rate {
        config.rate_per_kwh = rate;
        println!("✅ Set rate to: {rate:.2} per kWh");
    }
    if let Some(threshold) = threshold {
        config.alert_threshold_kw = threshold;
        println!("✅ Set alert threshold to: {threshold:.2} kW");
    }
    if let Some(interval_ms) = interval_ms {
        config.sample_interval_ms = interval_ms;
        println!("✅ Set sampling interval to: {interval_ms} ms");
    }

    config_service.save_config(&config)?;
    println!("💾 Saved {}", config_service.get_config_path()?.display());
    Ok(())
}

fn show_about() {
    println!("{}", "⚡ Appliance Energy Monitor".bright_cyan().bold());
    println!();
    println!("{}", "📋 Version Information:".bright_yellow().bold());
    println!("  Version: {}", env!("CARGO_PKG_VERSION").bright_green());
    println!("  Built: {}", env!("ENERGY_MONITOR_BUILD_TIME"));
    println!("  Build ID: {}", env!("ENERGY_MONITOR_BUILD_ID"));
    println!("  Commit: {}", env!("ENERGY_MONITOR_GIT_HASH"));
    println!();
    println!("{}", "💡 Usage:".bright_green().bold());
    println!("  energy-monitor monitor --appliance AirConditioner --seconds 30");
    println!("  energy-monitor forecast --horizon month");
    println!("  energy-monitor bill");
}
