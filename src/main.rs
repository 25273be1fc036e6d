use clap::Parser;
use std::collections::BTreeMap;
use std::process;

use anta::checks;
use anta::config::cli::{
    exit_code, parse_version, CatalogArgs, CheckCommand, Cli, Command, DebugCommand, ExitCode, GetCommand, GroupBy,
    InventoryArgs, NrfuArgs, OfmtArg, ReportCommand,
};
use anta::core::runner;
use anta::reporter::{csv_reporter, json, md_reporter, table, text};
use anta::utils::error::{AntaError, Result};
use anta::utils::monitor::SystemMonitor;
use anta::utils::{logger, validation::Validate};
use anta::{
    AntaCatalog, AntaCommand, AntaDevice, AntaInventory, DeviceOptions, ResultManager, RunOptions, RunSettings,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日誌
    if let Err(e) = logger::init_cli_logger(&cli.log_level, cli.log_file.as_deref()) {
        eprintln!("❌ {}", e.user_friendly_message());
        process::exit(ExitCode::UsageError.code());
    }

    let code = match cli.command {
        Command::Nrfu(args) => nrfu(args).await,
        Command::Check(CheckCommand::Catalog(args)) => check_catalog(&args),
        Command::Get(command) => get(command).await,
        Command::Debug(DebugCommand::RunCmd {
            inventory,
            device,
            command,
            ofmt,
            version,
            revision,
        }) => run_cmd(&inventory, &device, &command, ofmt, &version, revision).await,
    };
    process::exit(code.code());
}

/// 輸入錯誤：記錄詳細原因與建議，回傳 usage 退出碼
fn usage_error(context: &str, e: &AntaError) -> ExitCode {
    tracing::error!("❌ {}: {} (Category: {:?})", context, e, e.category());
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    ExitCode::UsageError
}

fn load_settings(args: &NrfuArgs) -> Result<RunSettings> {
    match &args.settings {
        Some(path) => RunSettings::from_file(path),
        None => Ok(RunSettings::default()),
    }
}

fn load_inventory(args: &InventoryArgs, settings: &RunSettings) -> Result<AntaInventory> {
    args.validate()?;
    let mut defaults = DeviceOptions::new("", "", "");
    settings.apply_to(&mut defaults);
    let defaults = args.device_options(defaults);
    AntaInventory::parse(&args.inventory, &defaults)
}

async fn nrfu(args: NrfuArgs) -> ExitCode {
    if let Err(e) = args.validate() {
        return usage_error("Invalid arguments", &e);
    }
    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => return usage_error("Unable to load settings", &e),
    };
    let inventory = match load_inventory(&args.inventory, &settings) {
        Ok(inventory) => inventory,
        Err(e) => return usage_error("Unable to load inventory", &e),
    };
    let mut catalog = match AntaCatalog::parse(&args.catalog.catalog) {
        Ok(catalog) => catalog,
        Err(e) => return usage_error("Unable to load catalog", &e),
    };

    let monitor = SystemMonitor::new(args.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }
    monitor.log_stats("start");

    let options = RunOptions {
        devices: args.device_filter(),
        tests: args.test_filter(),
        tags: args.inventory.tag_filter(),
        established_only: true,
        dry_run: args.dry_run,
        max_concurrency: settings.max_concurrency(),
    };

    let mut manager = ResultManager::new();
    let selected = runner::main(&mut manager, &inventory, &mut catalog, &options, Some(&monitor)).await;
    monitor.log_stats("end");

    if args.dry_run {
        println!("Dry-run: {} test(s) would be run", selected);
        return ExitCode::Ok;
    }

    let displayed = manager.filter(&args.hidden());
    let default_report = ReportCommand::Table { group_by: None };
    let report = args.report.as_ref().unwrap_or(&default_report);
    if let Err(e) = print_report(&displayed, report, &options) {
        tracing::error!("❌ Unable to generate report: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        return ExitCode::InternalError;
    }

    exit_code(&manager, args.ignore_status, args.ignore_error)
}

fn print_report(manager: &ResultManager, report: &ReportCommand, options: &RunOptions) -> Result<()> {
    match report {
        ReportCommand::Table { group_by } => {
            let table = match group_by {
                None => table::report_all(manager, "All tests results"),
                Some(GroupBy::Device) => {
                    table::report_summary_devices(manager, options.devices.as_ref(), "Summary per device")
                }
                Some(GroupBy::Test) => {
                    table::report_summary_tests(manager, options.tests.as_ref(), "Summary per test")
                }
            };
            println!("{}", table.render());
            println!("{}", table::report_totals(manager).render());
        }
        ReportCommand::Json { output } => {
            let content = json::report_json(manager, output.as_deref())?;
            match output {
                Some(path) => println!("✅ JSON results saved to {}", path.display()),
                None => println!("{}", content),
            }
        }
        ReportCommand::Csv { csv_output } => {
            csv_reporter::generate(manager, csv_output)?;
            println!("✅ CSV report saved to {}", csv_output.display());
        }
        ReportCommand::MdReport { md_output } => {
            md_reporter::generate(manager, md_output)?;
            println!("✅ Markdown report saved to {}", md_output.display());
        }
        ReportCommand::Text => print!("{}", text::report_text(manager)),
    }
    Ok(())
}

fn check_catalog(args: &CatalogArgs) -> ExitCode {
    match AntaCatalog::parse(&args.catalog) {
        Ok(catalog) => {
            println!(
                "✅ Catalog {} is valid: {} test definition(s)",
                args.catalog.display(),
                catalog.len()
            );
            ExitCode::Ok
        }
        Err(e) => usage_error("Catalog is invalid", &e),
    }
}

async fn get(command: GetCommand) -> ExitCode {
    match command {
        GetCommand::Inventory { inventory, connected } => {
            let loaded = match load_inventory(&inventory, &RunSettings::default()) {
                Ok(loaded) => loaded,
                Err(e) => return usage_error("Unable to load inventory", &e),
            };
            if connected {
                loaded.connect_inventory().await;
            }
            let selected = loaded.get_inventory(connected, inventory.tag_filter().as_ref(), None);
            println!("Current inventory content is:");
            for device in selected.devices() {
                let tags: Vec<&str> = device.tags().iter().map(String::as_str).collect();
                let mut line = format!("  - {} (tags: {})", device.name(), tags.join(", "));
                if connected {
                    line.push_str(&format!(
                        " established: {} model: {}",
                        device.established(),
                        device.hw_model().unwrap_or_else(|| "unknown".to_string())
                    ));
                }
                println!("{}", line);
            }
            ExitCode::Ok
        }
        GetCommand::Tags { inventory } => {
            let loaded = match load_inventory(&inventory, &RunSettings::default()) {
                Ok(loaded) => loaded,
                Err(e) => return usage_error("Unable to load inventory", &e),
            };
            println!("Tags found:");
            for tag in loaded.tags() {
                println!("  - {}", tag);
            }
            ExitCode::Ok
        }
        GetCommand::Tests { module, test } => {
            let mut by_module: BTreeMap<&str, Vec<&checks::TestSpec>> = BTreeMap::new();
            for spec in checks::registry() {
                if !spec.module.starts_with(module.as_str()) {
                    continue;
                }
                if test.as_deref().is_some_and(|name| !spec.name.contains(name)) {
                    continue;
                }
                by_module.entry(spec.module).or_default().push(spec);
            }
            if by_module.is_empty() {
                eprintln!("❌ No test found in '{}'", module);
                return ExitCode::UsageError;
            }
            for (module, specs) in by_module {
                println!("{}:", module);
                for spec in specs {
                    println!("  - {}:", spec.name);
                    println!("      # {}", spec.description);
                }
            }
            ExitCode::Ok
        }
    }
}

async fn run_cmd(
    inventory: &InventoryArgs,
    device: &str,
    command: &str,
    ofmt: OfmtArg,
    version: &str,
    revision: Option<u8>,
) -> ExitCode {
    let loaded = match load_inventory(inventory, &RunSettings::default()) {
        Ok(loaded) => loaded,
        Err(e) => return usage_error("Unable to load inventory", &e),
    };
    let Some(target) = loaded.get(device) else {
        eprintln!("❌ Device {} does not exist in Inventory", device);
        return ExitCode::UsageError;
    };
    let version = match parse_version(version) {
        Ok(version) => version,
        Err(e) => return usage_error("Invalid arguments", &e),
    };

    let mut cmd = AntaCommand::new(command)
        .with_ofmt(ofmt.into())
        .with_version(version)
        .with_cache(false);
    if let Some(revision) = revision {
        cmd = cmd.with_revision(revision);
    }

    tracing::info!("Sending {} command to device {}", ofmt_label(ofmt), target.name());
    target.collect(&mut cmd).await;

    if cmd.error() {
        eprintln!("❌ Command '{}' failed on {}: {}", cmd.command, target.name(), cmd.errors.join(", "));
        return ExitCode::InternalError;
    }
    match (&cmd.output, ofmt) {
        (Some(serde_json::Value::String(output)), OfmtArg::Text) => println!("{}", output),
        (Some(output), _) => match serde_json::to_string_pretty(output) {
            Ok(pretty) => println!("{}", pretty),
            Err(e) => {
                eprintln!("❌ {}", e);
                return ExitCode::InternalError;
            }
        },
        (None, _) => println!("(no output)"),
    }
    ExitCode::Ok
}

fn ofmt_label(ofmt: OfmtArg) -> &'static str {
    match ofmt {
        OfmtArg::Json => "JSON",
        OfmtArg::Text => "text",
    }
}
