pub mod commands;

pub use commands::{Cli, Commands};

use anyhow::Context;
use console::style;
use dialoguer::{theme::ColorfulTheme, Select};
use lwshell::models::{ConnectOptions, HostRecord};
use lwshell::services::config_service::{group_hosts, ConfigService};
use lwshell::services::launcher;
use lwshell::services::session_runner::{SessionRunner, EXIT_FAILURE, EXIT_OK};
use lwshell::utils::terminal;

/// Dispatch a parsed command line and return the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = match &cli.config_dir {
        Some(dir) => ConfigService::with_dir(dir.clone())?,
        None => ConfigService::new()?,
    };

    if let Some(id) = cli.connect_id {
        return Ok(connect(config, &id, ConnectOptions::new()).await);
    }

    match cli.command {
        Some(Commands::Connect { id, key, title }) => {
            let mut options = ConnectOptions::new();
            if let Some(key) = key {
                options = options.with_key_path(key);
            }
            if let Some(title) = title {
                options = options.with_window_title(title);
            }
            Ok(connect(config, &id, options).await)
        }
        Some(Commands::List) => {
            print_hosts(&config.load_hosts()?);
            Ok(EXIT_OK as u8)
        }
        Some(Commands::Add {
            name,
            host,
            port,
            user,
            password,
            key,
            group,
        }) => {
            let mut record = HostRecord::new(name, host, user).with_port(i64::from(port));
            record.password = password;
            record.key_path = key;
            record.group = group;

            let id = config.add_host(record)?;
            println!("{} host {}", style("Added").green(), style(&id).bold());
            Ok(EXIT_OK as u8)
        }
        Some(Commands::Remove { id }) => {
            if config.remove_host(&id)? {
                println!("{} host {}", style("Removed").green(), id);
                Ok(EXIT_OK as u8)
            } else {
                eprintln!("server not found: {}", id);
                Ok(EXIT_FAILURE as u8)
            }
        }
        Some(Commands::Export { output }) => {
            let json = config.export_hosts()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("{} hosts to {}", style("Exported").green(), path.display());
                }
                None => println!("{}", json),
            }
            Ok(EXIT_OK as u8)
        }
        Some(Commands::Import { file, replace }) => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let records = ConfigService::parse_export(&content)?;
            let total = config.import_hosts(records, replace)?;
            println!("{} hosts, {} saved", style("Imported").green(), total);
            Ok(EXIT_OK as u8)
        }
        Some(Commands::Open { id }) => {
            if config.find_host(&id)?.is_none() {
                eprintln!("server not found: {}", id);
                return Ok(EXIT_FAILURE as u8);
            }
            launcher::open_in_new_terminal(&id)?;
            Ok(EXIT_OK as u8)
        }
        None => run_picker(config).await,
    }
}

async fn connect(config: ConfigService, id: &str, options: ConnectOptions) -> u8 {
    let runner = match SessionRunner::from_config(config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_FAILURE as u8;
        }
    };
    runner.run_interactive_session(id, options).await as u8
}

/// Let the user pick a host when invoked without arguments.
async fn run_picker(config: ConfigService) -> anyhow::Result<u8> {
    let hosts = config.load_hosts()?;

    if !terminal::stdin_is_terminal() {
        print_hosts(&hosts);
        return Ok(EXIT_OK as u8);
    }
    if hosts.is_empty() {
        println!("No hosts saved. Add one with `lwshell add`.");
        return Ok(EXIT_OK as u8);
    }

    let items: Vec<String> = hosts.iter().map(host_line).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Connect to")
        .items(&items)
        .default(0)
        .interact_opt()?;

    match selection {
        Some(index) => Ok(connect(config, &hosts[index].id, ConnectOptions::new()).await),
        None => Ok(EXIT_OK as u8),
    }
}

fn host_line(record: &HostRecord) -> String {
    let port = record
        .effective_port()
        .map(|p| p.to_string())
        .unwrap_or_else(|_| record.port.to_string());
    format!(
        "[{}] {} - {}@{}:{}",
        record.id, record.name, record.user, record.host, port
    )
}

fn print_hosts(hosts: &[HostRecord]) {
    if hosts.is_empty() {
        println!("No hosts saved.");
        return;
    }
    for group in group_hosts(hosts) {
        println!("{}", style(&group.name).bold().underlined());
        for record in &group.servers {
            println!("  {}", host_line(record));
        }
    }
}
