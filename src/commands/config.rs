use colored::*;
use eyre::Result;

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;

pub fn run(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), config),
    }
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "Notifier Configuration".bold());
            println!();

            println!("{}:", "collector".cyan());
            println!("  host: {}", config.collector.host);
            println!("  port: {}", config.collector.port);
            println!();

            println!("{}:", "record".cyan());
            println!("  logger_name: {}", config.record.logger_name);
            println!("  message_type: {}", config.record.message_type);
            println!(
                "  source_tag: {}",
                config.record.source_tag.as_deref().unwrap_or("(builder source file)")
            );
            println!("  tags: [{}]", config.record.tags.join(", "));
            println!("  append_newline: {}", config.record.append_newline);
            println!();

            println!("{}:", "filter".cyan());
            println!("  events: {}", config.effective_events().join(", "));
            println!("  processes: {}", config.filter.processes.as_deref().unwrap_or("*"));
            println!("  groups: {}", config.filter.groups.as_deref().unwrap_or("*"));
            println!();

            println!("{}: {}", "capture_output".cyan(), config.capture_output);
            println!("{}: [{}]", "include".cyan(), config.include.join(", "));
            println!("{}: {}", "log_level".cyan(), config.log_level.as_filter());
            if let Some(ref path) = config.log_file {
                println!("{}: {}", "log_file".cyan(), path.display());
            }
        }
    }

    Ok(())
}
