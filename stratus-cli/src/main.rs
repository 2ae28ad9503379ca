use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use stratus_aws::cfn::{STACK_NAME_PREFIX, StackClient};
use stratus_aws::{HttpProbe, ObjectClient, SnapshotClient, load_aws_config};
use stratus_core::config::ImageBuildConfig;
use stratus_core::validation::{FailureLevel, ValidationReport};

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Cluster provisioning configuration validator and stack manager", long_about = None)]
struct Cli {
    /// AWS region override
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "config.yaml")]
        file: PathBuf,
    },
    /// Stack lifecycle commands
    Stack {
        #[command(subcommand)]
        command: StackCommands,
    },
}

#[derive(Subcommand)]
enum StackCommands {
    /// Create a stack from a local template or a template URL
    Create {
        /// Stack name (the managed prefix is added automatically)
        name: String,

        /// Path to a local template file
        #[arg(long, conflicts_with = "template_url")]
        template: Option<PathBuf>,

        /// URL of a template stored in S3
        #[arg(long)]
        template_url: Option<String>,

        /// Keep partially created resources when creation fails
        #[arg(long)]
        disable_rollback: bool,
    },
    /// Update a stack from a local template or a template URL
    Update {
        name: String,

        #[arg(long, conflicts_with = "template_url")]
        template: Option<PathBuf>,

        #[arg(long)]
        template_url: Option<String>,
    },
    /// Delete a stack
    Delete { name: String },
    /// Show the status of a stack
    Status { name: String },
    /// List stacks managed by this tool
    List {
        /// Match stacks by the managed name tag instead of the name prefix
        #[arg(long)]
        tagged: bool,
    },
    /// Print a stack's template body
    Template { name: String },
    /// Show one stack resource by logical id
    Resource { name: String, logical_id: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file, cli.region).await,
        Commands::Stack { command } => run_stack_command(command, cli.region).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_validate(file: &PathBuf, region: Option<String>) -> Result<(), String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;

    let config = ImageBuildConfig::from_yaml(&content).map_err(|e| e.to_string())?;

    println!("{}", "Validating...".cyan());

    let aws_config = load_aws_config(region).await;
    let snapshots = SnapshotClient::new(&aws_config);
    let objects = ObjectClient::new(&aws_config);
    let probe = HttpProbe::new();

    let report = config.validate(&snapshots, &objects, &probe).await;
    print_report(&report);

    if report.has_errors() {
        Err("Configuration is invalid".to_string())
    } else {
        println!("{}", "Configuration is valid.".green());
        Ok(())
    }
}

fn print_report(report: &ValidationReport) {
    for failure in report.by_severity() {
        let level = match failure.level {
            FailureLevel::Error => "ERROR".red().bold(),
            FailureLevel::Warning => "WARNING".yellow().bold(),
        };
        let fields: Vec<&str> = failure.params.iter().map(|p| p.name.as_str()).collect();
        if fields.is_empty() {
            println!("{} [{}] {}", level, failure.validator, failure.message);
        } else {
            println!(
                "{} [{}] {} ({})",
                level,
                failure.validator,
                failure.message,
                fields.join(", ")
            );
        }
    }
}

fn managed_stack_name(name: &str) -> String {
    if name.starts_with(STACK_NAME_PREFIX) {
        name.to_string()
    } else {
        format!("{STACK_NAME_PREFIX}{name}")
    }
}

fn name_tag(name: &str) -> Result<stratus_aws::cfn::StackTag, String> {
    Ok(stratus_aws::cfn::StackTag::builder()
        .key(stratus_aws::cfn::NAME_TAG_KEY)
        .value(name)
        .build())
}

async fn run_stack_command(command: StackCommands, region: Option<String>) -> Result<(), String> {
    let aws_config = load_aws_config(region).await;
    let client = StackClient::new(&aws_config);

    match command {
        StackCommands::Create {
            name,
            template,
            template_url,
            disable_rollback,
        } => {
            let stack_name = managed_stack_name(&name);
            let tags = vec![name_tag(&name)?];
            let stack_id = match (template, template_url) {
                (Some(path), None) => {
                    let body = fs::read_to_string(&path)
                        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
                    client
                        .create_stack(&stack_name, disable_rollback, tags, &body)
                        .await
                }
                (None, Some(url)) => {
                    client
                        .create_stack_from_url(&stack_name, disable_rollback, tags, &url)
                        .await
                }
                _ => return Err("Provide exactly one of --template or --template-url".to_string()),
            }
            .map_err(|e| e.to_string())?;
            println!("{} {}", "Created:".green(), stack_id);
            Ok(())
        }
        StackCommands::Update {
            name,
            template,
            template_url,
        } => {
            let stack_name = managed_stack_name(&name);
            match (template, template_url) {
                (Some(path), None) => {
                    let body = fs::read_to_string(&path)
                        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
                    client.update_stack(&stack_name, &body, Vec::new()).await
                }
                (None, Some(url)) => client.update_stack_from_url(&stack_name, &url, None).await,
                _ => return Err("Provide exactly one of --template or --template-url".to_string()),
            }
            .map_err(|e| e.to_string())?;
            println!("{} {}", "Update started:".green(), stack_name);
            Ok(())
        }
        StackCommands::Delete { name } => {
            let stack_name = managed_stack_name(&name);
            client
                .delete_stack(&stack_name)
                .await
                .map_err(|e| e.to_string())?;
            println!("{} {}", "Delete started:".green(), stack_name);
            Ok(())
        }
        StackCommands::Status { name } => {
            let stack_name = managed_stack_name(&name);
            let stack = client
                .describe_stack(&stack_name)
                .await
                .map_err(|e| e.to_string())?;
            println!(
                "{}: {}",
                stack.stack_name().unwrap_or("-"),
                stack.stack_status().map_or("-", |s| s.as_str())
            );
            Ok(())
        }
        StackCommands::List { tagged } => {
            let stacks = if tagged {
                client.list_tagged_stacks().await
            } else {
                client.list_stacks().await
            }
            .map_err(|e| e.to_string())?;
            if stacks.is_empty() {
                println!("No managed stacks found.");
            }
            for stack in stacks {
                println!(
                    "{}: {}",
                    stack.stack_name().unwrap_or("-"),
                    stack.stack_status().map_or("-", |s| s.as_str())
                );
            }
            Ok(())
        }
        StackCommands::Template { name } => {
            let stack_name = managed_stack_name(&name);
            let template = client
                .get_stack_template(&stack_name)
                .await
                .map_err(|e| e.to_string())?;
            println!("{template}");
            Ok(())
        }
        StackCommands::Resource { name, logical_id } => {
            let stack_name = managed_stack_name(&name);
            let detail = client
                .describe_stack_resource(&stack_name, &logical_id)
                .await
                .map_err(|e| e.to_string())?;
            println!(
                "{}: {} ({})",
                detail.logical_resource_id().unwrap_or("-"),
                detail.physical_resource_id().unwrap_or("-"),
                detail.resource_status().map_or("-", |s| s.as_str())
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_stack_name_adds_the_prefix_once() {
        assert_eq!(managed_stack_name("cluster-a"), "stratus-cluster-a");
        assert_eq!(managed_stack_name("stratus-cluster-a"), "stratus-cluster-a");
    }
}
