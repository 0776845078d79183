use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use convoy_engine::{
    ActionContext, Collaborators, RunOptions, StaticInventory, TracingReporter, default_project_path, load_project_file, plan_run,
    WavePlan, project_name, run_with_cancellation,
};
use convoy_types::{ActionKind, ProjectDefinition};

mod shell;

use shell::ShellAction;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("plan", sub)) => plan_cmd(sub),
        Some(("run", sub)) => run_cmd(sub).await,
        other => anyhow::bail!("unknown command: {other:?}"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter()).try_init();
}

/// Log filter from `RUST_LOG`, defaulting to `info`.
fn env_filter() -> EnvFilter {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    EnvFilter::new(directives)
}

fn build_cli() -> Command {
    let file = Arg::new("file")
        .long("file")
        .short('f')
        .action(ArgAction::Set)
        .help("Path to the project file (defaults to $CONVOY_PROJECT_FILE or ./convoy.yaml)");
    let action = Arg::new("action")
        .long("action")
        .short('a')
        .action(ArgAction::Set)
        .default_value("restart")
        .value_parser(["start", "stop", "restart"])
        .help("Lifecycle action to apply");
    let services = Arg::new("services")
        .action(ArgAction::Append)
        .num_args(0..)
        .help("Services to act on; all services when omitted");

    Command::new("convoy")
        .about("Apply lifecycle actions to services in dependency order")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("plan")
                .about("Print the execution waves as JSON")
                .arg(file.clone())
                .arg(action.clone())
                .arg(services.clone()),
        )
        .subcommand(
            Command::new("run")
                .about("Run the project's command for every selected instance")
                .arg(file)
                .arg(action)
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .action(ArgAction::Set)
                        .value_parser(clap::value_parser!(u64))
                        .help("Per-instance timeout in seconds"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print the commands that would run without executing them"),
                )
                .arg(services),
        )
}

fn load_project(matches: &ArgMatches) -> Result<ProjectDefinition> {
    let path = matches
        .get_one::<String>("file")
        .map(PathBuf::from)
        .unwrap_or_else(default_project_path);
    load_project_file(&path)
}

fn run_options(matches: &ArgMatches) -> Result<RunOptions> {
    let action: ActionKind = matches
        .get_one::<String>("action")
        .map(String::as_str)
        .unwrap_or("restart")
        .parse()
        .map_err(|error: String| anyhow!(error))?;
    let targets: Vec<String> = matches
        .get_many::<String>("services")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let mut options = RunOptions::new(action).with_targets(targets);
    if let Some(seconds) = matches.try_get_one::<u64>("timeout").ok().flatten() {
        options = options.with_timeout(Duration::from_secs(*seconds));
    }
    Ok(options)
}

fn plan_cmd(matches: &ArgMatches) -> Result<()> {
    let project = load_project(matches)?;
    let options = run_options(matches)?;
    let plan = plan_run(&project, &options)?;
    println!("{}", serde_json::to_string_pretty(&plan_output(&project, &plan))?);
    Ok(())
}

/// The wave plan plus the description of every scheduled service that has one.
fn plan_output(project: &ProjectDefinition, plan: &WavePlan) -> serde_json::Value {
    let descriptions: serde_json::Map<String, serde_json::Value> = plan
        .waves
        .iter()
        .flatten()
        .filter_map(|service| {
            let description = project.services.get(service)?.description.clone()?;
            Some((service.clone(), serde_json::Value::String(description)))
        })
        .collect();
    serde_json::json!({
        "direction": plan.direction,
        "waves": plan.waves,
        "descriptions": descriptions,
    })
}

async fn run_cmd(matches: &ArgMatches) -> Result<()> {
    let project = load_project(matches)?;
    let options = run_options(matches)?;
    let template = project
        .command_for(options.action)
        .with_context(|| format!("project defines no command for '{}'", options.action))?
        .to_string();
    let shell = ShellAction::new(template);
    let inventory = StaticInventory::from_project(project_name(&project), &project);

    if matches.get_flag("dry-run") {
        return print_dry_run(&project, &options, &shell, &inventory).await;
    }

    let collaborators = Collaborators::new(Arc::new(inventory), Arc::new(shell), Arc::new(TracingReporter));
    let cancellation = CancellationToken::new();
    let interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            interrupt.cancel();
        }
    });

    let report = run_with_cancellation(&project, &options, &collaborators, cancellation).await?;
    let (succeeded, failed) = report.tally();
    info!(succeeded, failed, "{} complete", options.action);
    report.into_result()?;
    Ok(())
}

async fn print_dry_run(project: &ProjectDefinition, options: &RunOptions, shell: &ShellAction, inventory: &StaticInventory) -> Result<()> {
    use convoy_engine::ResourceInventory;

    let plan = plan_run(project, options)?;
    let resources = inventory.list_resources().await?;
    let waves: Vec<serde_json::Value> = plan
        .waves
        .iter()
        .map(|wave| {
            let commands: Vec<String> = resources
                .iter()
                .filter(|resource| wave.contains(&resource.service))
                .map(|resource| {
                    let context = ActionContext::new(options.action, resource.service.clone(), options.timeout, CancellationToken::new());
                    shell.render(&context, resource)
                })
                .collect();
            serde_json::json!({ "services": wave, "commands": commands })
        })
        .collect();

    let out = serde_json::json!({
        "action": options.action,
        "direction": plan.direction,
        "waves": waves,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn run_arguments_map_to_options() {
        let matches = build_cli().get_matches_from(["convoy", "run", "--action", "stop", "--timeout", "5", "web", "db"]);
        let (_, sub) = matches.subcommand().expect("subcommand");
        let options = run_options(sub).expect("options");
        assert_eq!(options.action, ActionKind::Stop);
        assert_eq!(options.targets, vec!["web".to_string(), "db".to_string()]);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn log_filter_follows_rust_log() {
        use tracing::level_filters::LevelFilter;

        temp_env::with_var("RUST_LOG", Some("debug"), || {
            assert_eq!(env_filter().max_level_hint(), Some(LevelFilter::DEBUG));
        });
        temp_env::with_var("RUST_LOG", Some("warn"), || {
            assert_eq!(env_filter().max_level_hint(), Some(LevelFilter::WARN));
        });
        temp_env::with_var_unset("RUST_LOG", || {
            assert_eq!(env_filter().max_level_hint(), Some(LevelFilter::INFO));
        });
    }

    #[test]
    fn plan_output_includes_service_descriptions() {
        use convoy_types::{DependencyRule, ServiceDefinition};

        let project = ProjectDefinition::new("shop")
            .with_service(ServiceDefinition {
                description: Some("primary database".into()),
                ..ServiceDefinition::new("db")
            })
            .with_service(ServiceDefinition::new("web").depends_on("db", DependencyRule::restarting()));
        let plan = plan_run(&project, &RunOptions::new(ActionKind::Restart)).expect("plan");

        let output = plan_output(&project, &plan);
        assert_eq!(output["waves"], serde_json::json!([["db"], ["web"]]));
        assert_eq!(output["descriptions"], serde_json::json!({ "db": "primary database" }));
    }

    #[test]
    fn plan_arguments_default_to_restart_everything() {
        let matches = build_cli().get_matches_from(["convoy", "plan"]);
        let (_, sub) = matches.subcommand().expect("subcommand");
        let options = run_options(sub).expect("options");
        assert_eq!(options.action, ActionKind::Restart);
        assert!(options.targets.is_empty());
        assert_eq!(options.timeout, None);
    }
}
