use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use twincheck::model::{NewProject, Project, ProjectType, TestRecord};
use twincheck::provider::{
    DefinitionFile, ExecutionProvider, GenerationProvider, OutcomeFile, TemplateGenerator, Unavailable,
};
use twincheck::{AppConfig, RunReport, TestOrchestrator};

#[derive(Parser)]
#[command(
    name = "twincheck",
    about = "Behavioural equivalence testing between a legacy program and its rewrite",
    version,
    long_about = None
)]
struct Cli {
    /// Data directory (overrides the config file)
    #[arg(long, global = true, env = "TWINCHECK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to $TWINCHECK_CONFIG, then <data-dir>/twincheck.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON output for machine parsing
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Generate tests for a project
    Generate {
        project: String,

        /// Import definitions from a JSON file instead of the built-in templates
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Run every test of a project
    Run {
        project: String,

        /// JSON file with the outcomes reported by the test harness
        #[arg(long)]
        outcomes: PathBuf,
    },

    /// Run a single test
    RunOne {
        project: String,
        test: String,

        /// JSON file with the outcomes reported by the test harness
        #[arg(long)]
        outcomes: PathBuf,
    },

    /// Inspect or delete tests
    Tests {
        #[command(subcommand)]
        action: TestsAction,
    },

    /// Inspect or clear execution history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Register a project
    Add {
        #[arg(long)]
        name: String,

        /// Path to the legacy implementation
        #[arg(long)]
        legacy: String,

        /// Path to the new implementation
        #[arg(long = "new")]
        new_path: String,

        /// API, Web or Terminal
        #[arg(long = "type", default_value = "Terminal")]
        project_type: String,

        /// Register even if the paths do not exist
        #[arg(long)]
        skip_path_check: bool,
    },

    /// List all projects
    List,

    /// Most recently opened projects
    Recent {
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// Mark a project as opened and show it
    Open { project: String },

    /// Delete a project with its tests and history
    Delete { project: String },
}

#[derive(Subcommand)]
enum TestsAction {
    /// List test records
    List { project: String },

    /// Show a test with its generated code
    Show { project: String, test: String },

    /// Delete one test
    Delete { project: String, test: String },

    /// Delete all tests of a project
    Clear { project: String },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List executions, newest first
    List { project: String },

    /// Show an execution with the current test results
    Show { project: String, execution: String },

    /// Delete all executions of a project
    Clear { project: String },
}

fn init_tracing(cfg: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_tests(tests: &[TestRecord]) {
    if tests.is_empty() {
        println!("No tests found.");
        return;
    }
    println!("{:<28} | {:<8} | {:>8} | Name", "Id", "Status", "Time ms");
    println!("{:-<28}-|-{:-<8}-|-{:->8}-|-{:-<30}", "", "", "", "");
    for t in tests {
        let time = t.execution_time.map(|ms| ms.to_string()).unwrap_or_default();
        println!("{:<28} | {:<8} | {:>8} | {}", t.id, t.status, time, t.name);
    }
}

fn print_projects(list: &[Project], json: bool) -> Result<()> {
    if json {
        return print_json(list);
    }
    if list.is_empty() {
        println!("No projects found.");
        return Ok(());
    }
    println!("{:<36} | {:<20} | {:<8} | Last opened", "Id", "Name", "Type");
    println!("{:-<36}-|-{:-<20}-|-{:-<8}-|-{:-<20}", "", "", "", "");
    for p in list {
        let opened = p.last_opened.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".into());
        println!("{:<36} | {:<20} | {:<8} | {}", p.id, p.name, p.project_type, opened);
    }
    Ok(())
}

fn print_run(report: &RunReport, json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "tests": report.tests,
            "execution": report.execution,
            "error": report.failure.as_ref().map(|e| e.to_string()),
        }));
    }
    print_tests(&report.tests);
    if let Some(exec) = &report.execution {
        println!(
            "\nExecution {}: {} total, {} passed, {} failed, {} ms ({:?})",
            exec.id, exec.total_tests, exec.passed_tests, exec.failed_tests, exec.total_execution_time, exec.status
        );
    }
    if let Some(e) = &report.failure {
        println!("\nRun failed: {e}. Stored results were left unchanged.");
    }
    Ok(())
}

fn build(cfg: &AppConfig, generator: Arc<dyn GenerationProvider>, executor: Arc<dyn ExecutionProvider>) -> TestOrchestrator {
    twincheck::orchestrator(cfg, generator, executor)
}

fn offline(cfg: &AppConfig) -> TestOrchestrator {
    build(
        cfg,
        Arc::new(Unavailable::new("generation")),
        Arc::new(Unavailable::new("execution")),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::resolve(cli.config.as_deref(), cli.data_dir.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        cfg.storage.data_dir = dir.clone();
    }
    init_tracing(&cfg);
    tracing::debug!(data_dir = %cfg.storage.data_dir.display(), "configuration resolved");

    let json = cli.json;

    match cli.command {
        Commands::Project { action } => {
            let orch = offline(&cfg);
            let projects = &orch.storage().projects;
            match action {
                ProjectAction::Add {
                    name,
                    legacy,
                    new_path,
                    project_type,
                    skip_path_check,
                } => {
                    let project_type: ProjectType = project_type.parse()?;
                    let form = NewProject {
                        name,
                        legacy_path: legacy,
                        new_path,
                        project_type,
                    };
                    form.validate()?;
                    if !skip_path_check {
                        form.clone().into_project().validate_paths()?;
                    }
                    let project = projects.create(form).await?;
                    if json {
                        print_json(&project)?;
                    } else {
                        println!("Project '{}' added with id {}.", project.name, project.id);
                    }
                }
                ProjectAction::List => print_projects(&projects.list().await, json)?,
                ProjectAction::Recent { limit } => print_projects(&projects.recent(limit).await, json)?,
                ProjectAction::Open { project } => {
                    let Some(p) = projects.open(&project).await? else {
                        bail!("project {project} not found");
                    };
                    if json {
                        print_json(&p)?;
                    } else {
                        println!("{} ({})", p.name, p.project_type);
                        println!("  legacy: {}", p.legacy_path);
                        println!("  new:    {}", p.new_path);
                    }
                }
                ProjectAction::Delete { project } => {
                    if !orch.delete_project(&project).await? {
                        bail!("project {project} not found");
                    }
                    println!("Project {project} deleted.");
                }
            }
        }
        Commands::Generate { project, from } => {
            let generator: Arc<dyn GenerationProvider> = match from {
                Some(path) => Arc::new(DefinitionFile::new(path)),
                None => Arc::new(TemplateGenerator::new()),
            };
            let orch = build(&cfg, generator, Arc::new(Unavailable::new("execution")));
            let report = orch.generate(&project).await?;
            if json {
                print_json(&report.tests)?;
            } else {
                println!("Generated {} tests, {} new.", report.generated, report.inserted);
                print_tests(&report.tests);
            }
        }
        Commands::Run { project, outcomes } => {
            let orch = build(&cfg, Arc::new(Unavailable::new("generation")), Arc::new(OutcomeFile::new(outcomes)));
            let report = orch.run_all(&project).await?;
            print_run(&report, json)?;
            if !report.is_success() {
                std::process::exit(2);
            }
        }
        Commands::RunOne { project, test, outcomes } => {
            let orch = build(&cfg, Arc::new(Unavailable::new("generation")), Arc::new(OutcomeFile::new(outcomes)));
            let report = orch.run_single(&project, &test).await?;
            print_run(&report, json)?;
            if !report.is_success() {
                std::process::exit(2);
            }
        }
        Commands::Tests { action } => {
            let orch = offline(&cfg);
            let storage = orch.storage();
            match action {
                TestsAction::List { project } => {
                    let tests = storage.records.get_all(&project).await;
                    if json {
                        print_json(&tests)?;
                    } else {
                        print_tests(&tests);
                    }
                }
                TestsAction::Show { project, test } => {
                    let record = storage
                        .records
                        .get_by_id(&project, &test)
                        .await
                        .with_context(|| format!("test {test} not found in project {project}"))?;
                    let definition = storage.definitions.get_by_id(&project, &test).await;
                    if json {
                        print_json(&serde_json::json!({ "record": record, "definition": definition }))?;
                    } else {
                        println!("{} [{}]", record.name, record.status);
                        println!("{}", record.description);
                        if let Some(out) = &record.legacy_output {
                            println!("\nlegacy output:\n{out}");
                        }
                        if let Some(out) = &record.new_output {
                            println!("\nnew output:\n{out}");
                        }
                        match definition {
                            Some(d) => println!("\n{}", d.full_code),
                            None => println!("\n(no generated code stored)"),
                        }
                    }
                }
                TestsAction::Delete { project, test } => {
                    if !orch.delete_test(&project, &test).await? {
                        bail!("test {test} not found in project {project}");
                    }
                    println!("Test {test} deleted.");
                }
                TestsAction::Clear { project } => {
                    orch.delete_all_tests(&project).await?;
                    println!("All tests of {project} deleted.");
                }
            }
        }
        Commands::History { action } => {
            let orch = offline(&cfg);
            match action {
                HistoryAction::List { project } => {
                    let executions = orch.storage().history.list_by_project(&project).await;
                    if json {
                        print_json(&executions)?;
                    } else if executions.is_empty() {
                        println!("No executions recorded.");
                    } else {
                        println!("{:<36} | {:<25} | {:>5} | {:>5} | {:>5} | Status", "Id", "Executed at", "Total", "Pass", "Fail");
                        println!("{:-<36}-|-{:-<25}-|-{:->5}-|-{:->5}-|-{:->5}-|-{:-<6}", "", "", "", "", "", "");
                        for e in executions {
                            println!(
                                "{:<36} | {:<25} | {:>5} | {:>5} | {:>5} | {:?}",
                                e.id,
                                e.executed_at.to_rfc3339(),
                                e.total_tests,
                                e.passed_tests,
                                e.failed_tests,
                                e.status
                            );
                        }
                    }
                }
                HistoryAction::Show { project, execution } => {
                    let result = orch
                        .execution_result(&project, &execution)
                        .await
                        .with_context(|| format!("execution {execution} not found in project {project}"))?;
                    if json {
                        print_json(&result)?;
                    } else {
                        let e = &result.execution;
                        println!(
                            "{} at {}: {} passed, {} failed of {} ({} ms)",
                            e.project_name,
                            e.executed_at.to_rfc3339(),
                            e.passed_tests,
                            e.failed_tests,
                            e.total_tests,
                            e.total_execution_time
                        );
                        print_tests(&result.test_results);
                    }
                }
                HistoryAction::Clear { project } => {
                    orch.delete_all_executions(&project).await?;
                    println!("History of {project} cleared.");
                }
            }
        }
    }

    Ok(())
}
