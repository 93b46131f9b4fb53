//! Infusethink CLI entrypoint.
//!
//! This is the main entrypoint for the infusethink command-line tool.

use std::io::Write;
use std::process::ExitCode;

use infusethink_infra::cli::{Cli, Commands, OutputFormatter};
use infusethink_infra::config::{ConfigResolver, ConfigValidator, SettingsParser, StackSettings};
use infusethink_infra::engine::{ArmProvider, Deployer, DeploymentPlan};
use infusethink_infra::error::{DeployError, InfraError, Result, StackError};
use infusethink_infra::stack::{Composition, compose_environment, compose_shared};
use infusethink_infra::state::{LocalStackStore, StackStore};

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Everything a command needs to know about the selected stack.
struct StackContext {
    /// Stack name as given on the command line.
    name: String,
    /// Loaded stack settings.
    settings: StackSettings,
    /// Stack state store.
    store: LocalStackStore,
}

impl StackContext {
    /// Loads settings and opens the state store for a stack.
    fn load(cli: &Cli) -> Result<Self> {
        let parser = cli
            .settings_dir
            .as_ref()
            .map_or_else(SettingsParser::new, |dir| SettingsParser::new().with_base_path(dir));
        parser.load_dotenv()?;
        let settings = parser.load(&cli.stack)?;

        let store = match &cli.state_dir {
            Some(dir) => LocalStackStore::with_base_dir(dir),
            None => LocalStackStore::new()?,
        };
        debug!("Using state directory: {}", store.base_dir().display());

        Ok(Self {
            name: cli.stack.clone(),
            settings,
            store,
        })
    }

    /// Returns true if the selected stack is the shared stack.
    fn is_shared(&self) -> bool {
        self.name == self.settings.shared_stack
    }

    /// Validates the configuration and composes the stack's graph.
    async fn compose(&self) -> Result<Composition> {
        let resolver = ConfigResolver::new();
        let validator = ConfigValidator::new();

        if self.is_shared() {
            let shared = resolver.shared();
            validator.validate_shared(&shared, &self.settings)?;
            compose_shared(&shared, &self.settings)
        } else {
            let record = resolver.resolve(&self.name)?;
            validator.validate(&record, &self.settings)?;
            compose_environment(&record, &self.settings, &self.store).await
        }
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let context = StackContext::load(&cli)?;

    match cli.command {
        Commands::Config => cmd_config(&context, &formatter),
        Commands::Validate { warnings } => cmd_validate(&context, warnings, &formatter),
        Commands::Preview => cmd_preview(&context, &formatter).await,
        Commands::Up { yes } => cmd_up(&context, yes, &formatter).await,
        Commands::Outputs { show_secrets } => {
            cmd_outputs(&context, show_secrets, &formatter).await
        }
    }
}

/// Print the resolved configuration record.
fn cmd_config(context: &StackContext, formatter: &OutputFormatter) -> Result<()> {
    let resolver = ConfigResolver::new();
    let output = if context.is_shared() {
        formatter.format_config(&resolver.shared())
    } else {
        formatter.format_config(&resolver.resolve(&context.name)?)
    };
    eprintln!("{output}");
    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    context: &StackContext,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    info!("Validating configuration for stack: {}", context.name);

    let resolver = ConfigResolver::new();
    let validator = ConfigValidator::new();
    let result = if context.is_shared() {
        validator.validate_shared(&resolver.shared(), &context.settings)?
    } else {
        validator.validate(&resolver.resolve(&context.name)?, &context.settings)?
    };

    eprintln!("{}", formatter.format_validation(&result, show_warnings));
    Ok(())
}

/// Show deployment plan.
async fn cmd_preview(context: &StackContext, formatter: &OutputFormatter) -> Result<()> {
    let composition = context.compose().await?;
    let state = context.store.load(&composition.key).await?;

    let plan = DeploymentPlan::from_composition(&composition, state.as_ref())?;
    eprintln!("{}", formatter.format_plan(&plan));
    Ok(())
}

/// Deploy the stack.
async fn cmd_up(context: &StackContext, auto_approve: bool, formatter: &OutputFormatter) -> Result<()> {
    let composition = context.compose().await?;
    let state = context.store.load(&composition.key).await?;

    let plan = DeploymentPlan::from_composition(&composition, state.as_ref())?;
    eprintln!("{}", formatter.format_plan(&plan));

    if plan.is_empty() {
        return Ok(());
    }

    if !auto_approve && !confirm("Do you want to deploy this stack? [y/N]: ")? {
        eprintln!("{}", formatter.warning("Deployment cancelled."));
        return Err(InfraError::Deploy(DeployError::Aborted {
            reason: String::from("cancelled by user"),
        }));
    }

    let provider = ArmProvider::new(
        context.settings.require_subscription()?,
        SettingsParser::access_token()?,
    )?;
    let deployer = Deployer::new(&provider, &context.store);

    let report = deployer.deploy(&composition).await?;
    eprintln!("{}", formatter.format_report(&report));
    Ok(())
}

/// Show stored outputs.
async fn cmd_outputs(
    context: &StackContext,
    show_secrets: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let key = context.settings.stack_key(&context.name);
    let state = context
        .store
        .load(&key)
        .await?
        .ok_or_else(|| InfraError::Stack(StackError::NotDeployed { stack: key.to_string() }))?;

    eprintln!("{}", formatter.format_outputs(&state, show_secrets));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Asks the user for confirmation on stdin.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
