use anyhow::{Context, Result};

use crate::{
    cli::{Cli, Command},
    domain, infra, realtime,
    usecases::{self, bootstrap, context::AppContext, replay},
};

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;
    tracing::debug!(
        domain = domain::module_name(),
        realtime = realtime::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        logs_to_file = context.logs_to_file(),
        "module boundaries loaded"
    );

    let output = execute(&cli.command_or_default(), &context)?;
    println!("{output}");

    Ok(())
}

fn execute(command: &Command, context: &AppContext) -> Result<String> {
    match command {
        Command::Replay { transcript } => {
            let report = replay::replay_file(&context.config, transcript)?;
            tracing::info!(
                transcript = %transcript.display(),
                messages = report.session.messages.len(),
                notifications = report.notifications.len(),
                "replay finished"
            );
            serde_json::to_string_pretty(&report).context("failed to render replay report")
        }
        Command::Config => {
            toml::to_string_pretty(&context.config).context("failed to render configuration")
        }
    }
}
