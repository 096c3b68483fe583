use super::{Action, OutputFormat};
use crate::{
    doctor,
    tls::{ConnectionFactory, load_root_store},
};
use anyhow::Context;
use tracing::debug;

/// Execute the action's business logic by delegating to the appropriate module
pub async fn execute(action: Action) -> anyhow::Result<bool> {
    match action {
        Action::Diagnose {
            endpoint,
            trust,
            policy,
            timeout,
            format,
        } => {
            let roots = load_root_store(&trust).await?;
            debug!("using {policy:?} with {} trust anchors", roots.len());

            let factory = ConnectionFactory::new(policy, roots, timeout);
            let outcome = doctor::run(&endpoint, &trust, factory).await?;

            match format {
                OutputFormat::Human => println!("{outcome}"),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome)
                        .context("failed to serialize outcome")?
                ),
            }

            Ok(outcome.success())
        }
    }
}
