use anyhow::Context;

use classguard_audit::SeedData;
use classguard_infra::InfraConfig;
use classguard_policy::PolicyOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    classguard_observability::init();

    let config = InfraConfig::from_env().context("reading configuration")?;
    let options = PolicyOptions {
        strict_status_transitions: config.strict_status_transitions,
    };

    let report = classguard_audit::run(&SeedData::standard(), options).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    anyhow::ensure!(
        report.is_clean(),
        "{} of {} policy checks failed",
        report.failed,
        report.total
    );
    Ok(())
}
