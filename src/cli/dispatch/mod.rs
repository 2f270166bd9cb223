use crate::cli::actions::Action;
use crate::cli::service_spec;
use anyhow::Result;
use std::time::Duration;

/// Translate parsed CLI arguments into an [`Action`].
///
/// # Errors
/// Returns an error if a `--service` entry fails to parse.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches("update") {
        return Ok(Action::Update {
            manifest_url: sub.get_one::<String>("manifest-url").cloned().unwrap_or_default(),
        });
    }

    let services = matches
        .get_many::<String>("service")
        .into_iter()
        .flatten()
        .map(|raw| service_spec::parse(raw))
        .collect::<Result<Vec<_>>>()?;

    let exclude_databases = matches
        .get_many::<String>("exclude-databases")
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    Ok(Action::Run {
        listen: matches.get_one::<String>("listen").cloned().unwrap_or_default(),
        services,
        project_id: matches.get_one::<String>("project-id").cloned(),
        push_url: matches.get_one::<String>("push-url").cloned(),
        push_interval: Duration::from_secs(matches.get_one::<u64>("push-interval").copied().unwrap_or(15)),
        scrape_timeout: Duration::from_secs(matches.get_one::<u64>("scrape-timeout").copied().unwrap_or(30)),
        exclude_databases,
    })
}
