pub mod run;

use crate::cli::service_spec::ServiceSpec;
use std::time::Duration;

#[derive(Debug)]
pub enum Action {
    Run {
        listen: String,
        services: Vec<ServiceSpec>,
        project_id: Option<String>,
        push_url: Option<String>,
        push_interval: Duration,
        scrape_timeout: Duration,
        exclude_databases: Vec<String>,
    },
    Update {
        manifest_url: String,
    },
}
