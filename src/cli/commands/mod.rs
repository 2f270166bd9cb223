use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

fn update_subcommand() -> Command {
    Command::new("update")
        .about("Check a release manifest and replace the running binary if a newer version is available")
        .arg(
            Arg::new("manifest-url")
                .long("manifest-url")
                .help("URL serving the release manifest (JSON: {\"version\", \"url\"})")
                .env("PGHA_UPDATE_MANIFEST_URL")
                .value_name("URL")
                .required(true),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("pg-host-agent")
        .about("Host-resident telemetry agent for PostgreSQL servers and their connection poolers")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("listen")
                .long("listen")
                .help("Address to bind the pull (/metrics, /health) HTTP server on")
                .default_value("0.0.0.0:9930")
                .env("PGHA_LISTEN")
                .value_name("ADDR"),
        )
        .arg(
            Arg::new("service")
                .long("service")
                .help("Service to monitor, as kind=dsn (postgres=..., pgbouncer=..., system=local)")
                .env("PGHA_SERVICE")
                .value_name("kind=dsn")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("project-id")
                .long("project-id")
                .help("Fixed project_id label attached to every emitted sample")
                .env("PGHA_PROJECT_ID")
                .value_name("PROJECT_ID"),
        )
        .arg(
            Arg::new("push-url")
                .long("push-url")
                .help("Remote URL to push rendered metrics to; enables push mode")
                .env("PGHA_PUSH_URL")
                .value_name("URL"),
        )
        .arg(
            Arg::new("push-interval")
                .long("push-interval")
                .help("Interval between pushes, in seconds")
                .default_value("15")
                .env("PGHA_PUSH_INTERVAL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("scrape-timeout")
                .long("scrape-timeout")
                .help("Wall-clock budget for one collection cycle, in seconds")
                .default_value("30")
                .env("PGHA_SCRAPE_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("exclude-databases")
                .long("exclude-databases")
                .help("Comma-separated list of databases to exclude from per-database collection")
                .env("PGHA_EXCLUDE_DATABASES")
                .value_name("template0,template1,...")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug, -vvv for trace")
                .action(ArgAction::Count),
        )
        .subcommand(update_subcommand())
}
