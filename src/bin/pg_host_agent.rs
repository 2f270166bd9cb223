use anyhow::Result;
use pg_host_agent::cli::{actions, actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;

    match action {
        Action::Run { .. } => actions::run::handle(action).await?,
        Action::Update { manifest_url } => {
            pg_host_agent::update::run(&manifest_url, env!("CARGO_PKG_VERSION")).await?;
        }
    }

    Ok(())
}
