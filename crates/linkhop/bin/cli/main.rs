use anyhow::Context;
use clap::Parser;
use linkhop::config::Command;
use linkhop::{telemetry, App, Cli};
use linkhop_core::{ShortCode, UrlRecord};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
struct Resolution {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<UrlRecord>,
}

impl From<Option<UrlRecord>> for Resolution {
    fn from(record: Option<UrlRecord>) -> Self {
        Self {
            found: record.is_some(),
            origin_url: record.as_ref().map(|r| r.origin_url.clone()),
            record,
        }
    }
}

#[derive(Debug, Serialize)]
struct Deletion {
    code: ShortCode,
    deleted: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.settings.log_format).map_err(|e| anyhow::anyhow!(e))?;

    info!(
        storage = %cli.settings.storage,
        filter = %cli.settings.filter,
        cache = %cli.settings.cache,
        "starting linkhop"
    );

    let app = App::connect(&cli.settings)
        .await
        .context("failed to initialise backends")?;
    let ctx = cli.settings.request_context();

    let output = match cli.command {
        Command::Create { url } => {
            let record = app.create(&ctx, &url).await?;
            serde_json::to_value(record)?
        }
        Command::Resolve { code } => {
            let code = ShortCode::new(code)?;
            let resolved = app.resolve(&ctx, &code).await?;
            serde_json::to_value(Resolution::from(resolved))?
        }
        Command::Update { code } => {
            let code = ShortCode::new(code)?;
            let record = app
                .update(&ctx, &code)
                .await?
                .with_context(|| format!("short code not found: {code}"))?;
            serde_json::to_value(record)?
        }
        Command::Delete { code } => {
            let code = ShortCode::new(code)?;
            let deleted = app.delete(&ctx, &code).await?;
            serde_json::to_value(Deletion { code, deleted })?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
