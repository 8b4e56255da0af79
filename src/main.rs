use anyhow::{bail, Context};
use corpmedia::{Config, CorpClient, MediaType};
use std::env;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let (media_type, path) = match args.as_slice() {
        [media_type, path] => (media_type.parse::<MediaType>()?, path),
        _ => bail!("usage: corpmedia <image|voice|video|file> <path>"),
    };

    let config = Config::from_env()?;
    tracing::debug!(base_url = %config.base_url, "corp client configured.");
    let client = CorpClient::from_config(&config)?;

    let info = client
        .upload_media_from_file(media_type, path)
        .await
        .with_context(|| format!("uploading {path}"))?;

    tracing::info!(media_id = %info.media_id, created_at = info.created_at, "media uploaded.");
    println!("{}", info.media_id);
    Ok(())
}
