use bearer_cache::{
    issuer::oauth2::{ClientCredentials, ClientCredentialsIssuer},
    pool::WorkerPools,
    Audience, ClientId, ClientSecret, TokenCache, TokenCacheConfig, TokenStatus,
};
use clap::Parser;
use std::{thread, time::Duration};

#[derive(Debug, Parser)]
struct Opts {
    /// The issuing authority's token request URL
    #[arg(short, long, env)]
    token_url: reqwest::Url,

    /// The client ID of the client
    #[arg(short, long, env)]
    client_id: ClientId,

    /// The client secret used to identify the client to the issuing authority
    #[arg(short = 's', long, env, hide_env_values = true)]
    client_secret: ClientSecret,

    /// The audience to request a token for
    #[arg(short, long, env)]
    audience: Option<Audience>,

    /// Send credentials as form data instead of JSON
    #[arg(long, env)]
    form: bool,

    /// Seconds to wait for the first token
    #[arg(long, env, default_value_t = 10)]
    max_wait_secs: u64,
}

fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_thread_names(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let credentials = ClientCredentials {
        client_id: opts.client_id,
        client_secret: opts.client_secret,
        audience: opts.audience,
    };

    let config = TokenCacheConfig::default().with_max_wait(Duration::from_secs(opts.max_wait_secs));
    let issuer = ClientCredentialsIssuer::new(reqwest::Client::new(), opts.token_url, credentials);

    let cache = if opts.form {
        TokenCache::with_config(issuer.using_form_data(), config, WorkerPools::shared())?
    } else {
        TokenCache::with_config(issuer, config, WorkerPools::shared())?
    };

    match cache.access_token() {
        Some(token) => tracing::info!(token = format_args!("{:#?}", token), "first access token"),
        None => tracing::warn!("no access token yet, requests would go out unauthenticated"),
    }

    loop {
        thread::sleep(Duration::from_secs(5));

        let Some(token) = cache.current_token() else {
            tracing::warn!("still no token");
            continue;
        };

        let status = token.token_status();
        match status {
            TokenStatus::Fresh => {
                tracing::debug!(?status, lifetime_secs = token.lifetime().as_secs(), "pulled token")
            }
            TokenStatus::Stale => {
                tracing::warn!(?status, lifetime_secs = token.lifetime().as_secs(), "pulled token")
            }
            TokenStatus::Expired => {
                tracing::error!(?status, lifetime_secs = token.lifetime().as_secs(), "pulled token")
            }
        }
    }
}
