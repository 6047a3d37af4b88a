use std::time::Duration;

use anyhow::Context;
use url::Url;

use murmur_types::models::ChannelId;

/// Runtime settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub cable_url: String,
    pub origin: String,
    pub cookie: Option<String>,
    pub channel: Option<ChannelId>,
    pub subscribe_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_url = lookup("MURMUR_API_URL").unwrap_or_else(|| "http://localhost:8080".into());
        let api = Url::parse(&api_url).with_context(|| format!("invalid MURMUR_API_URL {api_url}"))?;

        let cable_url = match lookup("MURMUR_CABLE_URL") {
            Some(url) => url,
            None => cable_url_for(&api)?,
        };
        let origin = lookup("MURMUR_ORIGIN").unwrap_or_else(|| api.origin().ascii_serialization());
        let cookie = lookup("MURMUR_SESSION_COOKIE").filter(|c| !c.is_empty());
        let channel = lookup("MURMUR_CHANNEL")
            .map(|c| c.parse::<ChannelId>())
            .transpose()
            .context("MURMUR_CHANNEL must be a channel id")?;
        let subscribe_timeout = lookup("MURMUR_SUBSCRIBE_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".into())
            .parse::<u64>()
            .context("MURMUR_SUBSCRIBE_TIMEOUT_SECS must be a number of seconds")?;
        let request_timeout = lookup("MURMUR_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".into())
            .parse::<u64>()
            .context("MURMUR_REQUEST_TIMEOUT_SECS must be a number of seconds")?;

        Ok(Self {
            api_url,
            cable_url,
            origin,
            cookie,
            channel,
            subscribe_timeout: Duration::from_secs(subscribe_timeout),
            request_timeout: Duration::from_secs(request_timeout),
        })
    }
}

/// `http(s)://host/...` becomes `ws(s)://host/cable`.
fn cable_url_for(api: &Url) -> anyhow::Result<String> {
    let mut cable = api.clone();
    let scheme = if api.scheme() == "https" { "wss" } else { "ws" };
    cable
        .set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot derive a cable URL from {api}"))?;
    cable.set_path("/cable");
    cable.set_query(None);
    Ok(cable.to_string())
}
