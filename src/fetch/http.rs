use super::ScriptSource;
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use tracing::debug;
use url::Url;

/// Scripts served over HTTP. The URL template must contain `{id}`, which is
/// replaced by the percent-encoded script id, e.g.
/// `https://www.googleapis.com/drive/v3/files/{id}/export?mimeType=text/plain`.
#[derive(Debug, Clone)]
pub struct HttpScriptSource {
    client: Client,
    template: String,
    token: Option<String>,
}

impl HttpScriptSource {
    pub fn new(template: impl Into<String>, token: Option<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{id}") {
            bail!("script URL template `{template}` has no {{id}} placeholder");
        }
        Ok(Self {
            client: Client::new(),
            template,
            token,
        })
    }

    /// The concrete URL for `script_id`.
    pub fn url_for(&self, script_id: &str) -> Result<Url> {
        let encoded: String = url::form_urlencoded::byte_serialize(script_id.as_bytes()).collect();
        let raw = self.template.replace("{id}", &encoded);
        Url::parse(&raw).with_context(|| format!("invalid script URL {raw}"))
    }
}

impl ScriptSource for HttpScriptSource {
    fn read_script(&self, script_id: &str) -> Result<String> {
        let url = self.url_for(script_id)?;
        debug!(%url, "fetching script");
        let mut req = self.client.get(url.as_str());
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let text = req
            .send()
            .with_context(|| format!("fetching script {script_id}"))?
            .error_for_status()?
            .text()?;
        Ok(text)
    }
}
