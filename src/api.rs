// API client module: contains a small blocking HTTP client that talks to
// a DMX server's REST API. One method per remote operation, all of them
// synchronous round trips.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{error, info, warn};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::Config;

/// Response payload of a DMX call. Most endpoints answer with JSON, but a
/// few writes return an empty or plain body; callers that need structure
/// go through `into_json` and handle the raw case explicitly.
#[derive(Debug)]
pub enum Body {
    Json(Value),
    Raw(Vec<u8>),
}

impl Body {
    pub fn into_json(self) -> Result<Value> {
        match self {
            Body::Json(value) => Ok(value),
            Body::Raw(bytes) => bail!("response was not JSON ({} bytes)", bytes.len()),
        }
    }

    fn from_bytes(bytes: &[u8]) -> Body {
        match serde_json::from_slice(bytes) {
            Ok(value) => Body::Json(value),
            Err(_) => {
                warn!("no JSON object in response, keeping raw bytes");
                Body::Raw(bytes.to_vec())
            }
        }
    }
}

/// Minimal topic shape used when folding listings. Everything else stays
/// dynamic JSON; no topic data is cached client-side.
#[derive(Debug, Deserialize)]
pub struct TopicSummary {
    pub id: i64,
    #[serde(default)]
    pub value: Value,
}

impl TopicSummary {
    fn value_string(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Sharing mode of a workspace to be created. `private` exists in DMX but
/// cannot be set up through scripting, so it is rejected up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceType {
    Confidential,
    Collaborative,
    Public,
    Common,
}

impl WorkspaceType {
    fn uri(&self) -> &'static str {
        match self {
            WorkspaceType::Confidential => "dmx.workspaces.confidential",
            WorkspaceType::Collaborative => "dmx.workspaces.collaborative",
            WorkspaceType::Public => "dmx.workspaces.public",
            WorkspaceType::Common => "dmx.workspaces.common",
        }
    }
}

impl FromStr for WorkspaceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "confidential" => Ok(WorkspaceType::Confidential),
            "collaborative" => Ok(WorkspaceType::Collaborative),
            "public" => Ok(WorkspaceType::Public),
            "common" => Ok(WorkspaceType::Common),
            "private" => bail!("sorry, 'private' workspaces are not working yet via scripting"),
            other => bail!("'{other}' is not a valid workspace type"),
        }
    }
}

/// Blocking client for one DMX server. Holds the reqwest client and the
/// resolved configuration.
///
/// Session policy: every `read`/`write` mints a fresh session by replaying
/// Basic auth; sessions are never cached or reused across calls. The same
/// goes for workspace ids, which are re-resolved on every write.
pub struct ApiClient {
    client: Client,
    config: Config,
}

impl ApiClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient { client, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Base64 value for the `Authorization: Basic` header.
    fn basic_auth(&self) -> String {
        BASE64.encode(format!("{}:{}", self.config.authname, self.config.password))
    }

    /// Logs in with Basic auth and returns a fresh session id.
    ///
    /// `GET /core/topic/0` is the cheapest authenticated endpoint and
    /// serves as the login target; the session arrives as a `JSESSIONID`
    /// cookie on the response.
    pub fn session_id(&self) -> Result<String> {
        let url = format!("{}/core/topic/0", self.config.base_url());
        let res = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Basic {}", self.basic_auth()))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .with_context(|| format!("login request to {url} failed"))?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            bail!("Login failed: {} - {}", status, txt);
        }
        let session = res
            .cookies()
            .find(|c| c.name() == "JSESSIONID")
            .map(|c| c.value().to_string())
            .context("no JSESSIONID cookie in login response");
        session
    }

    /// GETs a path below the service root with a fresh session cookie.
    /// A 2xx body that is not valid JSON comes back as `Body::Raw`.
    pub fn read(&self, path: &str) -> Result<Body> {
        let url = format!("{}/{}", self.config.base_url(), path);
        let session = self.session_id()?;
        info!("reading {url}");
        let res = self
            .client
            .get(&url)
            .header(COOKIE, format!("JSESSIONID={session}"))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .with_context(|| format!("read request to {url} failed"))?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            bail!("Read failed: {} - {}", status, txt);
        }
        let bytes = res.bytes().context("reading response body")?;
        Ok(Body::from_bytes(&bytes))
    }

    /// Sends a write (POST/PUT/DELETE). The service takes the target
    /// workspace exclusively from the `dmx_workspace_id` cookie, never
    /// from the payload, so the cookie is attached even on body-less
    /// DELETE and PUT calls.
    pub fn write(
        &self,
        path: &str,
        payload: Option<&Value>,
        workspace: &str,
        method: Method,
    ) -> Result<Body> {
        let url = format!("{}/{}", self.config.base_url(), path);
        let session = self.session_id()?;
        let ws_id = self.workspace_id(workspace)?;
        info!("writing {url} ({method})");
        let mut req = self
            .client
            .request(method, &url)
            .header(COOKIE, format!("JSESSIONID={session}; dmx_workspace_id={ws_id}"))
            .header(CONTENT_TYPE, "application/json");
        if let Some(payload) = payload {
            req = req.json(payload);
        }
        let res = req
            .send()
            .with_context(|| format!("write request to {url} failed"))?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            bail!("Write failed: {} - {}", status, txt);
        }
        let bytes = res.bytes().context("reading response body")?;
        Ok(Body::from_bytes(&bytes))
    }

    /// Resolves a workspace name to its topic id: find the workspace's
    /// name topic, then follow the composition association to the owning
    /// workspace topic. Resolution repeats on every write; nothing is
    /// cached. Resolving by uri would be faster when one is present.
    pub fn workspace_id(&self, workspace: &str) -> Result<i64> {
        info!("searching workspace id for '{workspace}'");
        let path = format!(
            "core/topic?type_uri=dmx.workspaces.workspace_name&query=\"{}\"",
            workspace.replace(' ', "%20")
        );
        let found = self.read(&path)?.into_json()?;
        let name_id = found["topics"][0]["id"]
            .as_i64()
            .ok_or_else(|| anyhow!("no workspace named '{workspace}'"))?;
        let path = format!(
            "core/topic/{name_id}/related_topics\
             ?assoc_type_uri=dmx.core.composition\
             &my_role_type_uri=dmx.core.child\
             &others_role_type_uri=dmx.core.parent\
             &others_topic_type_uri=dmx.workspaces.workspace"
        );
        let related = self.read(&path)?.into_json()?;
        let ws_id = related[0]["id"]
            .as_i64()
            .ok_or_else(|| anyhow!("no workspace topic associated with '{workspace}'"))?;
        info!("workspace '{workspace}' has id {ws_id}");
        Ok(ws_id)
    }

    /// Creates a user account, refusing usernames that already exist on
    /// the server.
    pub fn create_user(&self, username: &str, password: &str) -> Result<i64> {
        let users = self.list_by_type("dmx.accesscontrol.username");
        if users.values().any(|existing| existing == username) {
            bail!("user '{username}' already exists");
        }
        let payload = json!({
            "username": username,
            "password": hash_password(password),
        });
        let created = self
            .write(
                "accesscontrol/user_account",
                Some(&payload),
                &self.config.workspace,
                Method::POST,
            )?
            .into_json()?;
        let id = created["id"]
            .as_i64()
            .context("no topic id in user creation response")?;
        info!("new user '{username}' created with topic id {id}");
        Ok(id)
    }

    /// Creates a workspace. The sharing mode is validated before any
    /// request goes out; name, uri and mode travel as query parameters.
    pub fn create_workspace(&self, name: &str, ws_type: &str) -> Result<i64> {
        let sharing: WorkspaceType = ws_type.parse()?;
        let uri = format!("{}.uri", name.to_lowercase());
        let path = format!(
            "workspace?name={name}&uri={uri}&sharing_mode_uri={}",
            sharing.uri()
        );
        let created = self
            .write(&path, None, &self.config.workspace, Method::POST)?
            .into_json()?;
        created["id"]
            .as_i64()
            .context("no topic id in workspace creation response")
    }

    /// Associates a user with a workspace.
    pub fn create_membership(&self, workspace: &str, username: &str) -> Result<()> {
        info!("creating membership for user '{username}' in workspace '{workspace}'");
        let ws_id = self.workspace_id(workspace)?;
        self.write(
            &format!("accesscontrol/user/{username}/workspace/{ws_id}"),
            None,
            workspace,
            Method::POST,
        )?;
        Ok(())
    }

    /// Posts a full topic payload into the given workspace and returns
    /// the created topic's id.
    pub fn send_topics(&self, payload: &Value, workspace: &str) -> Result<i64> {
        let created = self
            .write("core/topic/", Some(payload), workspace, Method::POST)?
            .into_json()?;
        created["id"]
            .as_i64()
            .context("no topic id in creation response")
    }

    pub fn get_topic(&self, topic_id: i64) -> Result<Body> {
        self.get_data(&format!("topic/{topic_id}"))
    }

    /// Generic read below `core/` with children expanded.
    pub fn get_data(&self, datapath: &str) -> Result<Body> {
        self.read(&format!("core/{datapath}?children=true"))
    }

    pub fn get_related(&self, topic_id: i64) -> Result<Body> {
        self.read(&format!("core/topic/{topic_id}/related_topics"))
    }

    pub fn get_creator(&self, topic_id: i64) -> Result<Body> {
        self.read(&format!("accesscontrol/object/{topic_id}/creator"))
    }

    pub fn get_modifier(&self, topic_id: i64) -> Result<Body> {
        self.read(&format!("accesscontrol/object/{topic_id}/modifier"))
    }

    pub fn get_topic_workspace(&self, topic_id: i64) -> Result<Body> {
        self.read(&format!("workspace/object/{topic_id}"))
    }

    pub fn get_workspace_owner(&self, workspace_id: i64) -> Result<Body> {
        self.read(&format!("accesscontrol/workspace/{workspace_id}/owner"))
    }

    /// Deletes a topic. Goes through the write executor so the workspace
    /// cookie is attached like on any other write.
    pub fn delete_topic(&self, topic_id: i64) -> Result<Body> {
        self.write(
            &format!("core/topic/{topic_id}"),
            None,
            &self.config.workspace,
            Method::DELETE,
        )
    }

    /// Lists all topics of a type as an id -> value map. A failed or
    /// empty listing logs and yields an empty map; it never aborts the
    /// caller.
    pub fn list_by_type(&self, type_uri: &str) -> BTreeMap<i64, String> {
        let mut items = BTreeMap::new();
        let listing = match self.get_data(&format!("topic/by_type/{type_uri}")) {
            Ok(body) => body,
            Err(err) => {
                error!("listing topics of type {type_uri} failed: {err:#}");
                return items;
            }
        };
        let topics: Vec<TopicSummary> = match listing
            .into_json()
            .and_then(|value| serde_json::from_value(value).context("listing is not a topic array"))
        {
            Ok(topics) => topics,
            Err(err) => {
                warn!("unexpected listing shape for {type_uri}: {err:#}");
                return items;
            }
        };
        for topic in &topics {
            items.insert(topic.id, topic.value_string());
        }
        items
    }
}

/// Scheme-tagged password digest as stored by the server: the SHA-256 hex
/// digest prefixed with `-SHA256-`.
pub fn hash_password(password: &str) -> String {
    format!("-SHA256-{}", hex::encode(Sha256::digest(password.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_type_parses_supported_modes() {
        assert_eq!(
            "confidential".parse::<WorkspaceType>().unwrap(),
            WorkspaceType::Confidential
        );
        assert_eq!(
            "collaborative".parse::<WorkspaceType>().unwrap(),
            WorkspaceType::Collaborative
        );
        assert_eq!("public".parse::<WorkspaceType>().unwrap(), WorkspaceType::Public);
        assert_eq!("common".parse::<WorkspaceType>().unwrap(), WorkspaceType::Common);
    }

    #[test]
    fn private_workspaces_are_rejected_with_a_hint() {
        let err = "private".parse::<WorkspaceType>().unwrap_err();
        assert!(err.to_string().contains("not working yet"));
    }

    #[test]
    fn unknown_workspace_type_is_invalid() {
        let err = "sneaky".parse::<WorkspaceType>().unwrap_err();
        assert!(err.to_string().contains("not a valid workspace type"));
    }

    #[test]
    fn sharing_mode_uris_carry_the_workspaces_namespace() {
        assert_eq!(WorkspaceType::Common.uri(), "dmx.workspaces.common");
    }

    #[test]
    fn password_hash_is_scheme_tagged_hex() {
        let hash = hash_password("testpass");
        let digest = hash.strip_prefix("-SHA256-").expect("scheme prefix");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "13d249f2cb4127b40cfa757866850278793f814ded3c587fe5889e889a7a9f6c"
        );
    }

    #[test]
    fn non_string_topic_values_fall_back_to_json_text() {
        let topic = TopicSummary { id: 7, value: json!(42) };
        assert_eq!(topic.value_string(), "42");
        let topic = TopicSummary { id: 8, value: json!("plain") };
        assert_eq!(topic.value_string(), "plain");
    }

    #[test]
    fn body_parses_json_and_keeps_raw_fallback() {
        match Body::from_bytes(br#"{"id": 1}"#) {
            Body::Json(value) => assert_eq!(value["id"], 1),
            Body::Raw(_) => panic!("expected JSON"),
        }
        match Body::from_bytes(b"\x00\x01 not json") {
            Body::Raw(bytes) => assert_eq!(bytes.len(), 11),
            Body::Json(_) => panic!("expected raw bytes"),
        }
    }

    #[test]
    fn into_json_rejects_raw_bodies() {
        let err = Body::Raw(b"bytes".to_vec()).into_json().unwrap_err();
        assert!(err.to_string().contains("was not JSON"));
    }
}
