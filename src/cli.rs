// CLI layer: flag parsing, command derivation and dispatch. The flag
// surface keeps the traditional short options of the server tooling;
// each requested action becomes a typed `Command` consumed by a single
// `match`, in the same order the actions have always run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::api::{ApiClient, Body};
use crate::config::Config;
use crate::payload;

#[derive(Parser, Debug)]
#[command(
    name = "dmx-cli",
    version,
    about = "Command line client for the DMX REST API"
)]
pub struct Cli {
    /// Get all items of a topic type by its topic.type.uri.
    #[arg(short = 'b', long = "by_type", value_name = "TYPE_URI")]
    pub by_type: Option<String>,

    /// Create a user with --user and --password.
    #[arg(short = 'C', long = "create_user")]
    pub create_user: bool,

    /// Delete a topic by id.
    #[arg(short = 'd', long = "delete_topic", value_name = "ID")]
    pub delete_topic: Option<i64>,

    /// Create topics from a JSON file in the workspace given by --workspace.
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Read connection data from a DMX config.properties file.
    #[arg(short = 'c', long = "config_properties", value_name = "PATH")]
    pub config_properties: Option<PathBuf>,

    /// Login as --user with --password instead of the configured account.
    #[arg(short = 'l', long = "login")]
    pub login: bool,

    /// Create a workspace membership with --workspace and --new_member.
    #[arg(short = 'm', long = "membership")]
    pub membership: bool,

    /// Username of the new member.
    #[arg(short = 'n', long = "new_member", value_name = "USERNAME")]
    pub new_member: Option<String>,

    /// Password for --create_user or --login.
    #[arg(short = 'p', long = "password", value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Get all related items of a topic id.
    #[arg(short = 'r', long = "get_related", value_name = "ID")]
    pub get_related: Option<i64>,

    /// Get a valid session id.
    #[arg(short = 's', long = "get_session_id")]
    pub get_session_id: bool,

    /// Get all data of a topic id.
    #[arg(short = 't', long = "get_topic", value_name = "ID")]
    pub get_topic: Option<i64>,

    /// Username for --create_user or --login.
    #[arg(short = 'u', long = "user", value_name = "USERNAME")]
    pub user: Option<String>,

    /// Workspace name for --file, --membership, or creation with --ws_type.
    #[arg(short = 'w', long = "workspace", value_name = "NAME")]
    pub workspace: Option<String>,

    /// Sharing mode of the workspace to create.
    #[arg(short = 'T', long = "ws_type", value_name = "TYPE")]
    pub ws_type: Option<String>,
}

/// One CLI action with everything it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SendFile { file: PathBuf, workspace: String },
    CreateUser { username: String, password: String },
    ListByType { type_uri: String },
    GetRelated { topic_id: i64 },
    GetTopic { topic_id: i64 },
    CreateWorkspace { name: String, ws_type: String },
    PrintSessionId,
    CreateMembership { workspace: String, username: String },
    DeleteTopic { topic_id: i64 },
}

impl Cli {
    /// Credentials override requested via --login, validated.
    pub fn login_override(&self) -> Result<Option<(String, String)>> {
        if !self.login {
            return Ok(None);
        }
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Ok(Some((user.clone(), password.clone()))),
            _ => bail!("missing username or password for --login"),
        }
    }

    /// Derives the typed command list from the flag combination. An
    /// incomplete combination (e.g. --create_user without --password) is
    /// an error rather than a silently skipped action.
    pub fn commands(&self) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        if let Some(file) = &self.file {
            match &self.workspace {
                Some(workspace) => commands.push(Command::SendFile {
                    file: file.clone(),
                    workspace: workspace.clone(),
                }),
                None => bail!("missing workspace declaration for --file"),
            }
        }
        if self.create_user {
            match (&self.user, &self.password) {
                (Some(username), Some(password)) => commands.push(Command::CreateUser {
                    username: username.clone(),
                    password: password.clone(),
                }),
                _ => bail!("missing username or password for --create_user"),
            }
        }
        if let Some(type_uri) = &self.by_type {
            commands.push(Command::ListByType {
                type_uri: type_uri.clone(),
            });
        }
        if let Some(topic_id) = self.get_related {
            commands.push(Command::GetRelated { topic_id });
        }
        if let Some(topic_id) = self.get_topic {
            commands.push(Command::GetTopic { topic_id });
        }
        // --workspace doubles as the target of --file and --membership;
        // it only means "create a workspace" together with --ws_type.
        if !self.membership {
            if let (Some(name), Some(ws_type)) = (&self.workspace, &self.ws_type) {
                commands.push(Command::CreateWorkspace {
                    name: name.clone(),
                    ws_type: ws_type.clone(),
                });
            }
        }
        if self.get_session_id {
            commands.push(Command::PrintSessionId);
        }
        if self.membership {
            match (&self.workspace, &self.new_member) {
                (Some(workspace), Some(username)) => commands.push(Command::CreateMembership {
                    workspace: workspace.clone(),
                    username: username.clone(),
                }),
                _ => bail!("missing workspace name or username of new member for --membership"),
            }
        }
        if let Some(topic_id) = self.delete_topic {
            commands.push(Command::DeleteTopic { topic_id });
        }
        Ok(commands)
    }
}

/// Entry point called from `main`: parse flags, load the configuration,
/// run every requested command in order.
pub fn run() -> Result<()> {
    if std::env::args().len() < 2 {
        Cli::command().print_help()?;
        println!();
        std::process::exit(1);
    }
    let cli = Cli::parse();

    let mut config = match &cli.config_properties {
        Some(path) => Config::from_properties(path)?,
        None => Config::load_local()?,
    };
    if let Some((user, password)) = cli.login_override()? {
        config.set_credentials(user, password);
    }

    let commands = cli.commands()?;
    let api = ApiClient::new(config)?;
    for command in commands {
        dispatch(&api, command)?;
    }
    Ok(())
}

fn dispatch(api: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::SendFile { file, workspace } => {
            info!("importing json data from file {}", file.display());
            let payload = payload::import_payload(&file)?;
            if payload::payload_len(&payload) == 0 {
                bail!("missing data in file {}", file.display());
            }
            payload::pretty_print(&payload)?;
            // Spinner while the topics are on the wire.
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
            spinner.set_message(format!("Sending topics to workspace '{workspace}'..."));
            spinner.enable_steady_tick(Duration::from_millis(100));
            let topic_id = api.send_topics(&payload, &workspace);
            spinner.finish_and_clear();
            println!("CREATED: {}", topic_id?);
        }
        Command::CreateUser { username, password } => {
            let topic_id = api.create_user(&username, &password)?;
            println!("New user '{username}' was created with topic id {topic_id}.");
        }
        Command::ListByType { type_uri } => {
            let items = api.list_by_type(&type_uri);
            payload::pretty_print(&serde_json::to_value(&items)?)?;
        }
        Command::GetRelated { topic_id } => {
            print_body(api.get_related(topic_id)?)?;
        }
        Command::GetTopic { topic_id } => {
            print_body(api.get_topic(topic_id)?)?;
        }
        Command::CreateWorkspace { name, ws_type } => {
            info!("creating new {ws_type} workspace '{name}'");
            let topic_id = api.create_workspace(&name, &ws_type)?;
            println!("New workspace '{name}' was created with topic id {topic_id}.");
        }
        Command::PrintSessionId => {
            println!("{}", api.session_id()?);
        }
        Command::CreateMembership { workspace, username } => {
            api.create_membership(&workspace, &username)?;
            println!("User '{username}' is now a member of workspace '{workspace}'.");
        }
        Command::DeleteTopic { topic_id } => {
            let topic = api.get_topic(topic_id)?.into_json()?;
            let value = topic["value"].as_str().unwrap_or_default().to_string();
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Are you sure you want to delete topic id {topic_id} with value \"{value}\"?"
                ))
                .default(false)
                .interact()?;
            if confirmed {
                print_body(api.delete_topic(topic_id)?)?;
            } else {
                println!("Skipped deletion of topic {topic_id}.");
            }
        }
    }
    Ok(())
}

/// Prints a response: JSON pretty-printed, raw bodies as lossy text.
fn print_body(body: Body) -> Result<()> {
    match body {
        Body::Json(value) => payload::pretty_print(&value),
        Body::Raw(bytes) => {
            println!("{}", String::from_utf8_lossy(&bytes));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn by_type_flag_maps_to_a_listing_command() {
        let cli = parse(&["dmx-cli", "--by_type", "dmx.notes.note"]);
        assert_eq!(
            cli.commands().unwrap(),
            vec![Command::ListByType {
                type_uri: "dmx.notes.note".into()
            }]
        );
    }

    #[test]
    fn short_flags_match_the_traditional_surface() {
        let cli = parse(&["dmx-cli", "-t", "42", "-r", "7"]);
        assert_eq!(
            cli.commands().unwrap(),
            vec![
                Command::GetRelated { topic_id: 7 },
                Command::GetTopic { topic_id: 42 },
            ]
        );
    }

    #[test]
    fn create_user_requires_both_credentials() {
        let cli = parse(&["dmx-cli", "-C", "-u", "alice"]);
        let err = cli.commands().unwrap_err();
        assert!(err.to_string().contains("username or password"));
    }

    #[test]
    fn file_requires_a_workspace() {
        let cli = parse(&["dmx-cli", "-f", "payload.json"]);
        let err = cli.commands().unwrap_err();
        assert!(err.to_string().contains("workspace"));
    }

    #[test]
    fn workspace_with_type_creates_a_workspace() {
        let cli = parse(&["dmx-cli", "-w", "Team X", "-T", "collaborative"]);
        assert_eq!(
            cli.commands().unwrap(),
            vec![Command::CreateWorkspace {
                name: "Team X".into(),
                ws_type: "collaborative".into()
            }]
        );
    }

    #[test]
    fn membership_claims_the_workspace_flag() {
        let cli = parse(&["dmx-cli", "-m", "-w", "Team X", "-n", "bob"]);
        assert_eq!(
            cli.commands().unwrap(),
            vec![Command::CreateMembership {
                workspace: "Team X".into(),
                username: "bob".into()
            }]
        );
    }

    #[test]
    fn membership_without_member_is_an_error() {
        let cli = parse(&["dmx-cli", "-m", "-w", "Team X"]);
        assert!(cli.commands().is_err());
    }

    #[test]
    fn login_override_requires_both_fields() {
        let cli = parse(&["dmx-cli", "-l", "-u", "alice"]);
        assert!(cli.login_override().is_err());
        let cli = parse(&["dmx-cli", "-l", "-u", "alice", "-p", "pw"]);
        assert_eq!(
            cli.login_override().unwrap(),
            Some(("alice".into(), "pw".into()))
        );
    }

    #[test]
    fn actions_keep_the_reference_order() {
        let cli = parse(&[
            "dmx-cli", "-t", "42", "-b", "dmx.notes.note", "-s", "-d", "9",
        ]);
        let commands = cli.commands().unwrap();
        assert_eq!(
            commands,
            vec![
                Command::ListByType {
                    type_uri: "dmx.notes.note".into()
                },
                Command::GetTopic { topic_id: 42 },
                Command::PrintSessionId,
                Command::DeleteTopic { topic_id: 9 },
            ]
        );
    }
}
