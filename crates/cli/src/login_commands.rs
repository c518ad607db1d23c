use std::{path::Path, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    clap::Args,
    tokio::{
        io::{AsyncBufReadExt, BufReader, Stdin},
        sync::Mutex,
    },
    tracing::{debug, info, warn},
    warden_config::WardenConfig,
    warden_cred::{
        AdapterRegistry, Anonymous, Avatar, Capability, Conversation, ConversationCredentials,
        Credentials, Login, Mind, Portal, Prompt, PromptKind, Realm, Reply, SESSION, Session,
        SessionRealm, UsernamePassword, checker_from_spec, checkers_from_config,
    },
};

use crate::password_commands::read_stdin_line;

/// Read-only view of a session exposing only who logged in.
pub const IDENTITY: Capability = Capability::new("identity");

/// Interfaces `--interface` may name.
const KNOWN_INTERFACES: &[Capability] = &[SESSION, IDENTITY];

#[derive(Args)]
pub struct CheckArgs {
    /// Username to log in as.
    #[arg(long, short, required_unless_present = "anonymous")]
    pub username: Option<String>,

    /// Password. Read from stdin when omitted.
    #[arg(long, conflicts_with = "interactive")]
    pub password: Option<String>,

    /// Answer the checker's prompts on the terminal instead of sending a password.
    #[arg(long)]
    pub interactive: bool,

    /// Log in without credentials.
    #[arg(long, conflicts_with_all = ["username", "password", "interactive"])]
    pub anonymous: bool,

    /// Interface to request, in order of preference. Repeatable.
    #[arg(long = "interface", value_name = "NAME")]
    pub interfaces: Vec<String>,
}

struct Identity {
    session: Arc<Session>,
}

impl Avatar for Identity {
    fn capabilities(&self) -> &[Capability] {
        &[IDENTITY]
    }
}

/// A portal assembled from configuration and `--checker` strings.
pub struct PortalSetup {
    pub portal: Portal,
    pub realm: Arc<SessionRealm>,
    default_interfaces: Vec<String>,
}

impl PortalSetup {
    pub fn load(config_path: Option<&Path>, specs: &[String]) -> Result<Self> {
        let config = match config_path {
            Some(path) => warden_config::load_config(path)?,
            None => warden_config::discover_and_load(),
        };
        Self::from_config(&config, specs)
    }

    pub fn from_config(config: &WardenConfig, specs: &[String]) -> Result<Self> {
        let mut checkers = checkers_from_config(config)?;
        for spec in specs {
            checkers.push(checker_from_spec(spec)?);
        }
        if checkers.is_empty() {
            warn!("no checkers configured, every login will be unhandled");
        }

        let adapters =
            AdapterRegistry::new().with(IDENTITY, |session: Arc<Session>| Identity { session });
        let realm = Arc::new(SessionRealm::with_adapters(adapters));
        let portal = Portal::with_checkers(Arc::clone(&realm) as Arc<dyn Realm>, checkers);

        Ok(Self {
            portal,
            realm,
            default_interfaces: config.realm.default_interfaces.clone(),
        })
    }
}

fn resolve_interfaces(names: &[String]) -> Result<Vec<Capability>> {
    names
        .iter()
        .map(|name| {
            KNOWN_INTERFACES
                .iter()
                .find(|c| c.name() == name.as_str())
                .copied()
                .ok_or_else(|| {
                    let known: Vec<_> = KNOWN_INTERFACES.iter().map(Capability::name).collect();
                    anyhow::anyhow!(
                        "unknown interface {name:?}, expected one of: {}",
                        known.join(", ")
                    )
                })
        })
        .collect()
}

fn describe_login(login: &Login) -> String {
    if let Some(session) = login.avatar.downcast_ref::<Session>() {
        session.id().to_string()
    } else if let Some(identity) = login.avatar.downcast_ref::<Identity>() {
        identity.session.id().to_string()
    } else {
        format!("{:?}", login.avatar)
    }
}

async fn credentials(args: &CheckArgs) -> Result<Box<dyn Credentials>> {
    if args.anonymous {
        return Ok(Box::new(Anonymous));
    }
    let Some(username) = args.username.clone() else {
        anyhow::bail!("--username is required unless --anonymous is given");
    };
    if args.interactive {
        return Ok(Box::new(ConversationCredentials::new(
            username,
            Arc::new(TerminalConversation::new()),
        )));
    }
    let password = match &args.password {
        Some(password) => password.clone(),
        None => read_stdin_line().await?,
    };
    Ok(Box::new(UsernamePassword::new(username, password)))
}

/// Log in once, print who was authenticated, then log out.
pub async fn check(setup: &PortalSetup, args: &CheckArgs) -> Result<()> {
    let names = if args.interfaces.is_empty() {
        &setup.default_interfaces
    } else {
        &args.interfaces
    };
    let interfaces = resolve_interfaces(names)?;
    let credentials = credentials(args).await?;

    match setup
        .portal
        .login(credentials.as_ref(), Mind::none(), &interfaces)
        .await
    {
        Ok(login) => {
            let who = describe_login(&login);
            info!(%who, interface = %login.interface, "login succeeded");
            println!("authenticated {who} via {}", login.interface);
            login.logout.call();
            debug!(sessions = setup.realm.len(), "logged out");
            Ok(())
        },
        Err(e) => {
            info!(error = %e, "login failed");
            Err(anyhow::anyhow!("login failed: {e}"))
        },
    }
}

/// Print every credential shape with a registered checker.
pub fn shapes(setup: &PortalSetup) {
    let shapes = setup.portal.list_credentials_interfaces();
    if shapes.is_empty() {
        println!("No checkers configured.");
        return;
    }
    for shape in shapes {
        let bases: Vec<_> = shape.bases().iter().map(|b| b.name()).collect();
        if bases.is_empty() {
            println!("  {shape}");
        } else {
            println!("  {shape} (extends {})", bases.join(", "));
        }
    }
}

/// Answers prompts from the controlling terminal, one line per prompt.
struct TerminalConversation {
    input: Mutex<BufReader<Stdin>>,
}

impl TerminalConversation {
    fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

#[async_trait]
impl Conversation for TerminalConversation {
    async fn converse(&self, prompts: &[Prompt]) -> warden_cred::Result<Vec<Reply>> {
        let mut input = self.input.lock().await;
        let mut replies = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            match prompt.kind {
                PromptKind::EchoOff | PromptKind::EchoOn => {
                    eprint!("{}: ", prompt.text);
                    let mut line = String::new();
                    input.read_line(&mut line).await?;
                    replies.push(Reply::new(line.trim_end_matches(['\r', '\n'])));
                },
                PromptKind::ErrorMessage => {
                    eprintln!("error: {}", prompt.text);
                    replies.push(Reply::new(""));
                },
                PromptKind::TextInfo => {
                    eprintln!("{}", prompt.text);
                    replies.push(Reply::new(""));
                },
            }
        }
        Ok(replies)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use warden_cred::{AvatarId, shape::USERNAME_PASSWORD};

    use super::*;

    fn args(username: &str, password: &str) -> CheckArgs {
        CheckArgs {
            username: Some(username.into()),
            password: Some(password.into()),
            interactive: false,
            anonymous: false,
            interfaces: Vec::new(),
        }
    }

    #[test]
    fn interfaces_resolve_by_name() {
        let resolved = resolve_interfaces(&["identity".into(), "session".into()]).unwrap();
        assert_eq!(resolved, vec![IDENTITY, SESSION]);

        let err = resolve_interfaces(&["admin".into()]).unwrap_err();
        assert!(err.to_string().contains("admin"));
    }

    #[tokio::test]
    async fn check_succeeds_and_logs_out() {
        let setup =
            PortalSetup::from_config(&WardenConfig::default(), &["memory:alice:secret".into()])
                .unwrap();
        check(&setup, &args("alice", "secret")).await.unwrap();

        let session = setup.realm.session(&AvatarId::named("alice")).unwrap();
        assert_eq!(session.login_count(), 1);
        assert!(!session.is_logged_in());
    }

    #[tokio::test]
    async fn check_fails_on_bad_password() {
        let setup =
            PortalSetup::from_config(&WardenConfig::default(), &["memory:alice:secret".into()])
                .unwrap();
        let err = check(&setup, &args("alice", "nope")).await.unwrap_err();
        assert!(err.to_string().contains("unauthorized"));
        assert!(setup.realm.is_empty());
    }

    #[tokio::test]
    async fn identity_interface_is_adapted() {
        let setup =
            PortalSetup::from_config(&WardenConfig::default(), &["memory:bob:hello".into()])
                .unwrap();
        let interfaces = resolve_interfaces(&["identity".into()]).unwrap();
        let login = setup
            .portal
            .login(&UsernamePassword::new("bob", "hello"), Mind::none(), &interfaces)
            .await
            .unwrap();
        assert_eq!(login.interface, IDENTITY);
        assert_eq!(describe_login(&login), "bob");
    }

    #[tokio::test]
    async fn anonymous_check_needs_anonymous_checker() {
        let anonymous = CheckArgs {
            username: None,
            password: None,
            interactive: false,
            anonymous: true,
            interfaces: vec!["session".into()],
        };

        let setup = PortalSetup::from_config(&WardenConfig::default(), &[]).unwrap();
        let err = check(&setup, &anonymous).await.unwrap_err();
        assert!(err.to_string().contains("no checker registered"));

        let setup =
            PortalSetup::from_config(&WardenConfig::default(), &["anonymous".into()]).unwrap();
        check(&setup, &anonymous).await.unwrap();
    }

    #[test]
    fn config_file_checkers_are_registered() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[[checkers]]\nkind = \"memory\"\n\
             users = [{{ username = \"alice\", password = \"secret\" }}]"
        )
        .unwrap();

        let setup = PortalSetup::load(Some(file.path()), &[]).unwrap();
        assert!(setup.portal.list_credentials_interfaces().contains(&USERNAME_PASSWORD));
    }

    #[test]
    fn bad_checker_string_is_an_error() {
        assert!(PortalSetup::from_config(&WardenConfig::default(), &["ldap:x".into()]).is_err());
    }
}
