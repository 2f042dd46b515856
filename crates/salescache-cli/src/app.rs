//! Command handling for the salescache terminal front-end.
//!
//! `App` owns the configuration, the file-backed store and the session. A
//! fresh `CacheManager` is built per command so it always carries the token
//! currently persisted in the session.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use tracing::{info, warn};

use salescache_core::api::ApiClient;
use salescache_core::auth::{warm_up_all, Session, WarmUpReport};
use salescache_core::cache::{CacheManager, EntityKind, FetchOptions, FileStore, StorageAdapter};
use salescache_core::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: Option<String> },
    WarmUp,
    Get { kind: EntityKind, options: FetchOptions },
    Invalidate { kind: EntityKind },
    WhoAmI,
    Logout,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("No command given"))?;

        match name.as_str() {
            "login" => Ok(Command::Login {
                username: rest.first().cloned(),
            }),
            "warmup" | "warm-up" => Ok(Command::WarmUp),
            "get" => {
                let mut kind = None;
                let mut options = FetchOptions::default();
                for arg in rest {
                    match arg.as_str() {
                        "--force" | "-f" => options.force_refresh = true,
                        "--include-inactive" => options.include_inactive = true,
                        other if other.starts_with('-') => bail!("Unknown flag: {}", other),
                        other => kind = Some(parse_kind(other)?),
                    }
                }
                let kind = kind.ok_or_else(|| anyhow!("get needs an entity name"))?;
                Ok(Command::Get { kind, options })
            }
            "invalidate" => {
                let entity = rest
                    .first()
                    .ok_or_else(|| anyhow!("invalidate needs an entity name"))?;
                Ok(Command::Invalidate {
                    kind: parse_kind(entity)?,
                })
            }
            "whoami" => Ok(Command::WhoAmI),
            "logout" => Ok(Command::Logout),
            other => bail!("Unknown command: {}", other),
        }
    }
}

fn parse_kind(name: &str) -> Result<EntityKind> {
    name.parse::<EntityKind>().map_err(|_| {
        let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.name()).collect();
        anyhow!("Unknown entity '{}'. Known: {}", name, known.join(", "))
    })
}

pub struct App {
    config: Config,
    cache_dir: PathBuf,
    storage: StorageAdapter<FileStore>,
    session: Session<FileStore>,
    api: ApiClient,
}

impl App {
    pub fn new(config: Config, cache_dir: PathBuf) -> Result<Self> {
        let store = FileStore::open(cache_dir.clone(), config.storage_quota_bytes)
            .context("Failed to open cache directory")?;
        let storage = StorageAdapter::new(store);
        let session = Session::new(storage.clone());
        let api = ApiClient::new(&config.api_base_url, config.request_timeout())?;

        Ok(Self {
            config,
            cache_dir,
            storage,
            session,
            api,
        })
    }

    /// Cache manager whose fetcher carries the persisted session token.
    fn manager(&self) -> CacheManager<FileStore, ApiClient> {
        let api = match self.session.token() {
            Some(token) => self.api.with_token(token),
            None => self.api.clone(),
        };
        CacheManager::new(self.storage.clone(), api)
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { username } => self.login(username).await,
            Command::WarmUp => {
                self.require_session()?;
                let report = warm_up_all(&self.manager()).await;
                print_report(&report);
                Ok(())
            }
            Command::Get { kind, options } => {
                let value = self.manager().get(kind, options).await;
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Command::Invalidate { kind } => {
                self.manager().invalidate(kind);
                eprintln!("Invalidated {}", kind);
                Ok(())
            }
            Command::WhoAmI => {
                self.whoami();
                Ok(())
            }
            Command::Logout => {
                self.session.logout();
                eprintln!("Logged out, cache cleared");
                Ok(())
            }
        }
    }

    async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(name) => name,
            None => prompt_username()?,
        };
        if username.is_empty() {
            bail!("Username required");
        }
        let password = rpassword::prompt_password(format!("Password for {}: ", username))?;
        if password.is_empty() {
            bail!("Password required");
        }

        let login = self
            .api
            .authenticate(&username, &password)
            .await
            .context("Login failed")?;

        if !self.session.begin(&login) {
            bail!("Logged in, but the session could not be saved to {}", self.cache_dir.display());
        }
        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        info!(company = %login.company_name, "Logged in");
        eprintln!("Logged in to {}. Warming cache...", login.company_name);

        let report = warm_up_all(&self.manager()).await;
        print_report(&report);
        Ok(())
    }

    fn require_session(&self) -> Result<()> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            bail!("Not logged in. Run `salescache login` first.")
        }
    }

    fn whoami(&self) {
        let Some(identity) = self.session.identity() else {
            println!("Not logged in");
            return;
        };
        println!("Company: {}", identity.company_name);
        println!("User:    {}", identity.user_uuid);
        println!("Role:    {}", identity.user_role.as_deref().unwrap_or("-"));
        if let Some(data) = self.session.data() {
            let since = data.created_at.with_timezone(&Local);
            println!("Login:   {} since {}", data.username, since.format("%Y-%m-%d %H:%M"));
        }
    }
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

fn print_report(report: &WarmUpReport) {
    for (kind, count) in &report.counts {
        println!("{:<24} {:>6}", kind.name(), count);
    }
    println!(
        "{} records across {} entities in {:.1}s",
        report.total_records(),
        report.counts.len(),
        report.elapsed.as_secs_f64()
    );
}
