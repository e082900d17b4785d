//! Entry point for the oemon TUI. Parses args, resolves the profile and runs the App.

use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{bail, Context};
use oemon::app::App;
use oemon::client::{Connection, OeClient};
use oemon::config::load_settings;
use oemon::poller::Scope;
use oemon::profiles::{
    config_dir, load_profiles, save_profiles, ProfileEntry, ProfileRequest, ResolveProfile,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "[--profile NAME|-P NAME] [--user USER|-u USER] [--password PW] \
[--app NAME|-a NAME] [--save] [--dry-run] [http(s)://HOST:PORT]";

#[derive(Debug, Default)]
struct ParsedArgs {
    url: Option<String>,
    profile: Option<String>,
    user: Option<String>,
    password: Option<String>,
    app: Option<String>,
    save: bool,
    dry_run: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "oemon".into());
    let mut parsed = ParsedArgs::default();

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(format!("Usage: {prog} {USAGE}")),
            "--profile" | "-P" => parsed.profile = it.next(),
            "--user" | "-u" => parsed.user = it.next(),
            "--password" => parsed.password = it.next(),
            "--app" | "-a" => parsed.app = it.next(),
            "--save" => parsed.save = true,
            "--dry-run" => parsed.dry_run = true,
            _ if arg.starts_with("--") && arg.contains('=') => {
                let (k, v) = arg.split_once('=').unwrap_or_default();
                let v = (!v.is_empty()).then(|| v.to_string());
                match k {
                    "--profile" => parsed.profile = v,
                    "--user" => parsed.user = v,
                    "--password" => parsed.password = v,
                    "--app" => parsed.app = v,
                    _ => return Err(format!("Unknown option '{k}'. Usage: {prog} {USAGE}")),
                }
            }
            _ => {
                if parsed.url.is_none() {
                    parsed.url = Some(arg);
                } else {
                    return Err(format!("Unexpected argument. Usage: {prog} {USAGE}"));
                }
            }
        }
    }
    Ok(parsed)
}

// The terminal belongs to the TUI, so logs go to a file.
// RUST_LOG controls verbosity (default: info).
fn init_logging() {
    let dir = config_dir();
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("oemon.log"))
    else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };

    init_logging();
    tracing::info!("oemon v{} starting", env!("CARGO_PKG_VERSION"));

    let Some(entry) = resolve_profile(&parsed)? else {
        return Ok(());
    };

    if parsed.dry_run {
        println!(
            "oemon: would connect to {} as '{}' (application: {})",
            entry.url,
            entry.username,
            entry.application.as_deref().unwrap_or("first available")
        );
        return Ok(());
    }

    let password = match parsed.password.clone().or_else(|| env::var("OEMON_PASSWORD").ok()) {
        Some(p) => p,
        None => prompt_string(&format!("Password for {}: ", entry.username))?
            .trim_end_matches(['\r', '\n'])
            .to_string(),
    };

    let settings = load_settings()?;
    let conn = Connection {
        url: entry.url.clone(),
        username: entry.username.clone(),
        password,
    };
    let client = OeClient::new(&conn, settings.request_timeout())?;

    let applications: Vec<String> = client
        .applications()
        .await
        .with_context(|| format!("fetching applications from {}", entry.url))?
        .into_iter()
        .map(|a| a.name)
        .collect();
    let application = match entry.application.clone().or_else(|| applications.first().cloned()) {
        Some(a) => a,
        None => bail!("{} reports no applications", entry.url),
    };
    tracing::info!(%application, count = applications.len(), "applications loaded");

    let mut app = App::new(client, settings, applications, Scope::application(application));
    app.run().await
}

/// Turn CLI inputs and stored profiles into connection details, creating or
/// updating the named profile as needed. `None` means the user backed out.
fn resolve_profile(parsed: &ParsedArgs) -> anyhow::Result<Option<ProfileEntry>> {
    let profiles_file = load_profiles();
    let req = ProfileRequest {
        profile_name: parsed.profile.clone(),
        url: parsed.url.clone(),
        username: parsed.user.clone(),
        application: parsed.app.clone(),
    };

    let mut profiles_mut = profiles_file.clone();
    let entry = match req.resolve(&profiles_file) {
        ResolveProfile::Direct(entry) => {
            // Possibly save if profile specified and --save or new entry
            if let Some(name) = parsed.profile.as_ref() {
                match profiles_mut.profiles.get(name) {
                    None => {
                        // New profile: auto-save immediately
                        profiles_mut.profiles.insert(name.clone(), entry.clone());
                        save_profiles(&profiles_mut).context("saving profiles")?;
                    }
                    Some(existing) if *existing != entry => {
                        let overwrite = parsed.save
                            || prompt_yes_no(&format!(
                                "Overwrite existing profile '{name}'? [y/N]: "
                            ));
                        if overwrite {
                            profiles_mut.profiles.insert(name.clone(), entry.clone());
                            save_profiles(&profiles_mut).context("saving profiles")?;
                        }
                    }
                    Some(_) => {}
                }
            }
            entry
        }
        ResolveProfile::Loaded(entry) => entry,
        ResolveProfile::PromptSelect(names) => {
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            let line = prompt_string("Enter number (or blank to abort): ")?;
            let picked = line
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|idx| (1..=names.len()).contains(idx))
                .and_then(|idx| profiles_mut.profiles.get(&names[idx - 1]));
            match picked {
                Some(entry) => ProfileEntry {
                    url: entry.url.clone(),
                    username: parsed.user.clone().unwrap_or_else(|| entry.username.clone()),
                    application: parsed.app.clone().or_else(|| entry.application.clone()),
                },
                None => return Ok(None),
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let url = prompt_string("Enter URL (http(s)://HOST:PORT): ")?;
            if url.trim().is_empty() {
                return Ok(None);
            }
            let username = match parsed.user.clone() {
                Some(u) => u,
                None => prompt_string("Enter user name: ")?.trim().to_string(),
            };
            let application = match parsed.app.clone() {
                Some(a) => Some(a),
                None => {
                    let a = prompt_string("Enter application (or leave blank): ")?;
                    (!a.trim().is_empty()).then(|| a.trim().to_string())
                }
            };
            let entry = ProfileEntry {
                url: url.trim().to_string(),
                username,
                application,
            };
            profiles_mut.profiles.insert(name, entry.clone());
            save_profiles(&profiles_mut).context("saving profiles")?;
            entry
        }
        ResolveProfile::None => {
            eprintln!("No URL provided and no profiles to select.");
            return Ok(None);
        }
    };
    Ok(Some(entry))
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_ok() {
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}
