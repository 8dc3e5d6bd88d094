mod session;

use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use session::AdminSession;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "symposium-admin")]
#[command(about = "Symposium admin console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with an allow-listed admin account
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SYMPOSIUM_PASSWORD")]
        password: String,
        #[arg(long, default_value = "http://localhost:3000")]
        server: String,
    },
    /// Forget the saved session
    Logout,
    /// Event and registration totals
    Dashboard,
    /// List events, optionally by category (technical, non-technical) or a title/venue search
    Events {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Create an event from a JSON file holding the admin form fields
    CreateEvent {
        #[arg(long)]
        file: PathBuf,
    },
    /// Open or close registrations for an event
    SetRegistration {
        #[arg(long)]
        event_id: String,
        /// true to open, false to close
        #[arg(long, action = clap::ArgAction::Set)]
        open: bool,
    },
    /// Delete an event together with its registrations
    DeleteEvent {
        #[arg(long)]
        event_id: String,
    },
    /// List who registered for an event
    Registrations {
        #[arg(long)]
        event_id: String,
    },
    /// Download an event's registrations as CSV
    Export {
        #[arg(long)]
        event_id: String,
        /// Defaults to the file name suggested by the server
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List contact messages (all, unread, read)
    Messages {
        #[arg(long, default_value = "all")]
        filter: String,
    },
    /// Show a message and mark it read
    OpenMessage {
        #[arg(long)]
        id: String,
    },
    DeleteMessage {
        #[arg(long)]
        id: String,
    },
    /// Upload a coordinator photo and print its hosted URL
    Upload {
        #[arg(long)]
        image_path: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    id_token: String,
    user: LoginUser,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    email: Option<String>,
}

/// Reads `{ "error": ... }` from a failed response, falling back to the raw body.
async fn check(resp: Response) -> anyhow::Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| body["error"].as_str().map(str::to_string))
        .unwrap_or(text);
    anyhow::bail!("{} ({})", message, status)
}

fn authorized(request: RequestBuilder, session: &AdminSession) -> RequestBuilder {
    request.bearer_auth(&session.id_token)
}

async fn login(email: String, password: String, server: String) -> anyhow::Result<()> {
    let client = Client::new();
    let server = server.trim_end_matches('/').to_string();

    let resp = client
        .post(format!("{}/api/auth/login", server))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await?;

    match check(resp).await {
        Ok(resp) => {
            let body: LoginResponse = resp.json().await?;
            let session = AdminSession {
                server,
                email: body.user.email.unwrap_or(email),
                id_token: body.id_token,
            };
            session.save()?;
            println!("✅ Signed in as {}", session.email);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Login failed: {}", e);
            Err(e)
        }
    }
}

async fn logout() -> anyhow::Result<()> {
    let Some(session) = AdminSession::load()? else {
        println!("Not signed in");
        return Ok(());
    };

    let client = Client::new();
    if let Err(e) = authorized(
        client.post(format!("{}/api/auth/logout", session.server)),
        &session,
    )
    .send()
    .await
    {
        eprintln!("⚠️  Warning: could not reach server: {}", e);
    }

    AdminSession::clear()?;
    println!("👋 Signed out {}", session.email);
    Ok(())
}

async fn dashboard(session: AdminSession) -> anyhow::Result<()> {
    let client = Client::new();
    let resp = authorized(
        client.get(format!("{}/api/admin/dashboard", session.server)),
        &session,
    )
    .send()
    .await?;
    let stats: Value = check(resp).await?.json().await?;

    println!("📊 Dashboard");
    println!("  Events:          {}", stats["totalEvents"]);
    println!("    Technical:     {}", stats["technicalEvents"]);
    println!("    Non-technical: {}", stats["nonTechnicalEvents"]);
    println!("  Registrations:   {}", stats["totalRegistrations"]);
    println!("  Unread messages: {}", stats["unreadMessages"]);
    Ok(())
}

async fn list_events(
    session: AdminSession,
    category: Option<String>,
    search: Option<String>,
) -> anyhow::Result<()> {
    let client = Client::new();
    let mut query = Vec::new();
    if let Some(category) = category {
        query.push(("category", category));
    }
    if let Some(search) = search {
        query.push(("search", search));
    }

    let resp = authorized(
        client.get(format!("{}/api/admin/events", session.server)),
        &session,
    )
    .query(&query)
    .send()
    .await?;
    let body: Value = check(resp).await?.json().await?;
    let events = body["events"].as_array().cloned().unwrap_or_default();

    if events.is_empty() {
        println!("No events found");
        return Ok(());
    }

    println!("Events ({}):", events.len());
    println!();
    for event in events {
        let status = if event["registrationOpen"] == true {
            "🟢 open"
        } else {
            "🔴 closed"
        };
        println!(
            "  📅 {} [{}] {}",
            event["title"].as_str().unwrap_or_default(),
            event["category"].as_str().unwrap_or_default(),
            status
        );
        println!(
            "     {} {} @ {}",
            event["date"].as_str().unwrap_or_default(),
            event["time"].as_str().unwrap_or_default(),
            event["venue"].as_str().unwrap_or_default()
        );
        println!("     id: {}", event["id"].as_str().unwrap_or_default());
    }
    Ok(())
}

async fn create_event(session: AdminSession, file: PathBuf) -> anyhow::Result<()> {
    let text = fs::read_to_string(&file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let draft: Value = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("{} is not valid JSON: {}", file.display(), e))?;

    let client = Client::new();
    let resp = authorized(
        client.post(format!("{}/api/admin/events", session.server)),
        &session,
    )
    .json(&draft)
    .send()
    .await?;
    let body: Value = check(resp).await?.json().await?;

    println!("✅ Event created: {}", body["id"].as_str().unwrap_or_default());
    Ok(())
}

async fn set_registration(session: AdminSession, event_id: String, open: bool) -> anyhow::Result<()> {
    let client = Client::new();
    let resp = authorized(
        client.put(format!("{}/api/admin/events/{}", session.server, event_id)),
        &session,
    )
    .json(&json!({ "registrationOpen": open }))
    .send()
    .await?;
    let event: Value = check(resp).await?.json().await?;

    println!(
        "✅ Registrations for '{}' are now {}",
        event["title"].as_str().unwrap_or_default(),
        if open { "open" } else { "closed" }
    );
    Ok(())
}

async fn delete_event(session: AdminSession, event_id: String) -> anyhow::Result<()> {
    let client = Client::new();
    let resp = authorized(
        client.delete(format!("{}/api/admin/events/{}", session.server, event_id)),
        &session,
    )
    .send()
    .await?;
    let body: Value = check(resp).await?.json().await?;

    println!(
        "🗑️  Event {} deleted ({} registration(s) removed)",
        event_id, body["registrationsRemoved"]
    );
    Ok(())
}

async fn list_registrations(session: AdminSession, event_id: String) -> anyhow::Result<()> {
    let client = Client::new();
    let resp = authorized(
        client.get(format!(
            "{}/api/admin/events/{}/registrations",
            session.server, event_id
        )),
        &session,
    )
    .send()
    .await?;
    let body: Value = check(resp).await?.json().await?;
    let registrations = body["registrations"].as_array().cloned().unwrap_or_default();

    println!(
        "📋 {} - {} registration(s)",
        body["event"]["title"].as_str().unwrap_or_default(),
        registrations.len()
    );
    for r in registrations {
        println!(
            "  👤 {} <{}> {} | {} | {}",
            r["participantName"].as_str().unwrap_or_default(),
            r["email"].as_str().unwrap_or_default(),
            r["phone"].as_str().unwrap_or_default(),
            r["department"].as_str().unwrap_or_default(),
            r["college"].as_str().unwrap_or_default()
        );
        let team: Vec<&str> = r["teamMembers"]
            .as_array()
            .map(|members| members.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if !team.is_empty() {
            println!("     Team: {}", team.join(", "));
        }
    }
    Ok(())
}

/// File name from `Content-Disposition: attachment; filename="..."`.
fn suggested_filename(resp: &Response) -> Option<String> {
    let disposition = resp
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;
    let name = disposition.split("filename=").nth(1)?.trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

async fn export(session: AdminSession, event_id: String, output: Option<PathBuf>) -> anyhow::Result<()> {
    let client = Client::new();
    let resp = authorized(
        client.get(format!(
            "{}/api/admin/events/{}/registrations/export.csv",
            session.server, event_id
        )),
        &session,
    )
    .send()
    .await?;
    let resp = check(resp).await?;

    let path = output.unwrap_or_else(|| {
        PathBuf::from(suggested_filename(&resp).unwrap_or_else(|| "registrations.csv".to_string()))
    });
    let csv = resp.text().await?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &csv)?;

    println!(
        "💾 Exported {} row(s) to {}",
        csv.lines().count().saturating_sub(1),
        path.display()
    );
    Ok(())
}

async fn list_messages(session: AdminSession, filter: String) -> anyhow::Result<()> {
    let client = Client::new();
    let resp = authorized(
        client.get(format!("{}/api/admin/messages", session.server)),
        &session,
    )
    .query(&[("filter", filter.as_str())])
    .send()
    .await?;
    let body: Value = check(resp).await?.json().await?;
    let messages = body["messages"].as_array().cloned().unwrap_or_default();

    println!(
        "📨 {} message(s), {} unread",
        messages.len(),
        body["unreadCount"]
    );
    for m in messages {
        let marker = if m["read"] == true { "  " } else { "🔵" };
        println!(
            "  {} {} <{}> - {}",
            marker,
            m["name"].as_str().unwrap_or_default(),
            m["email"].as_str().unwrap_or_default(),
            m["subject"].as_str().unwrap_or_default()
        );
        println!("     id: {}", m["id"].as_str().unwrap_or_default());
    }
    Ok(())
}

async fn open_message(session: AdminSession, id: String) -> anyhow::Result<()> {
    let client = Client::new();
    let resp = authorized(
        client.get(format!("{}/api/admin/messages/{}", session.server, id)),
        &session,
    )
    .send()
    .await?;
    let m: Value = check(resp).await?.json().await?;

    println!(
        "From:    {} <{}>",
        m["name"].as_str().unwrap_or_default(),
        m["email"].as_str().unwrap_or_default()
    );
    if let Some(college) = m["college"].as_str().filter(|c| !c.is_empty()) {
        println!("College: {}", college);
    }
    println!("Subject: {}", m["subjectLabel"].as_str().unwrap_or_default());
    println!("Sent:    {}", m["createdAt"].as_str().unwrap_or_default());
    println!();
    println!("{}", m["message"].as_str().unwrap_or_default());
    Ok(())
}

async fn delete_message(session: AdminSession, id: String) -> anyhow::Result<()> {
    let client = Client::new();
    let resp = authorized(
        client.delete(format!("{}/api/admin/messages/{}", session.server, id)),
        &session,
    )
    .send()
    .await?;
    check(resp).await?;

    println!("🗑️  Message {} deleted", id);
    Ok(())
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

async fn upload(session: AdminSession, image_path: PathBuf) -> anyhow::Result<()> {
    let data = fs::read(&image_path)
        .map_err(|e| anyhow::anyhow!("Failed to open image {}: {}", image_path.display(), e))?;
    let filename = image_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("photo")
        .to_string();

    println!("📤 Uploading {} ({} bytes)", filename, data.len());
    let part = Part::bytes(data)
        .file_name(filename)
        .mime_str(image_mime(&image_path))?;

    let client = Client::new();
    let resp = authorized(
        client.post(format!("{}/api/upload", session.server)),
        &session,
    )
    .multipart(Form::new().part("file", part))
    .send()
    .await?;
    let body: Value = check(resp).await?.json().await?;

    println!("✅ {}", body["url"].as_str().unwrap_or_default());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Login {
            email,
            password,
            server,
        } => login(email, password, server).await,
        Commands::Logout => logout().await,
        Commands::Dashboard => dashboard(AdminSession::require()?).await,
        Commands::Events { category, search } => {
            list_events(AdminSession::require()?, category, search).await
        }
        Commands::CreateEvent { file } => create_event(AdminSession::require()?, file).await,
        Commands::SetRegistration { event_id, open } => {
            set_registration(AdminSession::require()?, event_id, open).await
        }
        Commands::DeleteEvent { event_id } => {
            delete_event(AdminSession::require()?, event_id).await
        }
        Commands::Registrations { event_id } => {
            list_registrations(AdminSession::require()?, event_id).await
        }
        Commands::Export { event_id, output } => {
            export(AdminSession::require()?, event_id, output).await
        }
        Commands::Messages { filter } => list_messages(AdminSession::require()?, filter).await,
        Commands::OpenMessage { id } => open_message(AdminSession::require()?, id).await,
        Commands::DeleteMessage { id } => delete_message(AdminSession::require()?, id).await,
        Commands::Upload { image_path } => upload(AdminSession::require()?, image_path).await,
    }
}
