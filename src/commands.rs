//! Console commands.
//!
//! Each subcommand maps onto one screen action of the admin console: signing
//! in, browsing a resource table, or submitting a create/edit/delete form.
//! Results are printed to stdout as pretty JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Subcommand, ValueEnum};
use reqwest::Method;
use serde::Serialize;
use thiserror::Error;

use crate::api::resources::{self, ImageUpload};
use crate::api::types::*;
use crate::api::{auth, ApiClient, ApiError, RequestBody, RequestOptions};
use crate::session::{Session, SessionInvalidated, SessionObserver, TokenState};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Invalid JSON data: {0}")]
    InvalidData(#[from] serde_json::Error),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Unsupported(String),
    #[error("This command needs the stored session; run without --no-session")]
    NoSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceKind {
    Category,
    Material,
    Unit,
    Supplier,
    Table,
    Inventory,
    Reservation,
    MenuItem,
    Feature,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create a new account
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        user_name: String,
        #[arg(long)]
        gender: Option<i32>,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long, default_value = "")]
        phone_number: String,
    },
    /// Remove the stored session
    Logout,
    /// Show the stored session state
    Status,
    /// List every entry of a resource
    List { resource: ResourceKind },
    /// Show one entry by id
    Show { resource: ResourceKind, id: String },
    /// Create an entry from a JSON draft
    Create {
        resource: ResourceKind,
        /// Draft as JSON, e.g. '{"name":"Coffee"}'
        #[arg(long)]
        data: String,
        /// Image file (menu items only)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Replace an entry from a JSON draft
    Update {
        resource: ResourceKind,
        id: String,
        #[arg(long)]
        data: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete an entry by id
    Delete { resource: ResourceKind, id: String },
    /// List inventory lots of one material
    Stock { material_id: String },
    /// Send a raw request and print the response as received
    Request {
        method: HttpMethod,
        path: String,
        #[arg(long)]
        data: Option<String>,
        /// Extra header as NAME:VALUE (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,
    },
}

/// Presentation-side reaction to a torn-down session: tell the user to sign
/// in again.
pub struct ConsoleRedirect;

impl SessionObserver for ConsoleRedirect {
    fn session_invalidated(&self, event: &SessionInvalidated) {
        log::info!("Redirecting to {}", event.redirect_to);
        eprintln!(
            "Session ended ({}). Sign in again with `moc-admin login` ({}).",
            event.reason, event.redirect_to
        );
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_session(state: &AppState) -> Result<&Arc<Session>, CommandError> {
    state.session.as_ref().ok_or(CommandError::NoSession)
}

fn read_image(path: Option<&Path>) -> Result<Option<ImageUpload>, CommandError> {
    path.map(|p| {
        ImageUpload::from_path(p).map_err(|source| CommandError::Io {
            path: p.to_path_buf(),
            source,
        })
    })
    .transpose()
}

fn reject_image(kind: ResourceKind, image: Option<&Path>) -> Result<(), CommandError> {
    match image {
        Some(_) => Err(CommandError::Unsupported(format!(
            "--image is only accepted for menu items, not {:?}",
            kind
        ))),
        None => Ok(()),
    }
}

/// Run `$body` with `$r` bound to the resource type of `$kind`.
macro_rules! with_resource {
    ($kind:expr, $r:ident => $body:expr) => {
        match $kind {
            ResourceKind::Category => { type $r = Category; $body }
            ResourceKind::Material => { type $r = Material; $body }
            ResourceKind::Unit => { type $r = Unit; $body }
            ResourceKind::Supplier => { type $r = Supplier; $body }
            ResourceKind::Table => { type $r = Table; $body }
            ResourceKind::Inventory => { type $r = InventoryLot; $body }
            ResourceKind::Reservation => { type $r = Reservation; $body }
            ResourceKind::MenuItem => { type $r = MenuItem; $body }
            ResourceKind::Feature => { type $r = Feature; $body }
            ResourceKind::User => { type $r = User; $body }
        }
    };
}

/// Like `with_resource!` for collections with write routes. `$other` handles
/// the rest.
macro_rules! with_editable {
    ($kind:expr, $r:ident => $body:expr, $other:pat => $fallback:expr) => {
        match $kind {
            ResourceKind::Category => { type $r = Category; $body }
            ResourceKind::Material => { type $r = Material; $body }
            ResourceKind::Supplier => { type $r = Supplier; $body }
            ResourceKind::Table => { type $r = Table; $body }
            ResourceKind::Inventory => { type $r = InventoryLot; $body }
            ResourceKind::Reservation => { type $r = Reservation; $body }
            ResourceKind::Feature => { type $r = Feature; $body }
            $other => $fallback,
        }
    };
}

async fn create_entry(
    api: &ApiClient,
    kind: ResourceKind,
    data: &str,
    image: Option<&Path>,
) -> Result<Option<serde_json::Value>, CommandError> {
    if kind == ResourceKind::MenuItem {
        let draft: MenuItemDraft = serde_json::from_str(data)?;
        let image = read_image(image)?;
        return Ok(resources::create_menu_item(api, &draft, image).await?);
    }
    reject_image(kind, image)?;
    with_editable!(kind, R => {
        let draft: <R as resources::Editable>::Draft = serde_json::from_str(data)?;
        Ok(resources::create::<R>(api, &draft).await?)
    }, other => Err(CommandError::Unsupported(format!("{:?} entries cannot be created", other))))
}

async fn update_entry(
    api: &ApiClient,
    kind: ResourceKind,
    id: &str,
    data: &str,
    image: Option<&Path>,
) -> Result<Option<serde_json::Value>, CommandError> {
    if kind == ResourceKind::MenuItem {
        let draft: MenuItemDraft = serde_json::from_str(data)?;
        let image = read_image(image)?;
        return Ok(resources::update_menu_item(api, id, &draft, image).await?);
    }
    reject_image(kind, image)?;
    with_editable!(kind, R => {
        let draft: <R as resources::Editable>::Draft = serde_json::from_str(data)?;
        Ok(resources::update::<R>(api, id, &draft).await?)
    }, other => Err(CommandError::Unsupported(format!("{:?} entries cannot be updated", other))))
}

async fn delete_entry(
    api: &ApiClient,
    kind: ResourceKind,
    id: &str,
) -> Result<Option<serde_json::Value>, CommandError> {
    with_editable!(kind, R => {
        Ok(resources::delete::<R>(api, id).await?)
    }, other => Err(CommandError::Unsupported(format!("{:?} entries cannot be deleted", other))))
}

fn parse_header(raw: &str) -> Result<(String, String), CommandError> {
    raw.split_once(':')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| CommandError::Unsupported(format!("header '{}' is not NAME:VALUE", raw)))
}

/// Execute one console command.
pub async fn run(state: &AppState, command: Command) -> Result<(), CommandError> {
    let api = state.api.as_ref();

    match command {
        Command::Login { email, password } => {
            let session = require_session(state)?;
            let data = auth::login(api, session, &email, &password).await?;
            println!(
                "Signed in as {}",
                data.display_name().unwrap_or(email.as_str())
            );
        }
        Command::Register {
            first_name,
            last_name,
            email,
            user_name,
            gender,
            password,
            confirm_password,
            phone_number,
        } => {
            let request = RegisterRequest {
                first_name,
                last_name,
                email,
                user_name,
                gender,
                password,
                comfirm_password: confirm_password,
                phone_number,
            };
            auth::register(api, &request).await?;
            println!("Account {} created; you can sign in now", request.user_name);
        }
        Command::Logout => {
            auth::logout(require_session(state)?)?;
            println!("Signed out");
        }
        Command::Status => {
            let session = require_session(state)?;
            let token_state = session.state().map_err(ApiError::from)?;
            let snapshot: Option<AuthData> = session.snapshot().map_err(ApiError::from)?;
            let user = snapshot.as_ref().and_then(|s| s.display_name());
            match (token_state, user) {
                (TokenState::Valid, Some(user)) => println!("Signed in as {}", user),
                (TokenState::Valid, None) => println!("Signed in"),
                (TokenState::Expired, _) => println!("Session expired"),
                (TokenState::Absent, _) => println!("Not signed in"),
            }
        }
        Command::List { resource } => {
            with_resource!(resource, R => print_json(&resources::list::<R>(api).await?)?);
        }
        Command::Show { resource, id } => {
            with_resource!(resource, R => print_json(&resources::show::<R>(api, &id).await?)?);
        }
        Command::Create {
            resource,
            data,
            image,
        } => {
            let echoed = create_entry(api, resource, &data, image.as_deref()).await?;
            print_json(&echoed)?;
        }
        Command::Update {
            resource,
            id,
            data,
            image,
        } => {
            let echoed = update_entry(api, resource, &id, &data, image.as_deref()).await?;
            print_json(&echoed)?;
        }
        Command::Delete { resource, id } => {
            let echoed = delete_entry(api, resource, &id).await?;
            print_json(&echoed)?;
        }
        Command::Stock { material_id } => {
            print_json(&resources::inventory_for_material(api, &material_id).await?)?;
        }
        Command::Request {
            method,
            path,
            data,
            headers,
        } => {
            let mut options = RequestOptions::new();
            for raw in &headers {
                let (name, value) = parse_header(raw)?;
                options = options.header(&name, &value)?;
            }
            let body = match data {
                Some(data) => Some(RequestBody::Json(serde_json::from_str(&data)?)),
                None => None,
            };
            let resp = api.request(method.into(), &path, body, options).await?;
            println!("{}", resp.status());
            let text = resp.text().await.map_err(ApiError::from)?;
            println!("{}", text);
        }
    }

    Ok(())
}
