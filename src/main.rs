//! Administrative command-line tool for flatbase data directories.
//!
//! The HTTP API cannot mint its first user or permission rule (nothing is
//! authorized before `_permissions` has rows), so bootstrapping happens
//! here: `init` writes the system schemas, `add-user` and `set-permission`
//! seed accounts and rules, `list` inspects any collection.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use flatbase::auth::{generate_salt, hash_password};
use flatbase::store::{random_id, Error, Resource, RowLog, Store, Value};

#[derive(Parser)]
#[command(name = "flatbase")]
#[command(about = "Administer a flatbase data directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory with schemas for `_users` and `_permissions`
    Init {
        /// Data directory
        #[arg(default_value = "data", env = "FLATBASE_DATA")]
        dir: PathBuf,
    },

    /// Create a user, or rotate an existing user's password and roles
    AddUser {
        /// Data directory
        #[arg(long, default_value = "data", env = "FLATBASE_DATA")]
        dir: PathBuf,

        /// User name (stored as the row's `_id`)
        username: String,

        /// Clear-text password; only its salted hash is stored
        password: String,

        /// Roles granted to the user
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
    },

    /// Append a permission rule
    SetPermission {
        /// Data directory
        #[arg(long, default_value = "data", env = "FLATBASE_DATA")]
        dir: PathBuf,

        /// Collection the rule applies to
        resource: String,

        /// Action: read, create, update, delete or `*`
        action: String,

        /// Ownership field; the row grants access when this field equals or
        /// contains the acting user's name
        #[arg(long, default_value = "")]
        field: String,

        /// Role required by the rule; `*` accepts any authenticated user.
        /// Empty field and role together make the rule public
        #[arg(long, default_value = "")]
        role: String,
    },

    /// Print a collection as JSON, one resource per line
    List {
        /// Data directory
        #[arg(long, default_value = "data", env = "FLATBASE_DATA")]
        dir: PathBuf,

        /// Collection name
        collection: String,

        /// Field to order the output by
        #[arg(long)]
        sort: Option<String>,
    },
}

/// Field declarations for the system collections, in `_schemas.csv` column
/// order: collection, field, type, min, max, regex.
const SYSTEM_SCHEMAS: &[(&str, &str, &str, &str, &str, &str)] = &[
    ("_users", "_id", "text", "0", "0", "^[a-zA-Z0-9_.-]+$"),
    ("_users", "_v", "number", "1", "0", ""),
    ("_users", "salt", "text", "0", "0", ""),
    ("_users", "password", "text", "0", "0", ""),
    ("_users", "roles", "list", "0", "0", ""),
    ("_permissions", "_id", "text", "0", "0", ""),
    ("_permissions", "_v", "number", "1", "0", ""),
    ("_permissions", "resource", "text", "0", "0", ""),
    ("_permissions", "action", "text", "0", "0", ""),
    ("_permissions", "field", "text", "0", "0", ""),
    ("_permissions", "role", "text", "0", "0", ""),
];

fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Commands::Init { dir } => init(&dir),
        Commands::AddUser {
            dir,
            username,
            password,
            roles,
        } => add_user(&dir, &username, &password, roles),
        Commands::SetPermission {
            dir,
            resource,
            action,
            field,
            role,
        } => set_permission(&dir, &resource, &action, &field, &role),
        Commands::List {
            dir,
            collection,
            sort,
        } => list(&dir, &collection, sort.as_deref()),
    }
}

fn init(dir: &PathBuf) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let schemas = RowLog::open(dir.join("_schemas.csv"))?;
    if schemas.iter().next().is_some() {
        anyhow::bail!("{} is already initialized", dir.display());
    }
    for (collection, field, kind, min, max, regex) in SYSTEM_SCHEMAS {
        let row = vec![
            random_id(),
            "1".to_string(),
            collection.to_string(),
            field.to_string(),
            kind.to_string(),
            min.to_string(),
            max.to_string(),
            regex.to_string(),
        ];
        schemas.create(&row)?;
    }
    schemas.close()?;
    println!("initialized {}", dir.display());
    Ok(())
}

fn add_user(dir: &PathBuf, username: &str, password: &str, roles: Vec<String>) -> anyhow::Result<()> {
    let mut store = Store::open(dir)?;

    let salt = generate_salt();
    let mut user = Resource::new();
    user.insert("salt".to_string(), Value::Text(salt.clone()));
    user.insert(
        "password".to_string(),
        Value::Text(hash_password(password, &salt)),
    );
    user.insert("roles".to_string(), Value::List(roles));

    match store.get("_users", username) {
        Ok(Some(_)) => {
            user.insert("_id".to_string(), Value::Text(username.to_string()));
            store.update("_users", user)?;
            println!("updated user {username}");
        }
        Ok(None) | Err(Error::NotFound) => {
            // The user's name is their id, so override the random strategy.
            let name = username.to_string();
            store.set_id_gen(move || name.clone());
            store.create("_users", user)?;
            println!("created user {username}");
        }
        Err(e) => return Err(e.into()),
    }
    store.close()?;
    Ok(())
}

fn set_permission(
    dir: &PathBuf,
    resource: &str,
    action: &str,
    field: &str,
    role: &str,
) -> anyhow::Result<()> {
    let store = Store::open(dir)?;
    let mut rule = Resource::new();
    rule.insert("resource".to_string(), Value::Text(resource.to_string()));
    rule.insert("action".to_string(), Value::Text(action.to_string()));
    rule.insert("field".to_string(), Value::Text(field.to_string()));
    rule.insert("role".to_string(), Value::Text(role.to_string()));
    let created = store.create("_permissions", rule)?;
    let id = created.get("_id").and_then(Value::as_text).unwrap_or("");
    println!("created rule {id}");
    store.close()?;
    Ok(())
}

fn list(dir: &PathBuf, collection: &str, sort: Option<&str>) -> anyhow::Result<()> {
    let store = Store::open(dir)?;
    for resource in store.list(collection, sort)? {
        println!("{}", serde_json::to_string(&resource)?);
    }
    store.close()?;
    Ok(())
}
