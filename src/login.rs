#![cfg(feature = "web")]

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::{MAX_SESSION_HOURS, ServerConfig};
use crate::error::{GraphError, GraphResult};
use crate::validation::is_valid_username;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// User data structure representing a registered application user
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    pub created: SystemTime,
}

/// Credential data for login and registration
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Username of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Authenticated user, inserted into request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
    static ref USERS_LOCK: Mutex<()> = Mutex::new(());
}

/// Initialize the database structure
///
/// Creates the data directory, the history directory and an empty users file
/// if they don't exist. This should be called before any other database
/// operations; existing users are left untouched.
///
/// # Arguments
/// * `config` - Server configuration naming the data directory
///
/// # Returns
/// * `std::io::Result<()>` - Success or an IO error
///
/// # Examples
/// ```
/// use pressure_graph::config::ServerConfig;
/// use pressure_graph::login::init_database;
///
/// let config = ServerConfig {
///     data_dir: std::env::temp_dir().join("pressure-graph-doc-db"),
///     ..ServerConfig::default()
/// };
/// init_database(&config).unwrap();
/// assert!(config.users_file().exists());
/// ```
pub fn init_database(config: &ServerConfig) -> std::io::Result<()> {
    create_dir_all(&config.data_dir)?;
    create_dir_all(config.history_dir())?;

    let users_path = config.users_file();
    if !users_path.exists() {
        fs::write(users_path, b"{}")?;
    }

    Ok(())
}

/// Get all registered users
///
/// Reads the users file and returns a map of all registered users. A missing
/// file means no users yet.
///
/// # Arguments
/// * `users_file` - Path of `users.json`
///
/// # Returns
/// * `GraphResult<HashMap<String, User>>` - Map of usernames to user objects
///
/// # Errors
/// * Returns an error if the users file cannot be read or parsed
pub fn get_users(users_file: &Path) -> GraphResult<HashMap<String, User>> {
    if !users_file.exists() {
        return Ok(HashMap::new());
    }
    let contents = fs::read_to_string(users_file)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the users map to disk
///
/// # Arguments
/// * `users_file` - Path of `users.json`
/// * `users` - The users map to save
pub fn save_users(users_file: &Path, users: &HashMap<String, User>) -> GraphResult<()> {
    fs::write(users_file, serde_json::to_string_pretty(users)?)?;
    Ok(())
}

/// Register a new user
///
/// Creates a new user account with the provided username and password.
/// The password is hashed with Argon2 before storage.
///
/// # Arguments
/// * `users_file` - Path of `users.json`
/// * `username` - Unique username for the new account
/// * `password` - Plain text password (will be hashed)
///
/// # Returns
/// * `GraphResult<()>` - Success or an error
///
/// # Errors
/// * [`GraphError::Auth`] if the username is malformed or taken, or the
///   password is too short
pub fn register_user(users_file: &Path, username: &str, password: &str) -> GraphResult<()> {
    if !is_valid_username(username) {
        return Err(GraphError::Auth(
            "Username must be 3-32 letters, digits, '-' or '_'".to_string(),
        ));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(GraphError::Auth(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let _guard = USERS_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let mut users = get_users(users_file)?;
    if users.contains_key(username) {
        return Err(GraphError::Auth("Username already exists".to_string()));
    }

    let user = User {
        username: username.to_string(),
        password_hash: hash_password(password)?,
        created: SystemTime::now(),
    };
    users.insert(username.to_string(), user);
    save_users(users_file, &users)?;

    log::info!("Registered user {}", username);
    Ok(())
}

/// Verify user credentials
///
/// Checks whether the provided username and password match a registered user.
///
/// # Arguments
/// * `users_file` - Path of `users.json`
/// * `username` - Username to verify
/// * `password` - Password to verify
///
/// # Returns
/// * `GraphResult<bool>` - `true` if the credentials are valid, `false` for an
///   unknown user or a wrong password
pub fn verify_user(users_file: &Path, username: &str, password: &str) -> GraphResult<bool> {
    let users = get_users(users_file)?;

    match users.get(username) {
        Some(user) => verify_password(password, &user.password_hash),
        None => Ok(false),
    }
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> GraphResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err(GraphError::Auth("Password hashing failed".to_string())),
    }
}

/// Verify a password against a stored hash
fn verify_password(password: &str, hash: &str) -> GraphResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| GraphError::Auth("Invalid password hash format".to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Create a new user session
///
/// Creates and stores a new session for an authenticated user. Expired
/// sessions are dropped at the same time.
///
/// # Arguments
/// * `username` - Username of the authenticated user
/// * `lifetime` - How long the session stays valid, capped at
///   [`MAX_SESSION_HOURS`]
///
/// # Returns
/// * `String` - The session id to put in the cookie
pub fn create_session(username: &str, lifetime: Duration) -> String {
    let lifetime = lifetime.min(Duration::from_secs(MAX_SESSION_HOURS * 60 * 60));
    let session_id = Uuid::new_v4().to_string();
    let session = Session {
        user_id: username.to_string(),
        expires_at: SystemTime::now() + lifetime,
    };

    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    let now = SystemTime::now();
    sessions.retain(|_, s| s.expires_at > now);
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Username for a live session, `None` if unknown or expired
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap_or_else(|e| e.into_inner());

    sessions
        .get(session_id)
        .filter(|session| session.expires_at > SystemTime::now())
        .map(|session| session.user_id.clone())
}

/// Ends a session
pub fn destroy_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap_or_else(|e| e.into_inner());
    sessions.remove(session_id);
}

/// Username of the session in the cookie jar, if any
pub fn current_user(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| validate_session(cookie.value()))
}

/// Authentication middleware
///
/// Lets requests with a valid session cookie through, attaching a
/// [`CurrentUser`]; everything else gets 401.
pub async fn require_auth(jar: CookieJar, mut request: Request, next: Next) -> Response {
    match current_user(&jar) {
        Some(username) => {
            request.extensions_mut().insert(CurrentUser(username));
            next.run(request).await
        }
        None => GraphError::Auth("Login required".to_string()).into_response(),
    }
}

/// Handle user registration
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<UserCredentials>,
) -> Result<StatusCode, GraphError> {
    register_user(
        &state.config.users_file(),
        &credentials.username,
        &credentials.password,
    )?;
    Ok(StatusCode::CREATED)
}

/// Handle user login requests
///
/// Sets the session cookie on success.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<UserCredentials>,
) -> Result<(CookieJar, Json<serde_json::Value>), GraphError> {
    if !verify_user(
        &state.config.users_file(),
        &credentials.username,
        &credentials.password,
    )? {
        log::warn!("Failed login for {}", credentials.username);
        return Err(GraphError::Auth("Invalid username or password".to_string()));
    }

    let session_id = create_session(&credentials.username, state.config.session_duration());
    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true);

    Ok((
        jar.add(cookie),
        Json(serde_json::json!({ "status": "ok", "username": credentials.username })),
    ))
}

/// Handle user logout
///
/// Ends the session and clears the cookie.
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        destroy_session(cookie.value());
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}
