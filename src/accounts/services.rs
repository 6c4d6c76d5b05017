use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::accounts::repo::UserStore;
use crate::accounts::repo_types::{NewUser, User};
use crate::auth::{extractors::RequestContext, password::hash_password};
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{1,32}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create a user with a freshly salted credential hash.
pub async fn register(
    users: &dyn UserStore,
    email: &str,
    username: &str,
    password: &str,
) -> AppResult<User> {
    let email = normalize_email(email);
    let username = username.trim();

    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    if !is_valid_username(username) {
        return Err(AppError::Validation(
            "username must be 1-32 letters, digits, '_', '.' or '-'".into(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation("password too short".into()));
    }

    let password_hash = hash_password(password)?;
    let user = users
        .insert(NewUser {
            email,
            username: username.to_string(),
            password_hash,
        })
        .await?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Zero or one user; no match is `Ok(None)`.
pub async fn find_by_username(users: &dyn UserStore, username: &str) -> AppResult<Option<User>> {
    users.find_by_username(username.trim()).await
}

pub async fn list_all(users: &dyn UserStore) -> AppResult<Vec<User>> {
    users.list_all().await
}

async fn require_target(users: &dyn UserStore, username: &str) -> AppResult<User> {
    find_by_username(users, username)
        .await?
        .ok_or(AppError::NotFound)
}

/// Make the current user a follower of `target_username`. Following twice
/// leaves a single edge.
pub async fn follow(
    users: &dyn UserStore,
    ctx: &RequestContext,
    target_username: &str,
) -> AppResult<User> {
    let follower_id = ctx.require_user()?;
    let target = require_target(users, target_username).await?;
    if target.id == follower_id {
        return Err(AppError::SelfFollow);
    }

    let added = users.add_follower(target.id, follower_id).await?;
    if added {
        info!(target_id = %target.id, follower_id = %follower_id, "follow");
    } else {
        debug!(target_id = %target.id, follower_id = %follower_id, "already following");
    }
    users.find_by_id(target.id).await?.ok_or(AppError::NotFound)
}

/// Removing a follower that is not there is a no-op.
pub async fn unfollow(
    users: &dyn UserStore,
    ctx: &RequestContext,
    target_username: &str,
) -> AppResult<User> {
    let follower_id = ctx.require_user()?;
    let target = require_target(users, target_username).await?;

    if users.remove_follower(target.id, follower_id).await? {
        info!(target_id = %target.id, follower_id = %follower_id, "unfollow");
    }
    users.find_by_id(target.id).await?.ok_or(AppError::NotFound)
}

pub async fn followers(users: &dyn UserStore, username: &str) -> AppResult<Vec<User>> {
    let user = require_target(users, username).await?;
    users.find_many(&user.followers).await
}

pub async fn following(users: &dyn UserStore, username: &str) -> AppResult<Vec<User>> {
    let user = require_target(users, username).await?;
    users.find_many(&user.following).await
}
