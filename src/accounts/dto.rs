use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::accounts::repo_types::User;
use crate::auth::{extractors::RequestContext, session::Flash};

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub followers: Vec<Uuid>,
    pub following: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            followers: u.followers,
            following: u.following,
            created_at: u.created_at,
        }
    }
}

/// Page payload: the data plus who is looking at it and any pending flash.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    #[serde(flatten)]
    pub data: T,
    pub current_user: Option<Uuid>,
    pub flash: Vec<Flash>,
}

impl<T> Page<T> {
    pub fn new(data: T, ctx: RequestContext) -> Self {
        Self {
            data,
            current_user: ctx.current_identity,
            flash: ctx.flash,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct UserDetails {
    pub user: PublicUser,
}

pub fn public_list(users: Vec<User>) -> UserList {
    UserList {
        users: users.into_iter().map(PublicUser::from).collect(),
    }
}
