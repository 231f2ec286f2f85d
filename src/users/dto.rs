use serde::Deserialize;

use crate::users::repo::Role;

/// Admin-created account; unlike self-registration the role is chosen here.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    pub email: String,
    pub role: Role,
}
