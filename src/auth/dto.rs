use serde::{Deserialize, Serialize};

use crate::users::repo::{Role, User};

/// Request body for user registration. No role field: every self-registered
/// account becomes a client, and only the admin back-office changes roles.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_serialization() {
        let user = PublicUser {
            id: 5,
            username: "alice".into(),
            email: "alice@example.com".into(),
            role: Role::Client,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("alice@example.com"));
        assert!(json.contains("\"client\""));
    }

    #[test]
    fn register_request_has_no_role_field() {
        let json = r#"{"username":"bob","email":"b@x.com","password":"hunter22","role":"admin"}"#;
        let req: RegisterRequest = serde_json::from_str(json).unwrap();
        // An injected role field is simply ignored by the wire shape.
        assert_eq!(req.username, "bob");
    }
}
