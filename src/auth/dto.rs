use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub login: String,
    pub password: String,
    pub email: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub login: String,
}

/// Response for registration. `email_sent` is false when the account was
/// created but the verification email could not be dispatched.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: PublicUser,
    pub email_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyEmailResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_serializes_id_and_login_only() {
        let user = PublicUser {
            id: Uuid::new_v4(),
            login: "alice".to_string(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("alice"));
        assert!(json.contains("id"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn register_response_uses_camel_case() {
        let response = RegisterResponse {
            user: PublicUser {
                id: Uuid::new_v4(),
                login: "alice".to_string(),
            },
            email_sent: false,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("emailSent"));
        assert!(!json.contains("email_sent"));
    }
}
