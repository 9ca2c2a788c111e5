use serde::{Deserialize, Serialize};

use crate::utils::AppError;

/// Body of `POST /user/signup`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_agency_name: Option<String>,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }
        if let Some(email) = &self.email {
            if !looks_like_email(email) {
                return Err(AppError::Validation(format!("Invalid email address: '{}'", email)));
            }
        }
        Ok(())
    }
}

/// `local@domain.tld`, no whitespace.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

/// Body of `POST /user/login`. Extra signup fields sent by older clients are
/// ignored.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: Option<&str>) -> SignupRequest {
        SignupRequest {
            username: "ana".into(),
            password: "secret".into(),
            email: email.map(String::from),
            phone: None,
            ad_agency_name: None,
        }
    }

    #[test]
    fn test_validate_email() {
        assert!(request(None).validate().is_ok());
        assert!(request(Some("ana@studio.com")).validate().is_ok());
        for bad in ["ana", "@studio.com", "ana@studio", "ana@@studio.com", "an a@studio.com", "ana@.com"] {
            assert!(request(Some(bad)).validate().is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_validate_required_fields() {
        let mut req = request(None);
        req.username = "  ".into();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));

        let mut req = request(None);
        req.password = String::new();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_optional_fields_skipped_when_absent() {
        let json = serde_json::to_value(request(None)).unwrap();
        assert!(json.get("email").is_none());
        assert!(json.get("phone").is_none());

        let parsed: LoginRequest =
            serde_json::from_str(r#"{"username":"ana","password":"x","email":null}"#).unwrap();
        assert_eq!(parsed.username, "ana");
    }
}
