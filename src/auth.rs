//! Account flows: form validation, then the matching backend call.

use serde_json::json;
use url::Url;

use crate::api::{LoginRequest, NotesApi, RegisterRequest, ResetPasswordRequest};
use crate::error::{ClientError, ClientResult};

/// Where the backend sends the browser after the calendar consent screen.
pub const AUTHORIZE_REDIRECT: &str = "/note";

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> ClientResult<LoginRequest> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err(ClientError::validation("Email and password are required."));
        }
        Ok(LoginRequest {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> ClientResult<RegisterRequest> {
        let username = self.username.trim();
        let email = self.email.trim();
        if username.is_empty() || email.is_empty() || self.password.is_empty() {
            return Err(ClientError::validation("All fields are required."));
        }
        Ok(RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResetForm {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl ResetForm {
    pub fn validate(&self) -> ClientResult<ResetPasswordRequest> {
        if self.token.trim().is_empty()
            || self.new_password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(ClientError::validation("All fields are required."));
        }
        if self.new_password != self.confirm_password {
            return Err(ClientError::validation("Passwords do not match."));
        }
        Ok(ResetPasswordRequest {
            token: self.token.trim().to_string(),
            new_password: self.new_password.clone(),
            confirm_password: self.confirm_password.clone(),
        })
    }
}

pub fn login<A: NotesApi + ?Sized>(api: &A, form: &LoginForm) -> ClientResult<()> {
    let request = form.validate()?;
    api.login(&request)
}

pub fn register<A: NotesApi + ?Sized>(api: &A, form: &RegisterForm) -> ClientResult<()> {
    let request = form.validate()?;
    api.register(&request)
}

pub fn forgot_password<A: NotesApi + ?Sized>(api: &A, email: &str) -> ClientResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ClientError::validation("Email field is required."));
    }
    api.forgot_password(email)
}

pub fn reset_password<A: NotesApi + ?Sized>(api: &A, form: &ResetForm) -> ClientResult<()> {
    let request = form.validate()?;
    api.reset_password(&request)
}

/// URL of the backend's calendar consent entry point. The `state` parameter
/// carries the page to come back to.
pub fn authorize_url(origin: &Url) -> ClientResult<Url> {
    let mut url = origin
        .join("/authorize")
        .map_err(|err| ClientError::Decode(format!("invalid authorize url: {err}")))?;
    let state = json!({ "redirectTo": AUTHORIZE_REDIRECT }).to_string();
    url.query_pairs_mut().append_pair("state", &state);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use assert_matches::assert_matches;

    #[test]
    fn register_requires_every_field() {
        let api = FakeApi::default();
        let form = RegisterForm {
            username: "pim".into(),
            email: "  ".into(),
            password: "pw".into(),
        };
        assert_matches!(
            register(&api, &form),
            Err(ClientError::Validation(msg)) if msg == "All fields are required."
        );
        assert!(api.calls().is_empty());

        let form = RegisterForm {
            email: "pim@x.io".into(),
            ..form
        };
        register(&api, &form).expect("register");
        assert_eq!(api.calls(), vec!["POST /register pim"]);
    }

    #[test]
    fn reset_rejects_mismatched_passwords() {
        let api = FakeApi::default();
        let form = ResetForm {
            token: "t0k".into(),
            new_password: "one".into(),
            confirm_password: "two".into(),
        };
        assert_matches!(
            reset_password(&api, &form),
            Err(ClientError::Validation(msg)) if msg == "Passwords do not match."
        );
        assert!(api.calls().is_empty());
    }

    #[test]
    fn reset_payload_uses_camel_case() -> anyhow::Result<()> {
        let request = ResetForm {
            token: "t0k".into(),
            new_password: "same".into(),
            confirm_password: "same".into(),
        }
        .validate()?;
        let value = serde_json::to_value(request)?;
        assert_eq!(value["newPassword"], "same");
        assert_eq!(value["confirmPassword"], "same");
        Ok(())
    }

    #[test]
    fn forgot_password_needs_email() {
        let api = FakeApi::default();
        assert_matches!(
            forgot_password(&api, ""),
            Err(ClientError::Validation(msg)) if msg == "Email field is required."
        );
        forgot_password(&api, "a@x.io").expect("forgot");
        assert_eq!(api.calls(), vec!["POST /forgot-password a@x.io"]);
    }

    #[test]
    fn login_requires_credentials() {
        let api = FakeApi::default();
        let form = LoginForm {
            email: "a@x.io".into(),
            password: String::new(),
        };
        assert!(login(&api, &form).is_err());
        assert!(api.calls().is_empty());
    }

    #[test]
    fn authorize_url_encodes_redirect_state() -> anyhow::Result<()> {
        let origin = Url::parse("http://localhost:8000")?;
        let url = authorize_url(&origin)?;
        assert_eq!(url.path(), "/authorize");
        let (key, value) = url.query_pairs().next().expect("state param");
        assert_eq!(key, "state");
        assert_eq!(value, r#"{"redirectTo":"/note"}"#);
        assert!(url.as_str().contains("%7B%22redirectTo%22"));
        Ok(())
    }
}
