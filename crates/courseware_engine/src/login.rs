use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::browser::{BrowserError, BrowserSession, Click, Locator, Lookup};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub login_url: String,
    pub username_field: Locator,
    pub password_field: Locator,
    pub submit_button: Locator,
    /// Pause after submitting, while the platform redirects.
    pub settle_wait: Duration,
}

impl LoginForm {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            username_field: Locator::XPath("//*[@id=\"userNameInput\"]".to_string()),
            password_field: Locator::XPath("//*[@id=\"passwordInput\"]".to_string()),
            submit_button: Locator::XPath("//*[@id=\"submitButton\"]".to_string()),
            settle_wait: Duration::from_secs(5),
        }
    }
}

/// How the sign-in went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    /// The form was filled in and submitted.
    Submitted,
    /// The browser showed its own sign-in dialogue instead of the form
    /// (seen on the campus network). Someone has to answer it by hand.
    ManualPrompt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("login form has no {0}")]
    MissingField(&'static str),
    #[error("login form changed while it was being filled")]
    Stale,
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Signs the session in through the platform's login form.
pub async fn log_in<S: BrowserSession>(
    session: &S,
    form: &LoginForm,
    credentials: &Credentials,
) -> Result<SignIn, LoginError> {
    engine_debug!("Opening login page {}", form.login_url);
    session.goto(&form.login_url).await?;

    if let Some(prompt) = session.alert_text().await? {
        engine_warn!("Browser asks for credentials itself: {:?}", prompt);
        return Ok(SignIn::ManualPrompt(prompt));
    }

    let username = locate(session, &form.username_field, "username field").await?;
    let password = locate(session, &form.password_field, "password field").await?;
    let submit = locate(session, &form.submit_button, "sign-in button").await?;

    for outcome in [
        session.type_text(&username, &credentials.username).await?,
        session.type_text(&password, &credentials.password).await?,
        session.click(&submit).await?,
    ] {
        if outcome == Click::Stale {
            return Err(LoginError::Stale);
        }
    }

    tokio::time::sleep(form.settle_wait).await;
    engine_info!("Signed in as {}", credentials.username);
    Ok(SignIn::Submitted)
}

async fn locate<S: BrowserSession>(
    session: &S,
    locator: &Locator,
    what: &'static str,
) -> Result<S::Element, LoginError> {
    match session.find(locator).await? {
        Lookup::Found(element) => Ok(element),
        Lookup::NotFound => Err(LoginError::MissingField(what)),
        Lookup::Stale => Err(LoginError::Stale),
    }
}
