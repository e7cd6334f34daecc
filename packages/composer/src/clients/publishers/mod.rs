//! Platform publisher implementations and selection.
//!
//! The variant set is closed: a token-authenticated REST platform, an
//! OAuth platform with a draft-then-publish flow, and a
//! browser-automation platform. Exactly one is selected per account by
//! which credentials are configured.

mod browser;
mod oauth;
mod rest;

use std::sync::Arc;

pub use browser::{BrowserDriver, BrowserPublisher, BrowserSession};
pub use oauth::{OauthAccount, OauthPublisher};
pub use rest::{RestAccount, RestPublisher};

use crate::error::{ComposeError, Result};
use crate::traits::PlatformPublisher;

/// Credentials for the publishing targets an account may use. At most
/// one should be populated; when several are, the first in declaration
/// order wins.
#[derive(Default)]
pub struct PublisherAccounts {
    pub rest: Option<RestAccount>,
    pub oauth: Option<OauthAccount>,
    pub browser: Option<Arc<dyn BrowserDriver>>,
}

/// Build the publisher for an account from whichever credentials are
/// present. No credentials at all is an operator configuration error,
/// not a retryable failure.
pub fn select(accounts: PublisherAccounts) -> Result<Arc<dyn PlatformPublisher>> {
    if let Some(rest) = accounts.rest {
        return Ok(Arc::new(RestPublisher::new(rest)));
    }
    if let Some(oauth) = accounts.oauth {
        return Ok(Arc::new(OauthPublisher::new(oauth)));
    }
    if let Some(driver) = accounts.browser {
        return Ok(Arc::new(BrowserPublisher::new(driver)));
    }
    Err(ComposeError::Configuration(
        "no publishing credentials configured for account".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_credentials_is_a_configuration_error() {
        let err = select(PublisherAccounts::default()).err().unwrap();
        assert!(matches!(err, ComposeError::Configuration(_)));
    }

    #[test]
    fn rest_credentials_select_the_rest_publisher() {
        let accounts = PublisherAccounts {
            rest: Some(RestAccount::new("https://blog.example/wp-json", "token")),
            ..Default::default()
        };
        assert!(select(accounts).is_ok());
    }
}
