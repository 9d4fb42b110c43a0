pub mod client;
pub mod executor;
pub mod oauth;
pub mod parser;
pub mod types;

pub use client::{DEFAULT_API_BASE, GmailClient, GmailClientError};
pub use executor::GmailActionExecutor;
pub use oauth::{
    DEFAULT_REFRESH_BUFFER, FileTokenStore, OAuthError, OAuthTokens, TokenFileError, TokenStore,
};
pub use parser::{ParsedMail, parse_message};
pub use types::*;
