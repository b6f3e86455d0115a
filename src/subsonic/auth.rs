//! Subsonic token authentication
//!
//! Every request carries `u`, `t = md5(password + s)`, a fresh salt `s`,
//! the API version, the client name and the response format.

use md5::{Digest, Md5};
use rand::Rng;
use url::Url;

/// API version to use for requests
pub const API_VERSION: &str = "1.16.1";

/// Client identifier
pub const CLIENT_NAME: &str = "tunegrab";

const SALT_LEN: usize = 16;

/// Credentials for one request, salted once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAuth {
    pub username: String,
    pub token: String,
    pub salt: String,
}

impl TokenAuth {
    /// Salt and hash the password for a new request
    pub fn new(username: &str, password: &str) -> Self {
        Self::with_salt(username, password, random_salt())
    }

    pub fn with_salt(username: &str, password: &str, salt: String) -> Self {
        let mut hasher = Md5::new();
        hasher.update(password.as_bytes());
        hasher.update(salt.as_bytes());

        Self {
            username: username.to_string(),
            token: format!("{:x}", hasher.finalize()),
            salt,
        }
    }

    /// Add the authentication query pairs to `url`
    pub fn append_to(&self, url: &mut Url) {
        url.query_pairs_mut()
            .append_pair("u", &self.username)
            .append_pair("t", &self.token)
            .append_pair("s", &self.salt)
            .append_pair("v", API_VERSION)
            .append_pair("c", CLIENT_NAME)
            .append_pair("f", "json");
    }
}

fn random_salt() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}
