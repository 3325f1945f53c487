use std::sync::Arc;

use crate::cache::AuthCache;

const TOKEN_LEN: usize = 32;

/// Opaque session tokens, cache-resident only. A token disappearing from
/// the cache (TTL expiry or revocation) simply makes validation fail.
pub struct TokenService {
    cache: Arc<dyn AuthCache>,
}

impl TokenService {
    pub fn new(cache: Arc<dyn AuthCache>) -> Self {
        Self { cache }
    }

    pub fn issue(&self, user_name: &str) -> String {
        let token = generate_token();
        self.cache.put_token(user_name, &token);
        tracing::debug!(user = user_name, "session token issued");
        token
    }

    pub fn validate(&self, user_name: &str, presented: &str) -> bool {
        match self.cache.token(user_name) {
            Some(cached) => cached == presented,
            None => false,
        }
    }

    pub fn revoke(&self, user_name: &str) {
        self.cache.clear_token(user_name);
        tracing::debug!(user = user_name, "session token revoked");
    }
}

/// 32 alphanumeric characters from the OS-seeded generator, just under
/// 166 bits of entropy.
fn generate_token() -> String {
    use rand::Rng;
    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rand::thread_rng().gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}
