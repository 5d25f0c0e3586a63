use super::Claims;
use super::TokenVerifier;
use super::UserInfo;

const TOKEN_DURATION: std::time::Duration = std::time::Duration::from_secs(12 * 60 * 60);

pub struct Crypto {
    encoding: jsonwebtoken::EncodingKey,
    decoding: jsonwebtoken::DecodingKey,
}

impl Crypto {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: jsonwebtoken::EncodingKey::from_secret(secret),
            decoding: jsonwebtoken::DecodingKey::from_secret(secret),
        }
    }
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| String::default())
                .as_bytes(),
        )
    }
    pub fn encode(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), claims, &self.encoding)
    }
    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &jsonwebtoken::Validation::default())
            .map(|data| data.claims)
    }
    pub const fn duration() -> std::time::Duration {
        TOKEN_DURATION
    }
}

impl TokenVerifier for Crypto {
    fn verify(&self, token: &str) -> Option<UserInfo> {
        self.decode(token)
            .ok()
            .filter(|claims| !claims.expired())
            .map(UserInfo::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypto() -> Crypto {
        Crypto::new(b"test-secret")
    }

    #[test]
    fn valid_token_verifies() {
        let crypto = crypto();
        let claims = Claims::new("user-1".to_string(), "Alice".to_string(), None);
        let token = crypto.encode(&claims).expect("encode");
        let info = crypto.verify(&token).expect("verify");
        assert_eq!(info.sub, "user-1");
        assert_eq!(info.name, "Alice");
        assert_eq!(info.picture, None);
    }

    #[test]
    fn tampered_token_fails() {
        let crypto = crypto();
        let claims = Claims::new("user-1".to_string(), "Alice".to_string(), None);
        let token = crypto.encode(&claims).expect("encode");
        let other = Crypto::new(b"other-secret");
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn garbage_token_fails() {
        assert!(crypto().verify("not-a-jwt").is_none());
    }

    #[test]
    fn picture_claim_survives() {
        let crypto = crypto();
        let claims = Claims::new(
            "user-2".to_string(),
            "Bob".to_string(),
            Some("https://example.test/bob.png".to_string()),
        );
        let token = crypto.encode(&claims).expect("encode");
        let info = crypto.verify(&token).expect("verify");
        assert_eq!(info.picture.as_deref(), Some("https://example.test/bob.png"));
    }
}
