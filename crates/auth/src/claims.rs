use super::Crypto;
use super::UserInfo;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub picture: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: String, name: String, picture: Option<String>) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_secs() as i64;
        Self {
            sub,
            name,
            picture,
            iat: now,
            exp: now + Crypto::duration().as_secs() as i64,
        }
    }
    pub fn expired(&self) -> bool {
        self.exp
            < std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time")
                .as_secs() as i64
    }
}

impl From<Claims> for UserInfo {
    fn from(claims: Claims) -> Self {
        Self {
            sub: claims.sub,
            name: claims.name,
            picture: claims.picture,
        }
    }
}
