//! HTTP authentication for CalDAV requests.
//!
//! Servers announce their schemes in `WWW-Authenticate` on a 401. Digest
//! (RFC 7616, MD5 and MD5-sess) is preferred when offered; Basic (RFC 7617)
//! is the fallback.

use base64::Engine;
use rand::Rng;
use std::collections::HashMap;

/// Username and password for a CalDAV server.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The authentication scheme negotiated with the server.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    Basic,
    Digest(DigestChallenge),
}

impl AuthScheme {
    /// Picks a scheme from the `WWW-Authenticate` values of a 401 response.
    ///
    /// Returns `None` when the server offers nothing we can answer.
    pub fn from_challenges<'a>(headers: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut basic = false;
        for header in headers {
            let header = header.trim();
            if let Some(digest) = DigestChallenge::parse(header) {
                return Some(Self::Digest(digest));
            }
            if header
                .get(..5)
                .is_some_and(|s| s.eq_ignore_ascii_case("basic"))
            {
                basic = true;
            }
        }
        basic.then_some(Self::Basic)
    }

    /// True if a Digest challenge marks the previous nonce as `stale`.
    ///
    /// The credentials were fine; the request should be retried with the
    /// fresh nonce.
    pub fn is_stale<'a>(headers: impl IntoIterator<Item = &'a str>) -> bool {
        headers
            .into_iter()
            .filter_map(|header| DigestChallenge::parse(header.trim()))
            .any(|digest| digest.stale)
    }

    /// Builds the `Authorization` header for one request.
    pub fn authorize(&mut self, method: &str, uri: &str, credentials: &Credentials) -> String {
        match self {
            Self::Basic => basic_auth(credentials),
            Self::Digest(digest) => digest.authorize(method, uri, credentials),
        }
    }
}

/// Digest hash variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Md5Sess,
}

impl DigestAlgorithm {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "MD5" => Some(Self::Md5),
            "MD5-SESS" => Some(Self::Md5Sess),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
        }
    }
}

/// A parsed Digest challenge plus the nonce counter for reusing it.
#[derive(Debug, Clone)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// True if the server offered `qop=auth`.
    pub qop_auth: bool,
    pub algorithm: DigestAlgorithm,
    /// True if the server rejected an earlier nonce as expired.
    pub stale: bool,
    nc: u32,
}

impl DigestChallenge {
    /// Parses a `Digest ...` challenge.
    ///
    /// Challenges with an unsupported algorithm (e.g. SHA-256) are rejected.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, content) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let params = parse_auth_params(content.trim());
        let algorithm = match params.get("algorithm") {
            Some(value) => DigestAlgorithm::parse(value)?,
            None => DigestAlgorithm::Md5,
        };
        let qop_auth = params
            .get("qop")
            .is_some_and(|qop| qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")));

        let stale = params
            .get("stale")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));

        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            opaque: params.get("opaque").cloned(),
            qop_auth,
            algorithm,
            stale,
            nc: 0,
        })
    }

    /// Computes the `Authorization` header for `method` on `uri`.
    pub fn authorize(&mut self, method: &str, uri: &str, credentials: &Credentials) -> String {
        self.nc += 1;
        let nc = format!("{:08x}", self.nc);
        let cnonce = generate_cnonce();
        let response = self.response(method, uri, credentials, &nc, &cnonce);

        let mut parts = vec![
            format!("username=\"{}\"", credentials.username),
            format!("realm=\"{}\"", self.realm),
            format!("nonce=\"{}\"", self.nonce),
            format!("uri=\"{}\"", uri),
            format!("response=\"{}\"", response),
            format!("algorithm={}", self.algorithm.as_str()),
        ];
        if self.qop_auth {
            parts.push("qop=auth".to_string());
            parts.push(format!("nc={}", nc));
            parts.push(format!("cnonce=\"{}\"", cnonce));
        }
        if let Some(ref opaque) = self.opaque {
            parts.push(format!("opaque=\"{}\"", opaque));
        }

        format!("Digest {}", parts.join(", "))
    }

    fn response(
        &self,
        method: &str,
        uri: &str,
        credentials: &Credentials,
        nc: &str,
        cnonce: &str,
    ) -> String {
        let mut ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.username, self.realm, credentials.password
        ));
        if self.algorithm == DigestAlgorithm::Md5Sess {
            ha1 = md5_hex(&format!("{}:{}:{}", ha1, self.nonce, cnonce));
        }
        let ha2 = md5_hex(&format!("{}:{}", method, uri));

        if self.qop_auth {
            md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, self.nonce, nc, cnonce, ha2
            ))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        }
    }
}

/// Builds a Basic `Authorization` header value.
pub fn basic_auth(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.username, credentials.password);
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(raw)
    )
}

/// Parses `key=value` pairs from a challenge; keys are lowercased.
fn parse_auth_params(content: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = content.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let key: String = chars
            .by_ref()
            .take_while(|c| *c != '=')
            .collect::<String>()
            .trim()
            .to_lowercase();
        if key.is_empty() {
            break;
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let mut val = String::new();
            let mut escaped = false;
            for c in chars.by_ref() {
                match (escaped, c) {
                    (true, _) => {
                        val.push(c);
                        escaped = false;
                    }
                    (false, '\\') => escaped = true,
                    (false, '"') => break,
                    (false, _) => val.push(c),
                }
            }
            val
        } else {
            chars.by_ref().take_while(|c| *c != ',').collect::<String>()
        };

        params.insert(key, value.trim().to_string());
    }

    params
}

fn generate_cnonce() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("Mufasa", "Circle Of Life")
    }

    #[test]
    fn parse_digest_challenge() {
        let header =
            r#"Digest realm="family@example.com", nonce="abc123", qop="auth,auth-int", algorithm=MD5"#;
        let digest = DigestChallenge::parse(header).unwrap();

        assert_eq!(digest.realm, "family@example.com");
        assert_eq!(digest.nonce, "abc123");
        assert!(digest.qop_auth);
        assert_eq!(digest.algorithm, DigestAlgorithm::Md5);
        assert!(digest.opaque.is_none());
        assert!(!digest.stale);
    }

    #[test]
    fn stale_nonce_is_detected() {
        let stale = r#"Digest realm="r", nonce="fresh", stale=TRUE, qop="auth""#;
        assert!(DigestChallenge::parse(stale).unwrap().stale);
        assert!(AuthScheme::is_stale([r#"Basic realm="r""#, stale]));

        assert!(!AuthScheme::is_stale([r#"Digest realm="r", nonce="n", stale=false"#]));
        assert!(!AuthScheme::is_stale([r#"Basic realm="r""#]));
    }

    #[test]
    fn parse_digest_minimal_and_sess() {
        let digest = DigestChallenge::parse(r#"digest realm="x", nonce="1""#).unwrap();
        assert!(!digest.qop_auth);
        assert_eq!(digest.algorithm, DigestAlgorithm::Md5);

        let sess =
            DigestChallenge::parse(r#"Digest realm="x", nonce="1", algorithm=MD5-sess"#).unwrap();
        assert_eq!(sess.algorithm, DigestAlgorithm::Md5Sess);
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        assert!(DigestChallenge::parse(r#"Digest realm="x", nonce="1", algorithm=SHA-256"#).is_none());
    }

    #[test]
    fn rfc2617_example_response() {
        // Worked example from RFC 2617 section 3.5.
        let digest = DigestChallenge::parse(
            r#"Digest realm="testrealm@host.com", qop="auth", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
        )
        .unwrap();

        let response = digest.response(
            "GET",
            "/dir/index.html",
            &creds(),
            "00000001",
            "0a4f113b",
        );
        assert_eq!(response, "6629fae49393a05397450978507c4ef1");
    }

    #[test]
    fn authorize_counts_requests() {
        let mut digest =
            DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth", opaque="o""#)
                .unwrap();

        let first = digest.authorize("REPORT", "/cal/", &creds());
        let second = digest.authorize("REPORT", "/cal/", &creds());

        assert!(first.starts_with("Digest "));
        assert!(first.contains("username=\"Mufasa\""));
        assert!(first.contains("uri=\"/cal/\""));
        assert!(first.contains("nc=00000001"));
        assert!(first.contains("opaque=\"o\""));
        assert!(second.contains("nc=00000002"));
    }

    #[test]
    fn scheme_prefers_digest() {
        let scheme =
            AuthScheme::from_challenges([r#"Basic realm="r""#, r#"Digest realm="r", nonce="n""#])
                .unwrap();
        assert!(matches!(scheme, AuthScheme::Digest(_)));

        let scheme = AuthScheme::from_challenges([r#"Basic realm="r""#]).unwrap();
        assert!(matches!(scheme, AuthScheme::Basic));

        assert!(AuthScheme::from_challenges([r#"Bearer realm="r""#]).is_none());
    }

    #[test]
    fn basic_auth_encoding() {
        let header = basic_auth(&Credentials::new("user", "password"));
        assert_eq!(header, "Basic dXNlcjpwYXNzd29yZA==");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let text = format!("{:?}", creds());
        assert!(text.contains("Mufasa"));
        assert!(!text.contains("Circle"));
    }
}
