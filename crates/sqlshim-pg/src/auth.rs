//! Password authentication for PostgreSQL: MD5 and SCRAM-SHA-256.
//!
//! SCRAM follows RFC 5802 / RFC 7677 (no channel binding).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use md5::Md5;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{PgError, PgResult};

type HmacSha256 = Hmac<Sha256>;

/// SASL mechanism name advertised by the server.
pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// Build the response to an AuthenticationMD5Password request:
/// `"md5" + hex(md5(hex(md5(password + user)) + salt))`.
pub fn md5_password(user: &str, password: &str, salt: &[u8]) -> String {
    let mut inner = Md5::new();
    inner.update(password.as_bytes());
    inner.update(user.as_bytes());
    let inner_hex = to_hex(&inner.finalize());

    let mut outer = Md5::new();
    outer.update(inner_hex.as_bytes());
    outer.update(salt);
    format!("md5{}", to_hex(&outer.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// SCRAM-SHA-256 client state machine.
pub struct ScramClient {
    username: String,
    password: String,
    nonce: String,
    client_first_bare: String,
    auth_message: String,
    salted_password: [u8; 32],
}

impl ScramClient {
    pub fn new(username: &str, password: &str) -> Self {
        let mut raw = [0u8; 18];
        rand::thread_rng().fill_bytes(&mut raw);
        Self::with_nonce(username, password, &BASE64.encode(raw))
    }

    /// Create a client with a fixed nonce.
    pub fn with_nonce(username: &str, password: &str, nonce: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            nonce: nonce.to_string(),
            client_first_bare: String::new(),
            auth_message: String::new(),
            salted_password: [0u8; 32],
        }
    }

    /// Build the client-first-message to send in SASLInitialResponse.
    pub fn client_first_message(&mut self) -> Vec<u8> {
        self.client_first_bare = format!("n={},r={}", self.username, self.nonce);
        format!("n,,{}", self.client_first_bare).into_bytes()
    }

    /// Process the server-first-message and produce the client-final-message.
    pub fn process_server_first(&mut self, server_first: &[u8]) -> PgResult<Vec<u8>> {
        let server_first = std::str::from_utf8(server_first)
            .map_err(|_| PgError::Auth("invalid UTF-8 in server-first-message".to_string()))?;

        let mut server_nonce = "";
        let mut salt_b64 = "";
        let mut iterations = 0u32;
        for part in server_first.split(',') {
            if let Some(val) = part.strip_prefix("r=") {
                server_nonce = val;
            } else if let Some(val) = part.strip_prefix("s=") {
                salt_b64 = val;
            } else if let Some(val) = part.strip_prefix("i=") {
                iterations = val
                    .parse()
                    .map_err(|_| PgError::Auth("invalid iteration count".to_string()))?;
            }
        }

        if !server_nonce.starts_with(&self.nonce) {
            return Err(PgError::Auth(
                "server nonce doesn't start with client nonce".to_string(),
            ));
        }
        if iterations == 0 {
            return Err(PgError::Auth("missing iteration count".to_string()));
        }
        let salt = BASE64
            .decode(salt_b64)
            .map_err(|e| PgError::Auth(format!("invalid salt: {e}")))?;

        pbkdf2::pbkdf2_hmac::<Sha256>(
            self.password.as_bytes(),
            &salt,
            iterations,
            &mut self.salted_password,
        );

        let client_final_without_proof = format!("c=biws,r={server_nonce}");
        self.auth_message = format!(
            "{},{},{}",
            self.client_first_bare, server_first, client_final_without_proof
        );

        let client_key = hmac_sha256(&self.salted_password, b"Client Key")?;
        let stored_key = Sha256::digest(client_key);
        let client_signature = hmac_sha256(&stored_key, self.auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        Ok(format!("{},p={}", client_final_without_proof, BASE64.encode(proof)).into_bytes())
    }

    /// Verify the server-final-message.
    pub fn verify_server_final(&self, server_final: &[u8]) -> PgResult<()> {
        let server_final = std::str::from_utf8(server_final)
            .map_err(|_| PgError::Auth("invalid UTF-8 in server-final-message".to_string()))?;
        let verifier = server_final
            .strip_prefix("v=")
            .ok_or_else(|| PgError::Auth("missing v= in server-final-message".to_string()))?;
        let received = BASE64
            .decode(verifier)
            .map_err(|e| PgError::Auth(format!("invalid server signature: {e}")))?;

        let server_key = hmac_sha256(&self.salted_password, b"Server Key")?;
        let mut mac = HmacSha256::new_from_slice(&server_key)
            .map_err(|e| PgError::Auth(e.to_string()))?;
        mac.update(self.auth_message.as_bytes());
        mac.verify_slice(&received)
            .map_err(|_| PgError::Auth("server signature mismatch".to_string()))
    }
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> PgResult<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| PgError::Auth(e.to_string()))?;
    mac.update(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7677 section 3.
    const NONCE: &str = "rOprNGfwEbeRWgbNEkqO";
    const SERVER_FIRST: &str = "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096";

    #[test]
    fn test_scram_rfc7677_exchange() {
        let mut scram = ScramClient::with_nonce("user", "pencil", NONCE);
        assert_eq!(
            scram.client_first_message(),
            b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO".to_vec()
        );

        let client_final = scram.process_server_first(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(
            String::from_utf8(client_final).unwrap(),
            "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ="
        );

        scram
            .verify_server_final(b"v=6rriTRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=")
            .unwrap();
        assert!(
            scram
                .verify_server_final(b"v=AAAATRBi23WpRR/wtup+mMhUZUn/dB5nLTJRsjl95G4=")
                .is_err()
        );
    }

    #[test]
    fn test_scram_rejects_foreign_nonce() {
        let mut scram = ScramClient::with_nonce("user", "pencil", "abc");
        scram.client_first_message();
        let err = scram
            .process_server_first(b"r=xyz123,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096")
            .unwrap_err();
        assert!(matches!(err, PgError::Auth(_)));
    }

    #[test]
    fn test_md5_password() {
        assert_eq!(
            md5_password("postgres", "secret", &[1, 2, 3, 4]),
            "md5bb41a296aab6baccb36ff243a562abff"
        );
    }
}
