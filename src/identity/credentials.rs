use std::str::FromStr;

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};

use super::principal::IdentityRecord;

/// How a login password is checked once the email has matched a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPolicy {
    /// Demo behaviour: any non-empty password is accepted. Not for production.
    #[default]
    DemoAnyPassword,
    /// Verify against the record's Argon2 PHC hash; records without a hash cannot log in.
    Argon2,
}

impl CredentialPolicy {
    pub fn accepts(&self, record: &IdentityRecord, password: &str) -> bool {
        if password.is_empty() { return false; }
        match self {
            CredentialPolicy::DemoAnyPassword => true,
            CredentialPolicy::Argon2 => match record.password_hash.as_deref() {
                Some(phc) => verify_password(phc, password),
                None => false,
            },
        }
    }
}

impl FromStr for CredentialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" | "any" | "demo_any_password" => Ok(CredentialPolicy::DemoAnyPassword),
            "argon2" | "strict" => Ok(CredentialPolicy::Argon2),
            other => Err(format!("unknown credential policy '{}'", other)),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}
