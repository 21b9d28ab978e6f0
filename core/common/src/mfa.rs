// core/common/src/mfa.rs
// Time-based one-time passwords (RFC 6238, HMAC-SHA1) on top of totp-rs

use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use totp_rs::{Algorithm, TOTP};

use crate::clock::Clock;
use crate::config::MfaConfig;

const SECRET_BYTES: usize = 20;
// Steps accepted on either side of the current one.
const VALIDATION_WINDOW: u64 = 1;
const MIN_DIGITS: u32 = 6;
const MAX_DIGITS: u32 = 8;

#[derive(Debug, Error)]
pub enum MfaError {
    #[error("MFA secret key is not configured")]
    MissingSecret,
    #[error("MFA secret must not be empty")]
    EmptySecret,
    #[error("Code must not be empty")]
    EmptyCode,
    #[error("MFA secret is not valid base32")]
    InvalidSecret,
}

#[derive(Clone)]
pub struct MfaService {
    config: MfaConfig,
    clock: Arc<dyn Clock>,
}

impl MfaService {
    pub fn new(config: MfaConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Current code for the configured secret.
    pub fn create(&self) -> Result<String, MfaError> {
        self.create_with(self.configured_secret()?)
    }

    pub fn create_with(&self, secret: &str) -> Result<String, MfaError> {
        let totp = self.generator(secret)?;
        Ok(self.code_at(&totp, self.current_step()))
    }

    pub fn validate(&self, code: &str) -> Result<bool, MfaError> {
        self.validate_with(self.configured_secret()?, code)
    }

    /// Accepts the previous, current and next step.
    pub fn validate_with(&self, secret: &str, code: &str) -> Result<bool, MfaError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(MfaError::EmptyCode);
        }
        let totp = self.generator(secret)?;

        let current = self.current_step();
        let first = current.saturating_sub(VALIDATION_WINDOW);
        let last = current.saturating_add(VALIDATION_WINDOW);

        let mut matched = false;
        for step in first..=last {
            let expected = self.code_at(&totp, step);
            // Every candidate is compared so timing does not reveal which step matched.
            matched |= bool::from(code.as_bytes().ct_eq(expected.as_bytes()));
        }

        if !matched {
            tracing::info!("MFA code rejected");
        }
        Ok(matched)
    }

    fn configured_secret(&self) -> Result<&str, MfaError> {
        let secret = self.config.secret_key.trim();
        if secret.is_empty() {
            return Err(MfaError::MissingSecret);
        }
        Ok(secret)
    }

    fn step_seconds(&self) -> u64 {
        self.config.step.max(1)
    }

    fn current_step(&self) -> u64 {
        let seconds = self.clock.now().timestamp().max(0) as u64;
        seconds / self.step_seconds()
    }

    /// Code size is held to the 6..=8 digits RFC 6238 allows.
    fn generator(&self, secret: &str) -> Result<TOTP, MfaError> {
        let key = decode_secret(secret)?;
        let digits = self.config.totp_size.clamp(MIN_DIGITS, MAX_DIGITS) as usize;
        // The window is walked here, so the generator's own skew is unused.
        Ok(TOTP::new_unchecked(
            Algorithm::SHA1,
            digits,
            0,
            self.step_seconds(),
            key,
        ))
    }

    fn code_at(&self, totp: &TOTP, step: u64) -> String {
        totp.generate(step.saturating_mul(self.step_seconds()))
    }
}

/// New shared secret: 20 random bytes as unpadded base32.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

/// Case-insensitive; padding and whitespace are ignored.
fn decode_secret(secret: &str) -> Result<Vec<u8>, MfaError> {
    if secret.trim().is_empty() {
        return Err(MfaError::EmptySecret);
    }

    let normalized: String = secret
        .chars()
        .filter(|c| *c != '=' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    match BASE32_NOPAD.decode(normalized.as_bytes()) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(MfaError::InvalidSecret),
    }
}
