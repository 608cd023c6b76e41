//! CSRF state scheme for the OAuth callback.
//!
//! A state value is `nonce.token`: the nonce is a tick-windowed digest binding the
//! initiating user to this process, and the token is a per-user random secret stored
//! until the callback consumes it. Both halves must verify, and the stored token is
//! single use.

// crates.io
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, error::ValidationError};

const STATE_TOKEN_LEN: usize = 32;
const NONCE_HEX_LEN: usize = 20;
// The nonce tick rolls twice a day, so a nonce stays valid for 12-24 hours.
const NONCE_TICK_SECS: i64 = 43_200;

/// State value issued when building the consent URL.
#[derive(Clone, Debug)]
pub struct IssuedState {
	/// Full `nonce.token` value round-tripped through the provider.
	pub state: String,
	/// Random per-user secret to store until the callback.
	pub token: String,
}

/// Issues and verifies callback state nonces.
///
/// The signing secret is generated per process, so pending connect flows do not
/// survive a restart; the user simply starts the flow again.
#[derive(Clone)]
pub struct StateIssuer {
	secret: [u8; 32],
}
impl StateIssuer {
	/// Creates an issuer with a fresh random signing secret.
	pub fn new() -> Self {
		let mut secret = [0_u8; 32];

		rand::rng().fill(&mut secret);

		Self { secret }
	}

	/// Issues a state value for the user, returning both the combined state and the
	/// random token the caller must persist.
	pub fn issue(&self, user: &str) -> IssuedState {
		let token = random_string(STATE_TOKEN_LEN);
		let nonce = self.nonce_at(user, current_tick());

		IssuedState { state: format!("{nonce}.{token}"), token }
	}

	/// Verifies a callback nonce against the current and previous tick windows.
	pub fn verify_nonce(&self, user: &str, nonce: &str) -> bool {
		let tick = current_tick();

		constant_time_eq(nonce, &self.nonce_at(user, tick))
			|| constant_time_eq(nonce, &self.nonce_at(user, tick - 1))
	}

	fn nonce_at(&self, user: &str, tick: i64) -> String {
		let mut hasher = Sha256::new();

		hasher.update(self.secret);
		hasher.update(user.as_bytes());
		hasher.update(tick.to_le_bytes());

		let digest = hasher.finalize();
		let mut hex = String::with_capacity(NONCE_HEX_LEN);

		for byte in digest.iter().take(NONCE_HEX_LEN / 2) {
			hex.push_str(&format!("{byte:02x}"));
		}

		hex
	}
}
impl Default for StateIssuer {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for StateIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StateIssuer").field("secret", &"<redacted>").finish()
	}
}

/// Splits a callback state into `(nonce, token)`, rejecting malformed values.
pub fn parse_state(state: &str) -> Result<(&str, &str), ValidationError> {
	match state.split_once('.') {
		Some((nonce, token)) if !nonce.is_empty() && !token.is_empty() => Ok((nonce, token)),
		_ => Err(ValidationError::MalformedState),
	}
}

/// Compares two strings without leaking the mismatch position.
///
/// Comparing the SHA-256 digests fixes both length and timing regardless of the inputs.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
	Sha256::digest(a.as_bytes()) == Sha256::digest(b.as_bytes())
}

/// Generates an alphanumeric secret of the requested length.
pub fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn current_tick() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp() / NONCE_TICK_SECS
}
