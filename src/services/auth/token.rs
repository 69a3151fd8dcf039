use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, RSAKeyParameters};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::services::auth::claims::Claims;
use crate::services::auth::error::AuthError;
use crate::services::auth::issuer::IssuerId;
use crate::services::auth::key_set_cache::KeySetCache;

/// Verifies compact-serialized tokens against the issuer's published RSA keys.
///
/// Only the signature is checked here. `exp`/`nbf`/`aud` validation of
/// `jsonwebtoken` is switched off; expiry is evaluated by the
/// [`Authorizer`](crate::services::auth::authorizer::Authorizer) because two
/// encodings of it exist in the wild.
#[derive(Debug, Clone)]
pub struct TokenDecoder {
    keys: Arc<KeySetCache>,
}

impl TokenDecoder {
    pub fn new(keys: Arc<KeySetCache>) -> Self {
        Self { keys }
    }

    pub async fn decode(&self, token: &str, issuer: &IssuerId) -> Result<Claims, AuthError> {
        let header = jsonwebtoken::decode_header(token).map_err(AuthError::Parse)?;
        let kid = header.kid.ok_or(AuthError::KeyIdMissing)?;

        let jwk = self.keys.lookup(issuer, &kid).await?;
        let (decoding_key, algorithm) = rsa_key(&jwk, header.alg)?;

        let data = jsonwebtoken::decode::<Claims>(token, &decoding_key, &signature_only(algorithm))
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::Parse(err),
                _ => AuthError::InvalidSignature(err),
            })?;

        Ok(data.claims)
    }
}

fn signature_only(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

/// Decoding key and algorithm for an RSA JWK.
///
/// The key's declared `alg` wins; a key without one accepts the token header's
/// algorithm as long as it is an RSA algorithm.
fn rsa_key(jwk: &Jwk, header_alg: Algorithm) -> Result<(DecodingKey, Algorithm), AuthError> {
    let AlgorithmParameters::RSA(RSAKeyParameters { n, e, .. }) = &jwk.algorithm else {
        return Err(AuthError::UnsupportedKey(format!("{:?}", jwk.algorithm)));
    };

    let algorithm = match &jwk.common.key_algorithm {
        Some(declared) => rsa_algorithm(declared)
            .ok_or_else(|| AuthError::UnsupportedKey(format!("{declared:?}")))?,
        None if is_rsa(header_alg) => header_alg,
        None => return Err(AuthError::UnsupportedKey(format!("{header_alg:?}"))),
    };

    let key = DecodingKey::from_rsa_components(n, e).map_err(AuthError::InvalidSignature)?;

    Ok((key, algorithm))
}

fn rsa_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        _ => None,
    }
}

fn is_rsa(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}
