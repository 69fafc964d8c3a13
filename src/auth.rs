//! Room access credentials
//!
//! Issues signed, time-limited grants that authorize a participant to join,
//! publish, and subscribe in a named room. Grants are HMAC-signed (HS256)
//! over a structured claim set and verified by the room transport, not by
//! this core.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default grant lifetime
pub const DEFAULT_TTL: Duration = Duration::hours(1);

/// Room-scoped permission set embedded in a grant
///
/// Wire names are camelCase to match what room servers expect in the
/// `video` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPermissions {
    /// Room the permissions are scoped to
    pub room: String,
    /// May join the room
    pub room_join: bool,
    /// May create the room if it does not exist
    pub room_create: bool,
    /// May publish audio tracks
    pub can_publish: bool,
    /// May subscribe to remote tracks
    pub can_subscribe: bool,
}

impl RoomPermissions {
    /// Full participant permissions for `room` (join, publish, subscribe)
    #[must_use]
    pub fn participant(room: &str) -> Self {
        Self {
            room: room.to_string(),
            room_join: true,
            room_create: false,
            can_publish: true,
            can_subscribe: true,
        }
    }
}

/// Signed claim set, the JWT payload
#[derive(Debug, Serialize, Deserialize)]
pub struct GrantClaims {
    /// Issuer (the room API key)
    pub iss: String,
    /// Subject (participant identity)
    pub sub: String,
    /// Not valid before (unix seconds)
    pub nbf: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Room-scoped permissions
    pub video: RoomPermissions,
}

/// A signed, time-limited room access grant
///
/// Immutable once issued; invalid after `expires_at`.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    /// Participant identity the grant was issued to
    pub subject: String,
    /// Room the grant is scoped to
    pub room: String,
    /// Issuance time
    pub issued_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Embedded permission set
    pub permissions: RoomPermissions,
    /// Compact signed token, handed to the room transport verbatim
    pub token: String,
}

/// Issues signed room access grants
///
/// Deterministic given a fixed time input (`issue_at`); no side effects.
#[derive(Debug)]
pub struct CredentialIssuer {
    api_key: String,
    api_secret: SecretString,
}

impl CredentialIssuer {
    /// Create an issuer from the room API key pair
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the key or secret is empty
    pub fn new(api_key: &str, api_secret: SecretString) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("room API key is required".to_string()));
        }
        if api_secret.expose_secret().trim().is_empty() {
            return Err(Error::Config("room API secret is required".to_string()));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            api_secret,
        })
    }

    /// Issue a grant valid from now until now + `ttl`
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty subject or room, or a
    /// signing error if encoding fails
    pub fn issue(
        &self,
        subject: &str,
        room: &str,
        permissions: RoomPermissions,
        ttl: Duration,
    ) -> Result<AccessGrant> {
        self.issue_at(subject, room, permissions, ttl, Utc::now())
    }

    /// Issue a grant anchored at an explicit issuance time
    ///
    /// Split out from [`issue`](Self::issue) so expiry math is testable
    /// against a fixed clock.
    pub fn issue_at(
        &self,
        subject: &str,
        room: &str,
        permissions: RoomPermissions,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant> {
        if subject.trim().is_empty() {
            return Err(Error::Validation("subject must not be empty".to_string()));
        }
        if room.trim().is_empty() {
            return Err(Error::Validation("room must not be empty".to_string()));
        }

        let expires_at = now + ttl;
        let claims = GrantClaims {
            iss: self.api_key.clone(),
            sub: subject.to_string(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            video: permissions.clone(),
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.expose_secret().as_bytes()),
        )?;

        tracing::debug!(room, subject, %expires_at, "issued access grant");

        Ok(AccessGrant {
            subject: subject.to_string(),
            room: room.to_string(),
            issued_at: now,
            expires_at,
            permissions,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation};

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new("api-key", "api-secret".to_string().into()).unwrap()
    }

    #[test]
    fn empty_secret_is_config_error() {
        let err = CredentialIssuer::new("api-key", String::new().into()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_room_is_validation_error() {
        let err = issuer()
            .issue(
                "alice",
                "",
                RoomPermissions::participant(""),
                DEFAULT_TTL,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn empty_subject_is_validation_error() {
        let err = issuer()
            .issue(
                "",
                "memory-lane",
                RoomPermissions::participant("memory-lane"),
                DEFAULT_TTL,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn one_hour_ttl_expires_3600_seconds_after_issuance() {
        let now = Utc::now();
        let grant = issuer()
            .issue_at(
                "alice",
                "memory-lane",
                RoomPermissions::participant("memory-lane"),
                Duration::hours(1),
                now,
            )
            .unwrap();
        assert_eq!((grant.expires_at - grant.issued_at).num_seconds(), 3600);
        assert_eq!(grant.issued_at, now);
    }

    #[test]
    fn token_verifies_under_the_shared_secret() {
        let now = Utc::now();
        let grant = issuer()
            .issue_at(
                "alice",
                "memory-lane",
                RoomPermissions::participant("memory-lane"),
                DEFAULT_TTL,
                now,
            )
            .unwrap();

        let decoded = jsonwebtoken::decode::<GrantClaims>(
            &grant.token,
            &DecodingKey::from_secret(b"api-secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, "alice");
        assert_eq!(decoded.claims.iss, "api-key");
        assert_eq!(decoded.claims.video.room, "memory-lane");
        assert!(decoded.claims.video.can_publish);
        assert_eq!(decoded.claims.exp, (now + DEFAULT_TTL).timestamp());
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let grant = issuer()
            .issue(
                "alice",
                "memory-lane",
                RoomPermissions::participant("memory-lane"),
                DEFAULT_TTL,
            )
            .unwrap();

        let result = jsonwebtoken::decode::<GrantClaims>(
            &grant.token,
            &DecodingKey::from_secret(b"some-other-secret"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }

    #[test]
    fn permission_wire_names_are_camel_case() {
        let json =
            serde_json::to_string(&RoomPermissions::participant("memory-lane")).unwrap();
        assert!(json.contains("\"roomJoin\":true"));
        assert!(json.contains("\"canPublish\":true"));
        assert!(json.contains("\"canSubscribe\":true"));
        assert!(json.contains("\"roomCreate\":false"));
    }
}
