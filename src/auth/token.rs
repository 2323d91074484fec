//! Defines the bearer access tokens and the token stored in the session cookie.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, auth::UserID};

/// The HMAC keys used to sign and verify access tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    /// Derive the signing and verification keys from `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// The claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Claims {
    /// The user ID.
    sub: i64,
    email: String,
    iat: i64,
    exp: i64,
}

/// Create a signed access token for the user that expires after `duration`.
///
/// # Errors
///
/// Returns [Error::TokenCreationError] if the token could not be signed.
pub fn encode_access_token(
    user_id: UserID,
    email: &str,
    duration: Duration,
    keys: &JwtKeys,
) -> Result<String, Error> {
    encode_access_token_at(user_id, email, OffsetDateTime::now_utc(), duration, keys)
}

fn encode_access_token_at(
    user_id: UserID,
    email: &str,
    issued_at: OffsetDateTime,
    duration: Duration,
    keys: &JwtKeys,
) -> Result<String, Error> {
    let claims = Claims {
        sub: user_id.as_i64(),
        email: email.to_owned(),
        iat: issued_at.unix_timestamp(),
        exp: (issued_at + duration).unix_timestamp(),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(|error| {
        tracing::error!("Could not sign access token: {error}");
        Error::TokenCreationError(error.to_string())
    })
}

/// Verify `token` and return the user ID it was issued for.
///
/// # Errors
///
/// Returns [Error::Unauthorized] if the token is malformed, has a bad signature or has expired.
pub fn decode_access_token(token: &str, keys: &JwtKeys) -> Result<UserID, Error> {
    decode::<Claims>(token, &keys.decoding, &Validation::new(Algorithm::HS256))
        .map(|data| UserID::new(data.claims.sub))
        .map_err(|error| {
            tracing::debug!("Rejected access token: {error}");
            Error::Unauthorized
        })
}

mod datetime_format {
    //! Specifies how to serialize a [time::OffsetDateTime] in a custom format that
    //! avoids serialisations with datetimes containing midnight.
    //!
    //! The default serializer for [time::OffsetDateTime] will serialize
    //! "00:00:00.000000" as "0:00:00.0" and the deserializer would error out
    //! because it expects the hours to be two digits, not one.
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{
        OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
    };

    /// Date time format for the cookie expiry, e.g. "2021-01-01 00:00:00.000000 +00:00:00".
    const DATE_TIME_FORMAT: &[BorrowedFormatItem] = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond] [offset_hour \
             sign:mandatory]:[offset_minute]:[offset_second]"
    );

    pub fn serialize<S>(dt: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = dt
            .format(DATE_TIME_FORMAT)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&s, DATE_TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// The token stored in the private session cookie.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct SessionToken {
    pub user_id: UserID,

    #[serde(
        serialize_with = "datetime_format::serialize",
        deserialize_with = "datetime_format::deserialize"
    )]
    pub expires_at: OffsetDateTime,
}
