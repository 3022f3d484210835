use crate::wire::null_as_default;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A single entry of the `windows-keys` attribute.
///
/// Each line of the attribute is one JSON object of this shape. Missing
/// fields decode as empty strings, validity is decided by [`WindowsKey::is_usable`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowsKey {
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(alias = "expire-on", deserialize_with = "null_as_default")]
    pub expire_on: String,
    #[serde(deserialize_with = "null_as_default")]
    pub exponent: String,
    #[serde(deserialize_with = "null_as_default")]
    pub modulus: String,
    #[serde(alias = "user-name", deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(alias = "hash-function", deserialize_with = "null_as_default")]
    pub hash_function: String,
}

impl WindowsKey {
    /// Returns true if the key may be handed to the account manager.
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(OffsetDateTime::now_utc())
    }

    pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
        !self.exponent.is_empty()
            && !self.modulus.is_empty()
            && !self.user_name.is_empty()
            && !self.expired_at(now)
    }

    /// An expiry that cannot be parsed counts as not expired.
    pub fn expired_at(&self, now: OffsetDateTime) -> bool {
        match OffsetDateTime::parse(&self.expire_on, &Rfc3339) {
            Ok(expire_on) => expire_on < now,
            Err(e) => {
                if !self.expire_on.is_empty() {
                    tracing::debug!(
                        user = %self.user_name,
                        expire_on = %self.expire_on,
                        error = %e,
                        "Could not parse windows key expiry, treating as not expired"
                    );
                }
                false
            }
        }
    }
}
