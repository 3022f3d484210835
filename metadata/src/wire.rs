use serde::{Deserialize, Deserializer};

/// Decodes an explicit JSON `null` the same way as a missing field.
/// Combine with `#[serde(default)]` so absent fields keep working.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
