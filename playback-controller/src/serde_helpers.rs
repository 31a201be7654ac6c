use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    millis_of(duration).serialize(serializer)
}

pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// `None` is written as 0 so it survives formats that drop missing values
pub fn serialize_optional_duration<S>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_ref().map(millis_of).unwrap_or(0).serialize(serializer)
}

pub fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<u64>::deserialize(deserializer)?;
    Ok(millis.filter(|m| *m > 0).map(Duration::from_millis))
}

// TOML integers are i64, so keep the wire value well inside u64
fn millis_of(duration: &Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(i64::MAX as u64)
}
