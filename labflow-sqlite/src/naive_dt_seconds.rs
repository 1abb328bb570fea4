use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serializer};

fn from_seconds<E: serde::de::Error>(sec: i64) -> Result<NaiveDateTime, E> {
    DateTime::from_timestamp(sec, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| E::custom(format!("timestamp out of range: {sec}")))
}

/// `NaiveDateTime` <-> epoch seconds
pub mod naive {
    use super::*;

    pub fn serialize<S>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(dt.and_utc().timestamp())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sec = i64::deserialize(deserializer)?;
        from_seconds::<D::Error>(sec)
    }
}

/// `Option<NaiveDateTime>` <-> optional epoch seconds
pub mod naive_opt {
    use super::*;

    pub fn serialize<S>(maybe_dt: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match maybe_dt {
            Some(dt) => serializer.serialize_some(&dt.and_utc().timestamp()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<i64>::deserialize(deserializer)? {
            Some(sec) => from_seconds::<D::Error>(sec).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Stamped {
        #[serde(with = "super::naive")]
        at: chrono::NaiveDateTime,
        #[serde(with = "super::naive_opt")]
        maybe: Option<chrono::NaiveDateTime>,
    }

    #[test]
    fn test_seconds_shape() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let json = serde_json::to_value(Stamped { at, maybe: None }).unwrap();
        assert_eq!(json["at"], 1704164645);
        assert!(json["maybe"].is_null());
    }
}
