//! Deterministic fingerprints for parameter sets and data files
//!
//! Parameter sets are canonicalized before hashing: keys are held in a
//! [`BTreeMap`] so they serialize in lexicographic order, and the map is
//! encoded as compact JSON (`{"a":1,"b":"x"}`). Numbers keep their type, so
//! `100` and `100.0` produce different fingerprints. Non-finite floats have
//! no JSON form and are rejected.
//!
//! Both fingerprints are lowercase hex SHA-256 digests.

use crate::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Length of a fingerprint in hex characters
pub const FINGERPRINT_HEX_LEN: usize = 64;

const READ_CHUNK: usize = 64 * 1024;

/// Integral floats at or beyond this magnitude may be rounded integer literals
const FLOAT_INTEGER_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// A scalar hyperparameter value
///
/// Integer literals must fit in an `i64`; larger ones are rejected, never
/// rounded to a float.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// JSON `null`
    Null,
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number (must be finite to be fingerprinted)
    Float(f64),
    /// Free-form string
    Str(String),
}

impl ParamValue {
    /// Parse a command-line value, inferring its scalar type
    ///
    /// `null`, `true`/`false`, integers and floats are recognised; anything
    /// else is kept as a string. An integer literal outside the `i64` range is
    /// a [`Error::Serialization`].
    pub fn infer(raw: &str) -> Result<Self> {
        match raw {
            "null" => return Ok(Self::Null),
            "true" => return Ok(Self::Bool(true)),
            "false" => return Ok(Self::Bool(false)),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Ok(Self::Int(i));
        }
        let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(integer_out_of_range(raw));
        }
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => exact_float(f).ok_or_else(|| integer_out_of_range(raw)),
            _ => Ok(Self::Str(raw.to_string())),
        }
    }
}

fn integer_out_of_range(raw: &str) -> Error {
    Error::serialization(format!(
        "parameter value {raw} is outside the 64-bit integer range; pass it as a string"
    ))
}

fn exact_float(f: f64) -> Option<ParamValue> {
    (f.fract() != 0.0 || f.abs() < FLOAT_INTEGER_LIMIT).then_some(ParamValue::Float(f))
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ParamValueVisitor)
    }
}

struct ParamValueVisitor;

impl Visitor<'_> for ParamValueVisitor {
    type Value = ParamValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a boolean, a 64-bit integer, a float or a string")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(ParamValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(ParamValue::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Self::Value, E> {
        Ok(ParamValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
        Ok(ParamValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
        i64::try_from(v)
            .map(ParamValue::Int)
            .map_err(|_| E::custom(format!("integer {v} is outside the 64-bit signed range")))
    }

    // serde_json reports integer literals beyond u64 as floats
    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
        exact_float(v)
            .ok_or_else(|| E::custom(format!("number {v} is too large to fingerprint exactly")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
        Ok(ParamValue::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Self::Value, E> {
        Ok(ParamValue::Str(v))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A parameter set whose iteration order is always sorted by key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    /// Create an empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value for `name`
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a parameter value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Canonical byte representation used for fingerprinting
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        if let Some((name, _)) = self
            .0
            .iter()
            .find(|(_, v)| matches!(v, ParamValue::Float(f) if !f.is_finite()))
        {
            return Err(Error::serialization(format!(
                "parameter '{name}' is not a finite number"
            )));
        }
        if let Some((name, _)) = self
            .0
            .iter()
            .find(|(_, v)| matches!(v, ParamValue::Float(f) if exact_float(*f).is_none()))
        {
            return Err(Error::serialization(format!(
                "parameter '{name}' is an integral float beyond the 64-bit integer range"
            )));
        }
        serde_json::to_vec(&self.0)
            .map_err(|e| Error::serialization(format!("Failed to encode parameters: {e}")))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, ParamValue>> for Params {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, ParamValue>> for Params {
    fn from(map: HashMap<String, ParamValue>) -> Self {
        Self(map.into_iter().collect())
    }
}

/// A hex digest identifying parameters or file contents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a byte slice
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Wrap an existing hex digest
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a lowercase hex digest of the expected length
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let s = hex.into();
        if s.len() != FINGERPRINT_HEX_LEN {
            return Err(Error::serialization(format!(
                "fingerprint must be {FINGERPRINT_HEX_LEN} hex characters, got {}",
                s.len()
            )));
        }
        if !s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
            return Err(Error::serialization(
                "fingerprint must contain only lowercase hex digits",
            ));
        }
        Ok(Self(s))
    }

    /// Get the hex representation
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a parameter set
///
/// Insertion order never matters; see the module docs for the canonical form.
pub fn fingerprint_params(params: &Params) -> Result<Fingerprint> {
    let bytes = params.canonical_bytes()?;
    Ok(Fingerprint::of_bytes(&bytes))
}

/// Fingerprint the raw bytes of a file
///
/// The file is streamed in fixed-size chunks; the result is identical to
/// [`Fingerprint::of_bytes`] over the whole content.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path).map_err(|e| Error::io(e, path, "open"))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(e, path, "read"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a: Params = [("n_estimators", 100), ("max_depth", 10)].into_iter().collect();
        let b: Params = [("max_depth", 10), ("n_estimators", 100)].into_iter().collect();
        assert_eq!(
            fingerprint_params(&a).unwrap(),
            fingerprint_params(&b).unwrap()
        );
    }

    #[test]
    fn test_value_change_changes_fingerprint() {
        let a = Params::new().with("alpha", 1.0);
        let b = Params::new().with("alpha", 1.1);
        assert_ne!(
            fingerprint_params(&a).unwrap(),
            fingerprint_params(&b).unwrap()
        );
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        let a = Params::new().with("n", 100);
        let b = Params::new().with("n", 100.0);
        assert_ne!(
            fingerprint_params(&a).unwrap(),
            fingerprint_params(&b).unwrap()
        );
    }

    #[test]
    fn test_canonical_form_is_compact_sorted_json() {
        let params = Params::new()
            .with("b", "x")
            .with("a", 1)
            .with("c", true)
            .with("d", Option::<i64>::None)
            .with("e", 0.5);
        let bytes = params.canonical_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":1,"b":"x","c":true,"d":null,"e":0.5}"#
        );
    }

    #[test]
    fn test_known_digest_of_empty_params() {
        // sha256("{}")
        let fp = fingerprint_params(&Params::new()).unwrap();
        assert_eq!(
            fp.as_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let params = Params::new().with("lr", f64::NAN);
        let err = fingerprint_params(&params).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));

        let params = Params::new().with("lr", f64::INFINITY);
        assert!(fingerprint_params(&params).is_err());

        let params = Params::new().with("seed", 1.8e19);
        assert!(matches!(
            fingerprint_params(&params).unwrap_err(),
            Error::Serialization { .. }
        ));
    }

    #[test]
    fn test_file_fingerprint_same_length_different_content() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.csv");
        let b = temp.path().join("b.csv");
        std::fs::write(&a, b"0.1 0.2 0.3").unwrap();
        std::fs::write(&b, b"0.1 0.2 0.4").unwrap();
        assert_ne!(fingerprint_file(&a).unwrap(), fingerprint_file(&b).unwrap());
    }

    #[test]
    fn test_file_fingerprint_ignores_filename() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("housing.csv");
        let b = temp.path().join("copy-of-housing.data");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        assert_eq!(fingerprint_file(&a).unwrap(), fingerprint_file(&b).unwrap());
    }

    #[test]
    fn test_file_fingerprint_matches_in_memory_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        assert_eq!(fingerprint_file(&path).unwrap(), Fingerprint::of_bytes(&data));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let err = fingerprint_file(&temp.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_infer_scalar_types() {
        assert_eq!(ParamValue::infer("200").unwrap(), ParamValue::Int(200));
        assert_eq!(ParamValue::infer("-3").unwrap(), ParamValue::Int(-3));
        assert_eq!(ParamValue::infer("0.87").unwrap(), ParamValue::Float(0.87));
        assert_eq!(ParamValue::infer("true").unwrap(), ParamValue::Bool(true));
        assert_eq!(ParamValue::infer("null").unwrap(), ParamValue::Null);
        assert_eq!(ParamValue::infer("gini").unwrap(), ParamValue::Str("gini".into()));
        assert_eq!(ParamValue::infer("nan").unwrap(), ParamValue::Str("nan".into()));
        assert_eq!(ParamValue::infer("").unwrap(), ParamValue::Str(String::new()));
    }

    #[test]
    fn test_params_deserialize_from_json() {
        let params: Params =
            serde_json::from_str(r#"{"max_depth": 15, "lr": 0.1, "criterion": "gini", "warm": false}"#)
                .unwrap();
        assert_eq!(params.get("max_depth"), Some(&ParamValue::Int(15)));
        assert_eq!(params.get("lr"), Some(&ParamValue::Float(0.1)));
        assert_eq!(params.get("criterion"), Some(&ParamValue::Str("gini".into())));
        assert_eq!(params.get("warm"), Some(&ParamValue::Bool(false)));
    }

    #[test]
    fn test_infer_rejects_integers_beyond_i64() {
        for raw in ["9223372036854775808", "-9223372036854775809", "18446744073709551615", "1e19"] {
            let err = ParamValue::infer(raw).unwrap_err();
            assert!(matches!(err, Error::Serialization { .. }), "{raw}");
        }
        assert_eq!(
            ParamValue::infer("9223372036854775807").unwrap(),
            ParamValue::Int(i64::MAX)
        );
        assert_eq!(ParamValue::infer("1e18").unwrap(), ParamValue::Float(1e18));
    }

    #[test]
    fn test_large_json_integers_are_rejected_not_rounded() {
        for json in [
            r#"{"seed": 18446744073709551615}"#,
            r#"{"seed": 18446744073709551614}"#,
            r#"{"seed": 9223372036854775808}"#,
            r#"{"seed": 100000000000000000000000}"#,
        ] {
            assert!(serde_json::from_str::<Params>(json).is_err(), "{json}");
        }
        let params: Params = serde_json::from_str(r#"{"seed": 9223372036854775807}"#).unwrap();
        assert_eq!(params.get("seed"), Some(&ParamValue::Int(i64::MAX)));
    }

    #[test]
    fn test_adjacent_large_integers_have_distinct_fingerprints() {
        let a = Params::new().with("seed", i64::MAX);
        let b = Params::new().with("seed", i64::MAX - 1);
        assert_ne!(
            fingerprint_params(&a).unwrap(),
            fingerprint_params(&b).unwrap()
        );
    }

    #[test]
    fn test_params_json_null_and_nested_rejection() {
        let params: Params = serde_json::from_str(r#"{"d": null}"#).unwrap();
        assert_eq!(params.get("d"), Some(&ParamValue::Null));
        assert!(serde_json::from_str::<Params>(r#"{"d": [1, 2]}"#).is_err());
    }

    #[test]
    fn test_fingerprint_from_hex_validation() {
        assert!(Fingerprint::from_hex("abc").is_err());
        assert!(Fingerprint::from_hex("G".repeat(64)).is_err());
        assert!(Fingerprint::from_hex("a".repeat(64)).is_ok());
    }
}
