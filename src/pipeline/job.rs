use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::DecodeError;

/// A named request to fetch `source` and register it with the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    pub source: Url,
}

impl Job {
    pub fn new(name: impl Into<String>, source: Url) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// Outcome of a successful job, sent back to stream clients as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pinned {
    pub name: String,
    pub identifier: String,
}

/// Job name to content identifier.
pub type ResultMap = HashMap<String, String>;

/// Jobs decoded from one request body or one stream message.
///
/// On the wire a batch is a JSON object mapping job names to URLs. Decoding
/// keeps document order and keeps repeated keys as separate jobs, so the
/// dispatcher sees exactly what the client sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    jobs: Vec<Job>,
}

impl Batch {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn encode(&self) -> Vec<u8> {
        // A map of strings always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }
}

impl From<Vec<Job>> for Batch {
    fn from(jobs: Vec<Job>) -> Self {
        Self { jobs }
    }
}

impl FromIterator<Job> for Batch {
    fn from_iter<I: IntoIterator<Item = Job>>(iter: I) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Batch {
    type Item = Job;
    type IntoIter = std::vec::IntoIter<Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

impl Serialize for Batch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.jobs.len()))?;
        for job in &self.jobs {
            map.serialize_entry(&job.name, job.source.as_str())?;
        }
        map.end()
    }
}

struct BatchVisitor;

impl<'de> Visitor<'de> for BatchVisitor {
    type Value = Batch;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping job names to URLs")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Batch, A::Error> {
        let mut jobs = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((name, source)) = map.next_entry::<String, Url>()? {
            jobs.push(Job { name, source });
        }
        Ok(Batch { jobs })
    }
}

impl<'de> Deserialize<'de> for Batch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(BatchVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_keeps_order_and_duplicates() {
        let batch =
            Batch::decode(br#"{"b": "http://x/2", "a": "http://x/1", "b": "http://x/3"}"#)
                .unwrap();

        let names: Vec<_> = batch.jobs().iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "b"]);
        assert_eq!(batch.jobs()[2].source.as_str(), "http://x/3");
    }

    #[test]
    fn test_decode_empty_object() {
        let batch = Batch::decode(b"{}").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_decode_rejects_whole_batch() {
        // One bad URL poisons the batch; nothing is partially returned.
        assert!(Batch::decode(br#"{"a": "http://x/1", "b": "not a url"}"#).is_err());
        assert!(Batch::decode(br#"{"a": 42}"#).is_err());
        assert!(Batch::decode(br#"["http://x/1"]"#).is_err());
        assert!(Batch::decode(b"").is_err());
    }

    #[test]
    fn test_encode_single_job_message() {
        let batch = Batch::from(vec![Job::new("file1", Url::parse("http://x/a").unwrap())]);
        assert_eq!(
            String::from_utf8(batch.encode()).unwrap(),
            r#"{"file1":"http://x/a"}"#
        );
    }

    #[test]
    fn test_pinned_wire_format() {
        let pinned = Pinned {
            name: "file1".to_string(),
            identifier: "Qm123".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&pinned).unwrap(),
            serde_json::json!({"name": "file1", "identifier": "Qm123"})
        );
    }
}
