use crate::core::models::data1d::Data1D;
use crate::core::models::histogram::Histogram1D;
use std::collections::BTreeMap;

/// Data published by nodes for use after (or outside) a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredData {
    Histogram(Histogram1D),
    Data1D(Data1D),
}

/// Named results shared between nodes and the caller, keyed `<prefix>//<name>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataStore {
    items: BTreeMap<String, StoredData>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(prefix: Option<&str>, name: &str) -> String {
        match prefix {
            Some(p) if !p.is_empty() => format!("{}//{}", p, name),
            _ => name.to_string(),
        }
    }

    /// Stores `data`, returning whatever was previously held under the same key.
    pub fn insert(&mut self, key: String, data: StoredData) -> Option<StoredData> {
        self.items.insert(key, data)
    }

    pub fn get(&self, key: &str) -> Option<&StoredData> {
        self.items.get(key)
    }

    pub fn histogram(&self, key: &str) -> Option<&Histogram1D> {
        match self.items.get(key)? {
            StoredData::Histogram(h) => Some(h),
            StoredData::Data1D(_) => None,
        }
    }

    pub fn data1d(&self, key: &str) -> Option<&Data1D> {
        match self.items.get(key)? {
            StoredData::Data1D(d) => Some(d),
            StoredData::Histogram(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoredData)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_join_prefix_and_name() {
        assert_eq!(DataStore::key(Some("Run1"), "RDF"), "Run1//RDF");
        assert_eq!(DataStore::key(None, "RDF"), "RDF");
        assert_eq!(DataStore::key(Some(""), "RDF"), "RDF");
    }

    #[test]
    fn histograms_are_retrieved_by_key() {
        let mut store = DataStore::new();
        let hist = Histogram1D::new(0.0, 1.0, 0.5).unwrap();
        assert!(store.insert("A//h".into(), StoredData::Histogram(hist.clone())).is_none());
        assert_eq!(store.histogram("A//h"), Some(&hist));
        assert!(store.histogram("h").is_none());
        assert!(store.data1d("A//h").is_none());
        assert_eq!(store.len(), 1);
    }
}
