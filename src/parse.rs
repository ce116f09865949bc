use serde::{Deserialize, Deserializer};

use crate::{FetchError, PageIndex};

/// Records decoded from one page.
pub type ResultBatch = Vec<Record>;

/// One catalog entry. The pipeline never looks inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Record {
    #[serde(rename = "product_id", deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub categories: Vec<Vec<String>>,
    #[serde(deserialize_with = "null_as_default")]
    pub cover_image: String,
    #[serde(rename = "custom_attributes", deserialize_with = "null_as_default")]
    pub attributes: CustomAttributes,
    #[serde(deserialize_with = "null_as_default")]
    pub authors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CustomAttributes {
    #[serde(deserialize_with = "null_as_default")]
    pub publishers: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub publication_date: String,
}

/// `{ message, data: { products, total, start } }`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub message: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub data: EnvelopeData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EnvelopeData {
    #[serde(deserialize_with = "null_as_default")]
    pub products: ResultBatch,
    pub total: Option<u64>,
    pub start: Option<u64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a page body and keeps only `data.products`.
pub fn decode_page(page: PageIndex, body: &[u8]) -> Result<ResultBatch, FetchError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|source| FetchError::Decode { page, source })?;
    Ok(envelope.data.products)
}

/// First label of every non-empty category path, joined by `" > "`.
pub fn flatten_categories(categories: &[Vec<String>]) -> String {
    categories
        .iter()
        .filter_map(|path| path.first().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" > ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|p| p.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn flatten_takes_first_label_of_each_path() {
        let cats = paths(&[&["Programming", "Go"], &["Web"]]);
        assert_eq!(flatten_categories(&cats), "Programming > Web");
    }

    #[test]
    fn flatten_empty_and_skips_empty_paths() {
        assert_eq!(flatten_categories(&[]), "");
        let cats = paths(&[&[], &["Data"], &[]]);
        assert_eq!(flatten_categories(&cats), "Data");
    }

    #[test]
    fn flatten_is_stable_across_calls() {
        let cats = paths(&[&["A", "x"], &["B"], &["C", "y", "z"]]);
        let first = flatten_categories(&cats);
        for _ in 0..10 {
            assert_eq!(flatten_categories(&cats), first);
        }
    }

    #[test]
    fn decode_page_reads_products() {
        let body = br#"{
            "message": "ok",
            "data": {
                "products": [{
                    "product_id": "978",
                    "url": "https://example.com/978",
                    "language": "en",
                    "title": "Rust in Action",
                    "type": "book",
                    "description": "systems",
                    "categories": [["Programming", "Rust"]],
                    "cover_image": "https://example.com/978.jpg",
                    "custom_attributes": {
                        "publishers": ["Manning"],
                        "publication_date": "2021-08-10"
                    },
                    "authors": ["T. McNamara"]
                }],
                "total": 1,
                "start": 0
            }
        }"#;
        let batch = decode_page(3, body).unwrap();
        assert_eq!(batch.len(), 1);
        let rec = &batch[0];
        assert_eq!(rec.id, "978");
        assert_eq!(rec.kind, "book");
        assert_eq!(rec.attributes.publishers, vec!["Manning"]);
        assert_eq!(rec.attributes.publication_date, "2021-08-10");
    }

    #[test]
    fn decode_page_tolerates_nulls_and_missing_fields() {
        let body = br#"{"data": {"products": [{"title": "T", "authors": null, "categories": null}]}}"#;
        let batch = decode_page(0, body).unwrap();
        assert_eq!(batch[0].title, "T");
        assert!(batch[0].authors.is_empty());
        assert!(batch[0].categories.is_empty());

        let empty = decode_page(0, br#"{"data": null}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn decode_page_error_carries_page() {
        let err = decode_page(7, b"<html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { page: 7, .. }));
        assert_eq!(err.page(), 7);
    }
}
