//! Per-record transformation and validation
//!
//! Converts raw upstream records into canonical [`University`] records,
//! isolating failures per record so one bad entry never aborts the batch.
//! Every rejection is recorded with its index, the original raw value and a
//! readable reason; the batch counters always reconcile with the input size.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use super::extractor::json_kind;
use super::models::{TransformBatch, TransformFailure, University};

/// Batch transformer for raw university records.
pub struct Transformer;

impl Transformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform a raw batch. Never fails wholesale.
    pub fn transform(&self, raw_records: &[Value]) -> TransformBatch {
        let mut records = Vec::with_capacity(raw_records.len());
        let mut failures = Vec::new();

        for (index, raw) in raw_records.iter().enumerate() {
            match transform_record(raw) {
                Ok(record) => records.push(record),
                Err(error) => {
                    debug!(index, %error, "Rejected record");
                    failures.push(TransformFailure {
                        index,
                        raw_record: raw.clone(),
                        error,
                    });
                },
            }
        }

        let success_count = records.len();
        let failure_count = failures.len();

        TransformBatch {
            records,
            total_input: raw_records.len(),
            success_count,
            failure_count,
            transformed_at: Utc::now(),
            failures,
        }
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform a single raw record into its canonical form.
fn transform_record(raw: &Value) -> Result<University, String> {
    let object = raw
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", json_kind(raw)))?;

    let name = required_text(object, "name")?;
    let country = required_text(object, "country")?;
    let alpha_two_code = optional_text(object, "alpha_two_code");
    // The upstream dataset spells this "state-province"; the snake_case
    // variant also appears in the wild.
    let state_province =
        optional_text(object, "state-province").or_else(|| optional_text(object, "state_province"));

    let record = University {
        id: build_id(&country, state_province.as_deref(), &name),
        name,
        country,
        alpha_two_code,
        state_province,
        domains: normalize_domains(object.get("domains")),
        web_pages: normalize_web_pages(object.get("web_pages")),
        last_updated: Utc::now(),
    };

    if record.id.is_empty() || record.name.is_empty() || record.country.is_empty() {
        return Err("canonical record failed final shape check".to_string());
    }

    Ok(record)
}

/// Fetch a required string field, trimmed and whitespace-collapsed.
fn required_text(object: &Map<String, Value>, key: &str) -> Result<String, String> {
    match object.get(key) {
        None | Some(Value::Null) => Err(format!("missing required field `{key}`")),
        Some(Value::String(text)) => {
            let cleaned = collapse_whitespace(text);
            if cleaned.is_empty() {
                Err(format!("field `{key}` is empty"))
            } else {
                Ok(cleaned)
            }
        },
        Some(other) => Err(format!(
            "field `{key}` must be a string, got {}",
            json_kind(other)
        )),
    }
}

/// Fetch an optional string field; blank or non-string values become `None`.
fn optional_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(collapse_whitespace)
        .filter(|text| !text.is_empty())
}

/// Trim and collapse internal whitespace runs to a single space.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic URL-safe id: slugified country, optional state/province and
/// name joined with single hyphens, re-collapsed so no duplicate hyphens
/// survive the join.
pub(crate) fn build_id(country: &str, state_province: Option<&str>, name: &str) -> String {
    let mut parts = vec![slugify(country)];
    if let Some(state) = state_province {
        parts.push(slugify(state));
    }
    parts.push(slugify(name));

    collapse_hyphens(&parts.join("-"))
}

/// Lowercase, replace every run of non-alphanumeric characters with a single
/// hyphen, strip leading and trailing hyphens.
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Remove duplicate hyphens and strip them from both ends.
fn collapse_hyphens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    out.trim_matches('-').to_string()
}

/// Keep string entries, trim, lowercase, drop empties, deduplicate
/// preserving first-seen order.
pub(crate) fn normalize_domains(value: Option<&Value>) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();

    for entry in value.and_then(Value::as_array).into_iter().flatten() {
        if let Some(text) = entry.as_str() {
            let domain = text.trim().to_lowercase();
            if !domain.is_empty() && !domains.contains(&domain) {
                domains.push(domain);
            }
        }
    }

    domains
}

/// Keep string entries, trim, drop empties, prefix `https://` when no scheme
/// is present, deduplicate preserving first-seen order.
pub(crate) fn normalize_web_pages(value: Option<&Value>) -> Vec<String> {
    let mut pages: Vec<String> = Vec::new();

    for entry in value.and_then(Value::as_array).into_iter().flatten() {
        if let Some(text) = entry.as_str() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                trimmed.to_string()
            } else {
                format!("https://{trimmed}")
            };
            if !pages.contains(&url) {
                pages.push(url);
            }
        }
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Value {
        json!({
            "name": "  Massachusetts  Institute of Technology ",
            "country": "United States",
            "alpha_two_code": "US",
            "state-province": "Massachusetts",
            "domains": ["MIT.edu", "mit.edu ", "media.mit.edu"],
            "web_pages": ["www.mit.edu", "http://web.mit.edu", "www.mit.edu"]
        })
    }

    #[test]
    fn counters_reconcile_with_input() {
        let raw = vec![
            sample_record(),
            json!("not an object"),
            json!({"country": "France"}),
            json!({"name": "ENS", "country": "France"}),
        ];

        let batch = Transformer::new().transform(&raw);

        assert_eq!(batch.total_input, 4);
        assert_eq!(batch.success_count + batch.failure_count, batch.total_input);
        assert_eq!(batch.records.len(), batch.success_count);
        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.failures[0].index, 1);
        assert_eq!(batch.failures[1].index, 2);
    }

    #[test]
    fn canonical_record_fields() {
        let batch = Transformer::new().transform(&[sample_record()]);
        let record = &batch.records[0];

        assert_eq!(
            record.id,
            "united-states-massachusetts-massachusetts-institute-of-technology"
        );
        assert_eq!(record.name, "Massachusetts Institute of Technology");
        assert_eq!(record.country, "United States");
        assert_eq!(record.alpha_two_code.as_deref(), Some("US"));
        assert_eq!(record.state_province.as_deref(), Some("Massachusetts"));
    }

    #[test]
    fn transform_is_idempotent_except_timestamp() {
        let raw = [sample_record()];
        let transformer = Transformer::new();

        let first = transformer.transform(&raw).records.remove(0);
        let second = transformer.transform(&raw).records.remove(0);

        assert_eq!(first.id, second.id);
        assert_eq!(first.name, second.name);
        assert_eq!(first.country, second.country);
        assert_eq!(first.alpha_two_code, second.alpha_two_code);
        assert_eq!(first.state_province, second.state_province);
        assert_eq!(first.domains, second.domains);
        assert_eq!(first.web_pages, second.web_pages);
    }

    #[test]
    fn slug_has_no_edge_or_double_hyphens() {
        let cases = [
            ("  Ecole -- Polytechnique!  ", "ecole-polytechnique"),
            ("A&M University", "a-m-university"),
            ("---", ""),
            ("Saint John's", "saint-john-s"),
        ];
        for (input, expected) in cases {
            let slug = slugify(input);
            assert_eq!(slug, expected);
            assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            assert!(!slug.contains("--"));
        }
    }

    #[test]
    fn build_id_skips_empty_parts() {
        let id = build_id("France", Some("???"), "ENS");
        assert_eq!(id, "france-ens");
        assert!(!id.contains("--"));
    }

    #[test]
    fn domains_are_lowercased_and_deduplicated_in_order() {
        let value = json!(["A.edu", "a.edu ", "b.edu"]);
        assert_eq!(normalize_domains(Some(&value)), vec!["a.edu", "b.edu"]);
    }

    #[test]
    fn web_pages_gain_a_scheme_when_missing() {
        let value = json!(["test.edu"]);
        assert_eq!(normalize_web_pages(Some(&value)), vec!["https://test.edu"]);

        let with_scheme = json!(["http://test.edu"]);
        assert_eq!(
            normalize_web_pages(Some(&with_scheme)),
            vec!["http://test.edu"]
        );
    }

    #[test]
    fn web_pages_deduplicate_after_normalization() {
        let value = json!(["https://test.edu", " test.edu", "", 42]);
        assert_eq!(normalize_web_pages(Some(&value)), vec!["https://test.edu"]);
    }

    #[test]
    fn missing_name_is_reported_with_reason() {
        let batch = Transformer::new().transform(&[json!({"country": "France"})]);
        assert_eq!(batch.failure_count, 1);
        assert!(batch.failures[0].error.contains("name"));
    }

    #[test]
    fn non_string_country_is_rejected() {
        let batch = Transformer::new().transform(&[json!({"name": "ENS", "country": 42})]);
        assert_eq!(batch.failure_count, 1);
        assert!(batch.failures[0].error.contains("country"));
    }
}
