//! Operator input validation.
//!
//! Forms hold raw operator input and turn it into request bodies. Problems
//! are collected per field so they can all be reported at once; nothing
//! invalid is ever sent to the backend.

use std::fmt;

use crate::api::sources::{CreateSource, RobotsMode, SourceKind, UpdateSource};
use crate::api::subscriptions::{CreateSubscription, SubscriptionStatus};

const MAX_NAME_LEN: usize = 255;
const MAX_AUTH_REF_LEN: usize = 255;
const MIN_RATE_LIMIT: i64 = 1;
const MAX_RATE_LIMIT: i64 = 3600;
const DEFAULT_RATE_LIMIT: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field errors from one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First message reported for a field.
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn check_name(errors: &mut ValidationErrors, name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        errors.add("name", "Required");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.add("name", format!("Must be at most {} characters", MAX_NAME_LEN));
    }
    name.to_string()
}

fn check_kind(errors: &mut ValidationErrors, kind: &str) -> Option<SourceKind> {
    kind.parse()
        .map_err(|e: String| errors.add("kind", e))
        .ok()
}

fn check_robots_mode(errors: &mut ValidationErrors, mode: &str) -> Option<RobotsMode> {
    mode.parse()
        .map_err(|e: String| errors.add("robots_mode", e))
        .ok()
}

fn check_base_url(errors: &mut ValidationErrors, base_url: &str) -> String {
    let base_url = base_url.trim();
    match url::Url::parse(base_url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
        _ => errors.add("base_url", "Must be a valid URL"),
    }
    base_url.to_string()
}

fn check_auth_ref(errors: &mut ValidationErrors, auth_ref: Option<&str>) -> Option<String> {
    let auth_ref = auth_ref.map(str::trim).filter(|s| !s.is_empty())?;
    if auth_ref.chars().count() > MAX_AUTH_REF_LEN {
        errors.add(
            "auth_ref",
            format!("Must be at most {} characters", MAX_AUTH_REF_LEN),
        );
    }
    Some(auth_ref.to_string())
}

fn check_rate_limit(errors: &mut ValidationErrors, rate_limit: i64) -> u32 {
    if !(MIN_RATE_LIMIT..=MAX_RATE_LIMIT).contains(&rate_limit) {
        errors.add(
            "rate_limit",
            format!("Must be between {} and {}", MIN_RATE_LIMIT, MAX_RATE_LIMIT),
        );
        return DEFAULT_RATE_LIMIT;
    }
    rate_limit as u32
}

/// Raw input for a new crawl source.
#[derive(Debug, Clone, Default)]
pub struct SourceForm {
    pub name: String,
    pub kind: String,
    pub base_url: String,
    pub auth_ref: Option<String>,
    pub robots_mode: Option<String>,
    pub rate_limit: Option<i64>,
    pub enabled: Option<bool>,
}

impl SourceForm {
    pub fn validate(&self) -> Result<CreateSource, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = check_name(&mut errors, &self.name);
        let kind = check_kind(&mut errors, &self.kind);
        let base_url = check_base_url(&mut errors, &self.base_url);
        let auth_ref = check_auth_ref(&mut errors, self.auth_ref.as_deref());
        let robots_mode = match &self.robots_mode {
            Some(mode) => check_robots_mode(&mut errors, mode),
            None => Some(RobotsMode::default()),
        };
        let rate_limit = self
            .rate_limit
            .map(|r| check_rate_limit(&mut errors, r))
            .unwrap_or(DEFAULT_RATE_LIMIT);

        match (kind, robots_mode) {
            (Some(kind), Some(robots_mode)) => errors.into_result(CreateSource {
                name,
                kind,
                base_url,
                auth_ref,
                robots_mode,
                rate_limit,
                enabled: self.enabled.unwrap_or(true),
            }),
            _ => Err(errors),
        }
    }
}

/// Partial update of an existing source. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct SourcePatch {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub base_url: Option<String>,
    pub auth_ref: Option<String>,
    pub robots_mode: Option<String>,
    pub rate_limit: Option<i64>,
    pub enabled: Option<bool>,
}

impl SourcePatch {
    pub fn validate(&self) -> Result<UpdateSource, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let update = UpdateSource {
            name: self.name.as_deref().map(|n| check_name(&mut errors, n)),
            kind: self.kind.as_deref().and_then(|k| check_kind(&mut errors, k)),
            base_url: self
                .base_url
                .as_deref()
                .map(|u| check_base_url(&mut errors, u)),
            auth_ref: self
                .auth_ref
                .as_deref()
                .and_then(|a| check_auth_ref(&mut errors, Some(a))),
            robots_mode: self
                .robots_mode
                .as_deref()
                .and_then(|m| check_robots_mode(&mut errors, m)),
            rate_limit: self.rate_limit.map(|r| check_rate_limit(&mut errors, r)),
            enabled: self.enabled,
        };

        if errors.is_empty() && update == UpdateSource::default() {
            errors.add("body", "No fields provided for update");
        }
        errors.into_result(update)
    }
}

/// Raw input for a new subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionForm {
    pub source_id: i64,
    pub jurisdiction: String,
    pub schedule: String,
    pub status: Option<String>,
    /// JSON object text.
    pub selectors: Option<String>,
}

impl SubscriptionForm {
    pub fn validate(&self) -> Result<CreateSubscription, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.source_id < 1 {
            errors.add("source_id", "Please select a source");
        }
        let jurisdiction = self.jurisdiction.trim().to_string();
        if jurisdiction.is_empty() {
            errors.add("jurisdiction", "Jurisdiction is required");
        }
        let schedule = self.schedule.trim().to_string();
        if schedule.is_empty() {
            errors.add("schedule", "Schedule is required");
        }
        let status = match &self.status {
            Some(s) => s
                .parse::<SubscriptionStatus>()
                .map_err(|e| errors.add("status", e))
                .unwrap_or_default(),
            None => SubscriptionStatus::default(),
        };

        errors.into_result(CreateSubscription {
            source_id: self.source_id,
            jurisdiction,
            selectors: parse_selectors(self.selectors.as_deref()),
            schedule,
            status,
        })
    }
}

/// Selector text to a JSON object. Blank or unparseable input yields `{}`.
pub fn parse_selectors(text: Option<&str>) -> serde_json::Map<String, serde_json::Value> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return serde_json::Map::new();
    };
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!(selectors = %other, "Selectors are not a JSON object, using {{}}");
            serde_json::Map::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Selectors are not valid JSON, using {{}}");
            serde_json::Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source_form() -> SourceForm {
        SourceForm {
            name: "EU Official Journal".to_string(),
            kind: "html".to_string(),
            base_url: "https://eur-lex.europa.eu".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_source_defaults() {
        let source = source_form().validate().unwrap();
        assert_eq!(source.robots_mode, RobotsMode::Allow);
        assert_eq!(source.rate_limit, 60);
        assert!(source.enabled);
        assert_eq!(source.auth_ref, None);
    }

    #[test]
    fn test_source_collects_every_error() {
        let form = SourceForm {
            name: "  ".to_string(),
            kind: "rss".to_string(),
            base_url: "eur-lex.europa.eu".to_string(),
            rate_limit: Some(0),
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.message_for("name"), Some("Required"));
        assert!(errors.message_for("kind").is_some());
        assert_eq!(errors.message_for("base_url"), Some("Must be a valid URL"));
        assert_eq!(errors.message_for("rate_limit"), Some("Must be between 1 and 3600"));
        assert_eq!(errors.errors().len(), 4);
    }

    #[test]
    fn test_source_rejects_non_http_url() {
        let form = SourceForm {
            base_url: "ftp://files.example".to_string(),
            ..source_form()
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_blank_auth_ref_is_none() {
        let form = SourceForm {
            auth_ref: Some("   ".to_string()),
            ..source_form()
        };
        assert_eq!(form.validate().unwrap().auth_ref, None);
    }

    #[test]
    fn test_rate_limit_bounds() {
        let at_max = SourceForm {
            rate_limit: Some(3600),
            ..source_form()
        };
        assert_eq!(at_max.validate().unwrap().rate_limit, 3600);

        let over = SourceForm {
            rate_limit: Some(3601),
            ..source_form()
        };
        assert!(over.validate().is_err());
    }

    #[test]
    fn test_empty_patch_rejected() {
        let errors = SourcePatch::default().validate().unwrap_err();
        assert_eq!(errors.to_string(), "body: No fields provided for update");
    }

    #[test]
    fn test_patch_validates_supplied_fields() {
        let patch = SourcePatch {
            enabled: Some(false),
            robots_mode: Some("disallow".to_string()),
            ..Default::default()
        };
        let update = patch.validate().unwrap();
        assert_eq!(update.enabled, Some(false));
        assert_eq!(update.robots_mode, Some(RobotsMode::Disallow));
        assert_eq!(update.name, None);

        let bad = SourcePatch {
            name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(bad.validate().unwrap_err().message_for("name"), Some("Required"));
    }

    #[test]
    fn test_subscription_requires_source() {
        let form = SubscriptionForm {
            source_id: 0,
            jurisdiction: "EU".to_string(),
            schedule: "0 9 * * 1".to_string(),
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.message_for("source_id"), Some("Please select a source"));
        assert_eq!(errors.errors().len(), 1);
    }

    #[test]
    fn test_subscription_selectors() {
        let form = SubscriptionForm {
            source_id: 2,
            jurisdiction: "EU".to_string(),
            schedule: "@daily".to_string(),
            status: Some("disabled".to_string()),
            selectors: Some(r#"{"css": "article.doc"}"#.to_string()),
        };
        let created = form.validate().unwrap();
        assert_eq!(created.status, SubscriptionStatus::Disabled);
        assert_eq!(created.selectors.get("css"), Some(&json!("article.doc")));
    }

    #[test]
    fn test_malformed_selectors_fall_back_to_empty() {
        assert!(parse_selectors(Some("{not json")).is_empty());
        assert!(parse_selectors(Some("[1, 2]")).is_empty());
        assert!(parse_selectors(Some("  ")).is_empty());
        assert!(parse_selectors(None).is_empty());
    }
}
