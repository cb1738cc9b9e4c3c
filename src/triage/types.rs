use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Triage severity returned by the analysis service.
///
/// Known labels are matched case-insensitively. Anything else is kept
/// verbatim in `Unrecognized` so a result is never rejected for carrying a
/// label this client has not seen before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UrgencyLevel {
    Emergency,
    Urgent,
    Monitor,
    SelfCare,
    Routine,
    Unrecognized(String),
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Emergency => "Emergency",
            Self::Urgent => "Urgent",
            Self::Monitor => "Monitor",
            Self::SelfCare => "Self-care",
            Self::Routine => "Routine",
            Self::Unrecognized(label) => label,
        }
    }

    /// Needs professional attention today or sooner.
    pub fn is_time_critical(&self) -> bool {
        matches!(self, Self::Emergency | Self::Urgent)
    }
}

impl UrgencyLevel {
    pub fn parse(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "emergency" => Self::Emergency,
            "urgent" => Self::Urgent,
            "monitor" => Self::Monitor,
            "selfcare" => Self::SelfCare,
            "routine" => Self::Routine,
            _ => Self::Unrecognized(label.to_string()),
        }
    }
}

impl From<String> for UrgencyLevel {
    fn from(label: String) -> Self {
        Self::parse(&label)
    }
}

impl From<UrgencyLevel> for String {
    fn from(level: UrgencyLevel) -> Self {
        match level {
            UrgencyLevel::Unrecognized(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured explanation attached to a result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AiExplanation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differentials: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_signs: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AiExplanation {
    pub fn differentials(&self) -> &[String] {
        self.differentials.as_deref().unwrap_or_default()
    }

    pub fn warning_signs(&self) -> &[String] {
        self.warning_signs.as_deref().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.summary.as_deref().map_or(true, |s| s.trim().is_empty())
            && self.differentials().is_empty()
            && self.warning_signs().is_empty()
    }
}

/// Triage assessment returned by `POST /analyze/`.
///
/// Only `prediction` and `urgency` are required. Optional members the service
/// left out stay out on serialization, numbers keep their JSON form, and
/// fields this client does not know about are kept in `extra`, so the value
/// handed back to callers is the payload the service sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Server-assigned identifier, referenced by follow-up submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    pub prediction: String,
    /// Urgency label exactly as sent; `urgency()` interprets it.
    pub urgency: String,
    /// Colour code for the urgency badge (RED, ORANGE, YELLOW, GREEN).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_color: Option<String>,
    /// Model confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_reasoning: Option<Vec<String>>,
    /// Older service revisions name the reasoning list `reasoning`; some send both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_explanation: Option<AiExplanation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisResult {
    pub fn urgency(&self) -> UrgencyLevel {
        UrgencyLevel::parse(&self.urgency)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence.as_ref().and_then(Number::as_f64)
    }

    /// Confidence as a whole percentage, clamped to 0..=100.
    pub fn confidence_percent(&self) -> Option<u8> {
        self.confidence()
            .filter(|c| c.is_finite())
            .map(|c| (c.clamp(0.0, 1.0) * 100.0).round() as u8)
    }

    pub fn risk_score(&self) -> Option<f64> {
        self.risk_score.as_ref().and_then(Number::as_f64)
    }

    /// Reasoning statements under whichever key carries them, preferring
    /// `clinical_reasoning`.
    pub fn clinical_reasoning(&self) -> &[String] {
        [&self.clinical_reasoning, &self.reasoning]
            .into_iter()
            .filter_map(|list| list.as_deref())
            .find(|list| !list.is_empty())
            .unwrap_or_default()
    }

    /// Non-blank emergency instruction, if the service sent one.
    pub fn emergency_action(&self) -> Option<&str> {
        self.emergency_action
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
