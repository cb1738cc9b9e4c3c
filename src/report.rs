//! Plain-text rendering of triage results and failures.
//!
//! Every optional field of `AnalysisResult` may be absent; rendering never
//! fails, it omits the section or says "not provided".

use crate::config::{ClientConfig, DEFAULT_RISK_SCALE};
use crate::session::SessionError;
use crate::triage::{AnalysisError, AnalysisResult, UrgencyLevel, ValidationError};

/// Shown when the service sends no disclaimer of its own.
pub const DEFAULT_DISCLAIMER: &str = "This system provides preliminary triage assistance only. \
It does not replace professional medical evaluation.";

const NOT_PROVIDED: &str = "not provided";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    /// Risk score that fills the bar completely.
    pub risk_scale: f64,
    /// Include the explanation (summary, differentials, warning signs).
    pub show_details: bool,
    /// Width of the risk bar in characters.
    pub bar_width: usize,
}

impl ReportOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            risk_scale: config.risk_scale,
            ..Self::default()
        }
    }

    pub fn with_details(mut self, show: bool) -> Self {
        self.show_details = show;
        self
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            risk_scale: DEFAULT_RISK_SCALE,
            show_details: false,
            bar_width: 30,
        }
    }
}

/// Headline advice for an urgency level.
pub fn urgency_banner(level: &UrgencyLevel) -> String {
    match level {
        UrgencyLevel::Emergency => "SEEK IMMEDIATE MEDICAL ATTENTION".into(),
        UrgencyLevel::Urgent => "See a doctor within 24 hours".into(),
        UrgencyLevel::Monitor => "Monitor symptoms carefully".into(),
        UrgencyLevel::SelfCare => "Self-care at home is appropriate".into(),
        UrgencyLevel::Routine => "Low risk, routine care".into(),
        UrgencyLevel::Unrecognized(label) => format!("Urgency: {label}"),
    }
}

/// Colour code for the urgency badge. The service's own `urgency_color`
/// wins; otherwise it is derived from the level.
pub fn urgency_color(result: &AnalysisResult) -> String {
    if let Some(color) = result
        .urgency_color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        return color.to_ascii_uppercase();
    }
    let derived = match result.urgency() {
        UrgencyLevel::Emergency => "RED",
        UrgencyLevel::Urgent => "ORANGE",
        UrgencyLevel::Monitor => "YELLOW",
        UrgencyLevel::SelfCare | UrgencyLevel::Routine => "GREEN",
        UrgencyLevel::Unrecognized(_) => "GREY",
    };
    derived.to_string()
}

/// Risk score as a share of `scale`, clamped to 0..=100.
pub fn risk_percentage(score: f64, scale: f64) -> f64 {
    if !score.is_finite() || !scale.is_finite() || scale <= 0.0 {
        return 0.0;
    }
    (score / scale * 100.0).clamp(0.0, 100.0)
}

/// `[#########---------]` style bar for a percentage.
pub fn risk_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled.min(width)))
}

/// Render a full report.
pub fn render_report(result: &AnalysisResult, options: &ReportOptions) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(format!(
        "[{}] {}\n{}",
        urgency_color(result),
        result.urgency(),
        urgency_banner(&result.urgency())
    ));

    if let Some(action) = result.emergency_action() {
        sections.push(format!("!! {action}"));
    }

    let mut summary = format!("Assessment: {}", result.prediction);
    if let Some(case_id) = &result.case_id {
        summary.push_str(&format!("\nCase ID: {case_id}"));
    }
    summary.push_str(&format!(
        "\nConfidence: {}",
        result
            .confidence_percent()
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| NOT_PROVIDED.into())
    ));
    sections.push(summary);

    sections.push(format_risk(result.risk_score(), options));

    let reasoning = result.clinical_reasoning();
    if !reasoning.is_empty() {
        sections.push(format!(
            "Clinical reasoning:\n{}",
            format_list(reasoning)
        ));
    }

    if options.show_details {
        sections.push(format_explanation(result));
    }

    let disclaimer = result
        .disclaimer
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DISCLAIMER);
    sections.push(disclaimer.to_string());

    sections.join("\n\n")
}

/// One message per failure kind, suitable for showing to the user.
pub fn describe_error(error: &AnalysisError) -> String {
    match error {
        AnalysisError::Validation(ValidationError::ImageMissing) => {
            "Please choose an image of the affected area.".into()
        }
        AnalysisError::Validation(ValidationError::InvalidImageType) => {
            "The selected file is not an image. Please choose a photo (JPEG, PNG, ...).".into()
        }
        AnalysisError::Validation(ValidationError::ImageTooLarge { limit, .. }) => format!(
            "The image is too large. Maximum {}MB.",
            limit / (1024 * 1024)
        ),
        AnalysisError::Validation(ValidationError::SymptomsTooShort) => {
            "Please describe your symptoms in a bit more detail.".into()
        }
        AnalysisError::Io(e) => format!("Could not read the image file: {e}"),
        AnalysisError::Timeout(after) => format!(
            "The analysis service did not answer within {} seconds. Please try again.",
            after.as_secs_f64().round()
        ),
        AnalysisError::Server { status, .. } => format!(
            "The analysis service could not process this case (HTTP {status}). Please try again later."
        ),
        AnalysisError::Network(cause) => {
            format!("Could not reach the analysis service ({cause}). Check your connection.")
        }
    }
}

pub fn describe_session_error(error: &SessionError) -> String {
    match error {
        SessionError::Busy => "An analysis is already running. Please wait for it to finish.".into(),
        SessionError::Analysis(e) => describe_error(e),
    }
}

fn format_risk(score: Option<f64>, options: &ReportOptions) -> String {
    match score.filter(|s| s.is_finite()) {
        Some(score) => {
            let pct = risk_percentage(score, options.risk_scale);
            format!(
                "Risk score: {} / {}\n{} {:.0}%",
                trim_float(score),
                trim_float(options.risk_scale),
                risk_bar(pct, options.bar_width),
                pct
            )
        }
        None => format!("Risk score: {NOT_PROVIDED}"),
    }
}

fn format_explanation(result: &AnalysisResult) -> String {
    let Some(explanation) = result.ai_explanation.as_ref().filter(|e| !e.is_empty()) else {
        return format!("Explanation: {NOT_PROVIDED}");
    };

    let mut parts = Vec::new();
    if let Some(summary) = explanation
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        parts.push(format!("Summary: {summary}"));
    }
    if !explanation.differentials().is_empty() {
        parts.push(format!(
            "Differential diagnoses:\n{}",
            format_list(explanation.differentials())
        ));
    }
    if !explanation.warning_signs().is_empty() {
        parts.push(format!(
            "Warning signs:\n{}",
            format_list(explanation.warning_signs())
        ));
    }
    parts.join("\n")
}

fn format_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 5 -> "5", 2.5 -> "2.5"
fn trim_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}
