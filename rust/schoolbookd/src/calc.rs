use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub const NOT_AVAILABLE: &str = "N/A";

/// Half-up 1-decimal rounding: `floor(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// One subject's stored scores for a (student, term).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid_term: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_exam: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl SubjectResult {
    fn continuous_scores(&self) -> impl Iterator<Item = f64> + '_ {
        [self.test1, self.test2, self.mid_term].into_iter().flatten()
    }

    fn all_scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.continuous_scores().chain(self.final_exam)
    }

    fn named_scores(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("test1", self.test1),
            ("test2", self.test2),
            ("midTerm", self.mid_term),
            ("finalExam", self.final_exam),
        ]
    }
}

/// A computed mark, or the "not available" sentinel when no inputs were present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mark {
    Value(f64),
    NotAvailable,
}

impl Mark {
    pub fn value(self) -> Option<f64> {
        match self {
            Mark::Value(v) => Some(v),
            Mark::NotAvailable => None,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::Value(v) => write!(f, "{:.1}", round_off_1_decimal(*v)),
            Mark::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

// Averages go out as one-decimal strings ("70.0"); the exam mark goes out
// as the stored number. Both use the "N/A" string when absent.
fn serialize_one_decimal<S: Serializer>(mark: &Mark, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(mark)
}

fn serialize_verbatim<S: Serializer>(mark: &Mark, s: S) -> Result<S::Ok, S::Error> {
    match mark {
        Mark::Value(v) => s.serialize_f64(*v),
        Mark::NotAvailable => s.serialize_str(NOT_AVAILABLE),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    #[serde(serialize_with = "serialize_one_decimal")]
    pub continuous_assessment: Mark,
    #[serde(serialize_with = "serialize_verbatim")]
    pub exam_marks: Mark,
    #[serde(serialize_with = "serialize_one_decimal")]
    pub total: Mark,
    pub grade: String,
    pub comment: String,
}

fn mean<I: IntoIterator<Item = f64>>(values: I) -> Mark {
    let (sum, n) = values
        .into_iter()
        .fold((0.0_f64, 0_usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        Mark::NotAvailable
    } else {
        Mark::Value(sum / n as f64)
    }
}

/// Every present score counts equally; absent scores are skipped, never zero-filled.
pub fn aggregate(result: &SubjectResult) -> SubjectPerformance {
    SubjectPerformance {
        continuous_assessment: mean(result.continuous_scores()),
        exam_marks: result.final_exam.map(Mark::Value).unwrap_or(Mark::NotAvailable),
        total: mean(result.all_scores()),
        grade: result
            .grade
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        comment: result.comment.clone().unwrap_or_default(),
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be between 0 and 100 (got {value})")]
    ScoreOutOfRange { field: &'static str, value: f64 },
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub fn validate_result(result: &SubjectResult) -> Result<(), ValidationError> {
    for (field, score) in result.named_scores() {
        if let Some(v) = score {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(ValidationError::ScoreOutOfRange { field, value: v });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    pub min: f64,
    pub grade: String,
}

/// Bands ordered from highest floor to lowest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeScale(Vec<GradeBand>);

impl Default for GradeScale {
    fn default() -> Self {
        GradeScale::new(
            [(80.0, "A"), (70.0, "B"), (60.0, "C"), (50.0, "D"), (40.0, "E"), (0.0, "F")]
                .into_iter()
                .map(|(min, grade)| GradeBand {
                    min,
                    grade: grade.to_string(),
                })
                .collect(),
        )
    }
}

impl GradeScale {
    pub fn new(mut bands: Vec<GradeBand>) -> Self {
        bands.sort_by(|a, b| b.min.total_cmp(&a.min));
        GradeScale(bands)
    }

    pub fn into_bands(self) -> Vec<GradeBand> {
        self.0
    }

    pub fn grade_for(&self, total: f64) -> Option<&str> {
        self.0
            .iter()
            .find(|b| total >= b.min)
            .map(|b| b.grade.as_str())
    }
}

/// Fills an absent grade from the record's total. A stored grade always wins.
pub fn suggest_grade(result: &mut SubjectResult, scale: &GradeScale) {
    if result.grade.is_some() {
        return;
    }
    if let Some(total) = aggregate(result).total.value() {
        result.grade = scale
            .grade_for(round_off_1_decimal(total))
            .map(str::to_string);
    }
}
