use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Essay,
    Web,
    ExactMatch,
    Code,
    Database,
}

impl QuestionType {
    pub const ALL: [QuestionType; 7] = [
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::Essay,
        QuestionType::Web,
        QuestionType::ExactMatch,
        QuestionType::Code,
        QuestionType::Database,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multipleChoice" => Some(Self::MultipleChoice),
            "trueFalse" => Some(Self::TrueFalse),
            "essay" => Some(Self::Essay),
            "web" => Some(Self::Web),
            "exactMatch" => Some(Self::ExactMatch),
            "code" => Some(Self::Code),
            "database" => Some(Self::Database),
            _ => None,
        }
    }

    /// Stored type tag; also the name of the type-specific relation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "multipleChoice",
            Self::TrueFalse => "trueFalse",
            Self::Essay => "essay",
            Self::Web => "web",
            Self::ExactMatch => "exactMatch",
            Self::Code => "code",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionStatus {
    #[default]
    Active,
    Archived,
}

impl QuestionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Archived => "ARCHIVED",
        }
    }
}

/// Provenance of a question row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionSource {
    #[default]
    Bank,
    Copy,
    Eval,
}

impl QuestionSource {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BANK" => Some(Self::Bank),
            "COPY" => Some(Self::Copy),
            "EVAL" => Some(Self::Eval),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "BANK",
            Self::Copy => "COPY",
            Self::Eval => "EVAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationPhase {
    Draft,
    InProgress,
    Grading,
    Finished,
}

impl EvaluationPhase {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "IN_PROGRESS" => Some(Self::InProgress),
            "GRADING" => Some(Self::Grading),
            "FINISHED" => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::InProgress => "IN_PROGRESS",
            Self::Grading => "GRADING",
            Self::Finished => "FINISHED",
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Draft => Some(Self::InProgress),
            Self::InProgress => Some(Self::Grading),
            Self::Grading => Some(Self::Finished),
            Self::Finished => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchivalStatus {
    Active,
    MarkedForArchival,
    Archived,
    Purged,
    Excluded,
    PurgedWithoutArchival,
}

impl ArchivalStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "MARKED_FOR_ARCHIVAL" => Some(Self::MarkedForArchival),
            "ARCHIVED" => Some(Self::Archived),
            "PURGED" => Some(Self::Purged),
            "EXCLUDED" => Some(Self::Excluded),
            "PURGED_WITHOUT_ARCHIVAL" => Some(Self::PurgedWithoutArchival),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::MarkedForArchival => "MARKED_FOR_ARCHIVAL",
            Self::Archived => "ARCHIVED",
            Self::Purged => "PURGED",
            Self::Excluded => "EXCLUDED",
            Self::PurgedWithoutArchival => "PURGED_WITHOUT_ARCHIVAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradingStatus {
    Ungraded,
    GradedCorrect,
    GradedIncorrect,
    GradedPartially,
}

impl GradingStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNGRADED" => Some(Self::Ungraded),
            "GRADED_CORRECT" => Some(Self::GradedCorrect),
            "GRADED_INCORRECT" => Some(Self::GradedIncorrect),
            "GRADED_PARTIALLY" => Some(Self::GradedPartially),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ungraded => "UNGRADED",
            Self::GradedCorrect => "GRADED_CORRECT",
            Self::GradedIncorrect => "GRADED_INCORRECT",
            Self::GradedPartially => "GRADED_PARTIALLY",
        }
    }
}
