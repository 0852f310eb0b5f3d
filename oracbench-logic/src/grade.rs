//! Grade Banding
//!
//! Maps an aggregate score onto a letter scale with +/- modifiers. Bands are
//! checked from the top down against fixed lower bounds, so the mapping is
//! monotonic: a higher score never produces a lower grade.

use serde::{Deserialize, Serialize};

/// Ordinal performance grade, ordered from worst (`F`) to best (`APlus`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Below 60
    #[serde(rename = "F")]
    F,
    /// 60 and above
    #[serde(rename = "D-")]
    DMinus,
    /// 63 and above
    #[serde(rename = "D")]
    D,
    /// 67 and above
    #[serde(rename = "D+")]
    DPlus,
    /// 70 and above
    #[serde(rename = "C-")]
    CMinus,
    /// 73 and above
    #[serde(rename = "C")]
    C,
    /// 77 and above
    #[serde(rename = "C+")]
    CPlus,
    /// 80 and above
    #[serde(rename = "B-")]
    BMinus,
    /// 83 and above
    #[serde(rename = "B")]
    B,
    /// 87 and above
    #[serde(rename = "B+")]
    BPlus,
    /// 90 and above
    #[serde(rename = "A-")]
    AMinus,
    /// 93 and above
    #[serde(rename = "A")]
    A,
    /// 97 and above
    #[serde(rename = "A+")]
    APlus,
}

/// Lower bound of each band, best first
const BANDS: [(f64, Grade); 12] = [
    (97.0, Grade::APlus),
    (93.0, Grade::A),
    (90.0, Grade::AMinus),
    (87.0, Grade::BPlus),
    (83.0, Grade::B),
    (80.0, Grade::BMinus),
    (77.0, Grade::CPlus),
    (73.0, Grade::C),
    (70.0, Grade::CMinus),
    (67.0, Grade::DPlus),
    (63.0, Grade::D),
    (60.0, Grade::DMinus),
];

impl Grade {
    /// Every grade from worst to best
    pub const ALL: [Grade; 13] = [
        Grade::F,
        Grade::DMinus,
        Grade::D,
        Grade::DPlus,
        Grade::CMinus,
        Grade::C,
        Grade::CPlus,
        Grade::BMinus,
        Grade::B,
        Grade::BPlus,
        Grade::AMinus,
        Grade::A,
        Grade::APlus,
    ];

    /// Band an aggregate score in `[0, 100]`. NaN maps to `F`.
    pub fn from_score(score: f64) -> Self {
        BANDS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::F)
    }

    /// Letter form, e.g. `"B+"`
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::F => "F",
            Grade::DMinus => "D-",
            Grade::D => "D",
            Grade::DPlus => "D+",
            Grade::CMinus => "C-",
            Grade::C => "C",
            Grade::CPlus => "C+",
            Grade::BMinus => "B-",
            Grade::B => "B",
            Grade::BPlus => "B+",
            Grade::AMinus => "A-",
            Grade::A => "A",
            Grade::APlus => "A+",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown grade: {}", s))
    }
}
