//! 症状分诊
//!
//! 基于固定关键词表推断病例严重程度和所需专科。
//! 严重程度与专科来自同一次关键词扫描，保证对同一输入结论一致。

use serde::{Deserialize, Serialize};
use triage_core::utils::normalize_symptoms;
use triage_core::Severity;

/// 症状描述的最短有效长度
pub const DEFAULT_MIN_SYMPTOM_LENGTH: usize = 5;

/// 无法匹配具体专科时的默认专科
pub const GENERAL_SPECIALIZATION: &str = "general";

const CRITICAL_KEYWORDS: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "unconscious",
    "seizure",
    "stroke",
    "severe bleeding",
];

const HIGH_KEYWORDS: &[&str] = &[
    "high fever",
    "vomiting",
    "fracture",
    "head injury",
    "persistent pain",
];

const MEDIUM_KEYWORDS: &[&str] = &["moderate pain", "infection", "dizziness", "nausea"];

/// 按优先级排列的分级表，先匹配到的级别胜出
const SEVERITY_TIERS: &[(Severity, &[&str])] = &[
    (Severity::Critical, CRITICAL_KEYWORDS),
    (Severity::High, HIGH_KEYWORDS),
    (Severity::Medium, MEDIUM_KEYWORDS),
];

const SPECIALIZATION_MAP: &[(&str, &str)] = &[
    ("chest pain", "cardiology"),
    ("stroke", "neurology"),
    ("seizure", "neurology"),
    ("difficulty breathing", "pulmonology"),
    ("fracture", "orthopedics"),
    ("head injury", "neurology"),
];

/// 一次关键词扫描的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatch {
    pub severity: Severity,
    pub keyword: Option<&'static str>,
}

impl KeywordMatch {
    fn none() -> Self {
        Self {
            severity: Severity::Low,
            keyword: None,
        }
    }
}

/// 严重程度分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub urgency_score: u32,
}

/// 完整分诊结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageAssessment {
    pub severity: Severity,
    pub urgency_score: u32,
    pub emergency: bool,
    pub specialization: String,
    pub matched_keyword: Option<String>,
}

/// 严重程度分类器
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    min_length: usize,
}

impl SeverityClassifier {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// 扫描关键词；文本缺失或过短时视为无匹配
    pub fn match_keywords(&self, symptoms: Option<&str>) -> KeywordMatch {
        let Some(raw) = symptoms else {
            return KeywordMatch::none();
        };

        if raw.trim().chars().count() < self.min_length {
            return KeywordMatch::none();
        }

        let text = normalize_symptoms(raw);
        for (severity, keywords) in SEVERITY_TIERS {
            if let Some(keyword) = keywords.iter().find(|k| text.contains(*k)) {
                return KeywordMatch {
                    severity: *severity,
                    keyword: Some(*keyword),
                };
            }
        }

        KeywordMatch::none()
    }

    pub fn classify(&self, symptoms: Option<&str>) -> Classification {
        let matched = self.match_keywords(symptoms);
        Classification {
            severity: matched.severity,
            urgency_score: matched.severity.urgency_score(),
        }
    }

    /// 单次扫描同时得出严重程度与专科
    pub fn analyze(&self, symptoms: Option<&str>) -> TriageAssessment {
        let matched = self.match_keywords(symptoms);
        let assessment = TriageAssessment {
            severity: matched.severity,
            urgency_score: matched.severity.urgency_score(),
            emergency: matched.severity == Severity::Critical,
            specialization: resolve_specialization(&matched),
            matched_keyword: matched.keyword.map(str::to_string),
        };

        tracing::debug!(
            "Triage analysis: severity={} specialization={} keyword={:?}",
            assessment.severity,
            assessment.specialization,
            assessment.matched_keyword
        );
        assessment
    }
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SYMPTOM_LENGTH)
    }
}

/// 根据分类器命中的关键词查专科
pub fn resolve_specialization(matched: &KeywordMatch) -> String {
    matched
        .keyword
        .and_then(|keyword| {
            SPECIALIZATION_MAP
                .iter()
                .find(|(k, _)| *k == keyword)
                .map(|(_, specialization)| *specialization)
        })
        .unwrap_or(GENERAL_SPECIALIZATION)
        .to_string()
}
