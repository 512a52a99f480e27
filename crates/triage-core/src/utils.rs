//! 通用工具函数

/// 规范化专科名称：去除首尾空白并转为小写
pub fn normalize_specialization(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// 规范化症状文本：小写并把连续空白折叠为单个空格
pub fn normalize_symptoms(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_specialization() {
        assert_eq!(normalize_specialization("  Cardiology "), "cardiology");
        assert_eq!(normalize_specialization("GENERAL"), "general");
    }

    #[test]
    fn test_normalize_symptoms() {
        assert_eq!(normalize_symptoms("Severe  CHEST\tpain\n"), "severe chest pain");
        assert_eq!(normalize_symptoms("   "), "");
    }
}
