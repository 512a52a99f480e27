//! 配置管理
//!
//! 从可选的配置文件和 `TRIAGE_` 前缀的环境变量加载配置

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use triage_core::{CaseMetadata, Gender, NewDoctor};
use triage_database::DatabaseConfig;
use triage_workflow::WorkflowConfig;

/// 分诊服务完整配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// 工作流配置
    pub workflow: WorkflowConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 模拟运行时登记的医生
    pub roster: Vec<NewDoctor>,
    /// 模拟运行的病例脚本
    pub scenario: ScenarioConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 表达式
    pub level: String,
    /// 是否输出颜色
    pub ansi: bool,
}

/// 模拟脚本
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub cases: Vec<ScenarioCase>,
    /// 按顺序完成的病例下标
    pub complete: Vec<usize>,
}

/// 模拟病例
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioCase {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub symptoms: String,
}

impl ScenarioCase {
    pub fn metadata(&self) -> CaseMetadata {
        CaseMetadata {
            name: self.name.clone(),
            age: self.age,
            gender: self.gender,
        }
    }
}

impl TriageConfig {
    /// 加载配置，文件缺省时只读取环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(Environment::with_prefix("TRIAGE").separator("__"));

        let settings = builder.build().context("Failed to read configuration sources")?;
        let config: TriageConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// 配置来源说明，用于启动日志
    pub fn source_description(config_path: Option<&str>) -> String {
        match config_path {
            Some(path) => format!("file '{}' and TRIAGE_ environment", path),
            None => "TRIAGE_ environment and defaults".to_string(),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        self.workflow.validate().context("Invalid workflow configuration")?;

        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level must not be empty");
        }

        for (index, doctor) in self.roster.iter().enumerate() {
            if doctor.max_cases == 0 {
                anyhow::bail!("roster[{}] ({}) must have max_cases >= 1", index, doctor.name);
            }
        }

        for &index in &self.scenario.complete {
            if index >= self.scenario.cases.len() {
                anyhow::bail!(
                    "scenario.complete refers to case {} but only {} cases are defined",
                    index,
                    self.scenario.cases.len()
                );
            }
        }
        Ok(())
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            roster: default_roster(),
            scenario: ScenarioConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let case = |name: &str, age: u32, gender: Gender, symptoms: &str| ScenarioCase {
            name: name.to_string(),
            age,
            gender,
            symptoms: symptoms.to_string(),
        };

        Self {
            cases: vec![
                case("Ada", 64, Gender::Female, "severe chest pain and nausea"),
                case("Ben", 58, Gender::Male, "chest pain when climbing stairs"),
                case("Cy", 35, Gender::Other, "moderate pain after chest pain episode"),
                case("Dee", 8, Gender::Female, "fracture of the right wrist"),
                case("Eli", 71, Gender::Male, "sudden stroke symptoms"),
                case("Fay", 27, Gender::Female, "mild dizziness and nausea"),
            ],
            complete: vec![0],
        }
    }
}

fn default_roster() -> Vec<NewDoctor> {
    let doctor = |name: &str, specialization: &str, experience: u32, max_cases: u32| NewDoctor {
        name: name.to_string(),
        specialization: specialization.to_string(),
        experience,
        department: None,
        max_cases,
        on_duty: true,
    };

    vec![
        doctor("Dr. Okafor", "cardiology", 14, 1),
        doctor("Dr. Lindqvist", "neurology", 9, 3),
        doctor("Dr. Mendes", "orthopedics", 6, 2),
        doctor("Dr. Haddad", "general", 11, 5),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TriageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workflow.min_symptom_length, 5);
        assert!(!config.roster.is_empty());
    }

    #[test]
    fn test_invalid_scenario_reference() {
        let mut config = TriageConfig::default();
        config.scenario.complete = vec![99];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_wait_cap() {
        let mut config = TriageConfig::default();
        config.workflow.wait_time_cap_minutes = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_description() {
        assert_eq!(
            TriageConfig::source_description(Some("triage.toml")),
            "file 'triage.toml' and TRIAGE_ environment"
        );
        assert_eq!(TriageConfig::source_description(None), "TRIAGE_ environment and defaults");
    }

    #[test]
    fn test_roster_capacity_validation() {
        let mut config = TriageConfig::default();
        config.roster[0].max_cases = 0;
        assert!(config.validate().is_err());
    }
}
