//! 分诊服务命令行程序

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crate::config::TriageConfig;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use triage_core::{CaseStatus, TriageStore};
use triage_database::{DatabasePool, PostgresStore};
use triage_workflow::{MemoryStore, TriageEngine};

/// 分诊服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "triage-server")]
#[command(about = "病例分诊与医生分配引擎")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 分析一段症状描述并输出分诊结论
    Classify {
        /// 症状描述
        symptoms: String,
    },
    /// 在内存存储上运行配置中的医生名单和病例脚本
    Simulate,
    /// 在 PostgreSQL 中创建表和索引
    InitDb {
        /// 数据库连接字符串，覆盖配置文件
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = TriageConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.level))
        .with_ansi(config.logging.ansi)
        .with_writer(std::io::stderr)
        .init();

    // 日志初始化之后才能输出配置来源
    info!("Configuration loaded from {}", TriageConfig::source_description(args.config.as_deref()));

    match args.command {
        Command::Classify { symptoms } => classify(&config, &symptoms),
        Command::Simulate => simulate(&config).await,
        Command::InitDb { database_url } => init_db(config, database_url).await,
    }
}

fn classify(config: &TriageConfig, symptoms: &str) -> Result<()> {
    let engine = TriageEngine::new(Arc::new(MemoryStore::new()), config.workflow.clone());
    let assessment = engine.analyze_symptoms(Some(symptoms));
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

async fn simulate(config: &TriageConfig) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let engine = TriageEngine::new(Arc::clone(&store), config.workflow.clone());

    for request in &config.roster {
        engine
            .register_doctor(request.clone())
            .await
            .with_context(|| format!("Failed to register doctor {}", request.name))?;
    }
    info!("Registered {} doctors", config.roster.len());

    let mut case_ids = Vec::with_capacity(config.scenario.cases.len());
    for scenario_case in &config.scenario.cases {
        let case = engine
            .classify_and_route(&scenario_case.symptoms, scenario_case.metadata())
            .await
            .with_context(|| format!("Failed to route case for {}", scenario_case.name))?;
        case_ids.push(case.id);
    }

    for &index in &config.scenario.complete {
        let case_id = case_ids[index];
        let case = store
            .find_case_by_id(case_id)
            .await?
            .context("Scenario case disappeared from the store")?;

        let Some(doctor_id) = case.assigned_doctor else {
            warn!("Scenario case {} is still waiting, skipping completion", index);
            continue;
        };

        if case.status == CaseStatus::Assigned {
            engine
                .update_case_status(case_id, doctor_id, CaseStatus::InTreatment)
                .await?;
        }
        engine.complete_case(case_id, doctor_id).await?;
    }

    let report = json!({
        "doctors": store.all_doctors().await,
        "cases": store.all_cases().await,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn init_db(mut config: TriageConfig, database_url: Option<String>) -> Result<()> {
    if let Some(url) = database_url {
        config.database.url = url;
    }

    let pool = DatabasePool::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    PostgresStore::new(pool)
        .create_tables()
        .await
        .context("Failed to create tables")?;

    info!("Database schema is ready");
    Ok(())
}
