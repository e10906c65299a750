use clap::Parser;
use small_iac::core::engine::RunMode;
use small_iac::domain::ports::EngineConfig;
use small_iac::utils::{logger, validation::Validate};
use small_iac::{
    CliConfig, DeploymentDocument, DocumentProvisioner, LocalProvider, LocalStateStore,
    ProvisionEngine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if std::env::var("SMALL_IAC_LOG_JSON").is_ok() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting small-iac CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證 CLI 設定
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    // 載入部署文件
    tracing::info!("📁 Loading document from: {}", config.document);
    let document = match DeploymentDocument::from_file(&config.document) {
        Ok(document) => document,
        Err(e) => {
            eprintln!(
                "❌ Failed to load document '{}': {}",
                config.document, e
            );
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    let region = LocalProvider::resolve_region(config.region(), document.region());
    let mode = config.run_mode();
    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 組裝 port 實作與引擎
    let state_store = LocalStateStore::new(config.state_path.clone());
    let provider = LocalProvider::new(config.workspace.clone(), region);
    let provisioner = DocumentProvisioner::new(document, provider, state_store);
    let engine = ProvisionEngine::new_with_monitoring(provisioner, monitor_enabled);

    match engine.run(mode).await {
        Ok(outcome) => {
            match mode {
                RunMode::Validate => {
                    println!("✅ Document is structurally valid");
                }
                RunMode::Plan => {
                    println!("✅ Plan complete (no changes were applied)");
                }
                RunMode::Apply | RunMode::Destroy => {
                    println!("✅ Provisioning run completed successfully!");
                    if let Some(summary) = &outcome.summary {
                        for (name, value) in &summary.outputs {
                            println!("📤 {} = {}", name, value);
                        }
                        println!("📁 State recorded at: {} (serial {})", config.state_path, summary.state_serial);
                    }
                }
            }
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Provisioning run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                small_iac::utils::error::ErrorSeverity::Low => 0,
                small_iac::utils::error::ErrorSeverity::Medium => 2,
                small_iac::utils::error::ErrorSeverity::High => 1,
                small_iac::utils::error::ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
