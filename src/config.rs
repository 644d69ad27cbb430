use crate::error::{AppError, AppResult};
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub funding: FundingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 只用于校验上游认证服务签发的 access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

/// 资助流程参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingConfig {
    /// 每个梦想必须完成的分级捐赠数量 (N)
    pub need_to_donate_num: usize,
    /// 推荐链遍历的防御性深度上限
    pub max_referral_depth: usize,
    /// “我的社区”向下展示的层数
    pub community_depth: usize,
    pub max_dream_count: u64,
    /// dream_maker 用户的目标上限倍数
    pub dream_maker_limit_factor: i64,
    pub short_description_len: usize,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            need_to_donate_num: 4,
            max_referral_depth: 16,
            community_depth: 4,
            max_dream_count: 20,
            dream_maker_limit_factor: 3,
            short_description_len: 256,
        }
    }
}

impl FundingConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.need_to_donate_num == 0 || self.need_to_donate_num > self.max_referral_depth {
            return Err(AppError::ConfigError(format!(
                "need_to_donate_num must be between 1 and max_referral_depth ({})",
                self.max_referral_depth
            )));
        }
        if self.community_depth == 0 || self.community_depth > self.max_referral_depth {
            return Err(AppError::ConfigError(format!(
                "community_depth must be between 1 and max_referral_depth ({})",
                self.max_referral_depth
            )));
        }
        if self.dream_maker_limit_factor < 1 {
            return Err(AppError::ConfigError(
                "dream_maker_limit_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationConfig {
    /// 配置后通过 webhook 推送通知，否则只写日志
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Config {
    pub fn from_toml() -> anyhow::Result<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => Self::parse(&config_str)
                .with_context(|| format!("解析配置文件失败: {config_path}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or_else(|| anyhow!("缺少 DATABASE_URL 环境变量，且未找到配置文件 {config_path}"))?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                    },
                    funding: FundingConfig::default(),
                    notifications: NotificationConfig::default(),
                }
            }
            Err(e) => {
                return Err(anyhow!("无法读取配置文件 {config_path}: {e}"));
            }
        };

        config.apply_env_overrides();
        config.funding.validate()?;
        Ok(config)
    }

    pub fn parse(config_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(config_str)?)
    }

    // 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("NEED_TO_DONATE_NUM")
            && let Ok(n) = v.parse()
        {
            self.funding.need_to_donate_num = n;
        }
        if let Ok(v) = env::var("MAX_REFERRAL_DEPTH")
            && let Ok(n) = v.parse()
        {
            self.funding.max_referral_depth = n;
        }
        if let Ok(v) = env::var("MAX_DREAM_COUNT")
            && let Ok(n) = v.parse()
        {
            self.funding.max_dream_count = n;
        }
        if let Ok(v) = env::var("NOTIFICATION_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(v);
        }
    }
}
