use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use dreamfund_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{
        CurrencyRates, CurrencyTableRates, LogNotifier, SharedNotifier, StoredTextTranslator,
        Translator, WebhookNotifier,
    },
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(&config.jwt.secret);

    // 外部协作方
    let notifier: SharedNotifier = match config.notifications.webhook_url.clone() {
        Some(url) => Arc::new(WebhookNotifier::new(url).expect("Failed to build webhook client")),
        None => {
            log::info!("No notification webhook configured, notifications go to the log");
            Arc::new(LogNotifier)
        }
    };
    let rates: Arc<dyn CurrencyRates> = Arc::new(CurrencyTableRates);
    let translator: Arc<dyn Translator> = Arc::new(StoredTextTranslator);

    // 创建服务
    let allocation_service = AllocationService::new(
        pool.clone(),
        config.funding.clone(),
        rates.clone(),
        translator,
    );
    let dream_service = DreamService::new(pool.clone(), config.funding.clone(), notifier.clone());
    let donation_service =
        DonationService::new(pool.clone(), config.funding.clone(), rates, notifier.clone());
    let referral_counter = ReferralCounter::new(pool.clone(), notifier);

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(allocation_service.clone()))
            .app_data(web::Data::new(dream_service.clone()))
            .app_data(web::Data::new(donation_service.clone()))
            .app_data(web::Data::new(referral_counter.clone()))
            .configure(swagger_config)
            .configure(handlers::health_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::dream_config)
                    .configure(handlers::referral_config)
                    .configure(handlers::donation_config)
                    .configure(handlers::subscription_config)
                    .configure(handlers::achievement_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
