use serde::Deserialize;
use std::env;

// Top-level configuration container for the whole service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub notifier: NotifierConfig,
    pub booking: BookingConfig,
    pub admin: AdminConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Redis settings
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Notifier gateway settings
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    pub gateway_url: String,
    pub service_id: String,
    pub service_secret: String,
    pub timeout_seconds: u64,
}

// Booking rules passed explicitly into the reservation core
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub max_txn_retries: u32,
    pub default_seat_price: f64,
}

// Credentials that resolve a requester as admin
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

// Circuit breaker settings for the notifier client
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "reservation_system=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            notifier: NotifierConfig {
                gateway_url: env::var("NOTIFIER_GATEWAY_URL")
                    .unwrap_or_else(|_| "http://localhost:9400/api/v1".to_string()),
                service_id: env::var("NOTIFIER_SERVICE_ID").expect("NOTIFIER_SERVICE_ID must be set"),
                service_secret: env::var("NOTIFIER_SERVICE_SECRET")
                    .expect("NOTIFIER_SERVICE_SECRET must be set"),
                timeout_seconds: env::var("NOTIFIER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("NOTIFIER_TIMEOUT_SECONDS must be a valid number"),
            },
            booking: BookingConfig {
                max_txn_retries: env::var("BOOKING_MAX_TXN_RETRIES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .expect("BOOKING_MAX_TXN_RETRIES must be a valid number"),
                default_seat_price: env::var("BOOKING_DEFAULT_SEAT_PRICE")
                    .unwrap_or_else(|_| "1500.0".to_string())
                    .parse()
                    .expect("BOOKING_DEFAULT_SEAT_PRICE must be a valid number"),
            },
            admin: AdminConfig {
                email: env::var("ADMIN_EMAIL").expect("ADMIN_EMAIL must be set"),
                password: env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set"),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be a valid number"),
                timeout_seconds: env::var("CIRCUIT_BREAKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_TIMEOUT_SECONDS must be a valid number"),
            },
        }
    }
}
