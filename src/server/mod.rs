//! JSON HTTP API：估算、系統比較、規範擷取與建物概算

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

use crate::adapters::solar::SolarClient;
use crate::catalog::pricing::PriceBook;
use crate::config::services::SolarConfig;
use axum::Router;
use std::sync::Arc;

pub use error::{map_estimator_error, Problem};

/// 所有請求共用的狀態
pub struct AppState {
    pub price_book: PriceBook,
    /// 未設定 Solar API 金鑰時為 None，/footprint 回 503
    pub solar: Option<SolarClient>,
}

impl AppState {
    pub fn new(price_book: PriceBook) -> Self {
        Self {
            price_book,
            solar: None,
        }
    }

    pub fn with_solar(mut self, config: SolarConfig) -> Self {
        self.solar = Some(SolarClient::new(config));
        self
    }
}

pub fn router(state: AppState) -> Router {
    routes::register_routes(Router::new(), Arc::new(state))
}
