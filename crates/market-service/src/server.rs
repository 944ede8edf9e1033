//! HTTP server for the marketplace API.
//!
//! All routes live under `/api` and speak JSON. Request tracing, a request
//! timeout, a body size limit and CORS are applied to every route.

use crate::apis::{cart, delivery, orders, products, users};
use axum::{
	extract::DefaultBodyLimit,
	http::HeaderValue,
	routing::{get, post},
	Router,
};
use market_config::ApiConfig;
use market_core::MarketEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the marketplace engine for processing requests.
	pub engine: Arc<MarketEngine>,
}

/// Builds the CORS layer: permissive unless origins are configured.
fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let Some(cors) = &api_config.cors else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse::<HeaderValue>() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods(Any)
		.allow_headers(Any)
}

/// Builds the API router with its middleware stack.
pub fn router(engine: Arc<MarketEngine>, api_config: &ApiConfig) -> Router {
	let api = Router::new()
		.route("/users", post(users::create_user).get(users::list_users))
		.route("/users/{id}", get(users::get_user))
		.route("/products", post(products::add_product))
		.route(
			"/products/{id}",
			get(products::get_product)
				.put(products::update_product)
				.delete(products::delete_product),
		)
		.route("/cart/{id}/add_product", post(cart::add_to_cart))
		.route(
			"/cart/{id}",
			get(cart::get_cart).delete(cart::remove_from_cart),
		)
		.route(
			"/order/{id}",
			post(orders::create_order).get(orders::user_orders),
		)
		.route("/order/{id}/review", post(orders::review_order))
		.route(
			"/orders/available_for_riders",
			get(delivery::available_for_riders),
		)
		.route("/orders/{id}/accept", post(delivery::accept_for_delivery))
		.route("/orders/{id}/deliver", post(delivery::mark_delivered))
		.route("/rider/{id}/orders", get(delivery::rider_orders));

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config)),
		)
		.layer(DefaultBodyLimit::max(api_config.max_request_size))
		.with_state(AppState { engine })
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<MarketEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Marketplace API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}
