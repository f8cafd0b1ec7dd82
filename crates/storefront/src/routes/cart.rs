//! Cart route handlers.
//!
//! The cart lives in the session as product ids and quantities (see
//! [`SessionCart`]). Every response re-prices it against current products.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use buildmart_core::{ActionResult, ProductId};
use buildmart_shop::db::ProductRepository;
use buildmart_shop::models::ProductDetail;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{ApiJson, ApiPath};
use crate::models::{CartView, SessionCart, session_keys};
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(show).delete(clear))
        .route("/cart/count", get(count))
        .route("/cart/items", post(add))
        .route(
            "/cart/items/{product_id}",
            patch(update).delete(remove),
        )
}

// =============================================================================
// Request/Response Types
// =============================================================================

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

// =============================================================================
// Session helpers
// =============================================================================

/// Read the cart from the session. A missing cart is an empty one.
pub(crate) async fn load_cart(session: &Session) -> Result<SessionCart> {
    Ok(session
        .get::<SessionCart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

pub(crate) async fn save_cart(session: &Session, cart: &SessionCart) -> Result<()> {
    session.insert(session_keys::CART, cart).await?;
    Ok(())
}

/// Price the cart, saving it back if lines were dropped or lowered.
pub(crate) async fn priced_cart(state: &AppState, session: &Session) -> Result<CartView> {
    let cart = load_cart(session).await?;
    if cart.is_empty() {
        return Ok(CartView::empty());
    }

    let products = ProductRepository::new(state.pool())
        .get_many(&cart.product_ids())
        .await?;
    let (view, kept, changed) = cart.resolve(&products);
    if changed {
        tracing::debug!(
            before = cart.lines.len(),
            after = kept.lines.len(),
            "Cart adjusted to current stock"
        );
        save_cart(session, &kept).await?;
    }
    Ok(view)
}

/// Load a product that can be put in a cart.
pub(crate) async fn purchasable_product(
    state: &AppState,
    product_id: ProductId,
) -> Result<ProductDetail> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .filter(|p| p.product.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    if !product.product.in_stock() {
        return Err(AppError::BadRequest(format!(
            "{} is out of stock",
            product.product.name
        )));
    }
    Ok(product)
}

// =============================================================================
// Handlers
// =============================================================================

/// The priced cart.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ActionResult<CartView>>> {
    Ok(Json(ActionResult::ok(priced_cart(&state, &session).await?)))
}

/// Number of units in the cart. Reads the session only.
#[instrument(skip_all)]
pub async fn count(session: Session) -> Result<Json<ActionResult<CartCount>>> {
    let cart = load_cart(&session).await?;
    Ok(Json(ActionResult::ok(CartCount {
        count: cart.count(),
    })))
}

/// Add units of a product, capped at stock and the per-line maximum.
#[instrument(skip_all, fields(product_id = %req.product_id, quantity = req.quantity))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<AddToCartRequest>,
) -> Result<Json<ActionResult<CartView>>> {
    if req.quantity == 0 {
        return Err(AppError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }
    let product = purchasable_product(&state, req.product_id).await?;

    let mut cart = load_cart(&session).await?;
    cart.add(
        req.product_id,
        req.quantity,
        product.product.stock_quantity,
    );
    save_cart(&session, &cart).await?;

    let product_id = req.product_id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &product_id)]));

    Ok(Json(ActionResult::ok(priced_cart(&state, &session).await?)))
}

/// Set a line's quantity. Zero removes the line.
#[instrument(skip_all, fields(product_id = %product_id, quantity = req.quantity))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(req): ApiJson<UpdateQuantityRequest>,
) -> Result<Json<ActionResult<CartView>>> {
    let mut cart = load_cart(&session).await?;
    if req.quantity == 0 {
        cart.remove(product_id);
    } else {
        if cart.quantity_of(product_id) == 0 {
            return Err(AppError::NotFound("Item is not in your cart".to_string()));
        }
        let product = purchasable_product(&state, product_id).await?;
        cart.set_quantity(product_id, req.quantity, product.product.stock_quantity);
    }
    save_cart(&session, &cart).await?;

    Ok(Json(ActionResult::ok(priced_cart(&state, &session).await?)))
}

/// Remove a line.
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ActionResult<CartView>>> {
    let mut cart = load_cart(&session).await?;
    if cart.remove(product_id) {
        save_cart(&session, &cart).await?;
    }
    Ok(Json(ActionResult::ok(priced_cart(&state, &session).await?)))
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(session: Session) -> Result<Json<ActionResult<CartView>>> {
    save_cart(&session, &SessionCart::default()).await?;
    Ok(Json(ActionResult::ok(CartView::empty())))
}
