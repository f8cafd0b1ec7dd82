//! Wishlist route handlers. All require a signed-in customer.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::instrument;

use buildmart_core::{ActionResult, ProductId};
use buildmart_shop::db::{ProductRepository, WishlistRepository};
use buildmart_shop::models::ProductDetail;

use crate::error::{AppError, Result};
use crate::extract::ApiPath;
use crate::middleware::RequireAuth;
use crate::models::CartView;
use crate::routes::cart::{load_cart, priced_cart, purchasable_product, save_cart};
use crate::state::AppState;

/// Build the wishlist router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(list))
        .route("/wishlist/{product_id}", post(add).delete(remove))
        .route("/wishlist/{product_id}/move-to-cart", post(move_to_cart))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ActionResult<Vec<ProductDetail>>>> {
    let items = WishlistRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(ActionResult::ok(items)))
}

/// Save a product. Saving it twice is not an error. Out-of-stock products
/// can be saved, inactive ones can't.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ActionResult<Vec<ProductDetail>>>> {
    ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .filter(|p| p.product.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let wishlist = WishlistRepository::new(state.pool());
    wishlist.add(user.id, product_id).await?;
    Ok(Json(ActionResult::ok(wishlist.list(user.id).await?)))
}

#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ActionResult<Vec<ProductDetail>>>> {
    let wishlist = WishlistRepository::new(state.pool());
    if !wishlist.remove(user.id, product_id).await? {
        return Err(AppError::NotFound(
            "Product is not on your wishlist".to_string(),
        ));
    }
    Ok(Json(ActionResult::ok(wishlist.list(user.id).await?)))
}

/// Put one unit in the cart and take the product off the wishlist.
///
/// The wishlist entry stays if the product can't be bought right now.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %product_id))]
pub async fn move_to_cart(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<ActionResult<CartView>>> {
    let product = purchasable_product(&state, product_id).await?;

    let mut cart = load_cart(&session).await?;
    cart.add(product_id, 1, product.product.stock_quantity);
    save_cart(&session, &cart).await?;

    WishlistRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;

    Ok(Json(ActionResult::ok(priced_cart(&state, &session).await?)))
}
