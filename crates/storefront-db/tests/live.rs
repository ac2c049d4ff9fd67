//! Live integration tests for storefront-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/storefront-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use futures::future::join_all;
use rust_decimal::Decimal;
use storefront_core::{
    load_catalog, CoreError, OrderStatus, PaymentMode, RatingValue, Role, StatusPolicy, TimeRange,
};
use storefront_db::{cart, inventory};
use storefront_db::{
    add_to_cart, admin_metrics, create_product, create_user, deactivate_user, get_order,
    get_product, get_product_detail, list_cart_items, list_categories, list_order_lines, list_orders_for_user,
    list_products, list_transactions, list_users, pay_order, place_order, remove_cart_line,
    sales_analytics, seed_catalog, set_order_status, submit_rating, update_cart_line, CartError,
    InventoryError, NewProduct, PlacementError, ProductListFilters, ProductSort, RatingError,
    StatusError, TransactionFilters,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dec(raw: &str) -> Decimal {
    raw.parse()
        .unwrap_or_else(|e| panic!("bad decimal literal '{raw}': {e}"))
}

async fn insert_user(pool: &sqlx::PgPool, username: &str) -> i64 {
    create_user(pool, username, Role::Customer)
        .await
        .unwrap_or_else(|e| panic!("create_user failed for '{username}': {e}"))
}

async fn insert_product(pool: &sqlx::PgPool, name: &str, price: &str, inventory: i32) -> i64 {
    create_product(
        pool,
        &NewProduct {
            name,
            description: None,
            price: dec(price),
            inventory,
            image_url: None,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("create_product failed for '{name}': {e}"))
}

/// Puts a cart line in place without the inventory courtesy check, as if
/// stock had dropped after the customer added it.
async fn force_cart_line(pool: &sqlx::PgPool, user_id: i64, product_id: i64, quantity: i32) {
    sqlx::query("INSERT INTO cart (user_id, product_id, quantity) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(pool)
        .await
        .expect("insert cart line failed");
}

/// Inserts an order row directly with a fixed status, total and timestamp.
async fn insert_order(
    pool: &sqlx::PgPool,
    user_id: i64,
    status: OrderStatus,
    total: &str,
    created_at: &str,
) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders (user_id, status, total, created_at) \
         VALUES ($1, $2, $3, $4::TIMESTAMPTZ) RETURNING order_id",
    )
    .bind(user_id)
    .bind(status.as_str())
    .bind(dec(total))
    .bind(created_at)
    .fetch_one(pool)
    .await
    .expect("insert order failed")
}

async fn stock(pool: &sqlx::PgPool, product_id: i64) -> i32 {
    inventory::available(pool, product_id)
        .await
        .expect("inventory lookup failed")
}

// ---------------------------------------------------------------------------
// Section 1: Order placement
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn placing_an_order_reserves_stock_and_clears_cart(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Lantern", "21.75", 3).await;
    add_to_cart(&pool, user_id, product_id, 2)
        .await
        .expect("add_to_cart failed");

    let summary = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .expect("place_order failed");

    assert_eq!(summary.status, OrderStatus::Paid);
    assert_eq!(summary.total, dec("43.50"));
    assert_eq!(stock(&pool, product_id).await, 1);
    assert!(list_cart_items(&pool, user_id).await.unwrap().is_empty());

    let lines = list_order_lines(&pool, summary.order_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[0].price_at_purchase, dec("21.75"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn insufficient_inventory_changes_nothing(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Lantern", "21.75", 3).await;
    force_cart_line(&pool, user_id, product_id, 4).await;

    let err = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            PlacementError::InsufficientInventory { product_id: p, requested: 4, available: 3 }
                if p == product_id
        ),
        "unexpected error: {err:?}"
    );
    assert_eq!(stock(&pool, product_id).await, 3);
    let cart = list_cart_items(&pool, user_id).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 4);
    assert!(list_orders_for_user(&pool, user_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn failure_on_a_later_line_rolls_back_earlier_reservations(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let plenty = insert_product(&pool, "Mug", "8.00", 10).await;
    let scarce = insert_product(&pool, "Lantern", "21.75", 1).await;
    force_cart_line(&pool, user_id, plenty, 2).await;
    force_cart_line(&pool, user_id, scarce, 2).await;

    let err = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap_err();

    assert!(matches!(err, PlacementError::InsufficientInventory { product_id, .. } if product_id == scarce));
    assert_eq!(stock(&pool, plenty).await, 10);
    assert_eq!(stock(&pool, scarce).await, 1);
    assert_eq!(list_cart_items(&pool, user_id).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_cart_is_rejected(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;

    let err = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap_err();

    assert!(matches!(err, PlacementError::EmptyCart));
}

#[sqlx::test(migrations = "../../migrations")]
async fn captured_price_survives_a_later_price_change(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;
    add_to_cart(&pool, user_id, product_id, 3).await.unwrap();
    let summary = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap();

    sqlx::query("UPDATE products SET price = 12.00 WHERE product_id = $1")
        .bind(product_id)
        .execute(&pool)
        .await
        .unwrap();

    let order = get_order(&pool, summary.order_id).await.unwrap().unwrap();
    let lines = list_order_lines(&pool, summary.order_id).await.unwrap();
    assert_eq!(order.total, dec("24.00"));
    assert_eq!(lines[0].price_at_purchase, dec("8.00"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_checkouts_never_oversell(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "Lantern", "21.75", 5).await;
    let mut users = Vec::new();
    for i in 0..8 {
        let user_id = insert_user(&pool, &format!("buyer{i}")).await;
        add_to_cart(&pool, user_id, product_id, 1).await.unwrap();
        users.push(user_id);
    }

    let results = join_all(users.iter().map(|&user_id| {
        let pool = pool.clone();
        async move { place_order(&pool, user_id, PaymentMode::Immediate).await }
    }))
    .await;

    let placed = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(PlacementError::InsufficientInventory { .. })))
        .count();
    assert_eq!(placed, 5);
    assert_eq!(short, 3);
    assert_eq!(stock(&pool, product_id).await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_checkouts_of_one_cart_place_one_order(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;
    add_to_cart(&pool, user_id, product_id, 2).await.unwrap();

    let results = join_all((0..2).map(|_| {
        let pool = pool.clone();
        async move { place_order(&pool, user_id, PaymentMode::Immediate).await }
    }))
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(PlacementError::EmptyCart))));
    assert_eq!(stock(&pool, product_id).await, 8);
}

// ---------------------------------------------------------------------------
// Section 2: Status changes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn deferred_order_is_paid_by_its_owner(pool: sqlx::PgPool) {
    let owner = insert_user(&pool, "alice").await;
    let other = insert_user(&pool, "bob").await;
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;
    add_to_cart(&pool, owner, product_id, 1).await.unwrap();
    let summary = place_order(&pool, owner, PaymentMode::Deferred)
        .await
        .unwrap();
    assert_eq!(summary.status, OrderStatus::Pending);

    let err = pay_order(&pool, summary.order_id, other).await.unwrap_err();
    assert!(matches!(err, StatusError::Forbidden { .. }));

    let change = pay_order(&pool, summary.order_id, owner).await.unwrap();
    assert_eq!(change.previous, OrderStatus::Pending);
    assert_eq!(change.status, OrderStatus::Paid);

    let err = pay_order(&pool, summary.order_id, owner).await.unwrap_err();
    assert!(matches!(
        err,
        StatusError::Transition(CoreError::IllegalTransition {
            from: OrderStatus::Paid,
            to: OrderStatus::Paid
        })
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn customers_cannot_change_status(pool: sqlx::PgPool) {
    let err = set_order_status(
        &pool,
        999,
        OrderStatus::Shipped,
        Role::Customer,
        StatusPolicy::Permissive,
        false,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StatusError::NotAdmin));
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_order_is_not_found(pool: sqlx::PgPool) {
    let err = set_order_status(
        &pool,
        999,
        OrderStatus::Shipped,
        Role::Admin,
        StatusPolicy::Permissive,
        false,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StatusError::OrderNotFound(999)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn permissive_policy_allows_backwards_moves(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let order_id = insert_order(
        &pool,
        user_id,
        OrderStatus::Delivered,
        "10.00",
        "2024-03-01T00:00:00Z",
    )
    .await;

    let change = set_order_status(
        &pool,
        order_id,
        OrderStatus::Pending,
        Role::Admin,
        StatusPolicy::Permissive,
        false,
    )
    .await
    .unwrap();

    assert_eq!(change.status, OrderStatus::Pending);
    let row = get_order(&pool, order_id).await.unwrap().unwrap();
    assert_eq!(row.status().unwrap(), OrderStatus::Pending);
}

#[sqlx::test(migrations = "../../migrations")]
async fn strict_policy_rejects_delivered_to_pending(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let order_id = insert_order(
        &pool,
        user_id,
        OrderStatus::Delivered,
        "10.00",
        "2024-03-01T00:00:00Z",
    )
    .await;

    let err = set_order_status(
        &pool,
        order_id,
        OrderStatus::Pending,
        Role::Admin,
        StatusPolicy::Strict,
        false,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        StatusError::Transition(CoreError::IllegalTransition { .. })
    ));
    let row = get_order(&pool, order_id).await.unwrap().unwrap();
    assert_eq!(row.status, "delivered");
}

#[sqlx::test(migrations = "../../migrations")]
async fn restocking_cancellation_returns_inventory(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;
    add_to_cart(&pool, user_id, product_id, 4).await.unwrap();
    let summary = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap();
    assert_eq!(stock(&pool, product_id).await, 6);

    let change = set_order_status(
        &pool,
        summary.order_id,
        OrderStatus::Cancelled,
        Role::Admin,
        StatusPolicy::Strict,
        true,
    )
    .await
    .unwrap();
    assert!(change.restocked);
    assert_eq!(stock(&pool, product_id).await, 10);

    // Cancelling again must not credit twice.
    let change = set_order_status(
        &pool,
        summary.order_id,
        OrderStatus::Cancelled,
        Role::Admin,
        StatusPolicy::Strict,
        true,
    )
    .await
    .unwrap();
    assert!(!change.restocked);
    assert_eq!(stock(&pool, product_id).await, 10);
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancellation_without_restock_keeps_inventory(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;
    add_to_cart(&pool, user_id, product_id, 4).await.unwrap();
    let summary = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap();

    set_order_status(
        &pool,
        summary.order_id,
        OrderStatus::Cancelled,
        Role::Admin,
        StatusPolicy::Permissive,
        false,
    )
    .await
    .unwrap();

    assert_eq!(stock(&pool, product_id).await, 6);
}

/// Permissive admin status change; returns whether stock was credited.
async fn admin_set(
    pool: &sqlx::PgPool,
    order_id: i64,
    status: OrderStatus,
    restock: bool,
) -> bool {
    set_order_status(
        pool,
        order_id,
        status,
        Role::Admin,
        StatusPolicy::Permissive,
        restock,
    )
    .await
    .unwrap_or_else(|e| panic!("set_order_status to {status} failed: {e}"))
    .restocked
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_reopen_cancel_cycle_credits_stock_once(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;
    add_to_cart(&pool, user_id, product_id, 4).await.unwrap();
    let order_id = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap()
        .order_id;
    assert_eq!(stock(&pool, product_id).await, 6);

    assert!(admin_set(&pool, order_id, OrderStatus::Cancelled, true).await);
    assert_eq!(stock(&pool, product_id).await, 10);

    // Reopening holds the units again.
    assert!(!admin_set(&pool, order_id, OrderStatus::Paid, false).await);
    assert_eq!(stock(&pool, product_id).await, 6);

    assert!(admin_set(&pool, order_id, OrderStatus::Cancelled, true).await);
    assert_eq!(stock(&pool, product_id).await, 10);

    let restocked: bool = sqlx::query_scalar("SELECT restocked FROM orders WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(restocked);
}

#[sqlx::test(migrations = "../../migrations")]
async fn reopening_restocked_order_requires_stock(pool: sqlx::PgPool) {
    let alice = insert_user(&pool, "alice").await;
    let bob = insert_user(&pool, "bob").await;
    let product_id = insert_product(&pool, "Mug", "8.00", 4).await;
    add_to_cart(&pool, alice, product_id, 4).await.unwrap();
    let order_id = place_order(&pool, alice, PaymentMode::Immediate)
        .await
        .unwrap()
        .order_id;
    assert!(admin_set(&pool, order_id, OrderStatus::Cancelled, true).await);

    // The returned units are sold to someone else.
    add_to_cart(&pool, bob, product_id, 3).await.unwrap();
    place_order(&pool, bob, PaymentMode::Immediate).await.unwrap();
    assert_eq!(stock(&pool, product_id).await, 1);

    let err = set_order_status(
        &pool,
        order_id,
        OrderStatus::Paid,
        Role::Admin,
        StatusPolicy::Permissive,
        false,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        StatusError::InsufficientInventory {
            product_id: p,
            requested: 4,
            available: 1,
        } if p == product_id
    ));
    assert_eq!(stock(&pool, product_id).await, 1);
    let row = get_order(&pool, order_id).await.unwrap().unwrap();
    assert_eq!(row.status().unwrap(), OrderStatus::Cancelled);
}

#[sqlx::test(migrations = "../../migrations")]
async fn late_restock_of_plain_cancellation_credits_once(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;
    add_to_cart(&pool, user_id, product_id, 4).await.unwrap();
    let order_id = place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap()
        .order_id;

    assert!(!admin_set(&pool, order_id, OrderStatus::Cancelled, false).await);
    assert_eq!(stock(&pool, product_id).await, 6);

    // A cancelled order that kept its units may still be restocked later.
    assert!(admin_set(&pool, order_id, OrderStatus::Cancelled, true).await);
    assert_eq!(stock(&pool, product_id).await, 10);
    assert!(!admin_set(&pool, order_id, OrderStatus::Cancelled, true).await);
    assert_eq!(stock(&pool, product_id).await, 10);
}

// ---------------------------------------------------------------------------
// Section 3: Inventory ledger
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn admin_override_sets_absolute_stock(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;

    inventory::set_absolute(&pool, product_id, 42).await.unwrap();
    assert_eq!(stock(&pool, product_id).await, 42);

    let err = inventory::set_absolute(&pool, product_id, -1)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidQuantity(-1)));

    let err = inventory::set_absolute(&pool, 9_999, 1).await.unwrap_err();
    assert!(matches!(err, InventoryError::ProductNotFound(9_999)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn reserve_reports_shortfall_without_changing_stock(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "Mug", "8.00", 2).await;
    let mut conn = pool.acquire().await.unwrap();

    let err = inventory::reserve(&mut conn, product_id, 3).await.unwrap_err();
    assert!(matches!(
        err,
        InventoryError::Insufficient { requested: 3, available: 2, .. }
    ));

    inventory::reserve(&mut conn, product_id, 2).await.unwrap();
    drop(conn);
    assert_eq!(stock(&pool, product_id).await, 0);
}

// ---------------------------------------------------------------------------
// Section 4: Ratings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ratings_keep_a_running_mean(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;

    submit_rating(&pool, product_id, RatingValue::try_from(4).unwrap())
        .await
        .unwrap();
    let summary = submit_rating(&pool, product_id, RatingValue::try_from(2).unwrap())
        .await
        .unwrap();

    assert!((summary.rating - 3.0).abs() < f64::EPSILON);
    assert_eq!(summary.rating_count, 2);

    let detail = get_product_detail(&pool, product_id)
        .await
        .unwrap()
        .unwrap();
    assert!((detail.rating - 3.0).abs() < f64::EPSILON);
    assert_eq!(detail.rating_count, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn rating_unknown_product_fails(pool: sqlx::PgPool) {
    let err = submit_rating(&pool, 12_345, RatingValue::try_from(5).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, RatingError::ProductNotFound(12_345)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_ratings_are_all_counted(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "Mug", "8.00", 10).await;
    let values = [5_i64, 4, 3, 5, 1, 2, 5, 4, 3, 3];

    let results = join_all(values.iter().map(|&v| {
        let pool = pool.clone();
        async move { submit_rating(&pool, product_id, RatingValue::try_from(v).unwrap()).await }
    }))
    .await;
    assert!(results.iter().all(Result::is_ok));

    let detail = get_product_detail(&pool, product_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.rating_count, 10);
    assert!((detail.rating - 3.5).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Section 5: Analytics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn revenue_counts_only_realized_orders(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    insert_order(&pool, user_id, OrderStatus::Paid, "10.00", "2024-02-01T10:00:00Z").await;
    insert_order(&pool, user_id, OrderStatus::Paid, "20.00", "2024-02-02T10:00:00Z").await;
    insert_order(&pool, user_id, OrderStatus::Cancelled, "5.00", "2024-02-03T10:00:00Z").await;

    let metrics = admin_metrics(&pool).await.unwrap();

    assert_eq!(metrics.orders.total, 3);
    assert_eq!(metrics.orders.revenue_total, dec("30.00"));
    assert_eq!(metrics.orders.by_status["paid"], 2);
    assert_eq!(metrics.orders.by_status["cancelled"], 1);
    assert_eq!(metrics.orders.by_status["shipped"], 0);
    assert_eq!(metrics.users.total, 1);
    assert_eq!(metrics.users.active, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn top_products_rank_by_realized_quantity(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let mug = insert_product(&pool, "Mug", "8.00", 100).await;
    let lantern = insert_product(&pool, "Lantern", "21.75", 100).await;

    add_to_cart(&pool, user_id, mug, 3).await.unwrap();
    add_to_cart(&pool, user_id, lantern, 5).await.unwrap();
    place_order(&pool, user_id, PaymentMode::Immediate)
        .await
        .unwrap();

    // A pending order does not count toward the ranking.
    add_to_cart(&pool, user_id, mug, 10).await.unwrap();
    place_order(&pool, user_id, PaymentMode::Deferred)
        .await
        .unwrap();

    let metrics = admin_metrics(&pool).await.unwrap();
    let ranked: Vec<(i64, i64)> = metrics
        .top_products
        .iter()
        .map(|row| (row.product_id, row.quantity_sold))
        .collect();
    assert_eq!(ranked, vec![(lantern, 5), (mug, 3)]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn sales_buckets_are_sparse_and_range_bounded(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    insert_order(&pool, user_id, OrderStatus::Paid, "50.00", "2024-01-15T12:00:00Z").await;
    insert_order(&pool, user_id, OrderStatus::Pending, "70.00", "2024-01-16T12:00:00Z").await;
    insert_order(&pool, user_id, OrderStatus::Delivered, "99.00", "2024-02-02T12:00:00Z").await;

    let range = TimeRange::parse(Some("2024-01-01"), Some("2024-01-31")).unwrap();
    let analytics = sales_analytics(&pool, &range).await.unwrap();

    assert_eq!(analytics.total_sales, dec("50.00"));
    assert_eq!(analytics.daily.len(), 1);
    assert_eq!(analytics.daily[0].period, "2024-01-15");
    assert_eq!(analytics.daily[0].revenue, dec("50.00"));
    assert_eq!(analytics.monthly.len(), 1);
    assert_eq!(analytics.monthly[0].period, "2024-01");
    assert_eq!(analytics.monthly[0].revenue, dec("50.00"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn bare_to_date_includes_the_whole_day(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    insert_order(&pool, user_id, OrderStatus::Shipped, "12.00", "2024-01-31T23:30:00Z").await;

    let range = TimeRange::parse(None, Some("2024-01-31")).unwrap();
    let analytics = sales_analytics(&pool, &range).await.unwrap();

    assert_eq!(analytics.total_sales, dec("12.00"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_store_reports_zero(pool: sqlx::PgPool) {
    let analytics = sales_analytics(&pool, &TimeRange::default()).await.unwrap();
    assert_eq!(analytics.total_sales, Decimal::ZERO);
    assert!(analytics.daily.is_empty());
    assert!(analytics.monthly.is_empty());

    let metrics = admin_metrics(&pool).await.unwrap();
    assert_eq!(metrics.orders.revenue_total, Decimal::ZERO);
    assert!(metrics.top_products.is_empty());
}

// ---------------------------------------------------------------------------
// Section 6: Catalog, cart, users, seed
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn seeded_catalog_is_searchable(pool: sqlx::PgPool) {
    let catalog = load_catalog(std::path::Path::new("../../config/catalog.yaml"))
        .expect("demo catalog should load");
    let summary = seed_catalog(&pool, &catalog).await.unwrap();
    assert_eq!(summary.products_inserted, 4);

    // Seeding again updates in place.
    let again = seed_catalog(&pool, &catalog).await.unwrap();
    assert_eq!(again.products_inserted, 0);
    assert_eq!(again.products_updated, 4);

    let categories = list_categories(&pool).await.unwrap();
    let audio = categories
        .iter()
        .find(|c| c.name == "Audio")
        .expect("Audio category");

    let (rows, total) = list_products(
        &pool,
        &ProductListFilters {
            category_id: Some(audio.category_id),
            sort: Some(ProductSort::PriceAsc),
            ..ProductListFilters::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(total, 2);
    assert_eq!(rows[0].name, "Bluetooth Speaker");
    assert_eq!(rows[1].name, "Wireless Headphones");

    let (rows, total) = list_products(
        &pool,
        &ProductListFilters {
            q: Some("LANTERN"),
            ..ProductListFilters::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].inventory, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_lookup_reads_current_stock(pool: sqlx::PgPool) {
    let product_id = insert_product(&pool, "Lantern", "21.75", 7).await;
    let mut conn = pool.acquire().await.unwrap();

    let product = get_product(&mut *conn, product_id)
        .await
        .unwrap()
        .expect("product should exist");
    assert_eq!(product.name, "Lantern");
    assert_eq!(product.price, dec("21.75"));
    assert_eq!(product.inventory, 7);

    assert!(get_product(&mut *conn, product_id + 1)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn cart_lines_respect_inventory(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Lantern", "21.75", 3).await;

    add_to_cart(&pool, user_id, product_id, 2).await.unwrap();
    let err = add_to_cart(&pool, user_id, product_id, 2).await.unwrap_err();
    assert!(matches!(
        err,
        CartError::Insufficient { requested: 4, available: 3, .. }
    ));

    let line = update_cart_line(&pool, user_id, product_id, 3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.quantity, 3);

    assert!(update_cart_line(&pool, user_id, product_id, 0)
        .await
        .unwrap()
        .is_none());
    let err = remove_cart_line(&pool, user_id, product_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::LineNotFound(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_adds_of_one_product_all_count(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let product_id = insert_product(&pool, "Lantern", "21.75", 10).await;

    let results = join_all((0..6).map(|_| {
        let pool = pool.clone();
        async move { add_to_cart(&pool, user_id, product_id, 1).await }
    }))
    .await;
    assert!(results.iter().all(Result::is_ok));

    let items = list_cart_items(&pool, user_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 6);
}

#[sqlx::test(migrations = "../../migrations")]
async fn add_to_unknown_product_is_not_found(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;

    let err = add_to_cart(&pool, user_id, 4_242, 1).await.unwrap_err();
    assert!(matches!(err, CartError::ProductNotFound(4_242)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn clearing_checked_out_lines_keeps_other_lines(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "alice").await;
    let mug = insert_product(&pool, "Mug", "8.00", 10).await;
    let lantern = insert_product(&pool, "Lantern", "21.75", 10).await;
    add_to_cart(&pool, user_id, mug, 1).await.unwrap();
    add_to_cart(&pool, user_id, lantern, 2).await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let removed = cart::clear(&mut *tx, user_id, &[mug]).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(removed, 1);
    let items = list_cart_items(&pool, user_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, lantern);
    assert_eq!(items[0].quantity, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn transactions_list_newest_first_with_usernames(pool: sqlx::PgPool) {
    let alice = insert_user(&pool, "alice").await;
    let bob = insert_user(&pool, "bob").await;
    insert_order(&pool, alice, OrderStatus::Paid, "10.00", "2024-01-01T00:00:00Z").await;
    let newest = insert_order(&pool, bob, OrderStatus::Paid, "20.00", "2024-01-05T00:00:00Z").await;

    let (rows, total) = list_transactions(&pool, &TransactionFilters::default())
        .await
        .unwrap();

    assert_eq!(total, 2);
    assert_eq!(rows[0].order_id, newest);
    assert_eq!(rows[0].username, "bob");
    assert_eq!(rows[0].item_count, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn deactivated_users_are_counted_inactive(pool: sqlx::PgPool) {
    let alice = insert_user(&pool, "alice").await;
    insert_user(&pool, "bob").await;

    deactivate_user(&pool, alice).await.unwrap();

    let inactive = list_users(&pool, Some(false)).await.unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].username, "alice");

    let metrics = admin_metrics(&pool).await.unwrap();
    assert_eq!(metrics.users.total, 2);
    assert_eq!(metrics.users.inactive, 1);
}
