use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::memory::paginate;
use super::models::{convert_rows, OrderRow};
use super::{DbError, Store};
use crate::domain::models::{
    DashboardStats, NewOrder, Order, OrderItem, OrderStatus, Product, ReviewStatus,
};
use crate::domain::pagination::PageParams;
use crate::domain::pricing;

const ORDER_COLUMNS: &str = "id, customer_name, customer_email, address, items, status, \
                             total_amount, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub page: PageParams,
    pub status: Option<OrderStatus>,
}

/// Sum quantities of repeated product lines, keeping first-seen order.
fn merge_lines(order: &NewOrder) -> Vec<(Uuid, i32)> {
    let mut seen: BTreeMap<Uuid, usize> = BTreeMap::new();
    let mut lines: Vec<(Uuid, i32)> = Vec::new();
    for item in &order.items {
        match seen.get(&item.product_id) {
            Some(&index) => lines[index].1 = lines[index].1.saturating_add(item.quantity),
            None => {
                seen.insert(item.product_id, lines.len());
                lines.push((item.product_id, item.quantity));
            }
        }
    }
    lines
}

/// Check one line against the product and price it at the discounted price.
fn price_line(product: Option<&Product>, id: Uuid, quantity: i32) -> Result<OrderItem, DbError> {
    let product = product
        .filter(|p| p.is_published)
        .ok_or_else(|| DbError::Rejected(format!("Product is not available: {}", id)))?;
    if product.quantity < quantity {
        return Err(DbError::Rejected(format!(
            "Insufficient stock for {}",
            product.title
        )));
    }
    Ok(OrderItem {
        product_id: product.id,
        title: product.title.clone(),
        unit_price: product.discounted_price(),
        quantity,
    })
}

fn order_total(items: &[OrderItem]) -> f64 {
    pricing::round_cents(items.iter().map(OrderItem::line_total).sum())
}

impl Store {
    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<(Vec<Order>, i64), DbError> {
        match self {
            Store::Postgres(pool) => {
                let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
                let mut select =
                    QueryBuilder::<Postgres>::new(format!("SELECT {} FROM orders", ORDER_COLUMNS));
                if let Some(status) = filter.status {
                    count.push(" WHERE status = ").push_bind(status.as_str());
                    select.push(" WHERE status = ").push_bind(status.as_str());
                }
                let (total,): (i64,) = count.build_query_as().fetch_one(pool.as_ref()).await?;
                select
                    .push(" ORDER BY created_at DESC, id ASC LIMIT ")
                    .push_bind(filter.page.limit())
                    .push(" OFFSET ")
                    .push_bind(filter.page.offset());
                let rows = select
                    .build_query_as::<OrderRow>()
                    .fetch_all(pool.as_ref())
                    .await?;
                Ok((convert_rows(rows)?, total))
            }
            Store::Memory(mem) => {
                let table = mem.orders.read().await;
                let mut orders: Vec<Order> = table
                    .values()
                    .filter(|o| filter.status.map_or(true, |s| o.status == s))
                    .cloned()
                    .collect();
                orders.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then_with(|| a.id.cmp(&b.id))
                });
                Ok(paginate(orders, &filter.page))
            }
        }
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, DbError> {
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {} FROM orders WHERE id = $1",
                    ORDER_COLUMNS
                ))
                .bind(id)
                .fetch_optional(pool.as_ref())
                .await?
                .ok_or(DbError::NotFound)?;
                Order::try_from(row)
            }
            Store::Memory(mem) => mem
                .orders
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(DbError::NotFound),
        }
    }

    /// Price the order from current product data, take the stock and record
    /// the order, all or nothing.
    pub async fn place_order(&self, new: &NewOrder) -> Result<Order, DbError> {
        let lines = merge_lines(new);

        match self {
            Store::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                let mut items = Vec::with_capacity(lines.len());

                for (id, quantity) in &lines {
                    let product = sqlx::query_as::<_, Product>(
                        "SELECT id, title, description, price, discount, quantity, category_id, \
                         is_published, images, attributes, created_at, updated_at \
                         FROM products WHERE id = $1 FOR UPDATE",
                    )
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
                    items.push(price_line(product.as_ref(), *id, *quantity)?);

                    sqlx::query(
                        "UPDATE products SET quantity = quantity - $1, updated_at = now() \
                         WHERE id = $2",
                    )
                    .bind(quantity)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                }

                let total = order_total(&items);
                let row = sqlx::query_as::<_, OrderRow>(&format!(
                    r#"
                    INSERT INTO orders
                        (customer_name, customer_email, address, items, status, total_amount,
                         created_at, updated_at)
                    VALUES ($1, $2, $3, $4, 'pending', $5, now(), now())
                    RETURNING {}
                    "#,
                    ORDER_COLUMNS
                ))
                .bind(&new.customer_name)
                .bind(&new.customer_email)
                .bind(&new.address)
                .bind(Json(&items))
                .bind(total)
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;
                Order::try_from(row)
            }
            Store::Memory(mem) => {
                let mut products = mem.products.write().await;
                let items = lines
                    .iter()
                    .map(|(id, quantity)| price_line(products.get(id), *id, *quantity))
                    .collect::<Result<Vec<_>, _>>()?;

                let now = Utc::now();
                for item in &items {
                    if let Some(product) = products.get_mut(&item.product_id) {
                        product.quantity -= item.quantity;
                        product.updated_at = now;
                    }
                }

                let order = Order {
                    id: Uuid::new_v4(),
                    customer_name: new.customer_name.clone(),
                    customer_email: new.customer_email.clone(),
                    address: new.address.clone(),
                    total_amount: order_total(&items),
                    items,
                    status: OrderStatus::Pending,
                    created_at: now,
                    updated_at: now,
                };
                mem.orders.write().await.insert(order.id, order.clone());
                Ok(order)
            }
        }
    }

    pub async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, DbError> {
        match self {
            Store::Postgres(pool) => {
                let row = sqlx::query_as::<_, OrderRow>(&format!(
                    "UPDATE orders SET status = $1, updated_at = now() WHERE id = $2 RETURNING {}",
                    ORDER_COLUMNS
                ))
                .bind(status.as_str())
                .bind(id)
                .fetch_optional(pool.as_ref())
                .await?
                .ok_or(DbError::NotFound)?;
                Order::try_from(row)
            }
            Store::Memory(mem) => {
                let mut table = mem.orders.write().await;
                let order = table.get_mut(&id).ok_or(DbError::NotFound)?;
                order.status = status;
                order.updated_at = Utc::now();
                Ok(order.clone())
            }
        }
    }

    /// Dashboard aggregates across orders, products and reviews.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, DbError> {
        let mut stats = match self {
            Store::Postgres(pool) => {
                let rows: Vec<(String, i64, f64)> = sqlx::query_as(
                    "SELECT status, COUNT(*), COALESCE(SUM(total_amount), 0)::DOUBLE PRECISION \
                     FROM orders GROUP BY status",
                )
                .fetch_all(pool.as_ref())
                .await?;
                let mut stats = DashboardStats::default();
                for (status, count, amount) in rows {
                    let status: OrderStatus = status
                        .parse()
                        .map_err(|e| DbError::Decode(format!("{}", e)))?;
                    tally(&mut stats, status, count, amount);
                }
                stats
            }
            Store::Memory(mem) => {
                let table = mem.orders.read().await;
                let mut stats = DashboardStats::default();
                for order in table.values() {
                    tally(&mut stats, order.status, 1, order.total_amount);
                }
                stats
            }
        };

        let (total_products, published_products) = self.count_products().await?;
        stats.total_products = total_products;
        stats.published_products = published_products;
        stats.pending_reviews = self
            .count_reviews_with_status(ReviewStatus::Pending)
            .await?;
        stats.revenue = pricing::round_cents(stats.revenue);
        Ok(stats)
    }
}

fn tally(stats: &mut DashboardStats, status: OrderStatus, count: i64, amount: f64) {
    stats.total_orders += count;
    match status {
        OrderStatus::Pending => stats.pending_orders += count,
        OrderStatus::Processing => stats.processing_orders += count,
        OrderStatus::Completed => {
            stats.completed_orders += count;
            stats.revenue += amount;
        }
        OrderStatus::Cancelled => stats.cancelled_orders += count,
    }
}
