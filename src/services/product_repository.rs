//! Typed access to the `products` table.

use crate::{
    errors::{ShopError, ShopResult},
    models::product::{
        CategoryCount, NewProduct, Pagination, Product, ProductChanges, ProductFilter,
        ProductPage, ProductSort, ProductStats, SortDirection, SortField,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};

const PRODUCT_COLUMNS: &str =
    "id, name, price, category, description, link, image, sold, is_featured, created_at, updated_at";

/// Data access interface for products.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// All products in the requested order.
    async fn get_all(&self, sort: ProductSort) -> ShopResult<Vec<Product>>;

    async fn get_by_id(&self, id: &str) -> ShopResult<Option<Product>>;

    /// One page of products matching `filter`, plus the total match count.
    async fn query(
        &self,
        filter: &ProductFilter,
        page: Pagination,
        sort: ProductSort,
    ) -> ShopResult<ProductPage>;

    /// Every product matching `filter`, unpaged.
    async fn find(&self, filter: &ProductFilter, sort: ProductSort) -> ShopResult<Vec<Product>>;

    /// Insert a row. Fails with `Conflict` when the id is taken.
    async fn create(&self, product: NewProduct) -> ShopResult<Product>;

    /// Merge `changes` into an existing row.
    async fn update(&self, id: &str, changes: &ProductChanges) -> ShopResult<Product>;

    /// Remove a row, returning its last state.
    async fn delete(&self, id: &str) -> ShopResult<Product>;

    async fn delete_many(&self, ids: &[String]) -> ShopResult<Vec<Product>>;

    async fn delete_by_category(&self, category: &str) -> ShopResult<Vec<Product>>;

    async fn delete_by_filter(&self, filter: &ProductFilter) -> ShopResult<Vec<Product>>;

    async fn set_featured(&self, id: &str, featured: bool) -> ShopResult<Product>;

    async fn count_featured(&self) -> ShopResult<i64>;

    async fn featured_ids(&self) -> ShopResult<Vec<String>>;

    async fn list_featured(&self) -> ShopResult<Vec<Product>>;

    /// Atomically add `quantity` to `sold`.
    async fn increment_sold(&self, id: &str, quantity: i64) -> ShopResult<Product>;

    async fn categories(&self) -> ShopResult<Vec<CategoryCount>>;

    async fn top_selling(&self, limit: i64, category: Option<String>) -> ShopResult<Vec<Product>>;

    async fn stats(&self) -> ShopResult<ProductStats>;
}

/// `ProductRepository` over a SQLite pool.
#[derive(Clone)]
pub struct SqliteProductRepository {
    db: SqlitePool,
}

impl SqliteProductRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn first_by(&self, order: &str) -> ShopResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY {order}, id ASC LIMIT 1");
        Ok(sqlx::query_as::<_, Product>(&sql)
            .fetch_optional(&self.db)
            .await?)
    }
}

/// Append `WHERE` conditions for `filter`. Always emits a `WHERE` clause.
fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(category) = &filter.category {
        builder.push(" AND category = ");
        builder.push_bind(category.clone());
    }
    if let Some(min_price) = filter.min_price {
        builder.push(" AND price >= ");
        builder.push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        builder.push(" AND price <= ");
        builder.push_bind(max_price);
    }
    if let Some(min_sold) = filter.min_sold {
        builder.push(" AND sold >= ");
        builder.push_bind(min_sold);
    }
    if let Some(max_sold) = filter.max_sold {
        builder.push(" AND sold <= ");
        builder.push_bind(max_sold);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(&search.to_ascii_lowercase()));
        builder.push(" AND (LOWER(name) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" ESCAPE '\\' OR LOWER(description) LIKE ");
        builder.push_bind(pattern);
        builder.push(" ESCAPE '\\')");
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Sqlite>, sort: ProductSort) {
    builder.push(format!(
        " ORDER BY {} {}, id ASC",
        sort.field.column(),
        sort.direction.sql()
    ));
}

/// Escape LIKE wildcards so user search text matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[async_trait]
impl ProductRepository for SqliteProductRepository {
    async fn get_all(&self, sort: ProductSort) -> ShopResult<Vec<Product>> {
        self.find(&ProductFilter::default(), sort).await
    }

    async fn get_by_id(&self, id: &str) -> ShopResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        Ok(sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn query(
        &self,
        filter: &ProductFilter,
        page: Pagination,
        sort: ProductSort,
    ) -> ShopResult<ProductPage> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.db).await?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_filter(&mut builder, filter);
        push_order(&mut builder, sort);
        builder.push(" LIMIT ");
        builder.push_bind(page.limit);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset);

        let items = builder.build_query_as().fetch_all(&self.db).await?;
        Ok(ProductPage { items, total })
    }

    async fn find(&self, filter: &ProductFilter, sort: ProductSort) -> ShopResult<Vec<Product>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_filter(&mut builder, filter);
        push_order(&mut builder, sort);
        Ok(builder.build_query_as().fetch_all(&self.db).await?)
    }

    async fn create(&self, product: NewProduct) -> ShopResult<Product> {
        if self.get_by_id(&product.id).await?.is_some() {
            return Err(ShopError::Conflict(format!(
                "Product with ID `{}` already exists",
                product.id
            )));
        }

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO products (
                id, name, price, category, description, link, image,
                sold, is_featured, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(&product.id)
            .bind(&product.name)
            .bind(product.price)
            .bind(&product.category)
            .bind(&product.description)
            .bind(&product.link)
            .bind(&product.image)
            .bind(product.sold)
            .bind(now)
            .bind(now)
            .fetch_one(&self.db)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    ShopError::Conflict(format!("Product with ID `{}` already exists", product.id))
                } else {
                    ShopError::Database(err)
                }
            })
    }

    async fn update(&self, id: &str, changes: &ProductChanges) -> ShopResult<Product> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(name) = &changes.name {
            builder.push(", name = ");
            builder.push_bind(name.clone());
        }
        if let Some(price) = changes.price {
            builder.push(", price = ");
            builder.push_bind(price);
        }
        if let Some(category) = &changes.category {
            builder.push(", category = ");
            builder.push_bind(category.clone());
        }
        if let Some(description) = &changes.description {
            builder.push(", description = ");
            builder.push_bind(description.clone());
        }
        if let Some(link) = &changes.link {
            builder.push(", link = ");
            builder.push_bind(link.clone());
        }
        if let Some(image) = &changes.image {
            builder.push(", image = ");
            builder.push_bind(image.clone());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id.to_string());
        builder.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        builder
            .build_query_as::<Product>()
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ShopError::product_not_found(id))
    }

    async fn delete(&self, id: &str) -> ShopResult<Product> {
        let sql = format!("DELETE FROM products WHERE id = ? RETURNING {PRODUCT_COLUMNS}");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ShopError::product_not_found(id))
    }

    async fn delete_many(&self, ids: &[String]) -> ShopResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM products WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");
        builder.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let mut deleted: Vec<Product> = builder.build_query_as().fetch_all(&self.db).await?;
        deleted.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(deleted)
    }

    async fn delete_by_category(&self, category: &str) -> ShopResult<Vec<Product>> {
        let filter = ProductFilter {
            category: Some(category.to_string()),
            ..Default::default()
        };
        self.delete_by_filter(&filter).await
    }

    async fn delete_by_filter(&self, filter: &ProductFilter) -> ShopResult<Vec<Product>> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM products");
        push_filter(&mut builder, filter);
        builder.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        let mut deleted: Vec<Product> = builder.build_query_as().fetch_all(&self.db).await?;
        deleted.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(deleted)
    }

    async fn set_featured(&self, id: &str, featured: bool) -> ShopResult<Product> {
        let sql = format!(
            "UPDATE products SET is_featured = ?, updated_at = ? WHERE id = ? RETURNING {PRODUCT_COLUMNS}"
        );
        sqlx::query_as::<_, Product>(&sql)
            .bind(featured)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ShopError::product_not_found(id))
    }

    async fn count_featured(&self) -> ShopResult<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_featured = 1")
                .fetch_one(&self.db)
                .await?,
        )
    }

    async fn featured_ids(&self) -> ShopResult<Vec<String>> {
        Ok(
            sqlx::query_scalar("SELECT id FROM products WHERE is_featured = 1 ORDER BY id")
                .fetch_all(&self.db)
                .await?,
        )
    }

    async fn list_featured(&self) -> ShopResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_featured = 1 ORDER BY name ASC, id ASC"
        );
        Ok(sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.db)
            .await?)
    }

    async fn increment_sold(&self, id: &str, quantity: i64) -> ShopResult<Product> {
        // SQLite turns an overflowing integer sum into a REAL.
        let sql = format!(
            "UPDATE products SET sold = sold + ?, updated_at = ?
             WHERE id = ? AND sold <= ? RETURNING {PRODUCT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Product>(&sql)
            .bind(quantity)
            .bind(Utc::now())
            .bind(id)
            .bind(i64::MAX.saturating_sub(quantity))
            .fetch_optional(&self.db)
            .await?;
        match updated {
            Some(product) => Ok(product),
            None if self.get_by_id(id).await?.is_some() => Err(ShopError::validation(
                "quantity: Sold count would exceed the supported maximum",
            )),
            None => Err(ShopError::product_not_found(id)),
        }
    }

    async fn categories(&self) -> ShopResult<Vec<CategoryCount>> {
        Ok(sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(*) AS product_count
             FROM products GROUP BY category ORDER BY category ASC",
        )
        .fetch_all(&self.db)
        .await?)
    }

    async fn top_selling(&self, limit: i64, category: Option<String>) -> ShopResult<Vec<Product>> {
        let filter = ProductFilter {
            category,
            ..Default::default()
        };
        let page = Pagination { limit, offset: 0 };
        let sort = ProductSort::new(SortField::Sold, SortDirection::Desc);
        Ok(self.query(&filter, page, sort).await?.items)
    }

    async fn stats(&self) -> ShopResult<ProductStats> {
        let (total_products, total_categories, total_sold, average_price): (i64, i64, i64, f64) =
            sqlx::query_as(
                "SELECT COUNT(*), COUNT(DISTINCT category),
                        COALESCE(SUM(sold), 0), COALESCE(AVG(price), 0.0)
                 FROM products",
            )
            .fetch_one(&self.db)
            .await?;

        Ok(ProductStats {
            total_products,
            total_categories,
            total_sold,
            average_price,
            most_expensive: self.first_by("price DESC").await?,
            cheapest: self.first_by("price ASC").await?,
            top_seller: self.first_by("sold DESC").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    fn new_product(id: &str, name: &str, price: i64, category: &str, sold: i64) -> NewProduct {
        NewProduct {
            id: id.to_string(),
            name: name.to_string(),
            price,
            category: category.to_string(),
            description: format!("{name} description"),
            link: None,
            image: None,
            sold,
        }
    }

    async fn seeded() -> SqliteProductRepository {
        let repo = SqliteProductRepository::new(connect_in_memory().await.unwrap());
        for product in [
            new_product("p1", "Shure SM58", 1_500_000, "Microphone", 40),
            new_product("p2", "Mic Stand Boom", 250_000, "Stand", 10),
            new_product("p3", "Crown XLS 1502", 7_000_000, "Power Amplifier", 5),
            new_product("p4", "Wireless Mic 100%", 900_000, "Microphone", 0),
        ] {
            repo.create(product).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn create_defaults_and_conflict() {
        let repo = seeded().await;
        let p1 = repo.get_by_id("p1").await.unwrap().unwrap();
        assert!(!p1.is_featured);
        assert_eq!(p1.sold, 40);

        let err = repo
            .create(new_product("p1", "Dup", 1, "Stand", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Conflict(_)));
    }

    #[tokio::test]
    async fn get_all_sorts_and_handles_empty_store() {
        let empty = SqliteProductRepository::new(connect_in_memory().await.unwrap());
        assert!(empty.get_all(ProductSort::default()).await.unwrap().is_empty());

        let repo = seeded().await;
        let by_price = repo
            .get_all(ProductSort::new(SortField::Price, SortDirection::Desc))
            .await
            .unwrap();
        let ids: Vec<_> = by_price.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1", "p4", "p2"]);
    }

    #[tokio::test]
    async fn query_filters_search_and_paginates() {
        let repo = seeded().await;

        let filter = ProductFilter {
            search: Some("MIC".into()),
            ..Default::default()
        };
        let page = repo
            .query(&filter, Pagination { limit: 2, offset: 0 }, ProductSort::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 2);

        let filter = ProductFilter {
            category: Some("Microphone".into()),
            min_price: Some(1_000_000),
            ..Default::default()
        };
        let page = repo
            .query(&filter, Pagination { limit: 10, offset: 0 }, ProductSort::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "p1");
    }

    #[tokio::test]
    async fn search_matches_description_only() {
        let repo = seeded().await;
        let mut beta = new_product("p5", "Beta 58A", 2_000_000, "Microphone", 0);
        beta.description = "Handheld supercardioid VOCAL capsule".into();
        repo.create(beta).await.unwrap();

        let filter = ProductFilter {
            search: Some("vocal".into()),
            ..Default::default()
        };
        let found = repo.find(&filter, ProductSort::default()).await.unwrap();
        let ids: Vec<_> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p5"]);
    }

    #[tokio::test]
    async fn search_folds_ascii_case_only() {
        let repo = seeded().await;
        repo.create(new_product("p6", "Édition Stand", 100_000, "Stand", 0))
            .await
            .unwrap();

        let ascii = ProductFilter {
            search: Some("ÉDITION STAND".into()),
            ..Default::default()
        };
        let found = repo.find(&ascii, ProductSort::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "p6");
    }

    #[tokio::test]
    async fn increment_sold_refuses_to_overflow() {
        let repo = seeded().await;

        let err = repo.increment_sold("p1", i64::MAX).await.unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));

        let p1 = repo.get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(p1.sold, 40);
        assert_eq!(repo.get_all(ProductSort::default()).await.unwrap().len(), 4);

        let topped = repo.increment_sold("p4", i64::MAX).await.unwrap();
        assert_eq!(topped.sold, i64::MAX);
        assert!(matches!(
            repo.increment_sold("p4", 1).await.unwrap_err(),
            ShopError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let repo = seeded().await;
        let filter = ProductFilter {
            search: Some("100%".into()),
            ..Default::default()
        };
        let found = repo.find(&filter, ProductSort::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "p4");
    }

    #[tokio::test]
    async fn update_merges_only_provided_fields() {
        let repo = seeded().await;
        let changes = ProductChanges {
            price: Some(1_600_000),
            image: Some(Some("http://localhost/x.png".into())),
            ..Default::default()
        };
        let updated = repo.update("p1", &changes).await.unwrap();
        assert_eq!(updated.price, 1_600_000);
        assert_eq!(updated.name, "Shure SM58");
        assert_eq!(updated.image.as_deref(), Some("http://localhost/x.png"));

        let cleared = repo
            .update(
                "p1",
                &ProductChanges {
                    image: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.image, None);

        let err = repo.update("nope", &changes).await.unwrap_err();
        assert!(matches!(err, ShopError::NotFound(_)));
    }

    #[tokio::test]
    async fn deletes_return_snapshots() {
        let repo = seeded().await;

        let deleted = repo.delete("p2").await.unwrap();
        assert_eq!(deleted.name, "Mic Stand Boom");
        assert!(matches!(
            repo.delete("p2").await.unwrap_err(),
            ShopError::NotFound(_)
        ));

        let many = repo
            .delete_many(&["p3".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(many.len(), 1);

        let by_category = repo.delete_by_category("Microphone").await.unwrap();
        let ids: Vec<_> = by_category.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p4"]);
        assert!(repo.get_all(ProductSort::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_filter_uses_sold_bounds() {
        let repo = seeded().await;
        let filter = ProductFilter {
            max_sold: Some(5),
            ..Default::default()
        };
        let deleted = repo.delete_by_filter(&filter).await.unwrap();
        let ids: Vec<_> = deleted.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p4"]);
    }

    #[tokio::test]
    async fn featured_and_sold_bookkeeping() {
        let repo = seeded().await;
        repo.set_featured("p2", true).await.unwrap();
        repo.set_featured("p1", true).await.unwrap();
        assert_eq!(repo.count_featured().await.unwrap(), 2);
        assert_eq!(repo.featured_ids().await.unwrap(), vec!["p1", "p2"]);
        assert_eq!(repo.list_featured().await.unwrap()[0].id, "p2");

        let sold = repo.increment_sold("p4", 3).await.unwrap();
        assert_eq!(sold.sold, 3);
        assert!(matches!(
            repo.increment_sold("nope", 1).await.unwrap_err(),
            ShopError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn aggregates() {
        let repo = seeded().await;

        let categories = repo.categories().await.unwrap();
        assert_eq!(
            categories,
            vec![
                CategoryCount { category: "Microphone".into(), product_count: 2 },
                CategoryCount { category: "Power Amplifier".into(), product_count: 1 },
                CategoryCount { category: "Stand".into(), product_count: 1 },
            ]
        );

        let top = repo.top_selling(2, Some("Microphone".into())).await.unwrap();
        assert_eq!(top[0].id, "p1");

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_products, 4);
        assert_eq!(stats.total_categories, 3);
        assert_eq!(stats.total_sold, 55);
        assert_eq!(stats.most_expensive.unwrap().id, "p3");
        assert_eq!(stats.cheapest.unwrap().id, "p2");
        assert_eq!(stats.top_seller.unwrap().id, "p1");
    }
}
