//! redb-based ledger store — the single source of truth
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `coupons` | `coupon_id` | `Coupon` | Issuance pools |
//! | `user_coupons` | `(coupon_id, user_id)` | `UserCoupon` | Issuance records (unique per pair) |
//! | `products` | `product_id` | `Product` | Catalog |
//! | `product_options` | `product_option_id` | `ProductOption` | Stock-bearing options |
//! | `users` | `user_id` | `User` | Accounts + point balances |
//! | `orders` | `order_id` | `Order` | Orders with embedded items |
//! | `point_history` | `(user_id, seq)` | `PointHistory` | Append-only point movements |
//! | `stock_history` | `(option_id, seq)` | `StockHistory` | Append-only stock movements |
//! | `counters` | name | `u64` | Order count, history sequences |
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`: a commit is persistent when
//! `commit()` returns, and a transaction dropped without commit leaves no
//! partial effect. Every multi-entity mutation in the services is grouped in
//! one [`WriteTransaction`], so counters, records and history rows move
//! together or not at all.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use shared::models::{
    Coupon, Order, PointHistory, Product, ProductOption, StockHistory, User, UserCoupon,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Coupons: key = coupon_id, value = JSON-serialized Coupon
const COUPONS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("coupons");

/// Issuance records: key = (coupon_id, user_id), value = JSON-serialized UserCoupon
/// 复合主键天然保证 (coupon_id, user_id) 唯一
const USER_COUPONS_TABLE: TableDefinition<(i64, i64), &[u8]> = TableDefinition::new("user_coupons");

/// Products: key = product_id
const PRODUCTS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("products");

/// Product options: key = product_option_id
const PRODUCT_OPTIONS_TABLE: TableDefinition<i64, &[u8]> =
    TableDefinition::new("product_options");

/// Users: key = user_id
const USERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("users");

/// Orders: key = order_id
const ORDERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("orders");

/// Point history: key = (user_id, sequence), append-only
const POINT_HISTORY_TABLE: TableDefinition<(i64, u64), &[u8]> =
    TableDefinition::new("point_history");

/// Stock history: key = (product_option_id, sequence), append-only
const STOCK_HISTORY_TABLE: TableDefinition<(i64, u64), &[u8]> =
    TableDefinition::new("stock_history");

/// Counters: key = counter name, value = u64
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

pub const ORDER_COUNT_KEY: &str = "order_count";
const POINT_SEQ_KEY: &str = "point_seq";
const STOCK_SEQ_KEY: &str = "stock_seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Ledger store backed by redb
#[derive(Clone)]
pub struct LedgerStore {
    db: Arc<Database>,
}

impl LedgerStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    /// Open an in-memory database (tests and ephemeral deployments)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    /// Create all tables so read transactions never see a missing table
    fn init_tables(&self) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let _ = txn.open_table(COUPONS_TABLE)?;
            let _ = txn.open_table(USER_COUPONS_TABLE)?;
            let _ = txn.open_table(PRODUCTS_TABLE)?;
            let _ = txn.open_table(PRODUCT_OPTIONS_TABLE)?;
            let _ = txn.open_table(USERS_TABLE)?;
            let _ = txn.open_table(ORDERS_TABLE)?;
            let _ = txn.open_table(POINT_HISTORY_TABLE)?;
            let _ = txn.open_table(STOCK_HISTORY_TABLE)?;
            let _ = txn.open_table(COUNTERS_TABLE)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Commit a write transaction
    pub fn commit(&self, txn: WriteTransaction) -> StorageResult<()> {
        txn.commit()?;
        Ok(())
    }

    // ========== Coupons ==========

    /// Get a coupon (read-only)
    pub fn get_coupon(&self, coupon_id: i64) -> StorageResult<Option<Coupon>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COUPONS_TABLE)?;
        match table.get(coupon_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a coupon (within transaction)
    pub fn get_coupon_txn(
        &self,
        txn: &WriteTransaction,
        coupon_id: i64,
    ) -> StorageResult<Option<Coupon>> {
        let table = txn.open_table(COUPONS_TABLE)?;
        match table.get(coupon_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Store a coupon
    pub fn put_coupon(&self, txn: &WriteTransaction, coupon: &Coupon) -> StorageResult<()> {
        let mut table = txn.open_table(COUPONS_TABLE)?;
        let value = serde_json::to_vec(coupon)?;
        table.insert(coupon.coupon_id, value.as_slice())?;
        Ok(())
    }

    /// Remove a coupon (administrative)
    pub fn delete_coupon(&self, txn: &WriteTransaction, coupon_id: i64) -> StorageResult<()> {
        let mut table = txn.open_table(COUPONS_TABLE)?;
        table.remove(coupon_id)?;
        Ok(())
    }

    // ========== User coupons ==========

    /// Find the issuance record for (coupon_id, user_id), if any (read-only)
    pub fn find_user_coupon(
        &self,
        coupon_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<UserCoupon>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USER_COUPONS_TABLE)?;
        match table.get((coupon_id, user_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Find the issuance record for (coupon_id, user_id) (within transaction)
    pub fn find_user_coupon_txn(
        &self,
        txn: &WriteTransaction,
        coupon_id: i64,
        user_id: i64,
    ) -> StorageResult<Option<UserCoupon>> {
        let table = txn.open_table(USER_COUPONS_TABLE)?;
        match table.get((coupon_id, user_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Store an issuance record
    pub fn put_user_coupon(
        &self,
        txn: &WriteTransaction,
        user_coupon: &UserCoupon,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(USER_COUPONS_TABLE)?;
        let value = serde_json::to_vec(user_coupon)?;
        table.insert((user_coupon.coupon_id, user_coupon.user_id), value.as_slice())?;
        Ok(())
    }

    /// All issuance records of one coupon
    pub fn user_coupons_for_coupon(&self, coupon_id: i64) -> StorageResult<Vec<UserCoupon>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USER_COUPONS_TABLE)?;

        let mut records = Vec::new();
        for result in table.range((coupon_id, i64::MIN)..=(coupon_id, i64::MAX))? {
            let (_key, value) = result?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// Number of issuance records of one coupon
    pub fn count_user_coupons(&self, coupon_id: i64) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USER_COUPONS_TABLE)?;

        let mut count = 0;
        for result in table.range((coupon_id, i64::MIN)..=(coupon_id, i64::MAX))? {
            result?;
            count += 1;
        }
        Ok(count)
    }

    /// All issuance records held by one user
    pub fn user_coupons_of_user(&self, user_id: i64) -> StorageResult<Vec<UserCoupon>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USER_COUPONS_TABLE)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            if key.value().1 == user_id {
                records.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(records)
    }

    // ========== Products and options ==========

    /// Get a product (within transaction)
    pub fn get_product_txn(
        &self,
        txn: &WriteTransaction,
        product_id: i64,
    ) -> StorageResult<Option<Product>> {
        let table = txn.open_table(PRODUCTS_TABLE)?;
        match table.get(product_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Store a product
    pub fn put_product(&self, txn: &WriteTransaction, product: &Product) -> StorageResult<()> {
        let mut table = txn.open_table(PRODUCTS_TABLE)?;
        let value = serde_json::to_vec(product)?;
        table.insert(product.product_id, value.as_slice())?;
        Ok(())
    }

    /// Get a product option (read-only)
    pub fn get_option(&self, product_option_id: i64) -> StorageResult<Option<ProductOption>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCT_OPTIONS_TABLE)?;
        match table.get(product_option_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a product option (within transaction)
    pub fn get_option_txn(
        &self,
        txn: &WriteTransaction,
        product_option_id: i64,
    ) -> StorageResult<Option<ProductOption>> {
        let table = txn.open_table(PRODUCT_OPTIONS_TABLE)?;
        match table.get(product_option_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Store a product option
    pub fn put_option(
        &self,
        txn: &WriteTransaction,
        option: &ProductOption,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PRODUCT_OPTIONS_TABLE)?;
        let value = serde_json::to_vec(option)?;
        table.insert(option.product_option_id, value.as_slice())?;
        Ok(())
    }

    // ========== Users ==========

    /// Get a user (read-only)
    pub fn get_user(&self, user_id: i64) -> StorageResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a user (within transaction)
    pub fn get_user_txn(
        &self,
        txn: &WriteTransaction,
        user_id: i64,
    ) -> StorageResult<Option<User>> {
        let table = txn.open_table(USERS_TABLE)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Store a user
    pub fn put_user(&self, txn: &WriteTransaction, user: &User) -> StorageResult<()> {
        let mut table = txn.open_table(USERS_TABLE)?;
        let value = serde_json::to_vec(user)?;
        table.insert(user.user_id, value.as_slice())?;
        Ok(())
    }

    // ========== Orders ==========

    /// Get an order (read-only)
    pub fn get_order(&self, order_id: i64) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get an order (within transaction)
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Store an order
    pub fn put_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.order_id, value.as_slice())?;
        Ok(())
    }

    /// All orders of one user
    pub fn orders_of_user(&self, user_id: i64) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let order: Order = serde_json::from_slice(value.value())?;
            if order.user_id == user_id {
                orders.push(order);
            }
        }
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    // ========== History ==========

    /// Append a point movement (within transaction)
    pub fn append_point_history(
        &self,
        txn: &WriteTransaction,
        history: &PointHistory,
    ) -> StorageResult<()> {
        let seq = self.next_sequence(txn, POINT_SEQ_KEY)?;
        let mut table = txn.open_table(POINT_HISTORY_TABLE)?;
        let value = serde_json::to_vec(history)?;
        table.insert((history.user_id, seq), value.as_slice())?;
        Ok(())
    }

    /// All point movements of one user, in append order
    pub fn point_histories(&self, user_id: i64) -> StorageResult<Vec<PointHistory>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(POINT_HISTORY_TABLE)?;

        let mut entries = Vec::new();
        for result in table.range((user_id, u64::MIN)..=(user_id, u64::MAX))? {
            let (_key, value) = result?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }

    /// Append a stock movement (within transaction)
    pub fn append_stock_history(
        &self,
        txn: &WriteTransaction,
        history: &StockHistory,
    ) -> StorageResult<()> {
        let seq = self.next_sequence(txn, STOCK_SEQ_KEY)?;
        let mut table = txn.open_table(STOCK_HISTORY_TABLE)?;
        let value = serde_json::to_vec(history)?;
        table.insert((history.product_option_id, seq), value.as_slice())?;
        Ok(())
    }

    /// All stock movements of one option, in append order
    pub fn stock_histories(&self, product_option_id: i64) -> StorageResult<Vec<StockHistory>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STOCK_HISTORY_TABLE)?;

        let mut entries = Vec::new();
        for result in table.range((product_option_id, u64::MIN)..=(product_option_id, u64::MAX))? {
            let (_key, value) = result?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }

    // ========== Counters ==========

    /// Increment and return a named counter (within transaction)
    pub fn next_sequence(&self, txn: &WriteTransaction, key: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(COUNTERS_TABLE)?;
        let next = table.get(key)?.map(|g| g.value()).unwrap_or(0) + 1;
        table.insert(key, next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{DiscountType, OrderStatus, UserCouponStatus};
    use shared::util;

    fn test_coupon(coupon_id: i64, max_issue_count: u32) -> Coupon {
        Coupon {
            coupon_id,
            coupon_name: "test".into(),
            discount_type: DiscountType::Fixed,
            discount_value: 2000,
            min_order_amount: 0,
            max_issue_count,
            issued_count: 0,
            valid_from: 0,
            valid_to: i64::MAX,
            created_at: util::now_millis(),
            updated_at: util::now_millis(),
        }
    }

    #[test]
    fn test_coupon_roundtrip() {
        let store = LedgerStore::open_in_memory().unwrap();
        let coupon = test_coupon(1, 10);

        let txn = store.begin_write().unwrap();
        store.put_coupon(&txn, &coupon).unwrap();
        store.commit(txn).unwrap();

        let loaded = store.get_coupon(1).unwrap().unwrap();
        assert_eq!(loaded.coupon_name, "test");
        assert_eq!(loaded.max_issue_count, 10);
        assert!(store.get_coupon(2).unwrap().is_none());
    }

    #[test]
    fn test_dropped_transaction_leaves_no_partial_effect() {
        let store = LedgerStore::open_in_memory().unwrap();

        let txn = store.begin_write().unwrap();
        store.put_coupon(&txn, &test_coupon(7, 3)).unwrap();
        store
            .put_user_coupon(&txn, &UserCoupon::issue(100, 7))
            .unwrap();
        drop(txn); // abort

        assert!(store.get_coupon(7).unwrap().is_none());
        assert!(store.find_user_coupon(7, 100).unwrap().is_none());
    }

    #[test]
    fn test_user_coupon_composite_key() {
        let store = LedgerStore::open_in_memory().unwrap();

        let txn = store.begin_write().unwrap();
        store.put_user_coupon(&txn, &UserCoupon::issue(1, 10)).unwrap();
        store.put_user_coupon(&txn, &UserCoupon::issue(2, 10)).unwrap();
        store.put_user_coupon(&txn, &UserCoupon::issue(1, 11)).unwrap();
        store.commit(txn).unwrap();

        assert_eq!(store.count_user_coupons(10).unwrap(), 2);
        assert_eq!(store.count_user_coupons(11).unwrap(), 1);
        assert!(store.find_user_coupon(10, 1).unwrap().is_some());
        assert!(store.find_user_coupon(10, 3).unwrap().is_none());
        assert_eq!(store.user_coupons_of_user(1).unwrap().len(), 2);
    }

    #[test]
    fn test_overwrite_keeps_single_record_per_pair() {
        let store = LedgerStore::open_in_memory().unwrap();

        let mut record = UserCoupon::issue(5, 20);
        let txn = store.begin_write().unwrap();
        store.put_user_coupon(&txn, &record).unwrap();
        store.commit(txn).unwrap();

        record.status = UserCouponStatus::Used;
        record.order_id = Some(999);
        let txn = store.begin_write().unwrap();
        store.put_user_coupon(&txn, &record).unwrap();
        store.commit(txn).unwrap();

        assert_eq!(store.count_user_coupons(20).unwrap(), 1);
        let loaded = store.find_user_coupon(20, 5).unwrap().unwrap();
        assert_eq!(loaded.status, UserCouponStatus::Used);
        assert_eq!(loaded.order_id, Some(999));
    }

    #[test]
    fn test_sequence_increment() {
        let store = LedgerStore::open_in_memory().unwrap();

        let txn = store.begin_write().unwrap();
        assert_eq!(store.next_sequence(&txn, ORDER_COUNT_KEY).unwrap(), 1);
        assert_eq!(store.next_sequence(&txn, ORDER_COUNT_KEY).unwrap(), 2);
        store.commit(txn).unwrap();

        let txn = store.begin_write().unwrap();
        assert_eq!(store.next_sequence(&txn, ORDER_COUNT_KEY).unwrap(), 3);
        store.commit(txn).unwrap();
    }

    #[test]
    fn test_point_history_append_order() {
        let store = LedgerStore::open_in_memory().unwrap();

        for (amount, balance_after) in [(1000, 1000), (2000, 3000), (-500, 2500)] {
            let txn = store.begin_write().unwrap();
            store
                .append_point_history(
                    &txn,
                    &PointHistory {
                        history_id: util::snowflake_id(),
                        user_id: 42,
                        tx_type: shared::models::TransactionType::Charge,
                        amount,
                        balance_after,
                        order_id: None,
                        created_at: util::now_millis(),
                    },
                )
                .unwrap();
            store.commit(txn).unwrap();
        }

        let entries = store.point_histories(42).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].balance_after, 1000);
        assert_eq!(entries[2].balance_after, 2500);
        assert!(store.point_histories(43).unwrap().is_empty());
    }

    #[test]
    fn test_orders_of_user_sorted() {
        let store = LedgerStore::open_in_memory().unwrap();

        for (order_id, created_at) in [(3i64, 300i64), (1, 100), (2, 200)] {
            let order = Order {
                order_id,
                order_number: format!("ORD-{order_id}"),
                user_id: 9,
                items: vec![],
                total_amount: 1000,
                discount_amount: 0,
                used_points: 0,
                final_amount: 1000,
                coupon_id: None,
                status: OrderStatus::Pending,
                created_at,
                updated_at: created_at,
                paid_at: None,
            };
            let txn = store.begin_write().unwrap();
            store.put_order(&txn, &order).unwrap();
            store.commit(txn).unwrap();
        }

        let orders = store.orders_of_user(9).unwrap();
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[0].order_id, 1);
        assert_eq!(orders[2].order_id, 3);
    }

    #[test]
    fn test_reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.redb");

        {
            let store = LedgerStore::open(&path).unwrap();
            let txn = store.begin_write().unwrap();
            store.put_coupon(&txn, &test_coupon(77, 5)).unwrap();
            store.commit(txn).unwrap();
        }

        let store = LedgerStore::open(&path).unwrap();
        let loaded = store.get_coupon(77).unwrap().unwrap();
        assert_eq!(loaded.max_issue_count, 5);
    }
}
