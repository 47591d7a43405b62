//! Engine wiring
//!
//! [`Commerce`] owns the ledger, the lock registry and the services built
//! over them. Surrounding collaborators (HTTP layer, schedulers) hold one
//! instance and call the service contracts.

use crate::core::config::Config;
use crate::core::locks::LockRegistry;
use crate::coupon::CouponGate;
use crate::ledger::{LedgerStore, StorageError};
use crate::orders::{OrderService, PaymentService};
use crate::points::PointService;
use crate::stock::StockService;
use shared::models::{Product, ProductOption, User};
use shared::util;
use std::path::Path;
use std::sync::Arc;

/// The assembled commerce core
pub struct Commerce {
    pub config: Config,
    ledger: Arc<LedgerStore>,
    pub coupons: CouponGate,
    pub stock: StockService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub points: PointService,
}

impl Commerce {
    /// Open the engine over a file-backed ledger under `config.work_dir`
    pub fn open(config: Config) -> Result<Self, StorageError> {
        let path = Path::new(&config.work_dir).join("ledger.redb");
        let ledger = Arc::new(LedgerStore::open(path)?);
        tracing::info!(work_dir = %config.work_dir, strategy = ?config.issuance_strategy, "Commerce core started");
        Ok(Self::wire(config, ledger))
    }

    /// Open the engine over an in-memory ledger (tests, ephemeral runs)
    pub fn open_in_memory(config: Config) -> Result<Self, StorageError> {
        let ledger = Arc::new(LedgerStore::open_in_memory()?);
        Ok(Self::wire(config, ledger))
    }

    fn wire(config: Config, ledger: Arc<LedgerStore>) -> Self {
        let locks = Arc::new(LockRegistry::new());
        let lock_wait = config.lock_wait();

        let coupons = CouponGate::new(&config, ledger.clone(), locks.clone());
        let stock = StockService::new(ledger.clone());
        let orders = OrderService::new(ledger.clone());
        let payments = PaymentService::new(ledger.clone(), locks.clone(), lock_wait);
        let points = PointService::new(ledger.clone(), locks, lock_wait);

        Self {
            config,
            ledger,
            coupons,
            stock,
            orders,
            payments,
            points,
        }
    }

    // ========== Catalog / account administration ==========
    // Out-of-band seeding; counters are still only mutated by the services.

    /// Create a user with a zero point balance
    pub fn create_user(&self, user_name: &str) -> Result<User, StorageError> {
        let now = util::now_millis();
        let user = User {
            user_id: util::snowflake_id(),
            user_name: user_name.to_string(),
            point_balance: 0,
            created_at: now,
            updated_at: now,
        };
        let txn = self.ledger.begin_write()?;
        self.ledger.put_user(&txn, &user)?;
        self.ledger.commit(txn)?;
        Ok(user)
    }

    /// Create a product
    pub fn create_product(&self, product_name: &str, price: i64) -> Result<Product, StorageError> {
        let product = Product {
            product_id: util::snowflake_id(),
            product_name: product_name.to_string(),
            price,
            created_at: util::now_millis(),
        };
        let txn = self.ledger.begin_write()?;
        self.ledger.put_product(&txn, &product)?;
        self.ledger.commit(txn)?;
        Ok(product)
    }

    /// Create a product option with its initial stock
    pub fn create_product_option(
        &self,
        product_id: i64,
        option_name: &str,
        price_adjustment: i64,
        stock_quantity: i64,
    ) -> Result<ProductOption, StorageError> {
        let option = ProductOption {
            product_option_id: util::snowflake_id(),
            product_id,
            option_name: option_name.to_string(),
            price_adjustment,
            stock_quantity,
            sold_out: stock_quantity == 0,
            updated_at: util::now_millis(),
        };
        let txn = self.ledger.begin_write()?;
        self.ledger.put_option(&txn, &option)?;
        self.ledger.commit(txn)?;
        Ok(option)
    }
}
