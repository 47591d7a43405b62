//! Stock reservation unit
//!
//! Per-option inventory is decremented inside the enclosing order write
//! transaction: a validation pass across every line item, then a commit
//! pass that applies the decrements and records the movements. Any failure
//! aborts the whole transaction, so no partial decrement survives a later
//! line's failure.

use crate::ledger::{LedgerStore, StorageError};
use crate::money;
use redb::WriteTransaction;
use shared::error::{AppError, ErrorCode};
use shared::models::{ProductOption, StockChange, StockHistory};
use shared::util;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Stock errors
#[derive(Debug, Error)]
pub enum StockError {
    #[error("Product option not found: {0}")]
    OptionNotFound(i64),

    #[error(
        "Insufficient stock for option {option_id}: available {available}, requested {requested}"
    )]
    Insufficient {
        option_id: i64,
        available: i64,
        requested: i64,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type StockResult<T> = Result<T, StockError>;

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match &err {
            StockError::OptionNotFound(id) => {
                AppError::with_message(ErrorCode::ProductOptionNotFound, err.to_string())
                    .with_detail("product_option_id", *id)
            }
            StockError::Insufficient {
                option_id,
                available,
                requested,
            } => AppError::with_message(ErrorCode::StockInsufficient, err.to_string())
                .with_detail("product_option_id", *option_id)
                .with_detail("available", *available)
                .with_detail("requested", *requested),
            StockError::Validation(_) => AppError::validation(err.to_string()),
            StockError::Storage(e) => {
                tracing::error!(error = %e, "Storage error in stock operation");
                AppError::database(err.to_string())
            }
        }
    }
}

/// One reservation line
#[derive(Debug, Clone)]
pub struct StockLine {
    pub product_option_id: i64,
    pub quantity: i64,
}

/// Merge lines per option so a duplicated option is bounded as one demand
fn merge_lines(lines: &[StockLine]) -> StockResult<BTreeMap<i64, i64>> {
    let mut wanted = BTreeMap::new();
    for line in lines {
        if line.quantity <= 0 || line.quantity > money::MAX_QUANTITY {
            return Err(StockError::Validation(format!(
                "quantity must be between 1 and {}, got {}",
                money::MAX_QUANTITY,
                line.quantity
            )));
        }
        *wanted.entry(line.product_option_id).or_insert(0) += line.quantity;
    }
    Ok(wanted)
}

/// Decrement stock for every line, all or nothing (within transaction)
///
/// `stock_quantity -= quantity` only executes when the result stays `>= 0`
/// for every option; otherwise nothing is mutated.
pub(crate) fn reserve_all(
    ledger: &LedgerStore,
    txn: &WriteTransaction,
    lines: &[StockLine],
    order_id: Option<i64>,
) -> StockResult<()> {
    let wanted = merge_lines(lines)?;

    // 1. Validation pass: every option must cover its aggregated demand
    let mut staged: Vec<(ProductOption, i64)> = Vec::with_capacity(wanted.len());
    for (&option_id, &quantity) in &wanted {
        let option = ledger
            .get_option_txn(txn, option_id)?
            .ok_or(StockError::OptionNotFound(option_id))?;
        if option.stock_quantity < quantity {
            return Err(StockError::Insufficient {
                option_id,
                available: option.stock_quantity,
                requested: quantity,
            });
        }
        staged.push((option, quantity));
    }

    // 2. Commit pass: apply decrements and record the movements
    let now = util::now_millis();
    for (mut option, quantity) in staged {
        option.stock_quantity -= quantity;
        option.sold_out = option.stock_quantity == 0;
        option.updated_at = now;
        ledger.put_option(txn, &option)?;
        ledger.append_stock_history(
            txn,
            &StockHistory {
                history_id: util::snowflake_id(),
                product_option_id: option.product_option_id,
                change: StockChange::Decrease,
                amount: quantity,
                stock_after: option.stock_quantity,
                order_id,
                created_at: now,
            },
        )?;
    }
    Ok(())
}

/// Compensating increments for a cancelled order (within transaction)
pub(crate) fn release_all(
    ledger: &LedgerStore,
    txn: &WriteTransaction,
    lines: &[StockLine],
    order_id: Option<i64>,
) -> StockResult<()> {
    let wanted = merge_lines(lines)?;

    let now = util::now_millis();
    for (&option_id, &quantity) in &wanted {
        let mut option = ledger
            .get_option_txn(txn, option_id)?
            .ok_or(StockError::OptionNotFound(option_id))?;
        option.stock_quantity += quantity;
        option.sold_out = false;
        option.updated_at = now;
        ledger.put_option(txn, &option)?;
        ledger.append_stock_history(
            txn,
            &StockHistory {
                history_id: util::snowflake_id(),
                product_option_id: option_id,
                change: StockChange::Increase,
                amount: quantity,
                stock_after: option.stock_quantity,
                order_id,
                created_at: now,
            },
        )?;
    }
    Ok(())
}

/// Stock administration and reads
pub struct StockService {
    ledger: Arc<LedgerStore>,
}

impl StockService {
    pub(crate) fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Get a product option
    pub async fn get_option(&self, product_option_id: i64) -> StockResult<ProductOption> {
        self.ledger
            .get_option(product_option_id)?
            .ok_or(StockError::OptionNotFound(product_option_id))
    }

    /// Administrative stock adjustment (restock or shrink)
    ///
    /// Positive `amount` increases stock, negative decreases. A decrease
    /// below zero is rejected with the same insufficiency failure as a
    /// reservation.
    pub async fn change_stock(
        &self,
        product_option_id: i64,
        amount: i64,
    ) -> StockResult<StockHistory> {
        if amount == 0 {
            return Err(StockError::Validation("amount must not be zero".into()));
        }

        let txn = self.ledger.begin_write()?;
        let mut option = self
            .ledger
            .get_option_txn(&txn, product_option_id)?
            .ok_or(StockError::OptionNotFound(product_option_id))?;

        let change = if amount > 0 {
            StockChange::Increase
        } else {
            let decrease = amount.abs();
            if option.stock_quantity < decrease {
                return Err(StockError::Insufficient {
                    option_id: product_option_id,
                    available: option.stock_quantity,
                    requested: decrease,
                });
            }
            StockChange::Decrease
        };

        let now = util::now_millis();
        option.stock_quantity += amount;
        option.sold_out = option.stock_quantity == 0;
        option.updated_at = now;
        self.ledger.put_option(&txn, &option)?;

        let history = StockHistory {
            history_id: util::snowflake_id(),
            product_option_id,
            change,
            amount: amount.abs(),
            stock_after: option.stock_quantity,
            order_id: None,
            created_at: now,
        };
        self.ledger.append_stock_history(&txn, &history)?;
        self.ledger.commit(txn)?;

        tracing::info!(
            product_option_id,
            amount,
            stock_after = history.stock_after,
            "Stock adjusted"
        );
        Ok(history)
    }

    /// All movements of one option, in append order
    pub async fn histories(&self, product_option_id: i64) -> StockResult<Vec<StockHistory>> {
        Ok(self.ledger.stock_histories(product_option_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_option(option_id: i64, stock: i64) -> Arc<LedgerStore> {
        let ledger = Arc::new(LedgerStore::open_in_memory().unwrap());
        let option = ProductOption {
            product_option_id: option_id,
            product_id: 1,
            option_name: "default".into(),
            price_adjustment: 0,
            stock_quantity: stock,
            sold_out: stock == 0,
            updated_at: 0,
        };
        let txn = ledger.begin_write().unwrap();
        ledger.put_option(&txn, &option).unwrap();
        ledger.commit(txn).unwrap();
        ledger
    }

    fn line(option_id: i64, quantity: i64) -> StockLine {
        StockLine {
            product_option_id: option_id,
            quantity,
        }
    }

    #[test]
    fn test_reserve_decrements_and_records() {
        let ledger = ledger_with_option(1, 10);

        let txn = ledger.begin_write().unwrap();
        reserve_all(&ledger, &txn, &[line(1, 4)], Some(99)).unwrap();
        ledger.commit(txn).unwrap();

        let option = ledger.get_option(1).unwrap().unwrap();
        assert_eq!(option.stock_quantity, 6);
        assert!(!option.sold_out);

        let histories = ledger.stock_histories(1).unwrap();
        assert_eq!(histories.len(), 1);
        assert_eq!(histories[0].change, StockChange::Decrease);
        assert_eq!(histories[0].stock_after, 6);
        assert_eq!(histories[0].order_id, Some(99));
    }

    #[test]
    fn test_reserve_to_zero_marks_sold_out() {
        let ledger = ledger_with_option(1, 3);

        let txn = ledger.begin_write().unwrap();
        reserve_all(&ledger, &txn, &[line(1, 3)], None).unwrap();
        ledger.commit(txn).unwrap();

        let option = ledger.get_option(1).unwrap().unwrap();
        assert_eq!(option.stock_quantity, 0);
        assert!(option.sold_out);
    }

    #[test]
    fn test_insufficient_stock_mutates_nothing() {
        let ledger = ledger_with_option(1, 3);

        let txn = ledger.begin_write().unwrap();
        let result = reserve_all(&ledger, &txn, &[line(1, 5)], None);
        assert!(matches!(result, Err(StockError::Insufficient { .. })));
        drop(txn);

        assert_eq!(ledger.get_option(1).unwrap().unwrap().stock_quantity, 3);
        assert!(ledger.stock_histories(1).unwrap().is_empty());
    }

    #[test]
    fn test_multi_line_failure_rolls_back_all() {
        let ledger = ledger_with_option(1, 10);
        let option2 = ProductOption {
            product_option_id: 2,
            product_id: 1,
            option_name: "second".into(),
            price_adjustment: 0,
            stock_quantity: 1,
            sold_out: false,
            updated_at: 0,
        };
        let txn = ledger.begin_write().unwrap();
        ledger.put_option(&txn, &option2).unwrap();
        ledger.commit(txn).unwrap();

        let txn = ledger.begin_write().unwrap();
        let result = reserve_all(&ledger, &txn, &[line(1, 5), line(2, 2)], None);
        assert!(matches!(
            result,
            Err(StockError::Insufficient { option_id: 2, .. })
        ));
        drop(txn);

        // The passing line was not committed either
        assert_eq!(ledger.get_option(1).unwrap().unwrap().stock_quantity, 10);
        assert_eq!(ledger.get_option(2).unwrap().unwrap().stock_quantity, 1);
    }

    #[test]
    fn test_duplicate_option_lines_are_aggregated() {
        let ledger = ledger_with_option(1, 3);

        let txn = ledger.begin_write().unwrap();
        let result = reserve_all(&ledger, &txn, &[line(1, 2), line(1, 2)], None);
        assert!(matches!(result, Err(StockError::Insufficient { .. })));
        drop(txn);

        assert_eq!(ledger.get_option(1).unwrap().unwrap().stock_quantity, 3);
    }

    #[test]
    fn test_release_restores_stock() {
        let ledger = ledger_with_option(1, 5);

        let txn = ledger.begin_write().unwrap();
        reserve_all(&ledger, &txn, &[line(1, 5)], Some(7)).unwrap();
        ledger.commit(txn).unwrap();
        assert!(ledger.get_option(1).unwrap().unwrap().sold_out);

        let txn = ledger.begin_write().unwrap();
        release_all(&ledger, &txn, &[line(1, 5)], Some(7)).unwrap();
        ledger.commit(txn).unwrap();

        let option = ledger.get_option(1).unwrap().unwrap();
        assert_eq!(option.stock_quantity, 5);
        assert!(!option.sold_out);
        assert_eq!(ledger.stock_histories(1).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_change_stock_bounds() {
        let ledger = ledger_with_option(1, 2);
        let service = StockService::new(ledger);

        service.change_stock(1, 5).await.unwrap();
        assert_eq!(service.get_option(1).await.unwrap().stock_quantity, 7);

        let result = service.change_stock(1, -10).await;
        assert!(matches!(result, Err(StockError::Insufficient { .. })));
        assert_eq!(service.get_option(1).await.unwrap().stock_quantity, 7);

        assert!(matches!(
            service.change_stock(1, 0).await,
            Err(StockError::Validation(_))
        ));
        assert!(matches!(
            service.change_stock(999, 1).await,
            Err(StockError::OptionNotFound(999))
        ));
    }
}
