use super::ChurnStore;
use crate::{error::ChurnResult, types::ProductId};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub account_id:   String,
    pub timezone:     String,
    pub large_seller: bool,
}

impl ChurnStore {
    // ── Accounts ───────────────────────────────────────────────

    pub fn upsert_account(
        &self,
        account_id: &str,
        timezone: &str,
        large_seller: bool,
    ) -> ChurnResult<()> {
        self.conn().execute(
            "INSERT INTO account (account_id, timezone, large_seller)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(account_id) DO UPDATE SET
                timezone = excluded.timezone,
                large_seller = excluded.large_seller",
            params![account_id, timezone, if large_seller { 1i32 } else { 0i32 }],
        )?;
        Ok(())
    }

    pub fn get_account(&self, account_id: &str) -> ChurnResult<Option<AccountRecord>> {
        let record = self
            .conn()
            .query_row(
                "SELECT account_id, timezone, large_seller
                 FROM account WHERE account_id = ?1",
                params![account_id],
                |row| {
                    Ok(AccountRecord {
                        account_id:   row.get(0)?,
                        timezone:     row.get(1)?,
                        large_seller: row.get::<_, i32>(2)? != 0,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    // ── Products ───────────────────────────────────────────────

    pub fn upsert_product(
        &self,
        product_id: &str,
        account_id: &str,
        name: &str,
        archived: bool,
    ) -> ChurnResult<()> {
        self.conn().execute(
            "INSERT INTO product (product_id, account_id, name, archived)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(product_id) DO UPDATE SET
                name = excluded.name,
                archived = excluded.archived",
            params![product_id, account_id, name, if archived { 1i32 } else { 0i32 }],
        )?;
        Ok(())
    }

    /// Non-archived product ids for an account, sorted for determinism.
    pub fn live_product_ids(&self, account_id: &str) -> ChurnResult<Vec<ProductId>> {
        let mut stmt = self.conn().prepare(
            "SELECT product_id FROM product
             WHERE account_id = ?1 AND archived = 0
             ORDER BY product_id ASC",
        )?;
        let ids = stmt
            .query_map(params![account_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
