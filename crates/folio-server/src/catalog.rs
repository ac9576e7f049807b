//! Affiliate catalog stored as JSON collections in the data directory.
//!
//! Every mutation rewrites its collection, appends a [`ChangeRecord`] to the
//! history log and refreshes today's [`DailyBackup`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use folio_shared::catalog::{Deal, DealInput, Product, ProductInput};
use folio_shared::constants::{DEALS_FILE, PRODUCTS_FILE};
use folio_shared::types::{BackupDate, ChangeAction, ChangeRecord, DailyBackup};

use crate::error::ServerError;
use crate::history_store::{read_json, write_json_atomic, HistoryStore};

pub struct Catalog {
    products_path: PathBuf,
    deals_path: PathBuf,
    history: Arc<HistoryStore>,
    lock: Mutex<()>,
}

impl Catalog {
    pub fn new(data_dir: &Path, history: Arc<HistoryStore>) -> Self {
        Self {
            products_path: data_dir.join(PRODUCTS_FILE),
            deals_path: data_dir.join(DEALS_FILE),
            history,
            lock: Mutex::new(()),
        }
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, ServerError> {
        Ok(read_json(&self.products_path).await?.unwrap_or_default())
    }

    pub async fn list_deals(&self) -> Result<Vec<Deal>, ServerError> {
        Ok(read_json(&self.deals_path).await?.unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    pub async fn create_product(
        &self,
        input: ProductInput,
        actor: Option<String>,
    ) -> Result<Product, ServerError> {
        input.validate().map_err(ServerError::BadRequest)?;
        let _guard = self.lock.lock().await;

        let mut products = self.list_products().await?;
        let product = input.into_product(Uuid::new_v4(), Utc::now());
        products.push(product.clone());
        write_json_atomic(&self.products_path, &products).await?;

        self.record(ChangeAction::CreateProduct, product.id, actor).await?;
        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        input: ProductInput,
        actor: Option<String>,
    ) -> Result<Product, ServerError> {
        input.validate().map_err(ServerError::BadRequest)?;
        let _guard = self.lock.lock().await;

        let mut products = self.list_products().await?;
        let slot = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ServerError::NotFound(format!("Product {id}")))?;
        *slot = input.into_product(id, slot.created_at);
        let product = slot.clone();
        write_json_atomic(&self.products_path, &products).await?;

        self.record(ChangeAction::UpdateProduct, id, actor).await?;
        info!(id = %id, "Product updated");
        Ok(product)
    }

    pub async fn delete_product(&self, id: Uuid, actor: Option<String>) -> Result<(), ServerError> {
        let _guard = self.lock.lock().await;

        let mut products = self.list_products().await?;
        let before = products.len();
        products.retain(|p| p.id != id);
        if products.len() == before {
            return Err(ServerError::NotFound(format!("Product {id}")));
        }
        write_json_atomic(&self.products_path, &products).await?;

        // Deals outlive their product but lose the reference.
        let now = Utc::now();
        let mut deals = self.list_deals().await?;
        let mut detached = Vec::new();
        for deal in deals.iter_mut().filter(|d| d.product_id == Some(id)) {
            deal.product_id = None;
            deal.updated_at = now;
            detached.push(deal.id);
        }
        if !detached.is_empty() {
            write_json_atomic(&self.deals_path, &deals).await?;
            for deal_id in &detached {
                self.history
                    .append_change(ChangeRecord::now(
                        ChangeAction::UpdateDeal,
                        deal_id.to_string(),
                        actor.clone(),
                    ))
                    .await?;
            }
        }

        self.record(ChangeAction::DeleteProduct, id, actor).await?;
        info!(id = %id, detached_deals = detached.len(), "Product deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deals
    // ------------------------------------------------------------------

    pub async fn create_deal(
        &self,
        input: DealInput,
        actor: Option<String>,
    ) -> Result<Deal, ServerError> {
        input.validate().map_err(ServerError::BadRequest)?;
        let _guard = self.lock.lock().await;

        self.ensure_product_exists(input.product_id).await?;
        let mut deals = self.list_deals().await?;
        let deal = input.into_deal(Uuid::new_v4(), Utc::now());
        deals.push(deal.clone());
        write_json_atomic(&self.deals_path, &deals).await?;

        self.record(ChangeAction::CreateDeal, deal.id, actor).await?;
        info!(id = %deal.id, title = %deal.title, "Deal created");
        Ok(deal)
    }

    pub async fn update_deal(
        &self,
        id: Uuid,
        input: DealInput,
        actor: Option<String>,
    ) -> Result<Deal, ServerError> {
        input.validate().map_err(ServerError::BadRequest)?;
        let _guard = self.lock.lock().await;

        self.ensure_product_exists(input.product_id).await?;
        let mut deals = self.list_deals().await?;
        let slot = deals
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| ServerError::NotFound(format!("Deal {id}")))?;
        *slot = input.into_deal(id, slot.created_at);
        let deal = slot.clone();
        write_json_atomic(&self.deals_path, &deals).await?;

        self.record(ChangeAction::UpdateDeal, id, actor).await?;
        info!(id = %id, "Deal updated");
        Ok(deal)
    }

    pub async fn delete_deal(&self, id: Uuid, actor: Option<String>) -> Result<(), ServerError> {
        let _guard = self.lock.lock().await;

        let mut deals = self.list_deals().await?;
        let before = deals.len();
        deals.retain(|d| d.id != id);
        if deals.len() == before {
            return Err(ServerError::NotFound(format!("Deal {id}")));
        }
        write_json_atomic(&self.deals_path, &deals).await?;

        self.record(ChangeAction::DeleteDeal, id, actor).await?;
        info!(id = %id, "Deal deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn ensure_product_exists(&self, product_id: Option<Uuid>) -> Result<(), ServerError> {
        let Some(product_id) = product_id else {
            return Ok(());
        };
        let products = self.list_products().await?;
        if products.iter().any(|p| p.id == product_id) {
            Ok(())
        } else {
            Err(ServerError::BadRequest(format!(
                "Deal references unknown product {product_id}"
            )))
        }
    }

    /// Log the change and refresh today's snapshot. Caller holds `self.lock`.
    async fn record(
        &self,
        action: ChangeAction,
        id: Uuid,
        actor: Option<String>,
    ) -> Result<(), ServerError> {
        self.history
            .append_change(ChangeRecord::now(action, id.to_string(), actor))
            .await?;

        let snapshot = DailyBackup {
            date: BackupDate::today(),
            created_at: Utc::now(),
            products: self.list_products().await?,
            deals: self.list_deals().await?,
        };
        self.history.write_backup(&snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use folio_shared::types::ChangeKind;
    use tempfile::TempDir;

    use super::*;

    async fn test_catalog() -> (Catalog, Arc<HistoryStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let history = Arc::new(HistoryStore::new(dir.path()).await.unwrap());
        let catalog = Catalog::new(dir.path(), history.clone());
        (catalog, history, dir)
    }

    fn lamp() -> ProductInput {
        ProductInput {
            name: "Desk lamp".into(),
            url: "https://shop.example/lamp".into(),
            price: Some(24.0),
            currency: Some("EUR".into()),
            image_url: None,
            category: Some("office".into()),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_product_lifecycle_is_audited() {
        let (catalog, history, _dir) = test_catalog().await;

        let product = catalog.create_product(lamp(), Some("ed".into())).await.unwrap();
        let mut renamed = lamp();
        renamed.name = "Floor lamp".into();
        let updated = catalog
            .update_product(product.id, renamed, None)
            .await
            .unwrap();
        assert_eq!(updated.name, "Floor lamp");
        assert_eq!(updated.created_at, product.created_at);

        catalog.delete_product(product.id, None).await.unwrap();
        assert!(catalog.list_products().await.unwrap().is_empty());

        let index = history.load_index().await.unwrap();
        let kinds: Vec<_> = index.changes.iter().map(|c| c.action.kind()).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete]
        );
        assert_eq!(index.changes[0].actor.as_deref(), Some("ed"));
        assert!(index.changes.iter().all(|c| c.entity_id == product.id.to_string()));
    }

    #[tokio::test]
    async fn test_mutation_writes_todays_snapshot() {
        let (catalog, history, _dir) = test_catalog().await;
        catalog.create_product(lamp(), None).await.unwrap();
        catalog.create_product(lamp(), None).await.unwrap();

        let view = history
            .load_backup(BackupDate::today().as_str())
            .await
            .unwrap();
        assert_eq!(view.product_count, 2);
        assert_eq!(view.deals_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let (catalog, history, _dir) = test_catalog().await;
        let missing = Uuid::new_v4();

        assert!(matches!(
            catalog.update_product(missing, lamp(), None).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete_deal(missing, None).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(history.load_index().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deal_must_reference_existing_product() {
        let (catalog, _history, _dir) = test_catalog().await;
        let deal = DealInput {
            product_id: Some(Uuid::new_v4()),
            title: "Half off".into(),
            url: "https://shop.example/deal".into(),
            discount_percent: Some(50.0),
            expires_at: None,
        };
        assert!(matches!(
            catalog.create_deal(deal.clone(), None).await,
            Err(ServerError::BadRequest(_))
        ));

        let product = catalog.create_product(lamp(), None).await.unwrap();
        let deal = DealInput {
            product_id: Some(product.id),
            ..deal
        };
        let created = catalog.create_deal(deal, None).await.unwrap();
        assert_eq!(catalog.list_deals().await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn test_deleting_product_detaches_its_deals() {
        let (catalog, history, _dir) = test_catalog().await;
        let product = catalog.create_product(lamp(), None).await.unwrap();
        let deal = DealInput {
            product_id: Some(product.id),
            title: "Half off".into(),
            url: "https://shop.example/deal".into(),
            discount_percent: Some(50.0),
            expires_at: None,
        };
        let linked = catalog.create_deal(deal.clone(), None).await.unwrap();
        let unlinked = catalog
            .create_deal(DealInput { product_id: None, ..deal }, None)
            .await
            .unwrap();

        catalog.delete_product(product.id, Some("ed".into())).await.unwrap();

        let deals = catalog.list_deals().await.unwrap();
        assert_eq!(deals.len(), 2);
        assert!(deals.iter().all(|d| d.product_id.is_none()));
        assert_eq!(deals[1], unlinked);

        // The deal can still be edited without tripping the product check.
        let kept = DealInput {
            product_id: None,
            title: "Still half off".into(),
            url: linked.url.clone(),
            discount_percent: Some(50.0),
            expires_at: None,
        };
        catalog.update_deal(linked.id, kept, None).await.unwrap();

        let index = history.load_index().await.unwrap();
        let tail: Vec<_> = index.changes[3..]
            .iter()
            .map(|c| (c.action.clone(), c.entity_id.clone()))
            .collect();
        assert_eq!(
            tail,
            vec![
                (ChangeAction::UpdateDeal, linked.id.to_string()),
                (ChangeAction::DeleteProduct, product.id.to_string()),
                (ChangeAction::UpdateDeal, linked.id.to_string()),
            ]
        );
        assert_eq!(index.changes[3].actor.as_deref(), Some("ed"));

        let snapshot = history
            .load_backup(BackupDate::today().as_str())
            .await
            .unwrap();
        assert_eq!(snapshot.product_count, 0);
        assert_eq!(snapshot.deals_count, 2);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_write() {
        let (catalog, history, _dir) = test_catalog().await;
        let mut bad = lamp();
        bad.url = "ftp://nope".into();

        assert!(matches!(
            catalog.create_product(bad, None).await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(history.load_index().await.unwrap().is_empty());
    }
}
