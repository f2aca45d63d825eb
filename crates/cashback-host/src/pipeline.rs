//! Extraction pipeline: screenshot in, stamped rows out.
//!
//! 1. fetch the category vocabulary
//! 2. substitute it into the prompt template
//! 3. scale the image so its longer edge matches the configured size
//! 4. send image + prompt to the vision model
//! 5. parse rows out of the response
//! 6. stamp each row with `Person` and the billing-period `Date`
//! 7. optionally write every row, one call per row

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cashback_ai::{SamplingParams, VisionModel, VisionRequest, prepare_image};
use cashback_core::{Row, current_period, parse_rows};
use cashback_store::{Gateway, RowId};
use tracing::{debug, info};

use crate::ExtractError;

/// Placeholder in the prompt template replaced by the category vocabulary.
pub const CATEGORIES_PLACEHOLDER: &str = "{CASHBACK_CATEGORIES}";

pub struct Pipeline {
    gateway: Arc<dyn Gateway>,
    model: Arc<dyn VisionModel>,
    prompt_template: String,
    sampling: SamplingParams,
    image_size: u32,
}

impl Pipeline {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        model: Arc<dyn VisionModel>,
        prompt_template: String,
        sampling: SamplingParams,
        image_size: u32,
    ) -> Self {
        Self {
            gateway,
            model,
            prompt_template,
            sampling,
            image_size,
        }
    }

    /// Prompt with the vocabulary rendered as a JSON array of names.
    pub fn build_prompt(&self, categories: &[String]) -> String {
        let list = serde_json::to_string(categories).unwrap_or_else(|_| "[]".to_string());
        self.prompt_template.replace(CATEGORIES_PLACEHOLDER, &list)
    }

    /// Steps 1–6: read rows off the image at `image_path` and stamp them for `person`.
    ///
    /// The image file is resized in place.
    pub async fn recognize(
        &self,
        image_path: &Path,
        person: &str,
    ) -> Result<Vec<Row>, ExtractError> {
        let categories = self
            .gateway
            .list_categories()
            .await
            .map_err(ExtractError::Categories)?;
        debug!(categories = ?categories, "category vocabulary");
        let prompt = self.build_prompt(&categories);

        let path: PathBuf = image_path.to_path_buf();
        let size = self.image_size;
        let image_base64 = tokio::task::spawn_blocking(move || prepare_image(&path, size)).await??;

        let response = self
            .model
            .complete(VisionRequest {
                prompt: &prompt,
                image_base64: &image_base64,
                sampling: &self.sampling,
            })
            .await?;
        debug!(response = %response, "model response");

        let mut rows = parse_rows(&response)?;
        let date = current_period();
        for row in &mut rows {
            row.stamp(person, &date);
        }
        info!(
            image = %image_path.display(),
            person,
            rows = rows.len(),
            "extracted rows"
        );
        Ok(rows)
    }

    /// Step 7: write `rows` one at a time, stopping at the first failure.
    pub async fn persist(&self, rows: &[Row]) -> Result<Vec<RowId>, ExtractError> {
        let mut ids = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let id = self
                .gateway
                .write_row(row)
                .await
                .map_err(|source| ExtractError::Persist { index, source })?;
            ids.push(id);
        }
        info!(rows = ids.len(), "rows persisted");
        Ok(ids)
    }

    /// Full run: [`recognize`](Self::recognize) then [`persist`](Self::persist).
    pub async fn extract(&self, image_path: &Path, person: &str) -> Result<Vec<Row>, ExtractError> {
        let rows = self.recognize(image_path, person).await?;
        self.persist(&rows).await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGateway, FakeModel, sample_image};
    use cashback_core::RowField;
    use cashback_store::StoreError;
    use tempfile::TempDir;

    const TEMPLATE: &str = "Pick from {CASHBACK_CATEGORIES} and answer with JSON.";

    fn pipeline(gateway: Arc<FakeGateway>, model: Arc<FakeModel>) -> Pipeline {
        Pipeline::new(gateway, model, TEMPLATE.to_string(), SamplingParams::new(), 64)
    }

    #[test]
    fn prompt_lists_categories() {
        let p = pipeline(FakeGateway::new(&[]), FakeModel::replying("[]"));
        assert_eq!(
            p.build_prompt(&["Food".into(), "Taxi".into()]),
            r#"Pick from ["Food","Taxi"] and answer with JSON."#
        );
    }

    #[tokio::test]
    async fn extract_stamps_and_writes_every_row() {
        let dir = TempDir::new().unwrap();
        let image = sample_image(&dir, "shot.png");
        let gateway = FakeGateway::new(&["Food", "Taxi"]);
        let model = FakeModel::replying(
            r#"Here you go: [{"Category": "Food", "Percent": 5, "Bank": "X"},
                            {"Category": "Taxi", "Percent": 10, "Bank": "X"}]"#,
        );
        let p = pipeline(gateway.clone(), model.clone());

        let rows = p.extract(&image, "p1").await.unwrap();

        assert_eq!(rows.len(), 2);
        let period = current_period();
        for row in &rows {
            assert_eq!(row.person.as_deref(), Some("p1"));
            assert_eq!(row.date.as_deref(), Some(period.as_str()));
        }
        assert_eq!(gateway.written(), rows);
        assert!(model.prompts()[0].contains(r#"["Food","Taxi"]"#));
    }

    #[tokio::test]
    async fn image_is_resized_before_the_call() {
        let dir = TempDir::new().unwrap();
        let image = sample_image(&dir, "shot.png");
        let p = pipeline(FakeGateway::new(&[]), FakeModel::replying("[]"));
        p.recognize(&image, "p1").await.unwrap();
        let resized = image::open(&image).unwrap();
        assert_eq!(resized.width().max(resized.height()), 64);
    }

    #[tokio::test]
    async fn recognize_does_not_write() {
        let dir = TempDir::new().unwrap();
        let image = sample_image(&dir, "shot.png");
        let gateway = FakeGateway::new(&[]);
        let model = FakeModel::replying(r#"[{"Category": "Food", "Percent": 5, "Bank": "X"}]"#);
        let rows = pipeline(gateway.clone(), model).recognize(&image, "p1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(gateway.written().is_empty());
    }

    #[tokio::test]
    async fn unparseable_response_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let image = sample_image(&dir, "shot.png");
        let gateway = FakeGateway::new(&[]);
        let p = pipeline(gateway.clone(), FakeModel::replying("Sorry, I can't read that."));
        assert!(matches!(p.extract(&image, "p1").await, Err(ExtractError::Parse(_))));
        assert!(gateway.written().is_empty());
    }

    #[tokio::test]
    async fn model_failure_is_upstream() {
        let dir = TempDir::new().unwrap();
        let image = sample_image(&dir, "shot.png");
        let p = pipeline(FakeGateway::new(&[]), FakeModel::failing());
        assert!(matches!(p.extract(&image, "p1").await, Err(ExtractError::Upstream(_))));
    }

    #[tokio::test]
    async fn missing_image_fails_before_model_call() {
        let dir = TempDir::new().unwrap();
        let model = FakeModel::replying("[]");
        let p = pipeline(FakeGateway::new(&[]), model.clone());
        let res = p.recognize(&dir.path().join("gone.jpg"), "p1").await;
        assert!(matches!(res, Err(ExtractError::Image(_))));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn partial_write_failure_keeps_earlier_rows() {
        let dir = TempDir::new().unwrap();
        let image = sample_image(&dir, "shot.png");
        let gateway = FakeGateway::failing_at(&[], 1);
        let model = FakeModel::replying(
            r#"[{"Category": "A", "Percent": 1, "Bank": "X"},
                {"Category": "B", "Percent": 2, "Bank": "X"},
                {"Category": "C", "Percent": 3, "Bank": "X"}]"#,
        );
        let err = pipeline(gateway.clone(), model).extract(&image, "p1").await.unwrap_err();
        assert!(matches!(err, ExtractError::Persist { index: 1, .. }));
        assert_eq!(gateway.written().len(), 1);
    }

    #[tokio::test]
    async fn row_missing_bank_fails_validation_on_write() {
        let dir = TempDir::new().unwrap();
        let image = sample_image(&dir, "shot.png");
        let gateway = FakeGateway::new(&[]);
        let model = FakeModel::replying(r#"[{"Category": "Food", "Percent": 5}]"#);
        let err = pipeline(gateway.clone(), model).extract(&image, "p1").await.unwrap_err();
        match err {
            ExtractError::Persist {
                source: StoreError::Validation { field },
                ..
            } => assert_eq!(field, RowField::Bank),
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(gateway.written().is_empty());
    }
}
