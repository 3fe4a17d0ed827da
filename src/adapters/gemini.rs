//! Gemini 影像分析用戶端。
//!
//! 每頁圖面以 PNG 內嵌於 `generateContent` 請求；回覆解析成 JSON 並標上頁碼。
//! 單頁失敗不會中斷整批分析，失敗頁以 `parse_error` 或 `error` 欄位標記。

use crate::catalog::pricing::PriceBook;
use crate::config::services::GeminiConfig;
use crate::core::detail_takeoff::build_unit_detail_map;
use crate::core::drawing::{
    aggregate_measurements, detail_prompt, extract_json, measurement_prompt,
    select_best_parapet_height, spec_prompt, PARAPET_HEIGHT_PROMPT, PLAN_PROMPT,
};
use crate::domain::analysis::{
    DrawingAnalysis, MeasurementCandidate, ParapetCandidate, ReferenceMeasurement,
};
use crate::utils::error::{EstimatorError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// 已轉成 PNG 的圖面頁
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page: u32,
    pub png: Vec<u8>,
}

/// 讀取目錄中的 `page-<n>.png`
pub async fn load_page_images(dir: impl AsRef<Path>, pages: &[u32]) -> Result<Vec<PageImage>> {
    let mut images = Vec::with_capacity(pages.len());
    for &page in pages {
        let path = dir.as_ref().join(format!("page-{}.png", page));
        images.push(load_page_image(page, &path).await?);
    }
    Ok(images)
}

pub async fn load_page_image(page: u32, path: &Path) -> Result<PageImage> {
    match tokio::fs::read(path).await {
        Ok(png) => Ok(PageImage { page, png }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EstimatorError::NotFoundError {
            resource: "Page image".to_string(),
            detail: PathBuf::from(path).display().to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    InlineData { inline_data: InlineData },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn service_error(&self, status: Option<u16>, message: impl Into<String>) -> EstimatorError {
        EstimatorError::ExternalServiceError {
            service: "Gemini".to_string(),
            status,
            message: message.into(),
        }
    }

    async fn generate_once(&self, image_png: &[u8], prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: STANDARD.encode(image_png),
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(self.service_error(Some(status.as_u16()), body));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(text)
    }

    /// 送出影像與提示詞；可重試的錯誤以 2^(n+1) 倍基準延遲重試
    pub async fn generate(&self, image_png: &[u8], prompt: &str) -> Result<String> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let started = Instant::now();
            tracing::debug!(
                "Gemini API call attempt {}/{} (model={})",
                attempt + 1,
                attempts,
                self.config.model
            );

            match self.generate_once(image_png, prompt).await {
                Ok(text) => {
                    tracing::debug!(
                        "Gemini API responded in {:.1}s ({} chars)",
                        started.elapsed().as_secs_f64(),
                        text.len()
                    );
                    return Ok(text);
                }
                Err(e) if attempt + 1 < attempts && e.is_retryable() => {
                    let wait = Duration::from_millis(
                        self.config.retry_base_delay_ms * 2u64.pow(attempt as u32 + 1),
                    );
                    tracing::warn!(
                        "⚠️ Gemini API error (attempt {}): {}. Retrying in {:?}",
                        attempt + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("❌ Gemini API failed after {} attempts: {}", attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }

    /// 分析單頁並標上 `source_page`；失敗時回傳錯誤標記而非中斷
    pub async fn analyze_page(&self, image: &PageImage, prompt: &str) -> Value {
        let started = Instant::now();
        tracing::info!("🔍 Page {}: starting analysis...", image.page);

        let raw = match self.generate(&image.png, prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("❌ Page {}: failed: {}", image.page, e);
                return json!({"source_page": image.page, "error": e.to_string()});
            }
        };

        match serde_json::from_str::<Value>(extract_json(&raw)) {
            Ok(Value::Object(mut data)) => {
                data.insert("source_page".to_string(), json!(image.page));
                tracing::info!(
                    "✅ Page {}: completed in {:.1}s",
                    image.page,
                    started.elapsed().as_secs_f64()
                );
                Value::Object(data)
            }
            Ok(_) | Err(_) => {
                tracing::warn!("⚠️ Page {}: response is not a JSON object", image.page);
                let preview: String = raw.chars().take(500).collect();
                tracing::debug!("Page {}: raw response was: {}", image.page, preview);
                json!({"source_page": image.page, "raw_response": raw, "parse_error": true})
            }
        }
    }

    /// 同時分析多頁（上限 max_concurrency），結果依頁碼排序
    pub async fn analyze_pages(&self, images: &[PageImage], prompt: &str) -> Vec<Value> {
        let mut results: Vec<Value> = futures::stream::iter(images)
            .map(|image| self.analyze_page(image, prompt))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        results.sort_by_key(|v| v.get("source_page").and_then(Value::as_u64).unwrap_or(0));
        results
    }

    /// 平面圖、細部圖與規範頁三路分析，最後建立標示單元對照表
    pub async fn analyze_drawing(
        &self,
        drawing_pdf: &str,
        plan_pages: &[PageImage],
        detail_pages: &[PageImage],
        spec_pages: &[PageImage],
        book: &PriceBook,
    ) -> DrawingAnalysis {
        let detail_prompt = detail_prompt(book);
        let spec_prompt = spec_prompt(book);

        let (plans, details, specs) = tokio::join!(
            self.analyze_pages(plan_pages, PLAN_PROMPT),
            self.analyze_pages(detail_pages, &detail_prompt),
            self.analyze_pages(spec_pages, &spec_prompt),
        );

        let mut analysis = DrawingAnalysis {
            drawing_pdf: drawing_pdf.to_string(),
            model_used: self.config.model.clone(),
            plan_analysis: into_pages(plans),
            detail_analysis: into_pages(details),
            spec_analysis: into_pages(specs),
            unit_detail_map: Vec::new(),
        };
        analysis.unit_detail_map = build_unit_detail_map(&analysis);
        analysis
    }

    pub async fn analyze_measurements(
        &self,
        plan_pages: &[PageImage],
        reference: Option<&ReferenceMeasurement>,
    ) -> MeasurementCandidate {
        let prompt = measurement_prompt(reference);
        let results = self.analyze_pages(plan_pages, &prompt).await;
        aggregate_measurements(successful_candidates(results))
    }

    pub async fn analyze_parapet_height(&self, detail_pages: &[PageImage]) -> ParapetCandidate {
        let results = self.analyze_pages(detail_pages, PARAPET_HEIGHT_PROMPT).await;
        select_best_parapet_height(successful_candidates(results))
    }

    /// 列出可用模型（每頁 100 筆，自動翻頁）
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.config.endpoint.trim_end_matches('/'));
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .query(&[("pageSize", "100")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(self.service_error(Some(status.as_u16()), body));
            }

            let page: ListModelsResponse = response.json().await?;
            models.extend(page.models);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Found {} Gemini models", models.len());
        Ok(models)
    }
}

/// 模型回覆 → 頁面型別；形狀不符者轉為 parse_error 頁
fn into_pages<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| {
            let page = value.get("source_page").cloned().unwrap_or(json!(0));
            serde_json::from_value(value.clone())
                .or_else(|_| {
                    serde_json::from_value(json!({
                        "source_page": page,
                        "raw_response": value.to_string(),
                        "parse_error": true,
                    }))
                })
                .ok()
        })
        .collect()
}

/// 失敗頁不列入候選
fn successful_candidates<T: DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
    values
        .into_iter()
        .filter(|v| v.get("error").is_none() && v.get("parse_error").is_none())
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::PlanPage;

    #[test]
    fn test_into_pages_marks_malformed_responses() {
        let pages: Vec<PlanPage> = into_pages(vec![
            json!({"source_page": 1, "counts": {"roof_drains": 2}}),
            json!({"source_page": 2, "unit_labels": "not a list"}),
            json!({"source_page": 3, "error": "timeout"}),
        ]);

        assert_eq!(pages.len(), 3);
        assert!(pages[0].is_usable());
        assert!(pages[1].parse_error);
        assert!(!pages[2].is_usable());
    }

    #[test]
    fn test_successful_candidates_skip_failed_pages() {
        let candidates: Vec<MeasurementCandidate> = successful_candidates(vec![
            json!({"source_page": 1, "total_roof_area_sqft": "1200", "confidence": "medium"}),
            json!({"source_page": 2, "raw_response": "??", "parse_error": true}),
            json!({"source_page": 3, "error": "boom"}),
        ]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].total_roof_area_sqft, 1200.0);
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: STANDARD.encode(b"png"),
                        },
                    },
                    Part::Text { text: "count drains" },
                ],
            }],
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["inline_data"]["data"], "cG5n");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "count drains");
    }
}
