//! Google Solar API 建物屋頂資料與平屋頂概算。

use crate::catalog::pricing::PriceBook;
use crate::config::services::SolarConfig;
use crate::domain::estimate::round2;
use crate::utils::error::{EstimatorError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const SQ_M_TO_SQ_FT: f64 = 10.7639;
const M_TO_FT: f64 = 3.28084;
/// 平均地球半徑 (公尺)
const EARTH_RADIUS_M: f64 = 6_371_008.8;
const SQFT_PER_HVAC_UNIT: f64 = 2500.0;
const MEMBRANE_WASTE: f64 = 1.10;
const COMPASS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub sw: LatLng,
    pub ne: LatLng,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoofSegment {
    pub pitch_degrees: f64,
    pub azimuth_degrees: f64,
    pub area_m2: f64,
    pub ground_area_m2: f64,
    pub height_m: f64,
    pub center: Option<LatLng>,
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingInsights {
    pub latitude: f64,
    pub longitude: f64,
    pub whole_roof_area_m2: f64,
    pub ground_area_m2: f64,
    pub roof_segments: Vec<RoofSegment>,
    pub imagery_quality: String,
}

// Solar API 原始回應
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightsResponse {
    #[serde(default)]
    solar_potential: SolarPotential,
    imagery_quality: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolarPotential {
    #[serde(default)]
    whole_roof_stats: AreaStats,
    #[serde(default)]
    roof_segment_stats: Vec<SegmentStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AreaStats {
    #[serde(default)]
    area_meters2: f64,
    #[serde(default)]
    ground_area_meters2: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentStats {
    #[serde(default)]
    pitch_degrees: f64,
    #[serde(default)]
    azimuth_degrees: f64,
    #[serde(default)]
    stats: AreaStats,
    #[serde(default)]
    plane_height_at_center_meters: f64,
    center: Option<LatLng>,
    bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Debug, Default, Deserialize)]
struct ArcGisResponse {
    #[serde(default)]
    candidates: Vec<ArcGisCandidate>,
}

#[derive(Debug, Deserialize)]
struct ArcGisCandidate {
    location: ArcGisPoint,
}

#[derive(Debug, Deserialize)]
struct ArcGisPoint {
    x: f64,
    y: f64,
}

pub struct SolarClient {
    config: SolarConfig,
    client: Client,
}

impl SolarClient {
    pub fn new(config: SolarConfig) -> Self {
        Self {
            config,
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    fn service_error(service: &str, status: Option<u16>, message: impl Into<String>) -> EstimatorError {
        EstimatorError::ExternalServiceError {
            service: service.to_string(),
            status,
            message: message.into(),
        }
    }

    async fn nominatim_search(&self, address: &str) -> Result<Option<(f64, f64)>> {
        let url = format!("{}/search", self.config.nominatim_endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::service_error(
                "Nominatim",
                Some(status.as_u16()),
                response.text().await.unwrap_or_default(),
            ));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        Ok(places
            .first()
            .and_then(|p| Some((p.lat.parse().ok()?, p.lon.parse().ok()?))))
    }

    async fn arcgis_search(&self, address: &str) -> Result<Option<(f64, f64)>> {
        let url = format!(
            "{}/findAddressCandidates",
            self.config.arcgis_endpoint.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[("SingleLine", address), ("f", "json"), ("maxLocations", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::service_error(
                "ArcGIS",
                Some(status.as_u16()),
                response.text().await.unwrap_or_default(),
            ));
        }

        let body: ArcGisResponse = response.json().await?;
        Ok(body.candidates.first().map(|c| (c.location.y, c.location.x)))
    }

    /// 地址 → (緯度, 經度)；Nominatim 連續失敗後改用 ArcGIS
    pub async fn geocode(&self, address: &str) -> Result<(f64, f64)> {
        let attempts = self.config.geocode_attempts.max(1);
        let mut location = None;

        for attempt in 0..attempts {
            match self.nominatim_search(address).await {
                Ok(found) => {
                    location = found;
                    break;
                }
                Err(e) if attempt + 1 < attempts => {
                    let wait =
                        Duration::from_millis(self.config.retry_base_delay_ms * 2u64.pow(attempt as u32));
                    tracing::warn!(
                        "⚠️ Geocoder error (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        attempts,
                        wait,
                        e
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(nominatim_err) => {
                    tracing::warn!(
                        "⚠️ Nominatim failed after {} attempts, falling back to ArcGIS",
                        attempts
                    );
                    location = self.arcgis_search(address).await.map_err(|arcgis_err| {
                        Self::service_error(
                            "Geocoding",
                            None,
                            format!(
                                "All geocoders failed. Nominatim: {} | ArcGIS: {}",
                                nominatim_err, arcgis_err
                            ),
                        )
                    })?;
                }
            }
        }

        let (lat, lng) = location.ok_or_else(|| EstimatorError::NotFoundError {
            resource: "Address".to_string(),
            detail: format!("Could not find coordinates for address: {}", address),
        })?;
        tracing::info!("🔍 Located: {} ({}, {})", address, lat, lng);
        Ok((lat, lng))
    }

    pub async fn find_closest(&self, lat: f64, lng: f64) -> Result<BuildingInsights> {
        let url = format!(
            "{}/v1/buildingInsights:findClosest",
            self.config.solar_endpoint.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[
                ("location.latitude", lat.to_string()),
                ("location.longitude", lng.to_string()),
                ("requiredQuality", "HIGH".to_string()),
                ("key", self.config.api_key.clone()),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(EstimatorError::NotFoundError {
                    resource: "Building".to_string(),
                    detail: format!(
                        "No building found near ({:.6}, {:.6}). Google Solar API may not have coverage for this location.",
                        lat, lng
                    ),
                })
            }
            StatusCode::FORBIDDEN => {
                return Err(Self::service_error(
                    "Google Solar API",
                    Some(403),
                    "Google Solar API access denied. Check that your API key is valid and the Solar API is enabled in your Google Cloud project.",
                ))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                return Err(Self::service_error(
                    "Google Solar API",
                    Some(status.as_u16()),
                    text.chars().take(200).collect::<String>(),
                ));
            }
        }

        let data: InsightsResponse = response.json().await?;
        Ok(insights_from_response(lat, lng, data))
    }

    pub async fn get_building_insights(&self, address: &str) -> Result<BuildingInsights> {
        let (lat, lng) = self.geocode(address).await?;
        self.find_closest(lat, lng).await
    }
}

fn insights_from_response(lat: f64, lng: f64, data: InsightsResponse) -> BuildingInsights {
    let solar = data.solar_potential;
    BuildingInsights {
        latitude: lat,
        longitude: lng,
        whole_roof_area_m2: solar.whole_roof_stats.area_meters2,
        ground_area_m2: solar.whole_roof_stats.ground_area_meters2,
        roof_segments: solar
            .roof_segment_stats
            .into_iter()
            .map(|seg| RoofSegment {
                pitch_degrees: seg.pitch_degrees,
                azimuth_degrees: seg.azimuth_degrees,
                area_m2: seg.stats.area_meters2,
                ground_area_m2: seg.stats.ground_area_meters2,
                height_m: seg.plane_height_at_center_meters,
                center: seg.center,
                bounding_box: seg.bounding_box,
            })
            .collect(),
        imagery_quality: data.imagery_quality.unwrap_or_else(|| "UNKNOWN".to_string()),
    }
}

/// 大圓距離 (公尺)
pub fn great_circle_m(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlng = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// 以所有屋面分區的外框估算建物周長 (ft)
pub fn estimate_perimeter(insights: &BuildingInsights) -> f64 {
    let boxes: Vec<&BoundingBox> = insights
        .roof_segments
        .iter()
        .filter_map(|s| s.bounding_box.as_ref())
        .collect();

    if boxes.is_empty() {
        // 沒有外框時假設為正方形
        let ground_area_sqft = insights.ground_area_m2 * SQ_M_TO_SQ_FT;
        return 4.0 * ground_area_sqft.sqrt();
    }

    let sw_lat = boxes.iter().map(|b| b.sw.latitude).fold(f64::INFINITY, f64::min);
    let sw_lng = boxes.iter().map(|b| b.sw.longitude).fold(f64::INFINITY, f64::min);
    let ne_lat = boxes.iter().map(|b| b.ne.latitude).fold(f64::NEG_INFINITY, f64::max);
    let ne_lng = boxes.iter().map(|b| b.ne.longitude).fold(f64::NEG_INFINITY, f64::max);

    let origin = LatLng {
        latitude: sw_lat,
        longitude: sw_lng,
    };
    let width_ft = great_circle_m(
        origin,
        LatLng {
            latitude: sw_lat,
            longitude: ne_lng,
        },
    ) * M_TO_FT;
    let height_ft = great_circle_m(
        origin,
        LatLng {
            latitude: ne_lat,
            longitude: sw_lng,
        },
    ) * M_TO_FT;

    2.0 * (width_ft + height_ft)
}

/// 平屋頂概算使用的防水膜種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MembraneFamily {
    #[default]
    #[serde(rename = "TPO")]
    Tpo,
    #[serde(rename = "EPDM")]
    Epdm,
}

impl MembraneFamily {
    fn pricing_key(&self) -> &'static str {
        match self {
            MembraneFamily::Tpo => "TPO_60mil_Mechanically_Attached",
            MembraneFamily::Epdm => "EPDM_60mil_Fully_Adhered",
        }
    }
}

impl fmt::Display for MembraneFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembraneFamily::Tpo => write!(f, "TPO"),
            MembraneFamily::Epdm => write!(f, "EPDM"),
        }
    }
}

impl FromStr for MembraneFamily {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TPO" => Ok(MembraneFamily::Tpo),
            "EPDM" => Ok(MembraneFamily::Epdm),
            _ => Err(EstimatorError::InvalidConfigValueError {
                field: "system".to_string(),
                value: s.to_string(),
                reason: "Expected TPO or EPDM".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintMetrics {
    pub footprint_area_sqft: f64,
    pub roof_surface_area_sqft: f64,
    pub perimeter_linear_ft: f64,
    pub est_hvac_units: u32,
    pub num_roof_segments: usize,
    pub imagery_quality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintCosts {
    pub membrane: f64,
    pub insulation: f64,
    pub flashing: f64,
    pub hvac_curbs: f64,
    #[serde(rename = "TOTAL_ESTIMATE")]
    pub total_estimate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment_number: usize,
    pub pitch_degrees: f64,
    pub azimuth_degrees: f64,
    pub compass_direction: String,
    pub surface_area_sqft: f64,
    pub ground_area_sqft: f64,
    pub height_ft: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintEstimate {
    pub metrics: FootprintMetrics,
    pub costs: FootprintCosts,
    pub roof_segments: Vec<SegmentSummary>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn compass_direction(azimuth_degrees: f64) -> &'static str {
    let index = (azimuth_degrees / 45.0).round_ties_even().rem_euclid(8.0) as usize;
    COMPASS[index % 8]
}

/// 由建物資料估算平屋頂造價（防水膜含女兒牆立面與 10% 損耗）
pub fn estimate_flat_roof(
    insights: &BuildingInsights,
    family: MembraneFamily,
    parapet_height_ft: f64,
    hvac_override: Option<u32>,
    book: &PriceBook,
) -> FootprintEstimate {
    let field_area_sqft = insights.ground_area_m2 * SQ_M_TO_SQ_FT;
    let whole_roof_area_sqft = insights.whole_roof_area_m2 * SQ_M_TO_SQ_FT;
    let perimeter_lf = estimate_perimeter(insights);

    let hvac_units =
        hvac_override.unwrap_or_else(|| (field_area_sqft / SQFT_PER_HVAC_UNIT).ceil().max(0.0) as u32);

    let total_membrane_sqft = (field_area_sqft + perimeter_lf * parapet_height_ft) * MEMBRANE_WASTE;

    let membrane = total_membrane_sqft * book.price(family.pricing_key());
    let insulation = field_area_sqft * book.price("ISO_Insulation_2_Layer");
    let flashing = perimeter_lf * book.price("Parapet_Flashing_Detail");
    let hvac_curbs = f64::from(hvac_units) * book.price("HVAC_Curb_Detail");

    let roof_segments: Vec<SegmentSummary> = insights
        .roof_segments
        .iter()
        .enumerate()
        .map(|(i, seg)| SegmentSummary {
            segment_number: i + 1,
            pitch_degrees: round_to(seg.pitch_degrees, 1),
            azimuth_degrees: round_to(seg.azimuth_degrees, 1),
            compass_direction: compass_direction(seg.azimuth_degrees).to_string(),
            surface_area_sqft: round_to(seg.area_m2 * SQ_M_TO_SQ_FT, 0),
            ground_area_sqft: round_to(seg.ground_area_m2 * SQ_M_TO_SQ_FT, 0),
            height_ft: round_to(seg.height_m * M_TO_FT, 1),
        })
        .collect();

    FootprintEstimate {
        metrics: FootprintMetrics {
            footprint_area_sqft: round_to(field_area_sqft, 0),
            roof_surface_area_sqft: round_to(whole_roof_area_sqft, 0),
            perimeter_linear_ft: round_to(perimeter_lf, 0),
            est_hvac_units: hvac_units,
            num_roof_segments: roof_segments.len(),
            imagery_quality: insights.imagery_quality.clone(),
        },
        costs: FootprintCosts {
            membrane: round2(membrane),
            insulation: round2(insulation),
            flashing: round2(flashing),
            hvac_curbs: round2(hvac_curbs),
            total_estimate: round2(membrane + insulation + flashing + hvac_curbs),
        },
        roof_segments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_insights(with_boxes: bool) -> BuildingInsights {
        // 約 30m × 30m
        let bbox = BoundingBox {
            sw: LatLng {
                latitude: 51.0,
                longitude: -114.0,
            },
            ne: LatLng {
                latitude: 51.0 + 30.0 / 111_195.0,
                longitude: -114.0 + 30.0 / (111_195.0 * 51f64.to_radians().cos()),
            },
        };
        BuildingInsights {
            latitude: 51.0,
            longitude: -114.0,
            whole_roof_area_m2: 910.0,
            ground_area_m2: 900.0,
            roof_segments: vec![RoofSegment {
                pitch_degrees: 2.04,
                azimuth_degrees: 181.26,
                area_m2: 910.0,
                ground_area_m2: 900.0,
                height_m: 6.1,
                center: None,
                bounding_box: with_boxes.then_some(bbox),
            }],
            imagery_quality: "HIGH".to_string(),
        }
    }

    #[test]
    fn test_perimeter_from_bounding_box() {
        let perimeter = estimate_perimeter(&square_insights(true));
        // 4 × 30m × 3.28084 ≈ 393.7 ft
        assert!((perimeter - 393.7).abs() < 1.0, "perimeter was {}", perimeter);
    }

    #[test]
    fn test_perimeter_square_fallback() {
        let perimeter = estimate_perimeter(&square_insights(false));
        let expected = 4.0 * (900.0 * SQ_M_TO_SQ_FT).sqrt();
        assert!((perimeter - expected).abs() < 1e-9);
    }

    #[test]
    fn test_compass_direction_rounds_half_even() {
        assert_eq!(compass_direction(0.0), "N");
        assert_eq!(compass_direction(22.5), "N");
        assert_eq!(compass_direction(67.5), "E");
        assert_eq!(compass_direction(181.26), "S");
        assert_eq!(compass_direction(350.0), "N");
    }

    #[test]
    fn test_flat_roof_estimate() {
        let book = PriceBook::builtin();
        let insights = square_insights(false);
        let estimate = estimate_flat_roof(&insights, MembraneFamily::Tpo, 2.0, None, &book);

        let area = 900.0 * SQ_M_TO_SQ_FT;
        let perimeter = 4.0 * area.sqrt();
        assert_eq!(estimate.metrics.est_hvac_units, 4);
        assert_eq!(estimate.metrics.footprint_area_sqft, 9688.0);
        assert_eq!(estimate.roof_segments[0].compass_direction, "S");
        assert_eq!(estimate.roof_segments[0].height_ft, 20.0);

        let expected = (area + perimeter * 2.0) * 1.10 * 5.50
            + area * 3.75
            + perimeter * 45.0
            + 4.0 * 850.0;
        assert!((estimate.costs.total_estimate - expected).abs() < 0.01);

        let epdm = estimate_flat_roof(&insights, MembraneFamily::Epdm, 2.0, Some(1), &book);
        assert_eq!(epdm.metrics.est_hvac_units, 1);
        assert!(epdm.costs.membrane > estimate.costs.membrane);
    }

    #[test]
    fn test_membrane_family_parsing() {
        assert_eq!("tpo".parse::<MembraneFamily>().unwrap(), MembraneFamily::Tpo);
        assert_eq!("EPDM".parse::<MembraneFamily>().unwrap(), MembraneFamily::Epdm);
        assert!("SBS".parse::<MembraneFamily>().is_err());
    }
}
