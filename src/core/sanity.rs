use crate::domain::model::RoofMeasurements;

/// 檢查可疑的量測值；只回傳警告，不中斷估算
pub fn check_measurements(m: &RoofMeasurements) -> Vec<String> {
    let mut warnings = Vec::new();

    if m.total_roof_area_sqft <= 0.0 {
        warnings.push("Total roof area is zero or negative.".to_string());
    }

    if m.perimeter_lf <= 0.0 {
        warnings.push("Roof perimeter is zero or negative.".to_string());
    }

    if m.total_roof_area_sqft > 0.0 && m.perimeter_lf > 0.0 {
        // 正方形周長 = 4√A
        let min_perimeter = 4.0 * m.total_roof_area_sqft.sqrt();
        if m.perimeter_lf < min_perimeter * 0.5 {
            warnings.push(format!(
                "Perimeter ({:.0}') seems too small for the area ({:.0} sqft).",
                m.perimeter_lf, m.total_roof_area_sqft
            ));
        }
    }

    if m.parapet_length_lf > m.perimeter_lf * 1.5 {
        warnings.push("Parapet length is significantly longer than roof perimeter.".to_string());
    }

    if m.parapet_height_ft > 6.0 {
        warnings.push(format!(
            "Parapet height ({} ft) is unusually high.",
            m.parapet_height_ft
        ));
    }

    for warning in &warnings {
        tracing::warn!("⚠️ {}", warning);
    }
    warnings
}
