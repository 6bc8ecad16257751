// CSV export endpoints. Exports always reflect the current cached view of
// the default classification.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::api::routes::{cached_comparison, ApiState};
use crate::error::Result;
use crate::ingest::csv::write_row;
use crate::types::ClassificationResult;

fn csv_response(filename: &'static str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
}

fn opt(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

fn opt_price(v: Option<f64>) -> String {
    v.map(|p| format!("{p:.2}")).unwrap_or_default()
}

pub(crate) fn missing_csv(result: &ClassificationResult) -> String {
    let mut out = String::new();
    write_row(&mut out, &[
        "Name".to_string(),
        "SKU".to_string(),
        "Brand".to_string(),
        "Demand".to_string(),
        "Sizes Wanted".to_string(),
        "Stores".to_string(),
    ]);
    for item in &result.missing {
        write_row(&mut out, &[
            item.wtb_name.clone(),
            opt(&item.wtb_sku),
            opt(&item.brand),
            item.demand_count.to_string(),
            item.sizes_wanted.join(";"),
            item.stores_wanting.join(", "),
        ]);
    }
    out
}

pub(crate) fn all_csv(result: &ClassificationResult) -> String {
    let mut out = String::new();
    write_row(&mut out, &[
        "Status".to_string(),
        "Name".to_string(),
        "SKU".to_string(),
        "Brand".to_string(),
        "Demand".to_string(),
        "Price".to_string(),
        "URL".to_string(),
    ]);
    for item in &result.missing {
        write_row(&mut out, &[
            "Missing".to_string(),
            item.wtb_name.clone(),
            opt(&item.wtb_sku),
            opt(&item.brand),
            item.demand_count.to_string(),
            String::new(),
            String::new(),
        ]);
    }
    for item in &result.in_stock {
        write_row(&mut out, &[
            "In Stock".to_string(),
            item.my_product_name.clone(),
            opt(&item.my_product_sku),
            opt(&item.brand),
            item.demand_count.to_string(),
            opt_price(item.my_product_price),
            opt(&item.my_product_url),
        ]);
    }
    for item in &result.no_demand {
        write_row(&mut out, &[
            "No Demand".to_string(),
            item.my_product_name.clone(),
            opt(&item.my_product_sku),
            String::new(),
            "0".to_string(),
            opt_price(item.my_product_price),
            opt(&item.my_product_url),
        ]);
    }
    out
}

pub async fn export_missing(State(state): State<ApiState>) -> Result<impl IntoResponse> {
    let cached = cached_comparison(&state).await?;
    Ok(csv_response("missing_items.csv", missing_csv(&cached.result)))
}

pub async fn export_all(State(state): State<ApiState>) -> Result<impl IntoResponse> {
    let cached = cached_comparison(&state).await?;
    Ok(csv_response("comparison_results.csv", all_csv(&cached.result)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
