use serde::{Deserialize, Serialize};

/// Descriptive data resolved for a single code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichmentRecord {
    pub code: String,
    pub name: String,
    pub brand: String,
    pub calories: f64,
    pub fat: f64,
    pub protein: f64,
    pub sugar: f64,
}

/// Body of `GET /search/item`.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
    pub foods: Vec<FoodItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoodItem {
    pub food_name: String,
    pub brand_name: String,
    pub nf_calories: f64,
    pub nf_total_fat: f64,
    pub nf_protein: f64,
    pub nf_sugars: f64,
}

impl FoodItem {
    pub fn into_record(self, code: &str) -> EnrichmentRecord {
        EnrichmentRecord {
            code: code.to_string(),
            name: self.food_name,
            brand: self.brand_name,
            calories: self.nf_calories,
            fat: self.nf_total_fat,
            protein: self.nf_protein,
            sugar: self.nf_sugars,
        }
    }
}

impl LookupResponse {
    /// The first listed item wins; `None` when the provider matched nothing.
    pub fn into_first_record(self, code: &str) -> Option<EnrichmentRecord> {
        self.foods
            .into_iter()
            .next()
            .map(|item| item.into_record(code))
    }
}
