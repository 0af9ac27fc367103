use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: u64,
    /// Owner's username.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    pub breed: String,
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub description: String,
    /// Decimal amount as sent by the API, e.g. "1500.00".
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub views_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Body for creating or replacing a listing.
#[derive(Serialize, Debug, Clone, Default)]
pub struct PetForm {
    pub name: String,
    pub breed: String,
    pub age: u32,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Answer of `POST /pets/{id}/toggle_active/`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ActiveState {
    pub is_active: bool,
    #[serde(default)]
    pub message: String,
}

/// Query filters accepted by `GET /pets/`.
#[derive(Debug, Clone, Default)]
pub struct PetFilter {
    pub breed: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    /// Restrict to one seller.
    pub user: Option<u64>,
    pub page: Option<u32>,
}

impl PetFilter {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                query.push((key.to_string(), value));
            }
        };
        push("breed", self.breed.clone());
        push("category", self.category.clone());
        push("is_active", self.is_active.map(|b| b.to_string()));
        push("price_min", self.price_min.clone());
        push("price_max", self.price_max.clone());
        push("search", self.search.clone());
        push("ordering", self.ordering.clone());
        push("user", self.user.map(|u| u.to_string()));
        push("page", self.page.map(|p| p.to_string()));
        query
    }
}
