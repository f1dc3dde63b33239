//! Canned backend payloads.

use cynapp_core::Product;
use serde_json::{Value, json};

/// Sensor kit, 10 per unit.
pub const SENSOR_KIT: &str = "prod-sensor";

/// Gateway, 25 per unit.
pub const GATEWAY: &str = "prod-gateway";

/// Monitoring plan, 5 per unit, recurring.
pub const MONITORING: &str = "prod-monitoring";

/// Product JSON objects the shop sells.
#[must_use]
pub fn catalog() -> Vec<Value> {
    vec![
        json!({
            "_id": SENSOR_KIT,
            "label": { "en": "Sensor kit", "fr": "Kit capteur" },
            "characteristics": { "Connectivity": ["LoRa", "BLE"] },
            "categorie": "cat-hardware",
            "stock": 40,
            "price": 10,
            "taxe": 20,
            "picture": "https://cdn.shop.test/sensor.png"
        }),
        json!({
            "_id": GATEWAY,
            "label": { "en": "Gateway", "fr": "Passerelle" },
            "categorie": "cat-hardware",
            "stock": 5,
            "price": 25,
            "taxe": 20
        }),
        json!({
            "_id": MONITORING,
            "label": { "en": "Monitoring plan", "fr": "Abonnement supervision" },
            "categorie": "cat-services",
            "stock": 1000,
            "price": 5,
            "priceMonthly": 5,
            "priceAnnual": 50,
            "subscription": true
        }),
    ]
}

/// Category page JSON.
#[must_use]
pub fn categories() -> Value {
    json!({
        "categories": [
            { "_id": "cat-hardware", "label": { "en": "Hardware", "fr": "Matériel" }, "isActive": true },
            { "_id": "cat-services", "label": { "en": "Services", "fr": "Services" }, "isActive": true },
            { "_id": "cat-legacy", "label": { "en": "Legacy" }, "isActive": false }
        ],
        "total": 3
    })
}

/// Decoded catalog product `id`.
///
/// # Panics
///
/// Panics if `id` is not in [`catalog`].
#[must_use]
pub fn product(id: &str) -> Product {
    let json = catalog()
        .into_iter()
        .find(|p| p.get("_id").and_then(Value::as_str) == Some(id))
        .unwrap_or_else(|| panic!("no fixture product {id}"));
    serde_json::from_value(json).unwrap_or_else(|e| panic!("fixture {id} does not decode: {e}"))
}
