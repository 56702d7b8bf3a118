//! Field-map codecs for remote documents.
//!
//! The remote store exposes untyped key-value documents.  Decoding never
//! fails: missing or wrongly-typed fields fall back to safe defaults so one
//! malformed remote record degrades in place instead of poisoning a whole
//! sync batch.
//!
//! Document ids live outside the field map (they are the document's address
//! in its collection), so encoders omit `id` and decoders take it as a
//! parameter.

use serde_json::{Map, Value};

use crate::constants::ADMIN_FIELD;
use crate::models::{Product, User};

/// An untyped remote document: field name to JSON value.
pub type Document = Map<String, Value>;

// ---------------------------------------------------------------------------
// Field accessors
// ---------------------------------------------------------------------------

fn text(doc: &Document, field: &str) -> String {
    doc.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn float(doc: &Document, field: &str) -> f64 {
    doc.get(field).and_then(Value::as_f64).unwrap_or_default()
}

fn integer(doc: &Document, field: &str) -> i64 {
    doc.get(field)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or_default()
}

/// Normalize the remote admin flag.
///
/// The field historically arrives as a boolean or a numeric 0/1; anything
/// else (missing, null, string, ...) decodes to `false`.
pub fn admin_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

pub fn product_from_document(id: &str, doc: &Document) -> Product {
    Product {
        id: id.to_string(),
        name: text(doc, "name"),
        brand: text(doc, "brand"),
        category: text(doc, "category"),
        origin: text(doc, "origin"),
        price: float(doc, "price"),
        stock: integer(doc, "stock"),
        image_url: text(doc, "imageUrl"),
        description: text(doc, "description"),
    }
}

pub fn product_to_document(product: &Product) -> Document {
    let mut doc = Document::new();
    doc.insert("name".into(), Value::from(product.name.clone()));
    doc.insert("brand".into(), Value::from(product.brand.clone()));
    doc.insert("category".into(), Value::from(product.category.clone()));
    doc.insert("origin".into(), Value::from(product.origin.clone()));
    doc.insert("price".into(), Value::from(product.price));
    doc.insert("stock".into(), Value::from(product.stock));
    doc.insert("imageUrl".into(), Value::from(product.image_url.clone()));
    doc.insert(
        "description".into(),
        Value::from(product.description.clone()),
    );
    doc
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

pub fn user_from_document(id: &str, doc: &Document) -> User {
    User {
        id: id.to_string(),
        email: text(doc, "email"),
        name: text(doc, "name"),
        is_admin: admin_flag(doc.get(ADMIN_FIELD)),
    }
}

pub fn user_to_document(user: &User) -> Document {
    let mut doc = Document::new();
    doc.insert("email".into(), Value::from(user.email.clone()));
    doc.insert("name".into(), Value::from(user.name.clone()));
    doc.insert(ADMIN_FIELD.into(), Value::from(user.is_admin));
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn admin_flag_accepts_bool_and_numeric_shapes() {
        assert!(admin_flag(Some(&json!(true))));
        assert!(!admin_flag(Some(&json!(false))));
        assert!(admin_flag(Some(&json!(1))));
        assert!(admin_flag(Some(&json!(1.0))));
        assert!(!admin_flag(Some(&json!(0))));
        assert!(!admin_flag(Some(&json!(0.0))));
        assert!(!admin_flag(Some(&json!("true"))));
        assert!(!admin_flag(Some(&json!(null))));
        assert!(!admin_flag(None));
    }

    #[test]
    fn product_round_trips_through_document() {
        let product = Product {
            id: "p-1".into(),
            name: "Phin filter".into(),
            brand: "Trung Nguyên".into(),
            category: "Coffee".into(),
            origin: "Vietnam".into(),
            price: 12.5,
            stock: 40,
            image_url: "https://img.example/phin.png".into(),
            description: "Stainless steel drip filter".into(),
        };

        let decoded = product_from_document("p-1", &product_to_document(&product));
        assert_eq!(decoded, product);
    }

    #[test]
    fn malformed_product_fields_default_instead_of_failing() {
        let decoded = product_from_document(
            "p-2",
            &doc(json!({
                "name": 42,
                "price": "free",
                "stock": 3.0,
            })),
        );

        assert_eq!(decoded.name, "");
        assert_eq!(decoded.price, 0.0);
        assert_eq!(decoded.stock, 3);
        assert_eq!(decoded.brand, "");
    }

    #[test]
    fn user_decode_normalizes_admin_flag() {
        let user = user_from_document(
            "u-1",
            &doc(json!({ "email": "a@b.c", "name": "A", "isAdmin": 1 })),
        );
        assert!(user.is_admin);

        let user = user_from_document("u-1", &doc(json!({ "isAdmin": "yes" })));
        assert!(!user.is_admin);
        assert_eq!(user.email, "");
    }
}
