//! Order content generation
//!
//! The pipeline only needs an [`OrderSource`]; what goes into an order is up
//! to the implementation. [`CatalogOrderSource`] picks random items from a
//! small product catalogue and a random customer.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::types::{Order, OrderId};

/// Produces the order for a given id
///
/// Returning `None` means the source is exhausted, which the generator treats
/// as a fatal configuration error.
pub trait OrderSource: Send + Sync {
    /// Build the order with the given id
    fn next_order(&self, id: OrderId) -> Option<Order>;
}

impl<F> OrderSource for F
where
    F: Fn(OrderId) -> Option<Order> + Send + Sync,
{
    fn next_order(&self, id: OrderId) -> Option<Order> {
        self(id)
    }
}

/// A product that can appear in generated orders
#[derive(Clone, Debug, PartialEq)]
pub struct Product {
    /// Product name
    pub name: String,
    /// Unit price
    pub price: f64,
}

impl Product {
    /// Create a product
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}

/// Random orders drawn from a fixed catalogue
#[derive(Clone, Debug)]
pub struct CatalogOrderSource {
    products: Vec<Product>,
    customers: Vec<String>,
    max_items: usize,
}

impl Default for CatalogOrderSource {
    fn default() -> Self {
        Self {
            products: vec![
                Product::new("PC", 1500.0),
                Product::new("Laptop", 1100.0),
                Product::new("iPad", 325.0),
                Product::new("iPhone", 210.0),
                Product::new("Mouse", 15.0),
            ],
            customers: vec![
                "Janusz".to_string(),
                "Bartlomiej".to_string(),
                "Ryba".to_string(),
            ],
            max_items: 5,
        }
    }
}

impl CatalogOrderSource {
    /// Build a source from a custom catalogue
    ///
    /// Orders contain between 1 and `max_items` items (at least 1). An empty
    /// catalogue or customer list yields an exhausted source.
    pub fn new(products: Vec<Product>, customers: Vec<String>, max_items: usize) -> Self {
        Self {
            products,
            customers,
            max_items: max_items.max(1),
        }
    }
}

impl OrderSource for CatalogOrderSource {
    fn next_order(&self, id: OrderId) -> Option<Order> {
        let mut rng = rand::thread_rng();

        let customer_name = self.customers.choose(&mut rng)?.clone();
        let count = rng.gen_range(1..=self.max_items);

        let mut items = Vec::with_capacity(count);
        let mut total_amount = 0.0;
        for _ in 0..count {
            let product = self.products.choose(&mut rng)?;
            items.push(product.name.clone());
            total_amount += product.price;
        }

        Some(Order {
            id,
            customer_name,
            items,
            total_amount,
        })
    }
}
